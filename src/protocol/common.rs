// ============================================================================
// 1. 数据结构定义 (Data Structures)
// ============================================================================

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::math::FieldElement;
use crate::serde_impl::{biguint, biguint_seq};

/// 带盲化因子的分片 (Blinded Share)
///
/// `y = f(x)` 是秘密多项式的取值，`r = g(x)` 是盲化多项式的取值。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Share {
    pub x: u32,
    pub y: FieldElement,
    pub r: FieldElement,
}

impl Share {
    pub fn x_element(&self) -> FieldElement {
        FieldElement::from(self.x)
    }
}

/// 分片文件的两种格式 (Share Record)
///
/// - `Legacy`: 旧版 `x,y`，没有盲化因子，只能用于秘密恢复。
/// - `Blinded`: `x,y,r`，可以生成 Pedersen 承诺。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShareRecord {
    Legacy { x: u32, y: FieldElement },
    Blinded(Share),
}

impl ShareRecord {
    pub fn x(&self) -> u32 {
        match self {
            ShareRecord::Legacy { x, .. } => *x,
            ShareRecord::Blinded(share) => share.x,
        }
    }

    pub fn y(&self) -> &FieldElement {
        match self {
            ShareRecord::Legacy { y, .. } => y,
            ShareRecord::Blinded(share) => &share.y,
        }
    }

    /// `(x, y)` interpolation point.
    pub fn point(&self) -> (FieldElement, FieldElement) {
        (FieldElement::from(self.x()), self.y().clone())
    }

    /// Converts into a blinded share; legacy records are rejected, never defaulted.
    pub fn blinded(self) -> Result<Share> {
        match self {
            ShareRecord::Legacy { x, .. } => Err(Error::LegacyFormat { index: x }),
            ShareRecord::Blinded(share) => Ok(share),
        }
    }

    /// 解析分片文件内容 (Parse share file)
    ///
    /// 接受的格式：
    /// - `x,y,r` / `x,y`（逗号、冒号或空白分隔，可带括号）
    /// - `x=..` / `y=..` / `r=..` 键值对，每行一个或逗号分隔
    pub fn parse(text: &str, location: &str) -> Result<Self> {
        let content = text.trim();
        if content.is_empty() {
            return Err(Error::format(location, "empty share record"));
        }

        let (x, y, r) = if content.contains('=') {
            parse_key_values(content, location)?
        } else {
            parse_tuple(content, location)?
        };

        let x = parse_x(&x, location)?;
        let y = parse_element(&y, "y", location)?;
        match r {
            Some(r) => Ok(ShareRecord::Blinded(Share {
                x,
                y,
                r: parse_element(&r, "r", location)?,
            })),
            None => Ok(ShareRecord::Legacy { x, y }),
        }
    }
}

type RawFields = (String, String, Option<String>);

fn parse_key_values(content: &str, location: &str) -> Result<RawFields> {
    let (mut x, mut y, mut r) = (None, None, None);
    for entry in content
        .split(|c: char| c == '\n' || c == ',' || c == ';')
        .map(str::trim)
        .filter(|e| !e.is_empty())
    {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| Error::format(location, format!("expected key=value, got `{entry}`")))?;
        let slot = match key.trim().to_ascii_lowercase().as_str() {
            "x" => &mut x,
            "y" => &mut y,
            "r" => &mut r,
            other => return Err(Error::format(location, format!("unknown field `{other}`"))),
        };
        if slot.replace(value.trim().to_string()).is_some() {
            return Err(Error::format(location, format!("field `{}` repeated", key.trim())));
        }
    }
    let x = x.ok_or_else(|| Error::format(location, "missing field `x`"))?;
    let y = y.ok_or_else(|| Error::format(location, "missing field `y`"))?;
    Ok((x, y, r))
}

fn parse_tuple(content: &str, location: &str) -> Result<RawFields> {
    let inner = content.trim_start_matches('(').trim_end_matches(')');
    let fields: Vec<&str> = inner
        .split(|c: char| c == ',' || c == ':' || c.is_whitespace())
        .filter(|f| !f.is_empty())
        .collect();
    match fields.as_slice() {
        [x, y] => Ok((x.to_string(), y.to_string(), None)),
        [x, y, r] => Ok((x.to_string(), y.to_string(), Some(r.to_string()))),
        _ => Err(Error::format(
            location,
            format!("expected `x,y,r` or `x,y`, found {} fields", fields.len()),
        )),
    }
}

fn parse_x(raw: &str, location: &str) -> Result<u32> {
    match raw.parse::<u32>() {
        Ok(0) => Err(Error::format(location, "x must be non-zero")),
        Ok(x) => Ok(x),
        Err(e) => Err(Error::format(location, format!("invalid x `{raw}`: {e}"))),
    }
}

fn parse_element(raw: &str, name: &str, location: &str) -> Result<FieldElement> {
    let value = raw
        .parse::<BigUint>()
        .map_err(|e| Error::format(location, format!("invalid {name} `{raw}`: {e}")))?;
    FieldElement::from_canonical(value)
        .ok_or_else(|| Error::format(location, format!("{name} is not below the field prime")))
}

impl FromStr for ShareRecord {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ShareRecord::parse(s, "<input>")
    }
}

impl fmt::Display for ShareRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShareRecord::Legacy { x, y } => write!(f, "{x},{y}"),
            ShareRecord::Blinded(share) => write!(f, "{},{},{}", share.x, share.y, share.r),
        }
    }
}

impl From<Share> for ShareRecord {
    fn from(share: Share) -> Self {
        ShareRecord::Blinded(share)
    }
}

/// 分片承诺记录 (Commitment Record)
///
/// 每个分片在发放时生成一次，之后诚实方不会再修改。`y` 与 `r` 仅在
/// auditable 模式下保留。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub share: u32,
    pub x: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<FieldElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<FieldElement>,
    #[serde(with = "biguint")]
    pub commitment: BigUint,
    #[serde(rename = "H_used", with = "biguint")]
    pub h_used: BigUint,
}

impl Commitment {
    /// `(y, r)` when the record discloses them.
    pub fn disclosed(&self) -> Option<(&FieldElement, &FieldElement)> {
        self.y.as_ref().zip(self.r.as_ref())
    }

    pub fn x_element(&self) -> FieldElement {
        FieldElement::from(self.x)
    }

    /// Same record with `y`, `r` replaced by a participant's current share.
    pub fn with_share_values(&self, share: &Share) -> Self {
        Commitment {
            y: Some(share.y.clone()),
            r: Some(share.r.clone()),
            ..self.clone()
        }
    }
}

/// 系数承诺 (Coefficient Commitments) `C_j = g^{a_j}·h^{b_j}`
///
/// dealer 在分发时公开，opaque 模式下 dealer 一致性校验只依赖它。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolynomialCommitment {
    #[serde(rename = "H", with = "biguint")]
    pub h_used: BigUint,
    #[serde(with = "biguint_seq")]
    pub coefficients: Vec<BigUint>,
}

impl PolynomialCommitment {
    /// Threshold `k` implied by the number of coefficients.
    pub fn threshold(&self) -> usize {
        self.coefficients.len()
    }
}

// ============================================================================
// 2. 显示工具函数 (Display Utilities)
// ============================================================================

/// 辅助函数：截断长数字串用于日志展示
pub fn truncate_digits(digits: &str) -> String {
    if digits.len() <= 20 {
        digits.to_string()
    } else {
        format!("{}...{}", &digits[..10], &digits[digits.len() - 10..])
    }
}
