//! 模块封装了秘密共享协议中核心的数学原语：素数域 (Prime Field) 上的模运算、
//! 多项式求值以及拉格朗日插值 (Lagrange Interpolation)。
//!
//! ## 主要功能 (Key Features)
//!
//! 1. **有限域元素 (`FieldElement`)**:
//!    - 取值范围 `[0, p)`，`p = 2^521 - 1` (Mersenne 素数)。
//!    - 逆元通过费马小定理计算：`a^{-1} = a^{p-2} mod p`。
//!
//! 2. **多项式求值 (`eval`)**: Horner 方法，O(k) 次模乘。
//!
//! 3. **拉格朗日插值**:
//!    - `interpolate_at`: 由 k 个点求多项式在任意点 t 的值（秘密恢复时 t = 0）。
//!    - `interpolate_coefficients`: 符号展开每个基函数，恢复完整系数向量，
//!      用于 dealer 一致性校验。
//!
//! ## 安全性 (Security)
//!
//! - 随机系数只从调用方传入的 `CryptoRng` 中抽取（生产环境为 `OsRng`）。
//! - 本模块仅包含纯数学逻辑，不涉及存储或承诺。

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::sync::OnceLock;

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand_core::{CryptoRng, RngCore};

use crate::errors::{Error, Result};

/// Bit length of the field prime `p = 2^521 - 1`.
pub const FIELD_BITS: u32 = 521;

/// The field prime `p = 2^521 - 1`.
pub fn field_prime() -> &'static BigUint {
    static PRIME: OnceLock<BigUint> = OnceLock::new();
    PRIME.get_or_init(|| (BigUint::one() << FIELD_BITS) - 1u32)
}

/// An element of `GF(p)`, always kept in canonical form `[0, p)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldElement(BigUint);

impl FieldElement {
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn one() -> Self {
        Self(BigUint::one())
    }

    /// Reduces an arbitrary integer into the field.
    pub fn new(value: BigUint) -> Self {
        if &value < field_prime() {
            Self(value)
        } else {
            Self(value % field_prime())
        }
    }

    /// Accepts `value` only if it is already canonical (`< p`).
    pub fn from_canonical(value: BigUint) -> Option<Self> {
        (&value < field_prime()).then_some(Self(value))
    }

    /// Uniformly random element drawn from a cryptographically secure source.
    pub fn random<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen_biguint_below(field_prime()))
    }

    /// 将原始秘密字节按大端整数解释 (big-endian)。
    ///
    /// Fails with [`Error::SecretTooLarge`] if the integer is not below `p`.
    pub fn from_bytes_be(bytes: &[u8]) -> Result<Self> {
        let value = BigUint::from_bytes_be(bytes);
        let bits = value.bits();
        Self::from_canonical(value).ok_or(Error::SecretTooLarge { bits })
    }

    /// Minimal big-endian encoding; zero maps to an empty byte string.
    pub fn to_bytes_be(&self) -> Vec<u8> {
        if self.0.is_zero() {
            Vec::new()
        } else {
            self.0.to_bytes_be()
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    pub fn into_biguint(self) -> BigUint {
        self.0
    }

    pub fn pow(&self, exponent: &BigUint) -> Self {
        Self(self.0.modpow(exponent, field_prime()))
    }

    /// Multiplicative inverse via Fermat's little theorem, `None` for zero.
    pub fn inverse(&self) -> Option<Self> {
        if self.0.is_zero() {
            return None;
        }
        let exponent = field_prime() - 2u32;
        Some(self.pow(&exponent))
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self::new(BigUint::from(value))
    }
}

impl From<u32> for FieldElement {
    fn from(value: u32) -> Self {
        Self::new(BigUint::from(value))
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Add<&FieldElement> for &FieldElement {
    type Output = FieldElement;

    fn add(self, rhs: &FieldElement) -> FieldElement {
        FieldElement::new(&self.0 + &rhs.0)
    }
}

impl Sub<&FieldElement> for &FieldElement {
    type Output = FieldElement;

    fn sub(self, rhs: &FieldElement) -> FieldElement {
        // a - b = a + (p - b), both operands are canonical
        FieldElement::new(&self.0 + (field_prime() - &rhs.0))
    }
}

impl Mul<&FieldElement> for &FieldElement {
    type Output = FieldElement;

    fn mul(self, rhs: &FieldElement) -> FieldElement {
        FieldElement::new(&self.0 * &rhs.0)
    }
}

impl Neg for &FieldElement {
    type Output = FieldElement;

    fn neg(self) -> FieldElement {
        &FieldElement::zero() - self
    }
}

impl Add for FieldElement {
    type Output = FieldElement;

    fn add(self, rhs: Self) -> FieldElement {
        &self + &rhs
    }
}

impl Sub for FieldElement {
    type Output = FieldElement;

    fn sub(self, rhs: Self) -> FieldElement {
        &self - &rhs
    }
}

impl Mul for FieldElement {
    type Output = FieldElement;

    fn mul(self, rhs: Self) -> FieldElement {
        &self * &rhs
    }
}

/// 多项式求值 (Horner's Method)
///
/// 系数按升幂排列：`f(x) = coeffs[0] + coeffs[1]·x + ... + coeffs[k-1]·x^{k-1}`。
pub fn eval(coeffs: &[FieldElement], x: &FieldElement) -> FieldElement {
    coeffs
        .iter()
        .rev()
        .fold(FieldElement::zero(), |acc, c| &(&acc * x) + c)
}

/// 生成随机多项式 (Random Polynomial)
///
/// 返回 `threshold` 个系数，`coeffs[0] = constant`，其余系数从 CSPRNG 均匀抽取，
/// 即一个 `threshold - 1` 次多项式。
pub fn random_polynomial<R: RngCore + CryptoRng + ?Sized>(
    constant: FieldElement,
    threshold: usize,
    rng: &mut R,
) -> Vec<FieldElement> {
    let degree = threshold.saturating_sub(1);
    let mut coeffs = Vec::with_capacity(degree + 1);
    coeffs.push(constant);
    for _ in 0..degree {
        coeffs.push(FieldElement::random(rng));
    }
    coeffs
}

fn ensure_distinct(points: &[(FieldElement, FieldElement)]) -> Result<()> {
    for (i, (xi, _)) in points.iter().enumerate() {
        if points[..i].iter().any(|(xj, _)| xj == xi) {
            return Err(Error::DuplicateX {
                x: xi.as_biguint().clone(),
            });
        }
    }
    Ok(())
}

/// 计算拉格朗日插值系数 (Lagrange Coefficient) $\lambda_i$ 在 x = 0 处的值
///
/// ### 原理 (Theory)
/// $$ \lambda_{i, S} = \prod_{j \in S, j \neq i} \frac{x_j}{x_j - x_i} $$
///
/// `all_indices` 中等于 `party_index` 的项被跳过；其余项若与 `party_index`
/// 重合则无法构成分母，返回 [`Error::DuplicateX`]。
pub fn lagrange_coefficient(
    party_index: &FieldElement,
    all_indices: &[FieldElement],
) -> Result<FieldElement> {
    let mut num = FieldElement::one();
    let mut den = FieldElement::one();
    let mut seen_self = false;

    for other in all_indices {
        if other == party_index {
            if seen_self {
                return Err(Error::DuplicateX {
                    x: other.as_biguint().clone(),
                });
            }
            seen_self = true;
            continue;
        }
        num = &num * other;
        den = &den * &(other - party_index);
    }

    let inv = den.inverse().ok_or_else(|| Error::DuplicateX {
        x: party_index.as_biguint().clone(),
    })?;
    Ok(&num * &inv)
}

/// 拉格朗日插值求值 (Lagrange Interpolation at t)
///
/// 对每个点 i：
/// - numerator   = Π_{j≠i} (t − x_j)
/// - denominator = Π_{j≠i} (x_i − x_j)
/// - weight      = numerator · denominator⁻¹
///
/// 结果为 Σ y_i · weight。所有点都会被使用，调用方负责截取前 k 个。
pub fn interpolate_at(
    points: &[(FieldElement, FieldElement)],
    t: &FieldElement,
) -> Result<FieldElement> {
    if points.is_empty() {
        return Err(Error::InsufficientShares {
            required: 1,
            provided: 0,
        });
    }
    ensure_distinct(points)?;

    // t = 0: 秘密恢复的常见情形，直接用 λ_i
    if t.is_zero() {
        let xs: Vec<FieldElement> = points.iter().map(|(x, _)| x.clone()).collect();
        return points.iter().try_fold(FieldElement::zero(), |acc, (x, y)| {
            Ok(&acc + &(y * &lagrange_coefficient(x, &xs)?))
        });
    }

    let mut acc = FieldElement::zero();
    for (i, (xi, yi)) in points.iter().enumerate() {
        let mut num = FieldElement::one();
        let mut den = FieldElement::one();
        for (j, (xj, _)) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            num = &num * &(t - xj);
            den = &den * &(xi - xj);
        }
        // distinct x values guarantee a non-zero denominator
        let inv = den.inverse().ok_or_else(|| Error::DuplicateX {
            x: xi.as_biguint().clone(),
        })?;
        acc = &acc + &(yi * &(&num * &inv));
    }
    Ok(acc)
}

/// 拉格朗日插值恢复系数 (Lagrange Interpolation → coefficients)
///
/// 使用前 `k` 个点，把每个基函数
/// `L_i(X) = Π_{j≠i} (X − x_j) / (x_i − x_j)` 符号展开为系数向量，
/// 再按 `y_i` 加权累加，得到 `a_0 .. a_{k-1}`。
pub fn interpolate_coefficients(
    points: &[(FieldElement, FieldElement)],
    k: usize,
) -> Result<Vec<FieldElement>> {
    if k == 0 || points.len() < k {
        return Err(Error::InsufficientShares {
            required: k.max(1),
            provided: points.len(),
        });
    }
    let points = &points[..k];
    ensure_distinct(points)?;

    let mut coeffs = vec![FieldElement::zero(); k];
    for (i, (xi, yi)) in points.iter().enumerate() {
        // basis[d] is the coefficient of X^d in L_i
        let mut basis = vec![FieldElement::zero(); k];
        basis[0] = FieldElement::one();
        let mut degree = 0;

        for (j, (xj, _)) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            let inv = (xi - xj).inverse().ok_or_else(|| Error::DuplicateX {
                x: xi.as_biguint().clone(),
            })?;
            let shift = -&(xj * &inv);

            // basis <- basis · (inv·X − xj·inv), highest degree first
            degree += 1;
            for d in (0..=degree).rev() {
                let carried = if d > 0 {
                    &basis[d - 1] * &inv
                } else {
                    FieldElement::zero()
                };
                basis[d] = &(&basis[d] * &shift) + &carried;
            }
        }

        for (c, b) in coeffs.iter_mut().zip(&basis) {
            *c = &*c + &(yi * b);
        }
    }
    Ok(coeffs)
}
