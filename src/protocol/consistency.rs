//! # Dealer 一致性校验 (Dealer Consistency Verification)
//!
//! ## 核心目标 (The Goal)
//! 证明所有 n 个分片都落在同一对 k-1 次多项式 (f, g) 上，即 dealer 没有给
//! 不同参与方发放相互矛盾的分片。
//!
//! ## 两种等价的方法 (Two Techniques)
//!
//! ### 1. 直接重构 (Direct reconstruction)
//! - 取 k 个分片作为基集合 (base set)，用 `interpolate_coefficients` 恢复 f、g 的全部系数。
//! - 对每个分片（包括基集合自身）检查 `f(x_i) == y_i` 且 `g(x_i) == r_i`。
//! - 需要 y、r 明文，只适用于 auditable 记录。
//!
//! ### 2. 同态等式 (Homomorphic equation, Feldman/Pedersen VSS)
//! - 系数承诺 `C_j = g^{a_j} · h^{b_j}`。
//! - 对每个分片检查 `g^{y_i} · h^{r_i} == Π_j C_j^{x_i^j}`。
//! - 只依赖公开承诺：opaque 模式下 `C_j` 由 dealer 公开，LHS 是分片自己的承诺；
//!   若持有参与方当前的分片，则 LHS 换成 `g^{y_cur} · h^{r_cur}` 再检查一次。
//! - 记录中声明的承诺本身也必须等于 `Π_j C_j^{x_i^j}`，否则同样判为不一致。
//!
//! 两种方法在诚实输入上永远一致；若方法 1 通过而方法 2 失败，说明承诺层有 bug。
//!
//! ## 策略 (Policy)
//! 每个分片都必须检查，不能在第一个失败处提前退出，并报告所有不一致的索引。
//! 提前退出会向受害者隐藏"自己的分片是否可信"这一信息。

use std::collections::{BTreeMap, BTreeSet};

use num_bigint::BigUint;
use rayon::prelude::*;
use tracing::{info, instrument, warn};

use crate::errors::{Error, Result, RecordKind};
use crate::math::{eval, interpolate_coefficients, FieldElement};
use crate::params::Group;
use crate::protocol::common::{Commitment, PolynomialCommitment, Share};
use crate::protocol::pedersen::Pedersen;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DealerVerdict {
    Honest,
    /// Sorted indices of the shares that are off the shared polynomial pair.
    Malicious(Vec<u32>),
}

#[derive(Clone, Debug)]
pub struct DealerReport {
    /// Number of shares checked.
    pub checked: usize,
    /// Shares used to recover the polynomials (empty for opaque records).
    pub base: Vec<u32>,
    /// Shares whose `(y, r)` no longer open their recorded commitment.
    pub integrity_failures: BTreeSet<u32>,
    /// Offenders found by direct reconstruction; `None` when `(y, r)` are not disclosed.
    pub direct: Option<BTreeSet<u32>>,
    /// Offenders found by the homomorphic equation.
    pub homomorphic: BTreeSet<u32>,
    pub verdict: DealerVerdict,
}

impl DealerReport {
    pub fn is_honest(&self) -> bool {
        self.verdict == DealerVerdict::Honest
    }

    /// `true` when both techniques ran and flagged the same shares.
    pub fn techniques_agree(&self) -> bool {
        self.direct
            .as_ref()
            .map_or(true, |direct| direct == &self.homomorphic)
    }

    /// `Malicious` becomes [`Error::Consistency`] for callers that propagate with `?`.
    pub fn ensure_honest(&self) -> Result<()> {
        match &self.verdict {
            DealerVerdict::Honest => Ok(()),
            DealerVerdict::Malicious(indices) => Err(Error::Consistency {
                indices: indices.clone(),
            }),
        }
    }
}

/// A disclosed record, borrowed.
struct Opening<'c> {
    share: u32,
    x: FieldElement,
    y: &'c FieldElement,
    r: &'c FieldElement,
    commitment: &'c BigUint,
}

pub struct ConsistencyVerifier<'a> {
    group: &'a Group,
    k: usize,
    current: BTreeMap<u32, &'a Share>,
}

impl<'a> ConsistencyVerifier<'a> {
    pub fn new(group: &'a Group, k: usize) -> Self {
        Self {
            group,
            k,
            current: BTreeMap::new(),
        }
    }

    /// Participants' current shares, keyed by record index.
    ///
    /// Opaque records carry no `(y, r)`; with these the opaque path also
    /// checks that each share still opens its commitment and lies on the
    /// published polynomials.
    pub fn with_current_shares(
        mut self,
        shares: impl IntoIterator<Item = (u32, &'a Share)>,
    ) -> Self {
        self.current.extend(shares);
        self
    }

    /// Verifies a full set of commitment records.
    ///
    /// Records that disclose `(y, r)` go through both techniques, with the
    /// coefficient commitments derived from the recovered polynomials.
    /// Opaque records need the dealer's `published` coefficient commitments
    /// and go through the homomorphic equation only.
    #[instrument(level = "info", skip_all, fields(k = self.k, n = records.len()))]
    pub fn verify(
        &self,
        records: &[Commitment],
        published: Option<&PolynomialCommitment>,
    ) -> Result<DealerReport> {
        if self.k == 0 {
            return Err(Error::InvalidParameters("threshold k must be at least 1".into()));
        }
        if records.len() < self.k {
            return Err(Error::InsufficientShares {
                required: self.k,
                provided: records.len(),
            });
        }

        let mut records: Vec<&Commitment> = records.iter().collect();
        records.sort_by_key(|c| c.share);
        self.ensure_same_generator(&records)?;

        let disclosed = records.iter().filter(|c| c.disclosed().is_some()).count();
        let report = if disclosed == records.len() {
            self.verify_disclosed(&records)?
        } else if disclosed == 0 {
            let published = published.ok_or(Error::MissingRecord {
                kind: RecordKind::Polynomial,
                index: 0,
            })?;
            self.verify_opaque(&records, published)?
        } else {
            return Err(Error::format(
                "commitments",
                "records mix disclosed and opaque openings",
            ));
        };

        match &report.verdict {
            DealerVerdict::Honest => info!(checked = report.checked, "dealer honest"),
            DealerVerdict::Malicious(indices) => {
                warn!(?indices, "shares inconsistent with a single polynomial")
            }
        }
        Ok(report)
    }

    fn ensure_same_generator(&self, records: &[&Commitment]) -> Result<()> {
        match records
            .iter()
            .find(|c| &c.h_used != self.group.h())
        {
            Some(c) => Err(Error::GeneratorMismatch { index: c.share }),
            None => Ok(()),
        }
    }

    fn verify_disclosed(&self, records: &[&Commitment]) -> Result<DealerReport> {
        let pedersen = Pedersen::new(self.group);
        let openings = records
            .iter()
            .map(|c| match c.disclosed() {
                Some((y, r)) => Ok(Opening {
                    share: c.share,
                    x: c.x_element(),
                    y,
                    r,
                    commitment: &c.commitment,
                }),
                None => Err(Error::format(
                    format!("commitment {}", c.share),
                    "record does not disclose y and r",
                )),
            })
            .collect::<Result<Vec<_>>>()?;

        // 0. 完整性：打不开自己承诺的分片不能进入基集合
        let integrity_failures: BTreeSet<u32> = openings
            .par_iter()
            .filter(|o| &pedersen.commit(o.y, o.r) != o.commitment)
            .map(|o| o.share)
            .collect();

        let base: Vec<&Opening<'_>> = openings
            .iter()
            .filter(|o| !integrity_failures.contains(&o.share))
            .take(self.k)
            .collect();
        if base.len() < self.k {
            return Err(Error::InsufficientShares {
                required: self.k,
                provided: base.len(),
            });
        }

        // 1. 恢复 f、g 的系数 (sequential prerequisite)
        let ys: Vec<_> = base.iter().map(|o| (o.x.clone(), o.y.clone())).collect();
        let rs: Vec<_> = base.iter().map(|o| (o.x.clone(), o.r.clone())).collect();
        let f = interpolate_coefficients(&ys, self.k)?;
        let g = interpolate_coefficients(&rs, self.k)?;

        let direct: BTreeSet<u32> = openings
            .par_iter()
            .filter(|o| &eval(&f, &o.x) != o.y || &eval(&g, &o.x) != o.r)
            .map(|o| o.share)
            .collect();

        // 2. 同态等式: 系数承诺来自恢复出的多项式，分片的开启值和声明的承诺都要对上
        let coefficients = pedersen.coefficient_commitments(&f, &g).coefficients;
        let homomorphic: BTreeSet<u32> = openings
            .par_iter()
            .filter(|o| {
                let expected = pedersen.expected_commitment(&coefficients, &o.x);
                pedersen.commit(o.y, o.r) != expected || o.commitment != &expected
            })
            .map(|o| o.share)
            .collect();

        if direct != homomorphic {
            warn!(?direct, ?homomorphic, "verification techniques disagree");
        }

        Ok(DealerReport {
            checked: records.len(),
            base: base.iter().map(|o| o.share).collect(),
            verdict: verdict(
                direct
                    .iter()
                    .chain(&homomorphic)
                    .chain(&integrity_failures)
                    .copied(),
            ),
            integrity_failures,
            direct: Some(direct),
            homomorphic,
        })
    }

    fn verify_opaque(
        &self,
        records: &[&Commitment],
        published: &PolynomialCommitment,
    ) -> Result<DealerReport> {
        if &published.h_used != self.group.h() {
            return Err(Error::GeneratorMismatch { index: 0 });
        }
        if published.threshold() != self.k {
            return Err(Error::InvalidParameters(format!(
                "published polynomial has {} coefficients but k = {}",
                published.threshold(),
                self.k
            )));
        }

        let pedersen = Pedersen::new(self.group);
        let integrity_failures: BTreeSet<u32> = records
            .par_iter()
            .filter(|c| match self.current.get(&c.share) {
                Some(share) => {
                    share.x != c.x || pedersen.commit(&share.y, &share.r) != c.commitment
                }
                None => false,
            })
            .map(|c| c.share)
            .collect();

        let homomorphic: BTreeSet<u32> = records
            .par_iter()
            .filter(|c| {
                let expected: BigUint =
                    pedersen.expected_commitment(&published.coefficients, &c.x_element());
                let current_off = self
                    .current
                    .get(&c.share)
                    .is_some_and(|share| pedersen.commit(&share.y, &share.r) != expected);
                expected != c.commitment || current_off
            })
            .map(|c| c.share)
            .collect();

        Ok(DealerReport {
            checked: records.len(),
            base: Vec::new(),
            verdict: verdict(homomorphic.iter().chain(&integrity_failures).copied()),
            integrity_failures,
            direct: None,
            homomorphic,
        })
    }
}

fn verdict(offenders: impl Iterator<Item = u32>) -> DealerVerdict {
    let offenders: BTreeSet<u32> = offenders.collect();
    if offenders.is_empty() {
        DealerVerdict::Honest
    } else {
        DealerVerdict::Malicious(offenders.into_iter().collect())
    }
}
