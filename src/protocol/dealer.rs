//! 分片生成 (Dealer)
//!
//! ### 原理 (Theory)
//! 为了将秘密 $s$ 分发给 $n$ 个参与方，使得任意 $k$ 个参与方可以恢复秘密，
//! dealer 构造两个 $k-1$ 次多项式：
//! $$ f(x) = s + a_1 x + \dots + a_{k-1} x^{k-1} \pmod p $$
//! $$ g(x) = b_0 + b_1 x + \dots + b_{k-1} x^{k-1} \pmod p $$
//! 其中 $a_i$、$b_i$ 均从 CSPRNG 中独立均匀抽取，g 与 f 无任何关系。
//! 参与方 $P_j$ 获得 $(j, f(j), g(j))$。
//!
//! 少于 k 个分片不泄露关于 s 的任何信息（Shamir 方案的信息论安全性，
//! 与承诺层无关）；r 的保密性则是 Pedersen 承诺 hiding 性质的基础。

use rand_core::{CryptoRng, RngCore};
use tracing::{debug, info, instrument};

use crate::errors::Result;
use crate::math::{eval, random_polynomial, FieldElement};
use crate::params::SchemeParams;
use crate::protocol::common::{PolynomialCommitment, Share};
use crate::protocol::pedersen::Pedersen;

/// Output of one dealing: `n` shares plus the public coefficient commitments.
#[derive(Clone, Debug)]
pub struct Dealing {
    pub shares: Vec<Share>,
    pub polynomial: PolynomialCommitment,
}

pub struct Dealer<'a> {
    params: &'a SchemeParams,
}

impl<'a> Dealer<'a> {
    pub fn new(params: &'a SchemeParams) -> Self {
        Self { params }
    }

    /// Splits raw secret bytes, read as a big-endian integer.
    pub fn deal_bytes<R: RngCore + CryptoRng + ?Sized>(
        &self,
        secret: &[u8],
        rng: &mut R,
    ) -> Result<Dealing> {
        let secret = FieldElement::from_bytes_be(secret)?;
        self.deal(secret, rng)
    }

    #[instrument(level = "info", skip_all, fields(n = self.params.n(), k = self.params.k()))]
    pub fn deal<R: RngCore + CryptoRng + ?Sized>(
        &self,
        secret: FieldElement,
        rng: &mut R,
    ) -> Result<Dealing> {
        let (n, k) = (self.params.n(), self.params.k());

        // 1. 秘密多项式 f: a_0 = secret, 其余 k-1 个系数随机
        let f = random_polynomial(secret, k as usize, rng);
        // 2. 盲化多项式 g: k 个系数全部随机
        let g = random_polynomial(FieldElement::random(rng), k as usize, rng);

        let shares = shares_from_polynomials(&f, &g, n);
        let polynomial = Pedersen::new(self.params.group()).coefficient_commitments(&f, &g);
        debug!(
            coefficients = polynomial.coefficients.len(),
            "published coefficient commitments"
        );
        info!(shares = shares.len(), "dealing complete");

        Ok(Dealing { shares, polynomial })
    }
}

/// 计算每个点的份额 (Evaluation): `Share{x, f(x), g(x)}` for `x = 1..=n`.
pub fn shares_from_polynomials(f: &[FieldElement], g: &[FieldElement], n: u32) -> Vec<Share> {
    (1..=n)
        .map(|x| {
            let point = FieldElement::from(x);
            Share {
                x,
                y: eval(f, &point),
                r: eval(g, &point),
            }
        })
        .collect()
}
