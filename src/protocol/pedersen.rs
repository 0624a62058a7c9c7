//! # Pedersen 承诺 (Pedersen Commitment)
//!
//! `commit(y, r) = g^y · h^r mod P`
//!
//! ## 性质 (Properties)
//!
//! - **Binding**: 在离散对数困难假设下，一个 C 只对应一个 (y, r)。
//!   前提是承诺方不知道 `log_g h`，所以 `h` 必须由 [`crate::params`] 随机生成并固定。
//! - **Hiding**: r 均匀随机时 C 不泄露 y 的任何信息。
//! - **加法同态 (Additively homomorphic)**:
//!   `commit(y1, r1) · commit(y2, r2) = commit(y1 + y2, r1 + r2)`，
//!   `commit(y, r)^e = commit(e·y, e·r)`。
//!
//! 指数运算在阶为 p 的子群中进行，因此指数上的加法/乘法正好是域 GF(p) 上的运算，
//! 上面两个等式是严格成立的。dealer 一致性校验 (Feldman/Pedersen VSS 等式)
//! 依赖的正是这一点。

use num_bigint::BigUint;
use num_traits::One;

use crate::config::Disclosure;
use crate::math::FieldElement;
use crate::params::Group;
use crate::protocol::common::{Commitment, PolynomialCommitment, Share};

#[derive(Clone, Copy, Debug)]
pub struct Pedersen<'a> {
    group: &'a Group,
}

impl<'a> Pedersen<'a> {
    pub fn new(group: &'a Group) -> Self {
        Self { group }
    }

    pub fn group(&self) -> &'a Group {
        self.group
    }

    /// `g^y · h^r mod P`. Deterministic for fixed `(g, h, P)`.
    pub fn commit(&self, y: &FieldElement, r: &FieldElement) -> BigUint {
        let modulus = self.group.modulus();
        let gy = self.group.g().modpow(y.as_biguint(), modulus);
        let hr = self.group.h().modpow(r.as_biguint(), modulus);
        (gy * hr) % modulus
    }

    /// Product of two commitments, i.e. the commitment to the sum of their openings.
    pub fn combine(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % self.group.modulus()
    }

    /// `c^e`, the commitment to the opening scaled by `e`.
    pub fn scale(&self, c: &BigUint, e: &FieldElement) -> BigUint {
        c.modpow(e.as_biguint(), self.group.modulus())
    }

    /// Commitment record for one share.
    ///
    /// `Disclosure::Opaque` drops `y` and `r` from the record.
    pub fn commit_share(&self, share: &Share, disclosure: Disclosure) -> Commitment {
        let (y, r) = match disclosure {
            Disclosure::Auditable => (Some(share.y.clone()), Some(share.r.clone())),
            Disclosure::Opaque => (None, None),
        };
        Commitment {
            share: share.x,
            x: share.x,
            y,
            r,
            commitment: self.commit(&share.y, &share.r),
            h_used: self.group.h().clone(),
        }
    }

    /// `C_j = g^{a_j} · h^{b_j}` for `j = 0..k-1`.
    ///
    /// `f` and `g` must have the same length; a shorter blinding vector is
    /// padded with zero coefficients.
    pub fn coefficient_commitments(
        &self,
        f: &[FieldElement],
        g: &[FieldElement],
    ) -> PolynomialCommitment {
        let zero = FieldElement::zero();
        let coefficients = f
            .iter()
            .enumerate()
            .map(|(j, a)| self.commit(a, g.get(j).unwrap_or(&zero)))
            .collect();
        PolynomialCommitment {
            h_used: self.group.h().clone(),
            coefficients,
        }
    }

    /// VSS 校验等式右侧 (RHS): `Π_j C_j^{x^j mod p} mod P`
    pub fn expected_commitment(&self, coefficients: &[BigUint], x: &FieldElement) -> BigUint {
        let modulus = self.group.modulus();
        let mut acc = BigUint::one();
        let mut power = FieldElement::one();
        for c in coefficients {
            acc = (acc * c.modpow(power.as_biguint(), modulus)) % modulus;
            power = &power * x;
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{eval, random_polynomial};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup(seed: u64) -> (Group, StdRng) {
        let mut rng = StdRng::seed_from_u64(seed);
        (Group::generate(&mut rng), rng)
    }

    #[test]
    fn commit_is_deterministic() {
        let (group, mut rng) = setup(21);
        let scheme = Pedersen::new(&group);
        let y = FieldElement::random(&mut rng);
        let r = FieldElement::random(&mut rng);
        assert_eq!(scheme.commit(&y, &r), scheme.commit(&y, &r));
        assert_ne!(scheme.commit(&y, &r), scheme.commit(&(&y + &FieldElement::one()), &r));
    }

    #[test]
    fn commitments_are_additively_homomorphic() {
        let (group, mut rng) = setup(22);
        let scheme = Pedersen::new(&group);
        for _ in 0..4 {
            let (y1, r1) = (FieldElement::random(&mut rng), FieldElement::random(&mut rng));
            let (y2, r2) = (FieldElement::random(&mut rng), FieldElement::random(&mut rng));
            let lhs = scheme.combine(&scheme.commit(&y1, &r1), &scheme.commit(&y2, &r2));
            let rhs = scheme.commit(&(&y1 + &y2), &(&r1 + &r2));
            assert_eq!(lhs, rhs);
        }
    }

    #[test]
    fn scaling_a_commitment_scales_its_opening() {
        let (group, mut rng) = setup(23);
        let scheme = Pedersen::new(&group);
        let (y, r, e) = (
            FieldElement::random(&mut rng),
            FieldElement::random(&mut rng),
            FieldElement::random(&mut rng),
        );
        assert_eq!(
            scheme.scale(&scheme.commit(&y, &r), &e),
            scheme.commit(&(&e * &y), &(&e * &r))
        );
    }

    #[test]
    fn coefficient_commitments_satisfy_the_vss_equation() {
        let (group, mut rng) = setup(24);
        let scheme = Pedersen::new(&group);
        let f = random_polynomial(FieldElement::from(9u64), 3, &mut rng);
        let g = random_polynomial(FieldElement::random(&mut rng), 3, &mut rng);
        let published = scheme.coefficient_commitments(&f, &g);
        assert_eq!(published.threshold(), 3);

        for x in 1..=5u64 {
            let x = FieldElement::from(x);
            assert_eq!(
                scheme.expected_commitment(&published.coefficients, &x),
                scheme.commit(&eval(&f, &x), &eval(&g, &x))
            );
        }
    }

    #[test]
    fn opaque_records_hide_the_opening() {
        let (group, mut rng) = setup(25);
        let scheme = Pedersen::new(&group);
        let share = Share {
            x: 2,
            y: FieldElement::random(&mut rng),
            r: FieldElement::random(&mut rng),
        };
        let auditable = scheme.commit_share(&share, Disclosure::Auditable);
        let opaque = scheme.commit_share(&share, Disclosure::Opaque);
        assert_eq!(auditable.commitment, opaque.commitment);
        assert!(auditable.disclosed().is_some());
        assert!(opaque.disclosed().is_none());
        assert_eq!(opaque.h_used, *group.h());
    }
}
