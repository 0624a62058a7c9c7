//! Scheme parameters and the commitment group.
//!
//! Shares live in `GF(p)` with `p = 2^521 - 1`. Pedersen commitments live in
//! the order-`p` subgroup of `Z_P^*`, `P = 336·p + 1`, so that exponents of
//! `g` and `h` are exactly field elements and the homomorphic identities hold
//! without any reduction mismatch.
//!
//! `g = 2^336 mod P` is fixed. `h` is sampled once per deployment as
//! `u^336 mod P` for a random `u`, so nobody learns `log_g h`, and is then
//! threaded through every call as part of [`Group`].

use std::sync::OnceLock;

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

use crate::errors::{Error, Result};
use crate::math::field_prime;

/// `P = COFACTOR · p + 1` is prime; the smallest even cofactor with that property.
pub const COFACTOR: u32 = 336;

/// Modulus `P` of the commitment group.
pub fn group_modulus() -> &'static BigUint {
    static MODULUS: OnceLock<BigUint> = OnceLock::new();
    MODULUS.get_or_init(|| field_prime() * COFACTOR + 1u32)
}

/// Fixed generator `g = 2^COFACTOR mod P` of the order-`p` subgroup.
pub fn default_generator() -> &'static BigUint {
    static GENERATOR: OnceLock<BigUint> = OnceLock::new();
    GENERATOR.get_or_init(|| BigUint::from(2u32).modpow(&BigUint::from(COFACTOR), group_modulus()))
}

/// Returns `true` if `value` is a non-identity element of the order-`p` subgroup.
pub fn in_subgroup(value: &BigUint) -> bool {
    let modulus = group_modulus();
    if value.is_one() || value.is_zero() || value >= modulus {
        return false;
    }
    value.modpow(field_prime(), modulus).is_one()
}

/// Samples a second generator `h` whose discrete log relative to `g` is unknown.
pub fn random_generator<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> BigUint {
    let modulus = group_modulus();
    let cofactor = BigUint::from(COFACTOR);
    loop {
        let u = rng.gen_biguint_range(&BigUint::from(2u32), &(modulus - 1u32));
        let h = u.modpow(&cofactor, modulus);
        if !h.is_one() {
            return h;
        }
    }
}

/// Commitment group `(P, g, h)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    h: BigUint,
}

impl Group {
    /// Builds the group around a persisted `h`, rejecting values outside the subgroup.
    pub fn new(h: BigUint) -> Result<Self> {
        if !in_subgroup(&h) {
            return Err(Error::InvalidParameters(
                "generator H is not an element of the order-p commitment subgroup".into(),
            ));
        }
        Ok(Self { h })
    }

    pub fn generate<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Self {
        Self {
            h: random_generator(rng),
        }
    }

    pub fn modulus(&self) -> &BigUint {
        group_modulus()
    }

    /// Group order, identical to the field prime `p`.
    pub fn order(&self) -> &BigUint {
        field_prime()
    }

    pub fn g(&self) -> &BigUint {
        default_generator()
    }

    pub fn h(&self) -> &BigUint {
        &self.h
    }

    /// Short, stable identifier of `h` for log lines.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.h)
    }
}

pub fn fingerprint(value: &BigUint) -> String {
    let digest = Sha256::digest(value.to_str_radix(10).as_bytes());
    hex::encode(&digest[..8])
}

/// `{p, g, h, n, k}` for one dealing. Only constructible through [`SchemeParams::new`].
#[derive(Clone, Debug)]
pub struct SchemeParams {
    group: Group,
    n: u32,
    k: u32,
}

impl SchemeParams {
    pub fn new(group: Group, n: u32, k: u32) -> Result<Self> {
        if k == 0 || k > n {
            return Err(Error::InvalidParameters(format!(
                "threshold must satisfy 1 <= k <= n, got n = {n}, k = {k}"
            )));
        }
        Ok(Self { group, n, k })
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn n(&self) -> u32 {
        self.n
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn p(&self) -> &BigUint {
        self.group.order()
    }

    pub fn g(&self) -> &BigUint {
        self.group.g()
    }

    pub fn h(&self) -> &BigUint {
        self.group.h()
    }
}
