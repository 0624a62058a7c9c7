//! 秘密恢复 (Secret Reconstruction)
//!
//! 使用前 k 个分片做拉格朗日插值，计算 f(0)。
//! 恢复不需要盲化因子，旧版 `x,y` 分片同样可用。
//!
//! 注意：插值本身不做任何校验。混入一个被篡改的分片会得到错误的秘密，
//! 而不会报错；调用方应先通过 [`crate::protocol::integrity`] 检查分片。

use tracing::{debug, instrument};

use crate::errors::{Error, Result};
use crate::math::{interpolate_at, FieldElement};
use crate::protocol::common::ShareRecord;

/// Recovers `f(0)` from the first `k` records.
#[instrument(level = "debug", skip_all, fields(k = k, provided = records.len()))]
pub fn reconstruct(records: &[ShareRecord], k: usize) -> Result<FieldElement> {
    if k == 0 {
        return Err(Error::InvalidParameters("threshold k must be at least 1".into()));
    }
    if records.len() < k {
        return Err(Error::InsufficientShares {
            required: k,
            provided: records.len(),
        });
    }

    let points: Vec<_> = records[..k].iter().map(ShareRecord::point).collect();
    let secret = interpolate_at(&points, &FieldElement::zero())?;
    debug!(
        used = ?records[..k].iter().map(ShareRecord::x).collect::<Vec<_>>(),
        "interpolated at zero"
    );
    Ok(secret)
}

/// Same as [`reconstruct`], returning the secret as big-endian bytes.
pub fn reconstruct_bytes(records: &[ShareRecord], k: usize) -> Result<Vec<u8>> {
    reconstruct(records, k).map(|secret| secret.to_bytes_be())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Group, SchemeParams};
    use crate::protocol::dealer::Dealer;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dealt(n: u32, k: u32, secret: &[u8]) -> Vec<ShareRecord> {
        let mut rng = StdRng::seed_from_u64(61);
        let params = SchemeParams::new(Group::generate(&mut rng), n, k).unwrap();
        Dealer::new(&params)
            .deal_bytes(secret, &mut rng)
            .unwrap()
            .shares
            .into_iter()
            .map(ShareRecord::from)
            .collect()
    }

    #[test]
    fn recovers_bytes_from_any_subset() {
        let records = dealt(5, 3, b"HELLO");
        for subset in [[0usize, 2, 4], [1, 3, 4], [3, 0, 1]] {
            let chosen: Vec<_> = subset.iter().map(|&i| records[i].clone()).collect();
            assert_eq!(reconstruct_bytes(&chosen, 3).unwrap(), b"HELLO");
        }
    }

    #[test]
    fn only_the_first_k_records_are_used() {
        let mut records = dealt(4, 2, b"k first");
        // a garbage record past the threshold does not influence the result
        records.push(ShareRecord::Legacy {
            x: 9,
            y: FieldElement::from(1u64),
        });
        assert_eq!(reconstruct_bytes(&records, 2).unwrap(), b"k first");
    }

    #[test]
    fn legacy_records_reconstruct() {
        let records: Vec<_> = dealt(3, 2, b"old")
            .into_iter()
            .map(|r| ShareRecord::Legacy {
                x: r.x(),
                y: r.y().clone(),
            })
            .collect();
        assert_eq!(reconstruct_bytes(&records[1..], 2).unwrap(), b"old");
    }

    #[test]
    fn tampered_share_yields_a_different_secret() {
        let mut records = dealt(5, 3, b"HELLO");
        if let ShareRecord::Blinded(share) = &mut records[2] {
            share.y = &share.y + &FieldElement::one();
        }
        assert_ne!(reconstruct_bytes(&records[..3], 3).unwrap(), b"HELLO");
    }

    #[test]
    fn rejects_short_or_duplicate_input() {
        let records = dealt(3, 3, b"x");
        assert!(matches!(
            reconstruct(&records[..2], 3),
            Err(Error::InsufficientShares {
                required: 3,
                provided: 2
            })
        ));
        let dup = vec![records[0].clone(), records[0].clone()];
        assert!(matches!(reconstruct(&dup, 2), Err(Error::DuplicateX { .. })));
        assert!(matches!(
            reconstruct(&records, 0),
            Err(Error::InvalidParameters(_))
        ));
    }
}
