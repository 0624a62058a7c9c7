//! 单个分片的完整性校验 (Individual Integrity Verification)
//!
//! 用承诺记录里的 `H_used` 重新计算 `C' = g^y · h^r`，与记录的 C 比较。
//! 纯函数，没有副作用；如何上报由调用方决定。

use num_bigint::BigUint;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::errors::{Error, Result};
use crate::params::Group;
use crate::protocol::common::{Commitment, Share};
use crate::protocol::pedersen::Pedersen;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tamper {
    /// The recomputed commitment differs from the recorded one.
    Commitment {
        recorded: BigUint,
        recomputed: BigUint,
    },
    /// The share claims a different x coordinate than the record.
    Coordinate { recorded: u32, current: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IntegrityVerdict {
    Valid,
    Tampered(Tamper),
}

impl IntegrityVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, IntegrityVerdict::Valid)
    }

    /// `Tampered` becomes [`Error::Integrity`] for callers that propagate with `?`.
    pub fn into_result(self, index: u32) -> Result<()> {
        match self {
            IntegrityVerdict::Valid => Ok(()),
            IntegrityVerdict::Tampered(_) => Err(Error::Integrity { index }),
        }
    }
}

/// Checks one share against the commitment recorded when it was issued.
///
/// Returns [`Error::InconsistentBlinding`] before recomputing anything if the
/// record kept an `r` and the share's `r` no longer matches it.
pub fn verify_share(commitment: &Commitment, share: &Share) -> Result<IntegrityVerdict> {
    if commitment.x != share.x {
        warn!(share = commitment.share, recorded = commitment.x, current = share.x, "x coordinate changed");
        return Ok(IntegrityVerdict::Tampered(Tamper::Coordinate {
            recorded: commitment.x,
            current: share.x,
        }));
    }

    if let Some(recorded_r) = &commitment.r {
        if recorded_r != &share.r {
            warn!(share = commitment.share, "blinding factor diverges from the record");
            return Err(Error::InconsistentBlinding {
                index: commitment.share,
            });
        }
    }

    let group = Group::new(commitment.h_used.clone()).map_err(|_| {
        Error::format(
            format!("commitment {}", commitment.share),
            "H_used is not an element of the commitment group",
        )
    })?;
    let recomputed = Pedersen::new(&group).commit(&share.y, &share.r);

    if recomputed == commitment.commitment {
        debug!(share = commitment.share, "commitment matches");
        Ok(IntegrityVerdict::Valid)
    } else {
        warn!(share = commitment.share, "commitment mismatch");
        Ok(IntegrityVerdict::Tampered(Tamper::Commitment {
            recorded: commitment.commitment.clone(),
            recomputed,
        }))
    }
}

/// Checks many `(commitment, share)` pairs in parallel; every pair is checked.
pub fn verify_shares(pairs: &[(Commitment, Share)]) -> Vec<(u32, Result<IntegrityVerdict>)> {
    pairs
        .par_iter()
        .map(|(commitment, share)| (commitment.share, verify_share(commitment, share)))
        .collect()
}
