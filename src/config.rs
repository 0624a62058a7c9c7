//! Deployment configuration.
//!
//! A deployment is a data directory holding shares, commitments and the
//! generator record, plus the disclosure policy for commitment records.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::store::fs::{FsCommitmentRepository, FsLayout, FsShareRepository};
use crate::workflow::Deployment;

/// Whether commitment records carry the raw `(y, r)` of their share.
///
/// - `Auditable`: `y` and `r` are kept in the record, the dealer check can
///   reconstruct the polynomials directly (parity with older tooling).
/// - `Opaque`: only `C` is public; the dealer check relies on the published
///   coefficient commitments and the homomorphic equation alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disclosure {
    #[default]
    Auditable,
    Opaque,
}

impl FromStr for Disclosure {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auditable" => Ok(Disclosure::Auditable),
            "opaque" => Ok(Disclosure::Opaque),
            other => Err(Error::InvalidParameters(format!(
                "unknown disclosure mode `{other}` (expected auditable | opaque)"
            ))),
        }
    }
}

impl fmt::Display for Disclosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disclosure::Auditable => f.write_str("auditable"),
            Disclosure::Opaque => f.write_str("opaque"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub disclosure: Disclosure,
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>, disclosure: Disclosure) -> Self {
        Self {
            data_dir: data_dir.into(),
            disclosure,
        }
    }

    pub fn layout(&self) -> FsLayout {
        FsLayout::new(&self.data_dir)
    }

    /// Opens the filesystem-backed deployment, creating `H` on first use.
    pub fn open(&self) -> Result<Deployment<FsShareRepository, FsCommitmentRepository>> {
        let layout = self.layout();
        Deployment::open(
            &layout.params(),
            layout.shares(),
            layout.commitments(),
            self.disclosure,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(".", Disclosure::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disclosure_parses_case_insensitively() {
        assert_eq!("Opaque".parse::<Disclosure>().unwrap(), Disclosure::Opaque);
        assert_eq!(
            "auditable".parse::<Disclosure>().unwrap(),
            Disclosure::Auditable
        );
        assert!("public".parse::<Disclosure>().is_err());
        assert_eq!(Disclosure::Opaque.to_string(), "opaque");
    }
}
