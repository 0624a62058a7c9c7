//! 部署流程 (Deployment workflow)
//!
//! 命令行的六个操作在这里落地：分片、生成承诺、校验单个分片、校验 dealer、恢复秘密。
//! 协议逻辑全部在 [`crate::protocol`] 中，这里只负责读写 repository 并串联调用。

use rand_core::{CryptoRng, OsRng, RngCore};
use rayon::prelude::*;
use tracing::{info, instrument, warn};

use crate::config::Disclosure;
use crate::errors::{Error, Result};
use crate::params::{random_generator, Group, SchemeParams};
use crate::protocol::common::{truncate_digits, Commitment, ShareRecord};
use crate::protocol::consistency::{ConsistencyVerifier, DealerReport};
use crate::protocol::dealer::{Dealer, Dealing};
use crate::protocol::integrity::{self, IntegrityVerdict};
use crate::protocol::pedersen::Pedersen;
use crate::protocol::reconstruct::reconstruct_bytes;
use crate::store::{CommitmentRepository, Inserted, ParamsRepository, ShareRepository};

pub struct Deployment<S, C> {
    group: Group,
    shares: S,
    commitments: C,
    disclosure: Disclosure,
}

impl<S: ShareRepository, C: CommitmentRepository> Deployment<S, C> {
    /// Loads `H` from `params`, creating it on first use, and binds the repositories.
    pub fn open(
        params: &dyn ParamsRepository,
        shares: S,
        commitments: C,
        disclosure: Disclosure,
    ) -> Result<Self> {
        let mut rng = OsRng;
        let h = params.load_or_create(&mut || random_generator(&mut rng))?;
        let group = Group::new(h).map_err(|_| {
            Error::format(
                "generator",
                "stored H is not an element of the order-p commitment group",
            )
        })?;
        info!(h = %group.fingerprint(), %disclosure, "deployment opened");
        Ok(Self::with_group(group, shares, commitments, disclosure))
    }

    pub fn with_group(group: Group, shares: S, commitments: C, disclosure: Disclosure) -> Self {
        Self {
            group,
            shares,
            commitments,
            disclosure,
        }
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn disclosure(&self) -> Disclosure {
        self.disclosure
    }

    pub fn shares(&self) -> &S {
        &self.shares
    }

    pub fn commitments(&self) -> &C {
        &self.commitments
    }

    pub fn generate_all_shares(&self, secret: &[u8], n: u32, k: u32) -> Result<Dealing> {
        self.generate_all_shares_with_rng(secret, n, k, &mut OsRng)
    }

    /// Splits `secret` into `n` shares and replaces everything previously stored.
    ///
    /// Old commitments refer to the old polynomials and are removed with them.
    #[instrument(level = "info", skip(self, secret, rng))]
    pub fn generate_all_shares_with_rng<R: RngCore + CryptoRng + ?Sized>(
        &self,
        secret: &[u8],
        n: u32,
        k: u32,
        rng: &mut R,
    ) -> Result<Dealing> {
        let params = SchemeParams::new(self.group.clone(), n, k)?;
        let dealing = Dealer::new(&params).deal_bytes(secret, rng)?;

        self.commitments.clear()?;
        self.shares.clear()?;
        for share in &dealing.shares {
            self.shares.put(&ShareRecord::from(share.clone()))?;
        }
        self.commitments.put_polynomial(&dealing.polynomial)?;

        info!(n, k, "shares stored");
        Ok(dealing)
    }

    /// Issues the commitment for one share.
    ///
    /// Issuing twice is idempotent. If a record already exists and the share
    /// no longer opens to it, the share has changed since issuance and
    /// [`Error::Integrity`] is returned instead of recording the new value.
    #[instrument(level = "info", skip(self))]
    pub fn generate_commitment(&self, index: u32) -> Result<Commitment> {
        let share = self.shares.require(index)?.blinded()?;
        let record = Pedersen::new(&self.group).commit_share(&share, self.disclosure);

        match self.commitments.insert(&record)? {
            Inserted::Created => {
                info!(
                    commitment = %truncate_digits(&record.commitment.to_string()),
                    "commitment issued"
                );
                Ok(record)
            }
            Inserted::Existing(existing)
                if existing.commitment == record.commitment
                    && existing.h_used == record.h_used
                    && existing.x == record.x =>
            {
                Ok(existing)
            }
            Inserted::Existing(_) => {
                warn!("share no longer matches its issued commitment, refusing to re-commit");
                Err(Error::Integrity { index })
            }
        }
    }

    pub fn generate_all_commitments(&self) -> Result<Vec<Commitment>> {
        self.shares
            .indices()?
            .into_par_iter()
            .map(|index| self.generate_commitment(index))
            .collect()
    }

    #[instrument(level = "info", skip(self))]
    pub fn verify_share(&self, index: u32) -> Result<IntegrityVerdict> {
        let commitment = self.commitments.require(index)?;
        let share = self.shares.require(index)?.blinded()?;
        integrity::verify_share(&commitment, &share)
    }

    /// Checks that all issued shares lie on one polynomial pair.
    ///
    /// Every record is checked against the participant's current share, so
    /// a share altered after issuance is reported in both disclosure modes.
    /// Disclosed records get the current `(y, r)` overlaid; for opaque
    /// records the current shares are handed to the verifier alongside.
    #[instrument(level = "info", skip(self))]
    pub fn verify_dealer(&self, k: usize) -> Result<DealerReport> {
        let mut records = Vec::new();
        let mut current = Vec::new();
        for record in self.commitments.list()? {
            match self.shares.get(record.share)? {
                Some(ShareRecord::Blinded(share)) if record.disclosed().is_some() => {
                    records.push(record.with_share_values(&share));
                }
                Some(ShareRecord::Blinded(share)) => {
                    current.push((record.share, share));
                    records.push(record);
                }
                Some(ShareRecord::Legacy { .. }) => {
                    warn!(share = record.share, "legacy share file, checking recorded values");
                    records.push(record);
                }
                None => records.push(record),
            }
        }
        let published = self.commitments.polynomial()?;
        ConsistencyVerifier::new(&self.group, k)
            .with_current_shares(current.iter().map(|(index, share)| (*index, share)))
            .verify(&records, published.as_ref())
    }

    /// Recovers the secret from the listed shares.
    ///
    /// The threshold comes from the published coefficient commitments; without
    /// them every listed share is used.
    #[instrument(level = "info", skip(self))]
    pub fn reconstruct_secret(&self, indices: &[u32]) -> Result<Vec<u8>> {
        let records = indices
            .iter()
            .map(|&index| self.shares.require(index))
            .collect::<Result<Vec<_>>>()?;
        let k = match self.commitments.polynomial()? {
            Some(polynomial) => polynomial.threshold(),
            None => records.len(),
        };
        reconstruct_bytes(&records, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RecordKind;
    use crate::math::FieldElement;
    use crate::store::MemoryStore;
    use num_bigint::BigUint;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn deployment(disclosure: Disclosure) -> (Deployment<MemoryStore, MemoryStore>, MemoryStore) {
        let store = MemoryStore::new();
        let deployment = Deployment::open(&store, store.clone(), store.clone(), disclosure).unwrap();
        (deployment, store)
    }

    #[test]
    fn open_reuses_the_stored_generator() {
        let store = MemoryStore::new();
        let first = Deployment::open(&store, store.clone(), store.clone(), Disclosure::Auditable)
            .unwrap();
        let second = Deployment::open(&store, store.clone(), store.clone(), Disclosure::Opaque)
            .unwrap();
        assert_eq!(first.group().h(), second.group().h());
    }

    #[test]
    fn open_rejects_a_generator_outside_the_group() {
        let store = MemoryStore::new();
        store.load_or_create(&mut || BigUint::from(2u32)).unwrap();
        assert!(matches!(
            Deployment::open(&store, store.clone(), store.clone(), Disclosure::Auditable),
            Err(Error::Format { .. })
        ));
    }

    #[test]
    fn commit_is_idempotent_but_refuses_changed_shares() {
        let (deployment, store) = deployment(Disclosure::Auditable);
        let mut rng = StdRng::seed_from_u64(71);
        deployment
            .generate_all_shares_with_rng(b"HELLO", 3, 2, &mut rng)
            .unwrap();

        let first = deployment.generate_commitment(2).unwrap();
        assert_eq!(deployment.generate_commitment(2).unwrap(), first);

        let mut share = ShareRepository::require(&store, 2).unwrap().blinded().unwrap();
        share.y = &share.y + &FieldElement::one();
        ShareRepository::put(&store, &ShareRecord::from(share)).unwrap();
        assert!(matches!(
            deployment.generate_commitment(2),
            Err(Error::Integrity { index: 2 })
        ));
        assert_eq!(CommitmentRepository::require(&store, 2).unwrap(), first);
    }

    #[test]
    fn legacy_and_missing_shares_are_reported() {
        let (deployment, store) = deployment(Disclosure::Auditable);
        ShareRepository::put(
            &store,
            &ShareRecord::Legacy {
                x: 1,
                y: FieldElement::from(4u64),
            },
        )
        .unwrap();
        assert!(matches!(
            deployment.generate_commitment(1),
            Err(Error::LegacyFormat { index: 1 })
        ));
        assert!(matches!(
            deployment.generate_commitment(2),
            Err(Error::MissingRecord {
                kind: RecordKind::Share,
                index: 2
            })
        ));
        assert!(matches!(
            deployment.verify_share(1),
            Err(Error::MissingRecord {
                kind: RecordKind::Commitment,
                index: 1
            })
        ));
    }

    #[test]
    fn resplitting_drops_old_commitments() {
        let (deployment, store) = deployment(Disclosure::Auditable);
        let mut rng = StdRng::seed_from_u64(72);
        deployment
            .generate_all_shares_with_rng(b"first", 4, 2, &mut rng)
            .unwrap();
        deployment.generate_all_commitments().unwrap();

        deployment
            .generate_all_shares_with_rng(b"second", 2, 2, &mut rng)
            .unwrap();
        assert!(CommitmentRepository::list(&store).unwrap().is_empty());
        assert_eq!(store.indices().unwrap(), vec![1, 2]);
        assert_eq!(deployment.reconstruct_secret(&[2, 1]).unwrap(), b"second");
    }
}
