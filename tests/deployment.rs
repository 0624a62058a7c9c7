//! End-to-end scenarios over both repository backends.

use std::collections::BTreeSet;

use pedersen_vss::protocol::{DealerVerdict, IntegrityVerdict, Pedersen, ShareRecord};
use pedersen_vss::store::{CommitmentRepository, MemoryStore, ShareRepository};
use pedersen_vss::{Config, Deployment, Disclosure, Error, FieldElement};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

fn memory(disclosure: Disclosure) -> (Deployment<MemoryStore, MemoryStore>, ()) {
    let store = MemoryStore::new();
    let deployment = Deployment::open(&store, store.clone(), store.clone(), disclosure).unwrap();
    (deployment, ())
}

fn filesystem(
    disclosure: Disclosure,
) -> (
    Deployment<
        pedersen_vss::store::FsShareRepository,
        pedersen_vss::store::FsCommitmentRepository,
    >,
    TempDir,
) {
    let dir = tempfile::tempdir().unwrap();
    let deployment = Config::new(dir.path(), disclosure).open().unwrap();
    (deployment, dir)
}

/// Runs a scenario once per backend.
macro_rules! on_both_stores {
    ($scenario:ident, $disclosure:expr) => {
        mod $scenario {
            use super::*;

            #[test]
            fn memory_store() {
                let (deployment, _guard) = memory($disclosure);
                super::$scenario(&deployment);
            }

            #[test]
            fn filesystem_store() {
                let (deployment, _guard) = filesystem($disclosure);
                super::$scenario(&deployment);
            }
        }
    };
}

fn bump_y<S: ShareRepository>(shares: &S, index: u32) {
    let mut share = shares.require(index).unwrap().blinded().unwrap();
    share.y = &share.y + &FieldElement::one();
    shares.put(&ShareRecord::from(share)).unwrap();
}

/// Replaces share `index` with a pair that is not on the dealt polynomials.
fn corrupt_dealing<S: ShareRepository>(shares: &S, index: u32, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut share = shares.require(index).unwrap().blinded().unwrap();
    share.y = FieldElement::random(&mut rng);
    share.r = FieldElement::random(&mut rng);
    shares.put(&ShareRecord::from(share)).unwrap();
}

fn honest_round_trip<S: ShareRepository, C: CommitmentRepository>(d: &Deployment<S, C>) {
    d.generate_all_shares(b"HELLO", 5, 3).unwrap();
    assert_eq!(d.generate_all_commitments().unwrap().len(), 5);

    for index in 1..=5 {
        assert_eq!(d.verify_share(index).unwrap(), IntegrityVerdict::Valid);
    }
    let report = d.verify_dealer(3).unwrap();
    assert_eq!(report.verdict, DealerVerdict::Honest);
    assert!(report.techniques_agree());

    assert_eq!(d.reconstruct_secret(&[1, 3, 5]).unwrap(), b"HELLO");
    assert_eq!(d.reconstruct_secret(&[2, 4, 5]).unwrap(), b"HELLO");
}
on_both_stores!(honest_round_trip, Disclosure::Auditable);

fn tampered_share_is_detected<S: ShareRepository, C: CommitmentRepository>(d: &Deployment<S, C>) {
    d.generate_all_shares(b"HELLO", 5, 3).unwrap();
    d.generate_all_commitments().unwrap();
    bump_y(d.shares(), 3);

    assert!(matches!(
        d.verify_share(3).unwrap(),
        IntegrityVerdict::Tampered(_)
    ));
    assert_eq!(d.verify_share(2).unwrap(), IntegrityVerdict::Valid);

    let report = d.verify_dealer(3).unwrap();
    assert_eq!(report.verdict, DealerVerdict::Malicious(vec![3]));
    assert_eq!(report.integrity_failures, BTreeSet::from([3]));

    assert_eq!(d.reconstruct_secret(&[1, 2, 4]).unwrap(), b"HELLO");
    assert_ne!(d.reconstruct_secret(&[1, 3, 5]).unwrap(), b"HELLO");

    // the changed share cannot be laundered into a fresh commitment
    assert!(matches!(
        d.generate_commitment(3),
        Err(Error::Integrity { index: 3 })
    ));
}
on_both_stores!(tampered_share_is_detected, Disclosure::Auditable);

fn tampered_opaque_share_is_detected<S: ShareRepository, C: CommitmentRepository>(
    d: &Deployment<S, C>,
) {
    tampered_share_is_detected(d);
}
on_both_stores!(tampered_opaque_share_is_detected, Disclosure::Opaque);

/// Share 4 is honest but its stored commitment is not the one the dealing implies.
fn forged_commitment_is_detected<S: ShareRepository, C: CommitmentRepository>(
    d: &Deployment<S, C>,
) {
    d.generate_all_shares(b"HELLO", 5, 3).unwrap();
    let share = d.shares().require(4).unwrap().blinded().unwrap();
    let mut forged = Pedersen::new(d.group()).commit_share(&share, d.disclosure());
    forged.commitment = (&forged.commitment * 2u32) % d.group().modulus();
    d.commitments().insert(&forged).unwrap();
    for index in [1, 2, 3, 5] {
        d.generate_commitment(index).unwrap();
    }

    assert!(matches!(
        d.verify_share(4).unwrap(),
        IntegrityVerdict::Tampered(_)
    ));
    let report = d.verify_dealer(3).unwrap();
    assert_eq!(report.verdict, DealerVerdict::Malicious(vec![4]));
    assert_eq!(report.integrity_failures, BTreeSet::from([4]));
    assert_eq!(report.homomorphic, BTreeSet::from([4]));
}
on_both_stores!(forged_commitment_is_detected, Disclosure::Auditable);

fn forged_opaque_commitment_is_detected<S: ShareRepository, C: CommitmentRepository>(
    d: &Deployment<S, C>,
) {
    forged_commitment_is_detected(d);
}
on_both_stores!(forged_opaque_commitment_is_detected, Disclosure::Opaque);

fn malicious_dealer_is_detected<S: ShareRepository, C: CommitmentRepository>(
    d: &Deployment<S, C>,
) {
    d.generate_all_shares(b"HELLO", 5, 3).unwrap();
    corrupt_dealing(d.shares(), 4, 81);
    d.generate_all_commitments().unwrap();

    // the share opens its own commitment, only the dealer check notices
    assert_eq!(d.verify_share(4).unwrap(), IntegrityVerdict::Valid);

    let report = d.verify_dealer(3).unwrap();
    assert_eq!(report.verdict, DealerVerdict::Malicious(vec![4]));
    assert_eq!(report.base, vec![1, 2, 3]);
    assert_eq!(report.direct, Some(BTreeSet::from([4])));
    assert_eq!(report.homomorphic, BTreeSet::from([4]));
    assert!(matches!(
        report.ensure_honest(),
        Err(Error::Consistency { indices }) if indices == vec![4]
    ));
}
on_both_stores!(malicious_dealer_is_detected, Disclosure::Auditable);

fn opaque_records_hide_share_values<S: ShareRepository, C: CommitmentRepository>(
    d: &Deployment<S, C>,
) {
    d.generate_all_shares(b"HELLO", 4, 2).unwrap();
    corrupt_dealing(d.shares(), 3, 82);
    let records = d.generate_all_commitments().unwrap();
    assert!(records.iter().all(|r| r.disclosed().is_none()));

    let report = d.verify_dealer(2).unwrap();
    assert_eq!(report.verdict, DealerVerdict::Malicious(vec![3]));
    assert!(report.direct.is_none());

    bump_y(d.shares(), 1);
    assert!(matches!(
        d.verify_share(1).unwrap(),
        IntegrityVerdict::Tampered(_)
    ));
    assert_eq!(d.reconstruct_secret(&[2, 4]).unwrap(), b"HELLO");
}
on_both_stores!(opaque_records_hide_share_values, Disclosure::Opaque);

fn boundary_parameters<S: ShareRepository, C: CommitmentRepository>(d: &Deployment<S, C>) {
    let dealing = d.generate_all_shares(b"solo", 1, 1).unwrap();
    assert_eq!(
        dealing.shares[0].y,
        FieldElement::from_bytes_be(b"solo").unwrap()
    );
    d.generate_all_commitments().unwrap();
    assert!(d.verify_dealer(1).unwrap().is_honest());
    assert_eq!(d.reconstruct_secret(&[1]).unwrap(), b"solo");

    assert!(matches!(
        d.generate_all_shares(b"x", 2, 3),
        Err(Error::InvalidParameters(_))
    ));
    assert!(matches!(
        d.generate_all_shares(b"x", 2, 0),
        Err(Error::InvalidParameters(_))
    ));
    assert!(matches!(
        d.generate_all_shares(&[0xff; 66], 3, 2),
        Err(Error::SecretTooLarge { .. })
    ));
}
on_both_stores!(boundary_parameters, Disclosure::Auditable);

fn legacy_shares_reconstruct_but_cannot_commit<S: ShareRepository, C: CommitmentRepository>(
    d: &Deployment<S, C>,
) {
    d.generate_all_shares(b"HELLO", 3, 2).unwrap();
    let record = d.shares().require(1).unwrap();
    d.shares()
        .put(&ShareRecord::Legacy {
            x: record.x(),
            y: record.y().clone(),
        })
        .unwrap();

    assert!(matches!(
        d.generate_commitment(1),
        Err(Error::LegacyFormat { index: 1 })
    ));
    assert_eq!(d.reconstruct_secret(&[1, 3]).unwrap(), b"HELLO");
}
on_both_stores!(legacy_shares_reconstruct_but_cannot_commit, Disclosure::Auditable);

fn too_few_shares_are_rejected<S: ShareRepository, C: CommitmentRepository>(
    d: &Deployment<S, C>,
) {
    d.generate_all_shares(b"HELLO", 5, 3).unwrap();
    assert!(matches!(
        d.reconstruct_secret(&[1, 2]),
        Err(Error::InsufficientShares {
            required: 3,
            provided: 2
        })
    ));
    assert!(matches!(
        d.reconstruct_secret(&[1, 1, 2]),
        Err(Error::DuplicateX { .. })
    ));

    d.generate_commitment(1).unwrap();
    d.generate_commitment(2).unwrap();
    assert!(matches!(
        d.verify_dealer(3),
        Err(Error::InsufficientShares { .. })
    ));
}
on_both_stores!(too_few_shares_are_rejected, Disclosure::Auditable);
