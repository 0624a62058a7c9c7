//! 内存存储，用于测试和嵌入式调用。
//!
//! 一个 [`MemoryStore`] 同时实现三个 repository trait；克隆共享同一份数据。

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use num_bigint::BigUint;

use crate::errors::Result;
use crate::protocol::common::{Commitment, PolynomialCommitment, ShareRecord};
use crate::store::{CommitmentRepository, Inserted, ParamsRepository, ShareRepository};

#[derive(Default)]
struct State {
    shares: BTreeMap<u32, ShareRecord>,
    commitments: BTreeMap<u32, Commitment>,
    polynomial: Option<PolynomialCommitment>,
    generator: Option<BigUint>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // a panic while holding the lock cannot leave a map half-updated
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ShareRepository for MemoryStore {
    fn put(&self, record: &ShareRecord) -> Result<()> {
        self.state().shares.insert(record.x(), record.clone());
        Ok(())
    }

    fn get(&self, index: u32) -> Result<Option<ShareRecord>> {
        Ok(self.state().shares.get(&index).cloned())
    }

    fn indices(&self) -> Result<Vec<u32>> {
        Ok(self.state().shares.keys().copied().collect())
    }

    fn clear(&self) -> Result<()> {
        self.state().shares.clear();
        Ok(())
    }
}

impl CommitmentRepository for MemoryStore {
    fn insert(&self, commitment: &Commitment) -> Result<Inserted> {
        let mut state = self.state();
        if let Some(existing) = state.commitments.get(&commitment.share) {
            return Ok(Inserted::Existing(existing.clone()));
        }
        state
            .commitments
            .insert(commitment.share, commitment.clone());
        Ok(Inserted::Created)
    }

    fn get(&self, index: u32) -> Result<Option<Commitment>> {
        Ok(self.state().commitments.get(&index).cloned())
    }

    fn list(&self) -> Result<Vec<Commitment>> {
        Ok(self.state().commitments.values().cloned().collect())
    }

    fn clear(&self) -> Result<()> {
        let mut state = self.state();
        state.commitments.clear();
        state.polynomial = None;
        Ok(())
    }

    fn put_polynomial(&self, polynomial: &PolynomialCommitment) -> Result<()> {
        self.state().polynomial = Some(polynomial.clone());
        Ok(())
    }

    fn polynomial(&self) -> Result<Option<PolynomialCommitment>> {
        Ok(self.state().polynomial.clone())
    }
}

impl ParamsRepository for MemoryStore {
    fn load(&self) -> Result<Option<BigUint>> {
        Ok(self.state().generator.clone())
    }

    fn load_or_create(&self, create: &mut dyn FnMut() -> BigUint) -> Result<BigUint> {
        let mut state = self.state();
        Ok(state.generator.get_or_insert_with(create).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::FieldElement;

    #[test]
    fn clones_share_state() {
        let store = MemoryStore::new();
        let view = store.clone();
        ShareRepository::put(
            &store,
            &ShareRecord::Legacy {
                x: 2,
                y: FieldElement::from(9u64),
            },
        )
        .unwrap();
        assert_eq!(view.indices().unwrap(), vec![2]);
        assert!(ShareRepository::get(&view, 1).unwrap().is_none());
    }

    #[test]
    fn insert_keeps_the_first_record() {
        let store = MemoryStore::new();
        let record = |value: u32| Commitment {
            share: 1,
            x: 1,
            y: None,
            r: None,
            commitment: BigUint::from(value),
            h_used: BigUint::from(3u32),
        };
        assert_eq!(store.insert(&record(1)).unwrap(), Inserted::Created);
        assert_eq!(
            store.insert(&record(2)).unwrap(),
            Inserted::Existing(record(1))
        );
    }

    #[test]
    fn generator_is_created_once() {
        let store = MemoryStore::new();
        let mut calls = 0;
        for _ in 0..3 {
            let h = store
                .load_or_create(&mut || {
                    calls += 1;
                    BigUint::from(5u32)
                })
                .unwrap();
            assert_eq!(h, BigUint::from(5u32));
        }
        assert_eq!(calls, 1);
    }
}
