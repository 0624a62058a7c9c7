//! 持久化层 (Repositories)
//!
//! 协议代码只依赖这里的三个 trait；文件系统实现见 [`fs`]，测试用的内存实现见 [`memory`]。
//! 所有方法都返回类型化的结果：记录不存在是 `Ok(None)`，记录损坏是
//! [`Error::Format`]，存储不可用是 [`Error::Io`]。

pub mod fs;
pub mod memory;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, RecordKind, Result};
use crate::protocol::common::{Commitment, PolynomialCommitment, ShareRecord};
use crate::serde_impl::biguint;

pub use fs::{FsCommitmentRepository, FsLayout, FsParamsRepository, FsShareRepository};
pub use memory::MemoryStore;

pub trait ShareRepository: Send + Sync {
    /// Stores (or overwrites) the record under its own `x`.
    fn put(&self, record: &ShareRecord) -> Result<()>;

    fn get(&self, index: u32) -> Result<Option<ShareRecord>>;

    /// Sorted indices of all stored shares.
    fn indices(&self) -> Result<Vec<u32>>;

    fn clear(&self) -> Result<()>;

    fn require(&self, index: u32) -> Result<ShareRecord> {
        self.get(index)?.ok_or(Error::MissingRecord {
            kind: RecordKind::Share,
            index,
        })
    }
}

/// Outcome of [`CommitmentRepository::insert`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inserted {
    Created,
    /// A record already existed; it is returned untouched and nothing was written.
    Existing(Commitment),
}

pub trait CommitmentRepository: Send + Sync {
    /// Writes the record unless one already exists for the same share.
    ///
    /// The check and the write are atomic per share index.
    fn insert(&self, commitment: &Commitment) -> Result<Inserted>;

    fn get(&self, index: u32) -> Result<Option<Commitment>>;

    /// All records, sorted by share index.
    fn list(&self) -> Result<Vec<Commitment>>;

    /// Removes every per-share record and the coefficient commitments.
    fn clear(&self) -> Result<()>;

    fn put_polynomial(&self, polynomial: &PolynomialCommitment) -> Result<()>;

    fn polynomial(&self) -> Result<Option<PolynomialCommitment>>;

    fn require(&self, index: u32) -> Result<Commitment> {
        self.get(index)?.ok_or(Error::MissingRecord {
            kind: RecordKind::Commitment,
            index,
        })
    }
}

pub trait ParamsRepository: Send + Sync {
    fn load(&self) -> Result<Option<BigUint>>;

    /// Returns the stored `H`, or stores the value produced by `create`.
    ///
    /// Concurrent first-time callers converge on a single value: exactly one
    /// `create` result is kept, every caller returns it.
    fn load_or_create(&self, create: &mut dyn FnMut() -> BigUint) -> Result<BigUint>;
}

/// `generator.json`: `{"H": <int>}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorRecord {
    #[serde(rename = "H", with = "biguint")]
    pub h: BigUint,
}
