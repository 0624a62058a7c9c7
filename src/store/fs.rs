//! 文件系统存储 (Filesystem repositories)
//!
//! 目录布局：
//!
//! ```text
//! <data_dir>/
//!   generator.json                {"H": <int>}
//!   shares/share_XX.txt           x,y,r
//!   commitments/commitment_XX.txt {"share":..,"x":..,"y":..,"r":..,"commitment":..,"H_used":..}
//!   commitments/polynomial.json   {"H": <int>, "coefficients": [..]}
//! ```
//!
//! 所有写入都先写临时文件再原子地 rename，读者永远看不到写了一半的记录。

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use num_bigint::BigUint;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::errors::{Error, RecordKind, Result};
use crate::protocol::common::{Commitment, PolynomialCommitment, ShareRecord};
use crate::store::{
    CommitmentRepository, GeneratorRecord, Inserted, ParamsRepository, ShareRepository,
};

const GENERATOR_FILE: &str = "generator.json";
const POLYNOMIAL_FILE: &str = "polynomial.json";
const LOCK_ATTEMPTS: u32 = 500;
const LOCK_BACKOFF: Duration = Duration::from_millis(10);
/// A lock older than this was left behind by a writer that died while holding it.
const LOCK_STALE_AFTER: Duration = Duration::from_secs(30);

pub fn share_file_name(index: u32) -> String {
    format!("share_{index:02}.txt")
}

pub fn commitment_file_name(index: u32) -> String {
    format!("commitment_{index:02}.txt")
}

/// Paths of one deployment under its data directory.
#[derive(Clone, Debug)]
pub struct FsLayout {
    root: PathBuf,
}

impl FsLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn shares_dir(&self) -> PathBuf {
        self.root.join("shares")
    }

    pub fn commitments_dir(&self) -> PathBuf {
        self.root.join("commitments")
    }

    pub fn generator_path(&self) -> PathBuf {
        self.root.join(GENERATOR_FILE)
    }

    pub fn shares(&self) -> FsShareRepository {
        FsShareRepository {
            dir: self.shares_dir(),
        }
    }

    pub fn commitments(&self) -> FsCommitmentRepository {
        FsCommitmentRepository {
            dir: self.commitments_dir(),
        }
    }

    pub fn params(&self) -> FsParamsRepository {
        FsParamsRepository {
            dir: self.root.clone(),
        }
    }
}

// ============================================================================
// 1. 文件读写工具 (File helpers)
// ============================================================================

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let Some(text) = read_optional(path)? else {
        return Ok(None);
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| Error::format(path.display().to_string(), e.to_string()))
}

/// 临时文件 + rename 原子写入
fn write_atomic(dir: &Path, path: &Path, contents: &[u8]) -> Result<()> {
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Indices of `<prefix>NN<suffix>` files in `dir`, sorted.
fn list_indices(dir: &Path, prefix: &str, suffix: &str) -> Result<Vec<u32>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut indices = Vec::new();
    for entry in entries {
        let name = entry?.file_name();
        let index = name
            .to_str()
            .and_then(|n| n.strip_prefix(prefix))
            .and_then(|n| n.strip_suffix(suffix))
            .and_then(|n| n.parse::<u32>().ok());
        if let Some(index) = index {
            indices.push(index);
        }
    }
    indices.sort_unstable();
    indices.dedup();
    Ok(indices)
}

/// 每个分片索引一个锁文件 (`create_new` 保证互斥)，drop 时删除。
///
/// 锁文件里写入持有者的 pid；写者崩溃留下的锁在 [`LOCK_STALE_AFTER`] 之后被回收。
struct IndexLock {
    path: PathBuf,
}

impl IndexLock {
    fn acquire(path: PathBuf) -> Result<Self> {
        for _ in 0..LOCK_ATTEMPTS {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut file) => {
                    let lock = Self { path };
                    writeln!(file, "{}", std::process::id())?;
                    return Ok(lock);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if Self::is_stale(&path)? {
                        warn!(path = %path.display(), "removing stale lock");
                        match fs::remove_file(&path) {
                            Ok(()) => continue,
                            Err(e) if e.kind() == ErrorKind::NotFound => continue,
                            Err(e) => return Err(e.into()),
                        }
                    }
                    thread::sleep(LOCK_BACKOFF)
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::Io(io::Error::new(
            ErrorKind::WouldBlock,
            format!("lock {} is held by another writer", path.display()),
        )))
    }

    fn is_stale(path: &Path) -> Result<bool> {
        let modified = match fs::metadata(path) {
            Ok(meta) => meta.modified()?,
            // released between our attempt and this check
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        // a clock that runs backwards leaves the lock in place
        Ok(modified.elapsed().is_ok_and(|age| age > LOCK_STALE_AFTER))
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

// ============================================================================
// 2. 分片存储 (Shares)
// ============================================================================

#[derive(Clone, Debug)]
pub struct FsShareRepository {
    dir: PathBuf,
}

impl FsShareRepository {
    pub fn path(&self, index: u32) -> PathBuf {
        self.dir.join(share_file_name(index))
    }
}

impl ShareRepository for FsShareRepository {
    fn put(&self, record: &ShareRecord) -> Result<()> {
        let path = self.path(record.x());
        write_atomic(&self.dir, &path, format!("{record}\n").as_bytes())?;
        debug!(path = %path.display(), "share written");
        Ok(())
    }

    fn get(&self, index: u32) -> Result<Option<ShareRecord>> {
        let path = self.path(index);
        read_optional(&path)?
            .map(|text| ShareRecord::parse(&text, &path.display().to_string()))
            .transpose()
    }

    fn indices(&self) -> Result<Vec<u32>> {
        list_indices(&self.dir, "share_", ".txt")
    }

    fn clear(&self) -> Result<()> {
        for index in self.indices()? {
            remove_if_present(&self.path(index))?;
        }
        Ok(())
    }
}

// ============================================================================
// 3. 承诺存储 (Commitments)
// ============================================================================

#[derive(Clone, Debug)]
pub struct FsCommitmentRepository {
    dir: PathBuf,
}

impl FsCommitmentRepository {
    pub fn path(&self, index: u32) -> PathBuf {
        self.dir.join(commitment_file_name(index))
    }

    pub fn polynomial_path(&self) -> PathBuf {
        self.dir.join(POLYNOMIAL_FILE)
    }

    fn lock_path(&self, index: u32) -> PathBuf {
        self.dir.join(format!("commitment_{index:02}.lock"))
    }
}

impl CommitmentRepository for FsCommitmentRepository {
    fn insert(&self, commitment: &Commitment) -> Result<Inserted> {
        fs::create_dir_all(&self.dir)?;
        let _lock = IndexLock::acquire(self.lock_path(commitment.share))?;

        if let Some(existing) = self.get(commitment.share)? {
            return Ok(Inserted::Existing(existing));
        }
        let path = self.path(commitment.share);
        let json = serde_json::to_string_pretty(commitment)?;
        write_atomic(&self.dir, &path, json.as_bytes())?;
        debug!(path = %path.display(), "commitment written");
        Ok(Inserted::Created)
    }

    fn get(&self, index: u32) -> Result<Option<Commitment>> {
        read_json(&self.path(index))
    }

    fn list(&self) -> Result<Vec<Commitment>> {
        list_indices(&self.dir, "commitment_", ".txt")?
            .into_iter()
            .filter_map(|index| self.get(index).transpose())
            .collect()
    }

    fn clear(&self) -> Result<()> {
        for index in list_indices(&self.dir, "commitment_", ".txt")? {
            remove_if_present(&self.path(index))?;
        }
        remove_if_present(&self.polynomial_path())
    }

    fn put_polynomial(&self, polynomial: &PolynomialCommitment) -> Result<()> {
        let json = serde_json::to_string_pretty(polynomial)?;
        write_atomic(&self.dir, &self.polynomial_path(), json.as_bytes())
    }

    fn polynomial(&self) -> Result<Option<PolynomialCommitment>> {
        read_json(&self.polynomial_path())
    }
}

// ============================================================================
// 4. 生成元存储 (Generator H)
// ============================================================================

#[derive(Clone, Debug)]
pub struct FsParamsRepository {
    dir: PathBuf,
}

impl FsParamsRepository {
    pub fn path(&self) -> PathBuf {
        self.dir.join(GENERATOR_FILE)
    }
}

impl ParamsRepository for FsParamsRepository {
    fn load(&self) -> Result<Option<BigUint>> {
        Ok(read_json::<GeneratorRecord>(&self.path())?.map(|record| record.h))
    }

    fn load_or_create(&self, create: &mut dyn FnMut() -> BigUint) -> Result<BigUint> {
        if let Some(h) = self.load()? {
            return Ok(h);
        }

        let h = create();
        let json = serde_json::to_string_pretty(&GeneratorRecord { h: h.clone() })?;
        fs::create_dir_all(&self.dir)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;

        // persist_noclobber 在目标已存在时失败：先到者胜出，后到者读取胜者的值
        match tmp.persist_noclobber(self.path()) {
            Ok(_) => {
                info!(path = %self.path().display(), "generator H created");
                Ok(h)
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                debug!("generator H created concurrently, adopting stored value");
                self.load()?.ok_or(Error::MissingRecord {
                    kind: RecordKind::Generator,
                    index: 0,
                })
            }
            Err(e) => Err(e.error.into()),
        }
    }
}
