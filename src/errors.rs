//! 错误类型 (Error types)
//!
//! 协议层的失败（篡改、恶意 dealer、参数错误）与资源层的失败（文件系统不可用、
//! JSON 损坏）共用一个 [`Error`] 枚举，但可以通过 [`Error::is_resource_failure`]
//! 区分。所有校验入口都返回类型化的结果，调用方自行决定如何上报。

use std::fmt;

use num_bigint::BigUint;
use thiserror::Error;

/// 持久化记录的种类，用于 [`Error::MissingRecord`] 的提示信息。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Share,
    Commitment,
    Generator,
    Polynomial,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Share => "share",
            RecordKind::Commitment => "commitment",
            RecordKind::Generator => "generator",
            RecordKind::Polynomial => "polynomial commitment",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// A persisted record could not be parsed.
    #[error("malformed record ({location}): {reason}")]
    Format { location: String, reason: String },

    /// The share uses the two-field `x,y` layout and has no blinding factor.
    #[error("share {index} uses the legacy `x,y` layout and carries no blinding factor")]
    LegacyFormat { index: u32 },

    #[error("{kind} record {index} not found")]
    MissingRecord { kind: RecordKind, index: u32 },

    #[error("secret is {bits} bits long and does not fit below the field prime")]
    SecretTooLarge { bits: u64 },

    #[error("interpolation points repeat x = {x}")]
    DuplicateX { x: BigUint },

    #[error("insufficient shares: required {required}, provided {provided}")]
    InsufficientShares { required: usize, provided: usize },

    /// Commitments cannot be compared across different `H` bases.
    #[error("commitment {index} was made with a different generator H")]
    GeneratorMismatch { index: u32 },

    #[error("commitment {index} does not match its share")]
    Integrity { index: u32 },

    #[error("shares {indices:?} are inconsistent with a single polynomial")]
    Consistency { indices: Vec<u32> },

    #[error("blinding factor of share {index} differs from the one recorded at commitment time")]
    InconsistentBlinding { index: u32 },

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn format(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Format {
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// `true` for failures of the storage backend rather than of the protocol.
    ///
    /// 资源层错误 (repository unreachable) 对调用方是致命的；其余错误都是
    /// 可以在调用点处理的协议层结果。
    pub fn is_resource_failure(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Serialization(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
