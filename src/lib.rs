//! # pedersen-vss
//!
//! 带 Pedersen 承诺的 Shamir 门限秘密分享 (Verifiable Secret Sharing)。
//!
//! 秘密 s 被拆成 n 个分片 `(x, y = f(x), r = g(x))`，任意 k 个可以恢复 s。
//! 每个分片附带承诺 `C = g^y · h^r`，接收方可以发现：
//!
//! - 分片在发放后被修改 ([`protocol::integrity`])；
//! - dealer 发放的分片不在同一对多项式上 ([`protocol::consistency`])。
//!
//! 协议层 ([`protocol`]) 只做纯计算；持久化通过 [`store`] 中的 repository trait 注入，
//! [`workflow::Deployment`] 把两者串起来。

pub mod config;
pub mod errors;
pub mod math;
pub mod params;
pub mod protocol;
mod serde_impl;
pub mod store;
pub mod workflow;

pub use config::{Config, Disclosure};
pub use errors::{Error, RecordKind, Result};
pub use math::FieldElement;
pub use params::{Group, SchemeParams};
pub use workflow::Deployment;
