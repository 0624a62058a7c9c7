pub mod common;
pub mod consistency;
pub mod dealer;
pub mod integrity;
pub mod pedersen;
pub mod reconstruct;

pub use common::*;
pub use consistency::{ConsistencyVerifier, DealerReport, DealerVerdict};
pub use dealer::{shares_from_polynomials, Dealer, Dealing};
pub use integrity::{verify_share, verify_shares, IntegrityVerdict, Tamper};
pub use pedersen::Pedersen;
pub use reconstruct::{reconstruct, reconstruct_bytes};
