//! Tamper-evident vote ledger for Votechain.
//!
//! This crate is the heart of Votechain. It provides:
//! - [`VoteLedger`]: the single logical writer that hash-links every accepted
//!   vote into a gapless block chain, with bounded retry on append conflicts
//! - Full-chain verification ([`VoteLedger::verify_chain`]) and a diagnostic
//!   [`ChainReport`] naming the first broken block
//! - [`HistoryProjector`]: time-ordered, human-readable vote history per poll
//! - Tally projection from the chain, used to reconcile cached poll counts

pub mod error;
pub mod ledger;
pub mod projection;
pub mod validation;

pub use error::LedgerError;
pub use ledger::{LedgerConfig, VoteLedger};
pub use projection::{HistoryProjector, VoteHistoryEntry};
pub use validation::ChainReport;
