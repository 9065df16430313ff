//! Foundation types for Votechain.
//!
//! This crate provides the identity, domain, and temporal types shared by
//! every other Votechain crate.
//!
//! # Key Types
//!
//! - [`UserId`], [`PollId`], [`OptionId`] -- numeric store-assigned identifiers
//! - [`Poll`] / [`PollOption`] -- a timed poll and its fixed option list
//! - [`User`] -- a voter as seen by the coordinator (read-only)
//! - [`Block`] / [`BlockHash`] -- one immutable, hash-linked ledger entry
//! - [`Clock`] -- injectable source of microsecond-precision UTC instants

pub mod block;
pub mod error;
pub mod ids;
pub mod poll;
pub mod temporal;
pub mod user;

pub use block::{Block, BlockHash};
pub use error::TypeError;
pub use ids::{OptionId, PollId, UserId};
pub use poll::{Poll, PollDraft, PollOption};
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};
pub use user::User;
