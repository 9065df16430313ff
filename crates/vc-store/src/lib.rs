//! Storage boundaries for Votechain.
//!
//! The vote ledger, the cast coordinator, and the history projector talk to
//! persistence only through the traits in this crate:
//!
//! - [`LedgerStore`] -- ordered block log with a conditional (sequence-checked) append
//! - [`PollStore`] -- polls and their option tallies
//! - [`UserStore`] -- registered users (read-only for the coordinator)
//!
//! # Backends
//!
//! - [`InMemoryLedgerStore`], [`InMemoryPollStore`], [`InMemoryUserStore`] --
//!   `RwLock`-guarded maps for tests and embedding
//! - [`StoreSnapshot`] -- loads/saves the in-memory stores as one JSON file
//! - [`StateLock`] -- exclusive hold on a state file while it is in use
//!
//! # Design Rules
//!
//! 1. Blocks are never mutated or removed through the trait surface.
//! 2. The ledger store never interprets hashes; chain validity is the
//!    ledger's concern. It only refuses appends whose sequence or previous
//!    hash does not extend the current tail.
//! 3. Concurrent reads are always safe and see a consistent snapshot.
//! 4. Lock poisoning and I/O failures surface as errors, never panics.

pub mod error;
pub mod lock;
pub mod memory;
pub mod snapshot;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use lock::StateLock;
pub use memory::{InMemoryLedgerStore, InMemoryPollStore, InMemoryUserStore};
pub use snapshot::StoreSnapshot;
pub use traits::{AppendOutcome, LedgerStore, PollStore, UserStore};
