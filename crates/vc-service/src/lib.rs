//! Votechain services.
//!
//! - [`CastVoteCoordinator`]: validates cast attempts, appends accepted votes
//!   to the ledger and keeps poll tallies in step, with reconciliation for
//!   tallies that fell behind
//! - [`PollLifecycle`]: poll creation (with optional description
//!   enhancement) and listing
//! - [`InsightService`]: poll insights from a pluggable [`InsightProvider`]
//! - [`VotechainConfig`]: TOML configuration
//! - [`Votechain`]: everything wired together over the in-memory stores
//!
//! Every operation reports failures through [`ServiceError`], whose
//! variants follow one taxonomy: not found, invalid state, conflict,
//! unavailable, corruption.

pub mod app;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod insight;
pub mod lifecycle;

pub use app::Votechain;
pub use config::{ConfigError, CoordinatorConfig, InsightConfig, StorageConfig, VotechainConfig};
pub use coordinator::{CastVoteCoordinator, PollSnapshot, TallyCorrection};
pub use error::{Rejection, ServiceError, ServiceResult};
pub use insight::{DisabledInsights, InsightError, InsightProvider, InsightService, TallyInsights};
pub use lifecycle::{CreatePollRequest, PollLifecycle};

pub use vc_ledger::{ChainReport, VoteHistoryEntry};
pub use vc_types::{Block, OptionId, Poll, PollId, User, UserId};
