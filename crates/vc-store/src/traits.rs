use vc_types::{Block, Poll, PollDraft, PollId, User, UserId};

use crate::error::StoreResult;

/// Result of a conditional append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The block was persisted as the new tail.
    Committed,
    /// Another block already occupies the sequence, or the block does not
    /// link to the current tail. `next_sequence` is what the store expected.
    Conflict { next_sequence: u64 },
}

/// Ordered, append-only block log.
///
/// Implementations must satisfy these invariants:
/// - `append_if_sequence_matches` commits only when `block.sequence` equals
///   the current block count and `block.previous_hash` equals the tail's
///   hash (any value is accepted for sequence 0). The check and the write
///   are one atomic step.
/// - Committed blocks are never changed or removed.
/// - Readers never observe a partially written block.
pub trait LedgerStore: Send + Sync {
    fn append_if_sequence_matches(&self, block: &Block) -> StoreResult<AppendOutcome>;

    /// Every block, in sequence order.
    fn all_blocks(&self) -> StoreResult<Vec<Block>>;

    /// Every block cast by `user`, in any order.
    fn blocks_for_user(&self, user: UserId) -> StoreResult<Vec<Block>>;

    /// The current tail, if any.
    ///
    /// Default implementation scans `all_blocks()`. Backends should override.
    fn last_block(&self) -> StoreResult<Option<Block>> {
        Ok(self.all_blocks()?.pop())
    }

    /// The block recording `user`'s vote in `poll`, if any.
    ///
    /// Default implementation filters `blocks_for_user()`. Backends with an
    /// index on (user, poll) should override.
    fn find_vote(&self, user: UserId, poll: PollId) -> StoreResult<Option<Block>> {
        Ok(self
            .blocks_for_user(user)?
            .into_iter()
            .find(|b| b.is_vote_of(user, poll)))
    }

    fn block_count(&self) -> StoreResult<u64> {
        Ok(self.all_blocks()?.len() as u64)
    }
}

/// Poll repository.
pub trait PollStore: Send + Sync {
    fn find_by_id(&self, id: PollId) -> StoreResult<Option<Poll>>;

    /// Persist an existing poll and return the stored value.
    ///
    /// The option list (ids, order, and text) must match what was created;
    /// only tallies and the `active` flag may change.
    fn save(&self, poll: &Poll) -> StoreResult<Poll>;

    /// Allocate ids for a new poll and its options and persist it.
    fn create(&self, draft: PollDraft) -> StoreResult<Poll>;

    /// Every poll, ordered by id.
    fn list(&self) -> StoreResult<Vec<Poll>>;
}

/// User repository.
pub trait UserStore: Send + Sync {
    fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Register a new active user.
    fn register(&self, display_name: &str) -> StoreResult<User>;

    /// Every user, ordered by id.
    fn list(&self) -> StoreResult<Vec<User>>;
}
