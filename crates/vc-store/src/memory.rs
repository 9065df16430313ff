//! In-memory stores for tests, embedding, and the snapshot-file backend.
//!
//! Every store keeps its data behind a single `RwLock`, so a reader sees
//! either all or none of a write.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use tracing::debug;
use vc_types::{Block, OptionId, Poll, PollDraft, PollId, PollOption, User, UserId};

use crate::error::{StoreError, StoreResult};
use crate::traits::{AppendOutcome, LedgerStore, PollStore, UserStore};

// ---- Ledger ----

/// In-memory block log with per-user and per-(user, poll) indexes.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    inner: RwLock<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    blocks: Vec<Block>,
    by_user: HashMap<UserId, Vec<usize>>,
    votes: HashMap<(UserId, PollId), usize>,
}

impl LedgerState {
    fn push(&mut self, block: Block) {
        let index = self.blocks.len();
        self.by_user.entry(block.user_id).or_default().push(index);
        self.votes.entry((block.user_id, block.poll_id)).or_insert(index);
        self.blocks.push(block);
    }
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load previously persisted blocks exactly as given, in the given order.
    ///
    /// No validation happens here: a tampered or reordered log is loaded as-is
    /// so chain verification can report it.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        let mut state = LedgerState::default();
        for block in blocks {
            state.push(block);
        }
        Self {
            inner: RwLock::new(state),
        }
    }

    /// Copy of the stored blocks in storage order.
    pub fn blocks(&self) -> StoreResult<Vec<Block>> {
        let state = self
            .inner
            .read()
            .map_err(|_| StoreError::poisoned("ledger store"))?;
        Ok(state.blocks.clone())
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn append_if_sequence_matches(&self, block: &Block) -> StoreResult<AppendOutcome> {
        let mut state = self
            .inner
            .write()
            .map_err(|_| StoreError::poisoned("ledger store"))?;

        let next_sequence = state.blocks.len() as u64;
        if block.sequence != next_sequence {
            return Ok(AppendOutcome::Conflict { next_sequence });
        }
        if let Some(tail) = state.blocks.last() {
            if tail.hash != block.previous_hash {
                return Ok(AppendOutcome::Conflict { next_sequence });
            }
        }

        state.push(block.clone());
        debug!(sequence = block.sequence, "block stored");
        Ok(AppendOutcome::Committed)
    }

    fn all_blocks(&self) -> StoreResult<Vec<Block>> {
        self.blocks()
    }

    fn blocks_for_user(&self, user: UserId) -> StoreResult<Vec<Block>> {
        let state = self
            .inner
            .read()
            .map_err(|_| StoreError::poisoned("ledger store"))?;
        Ok(state
            .by_user
            .get(&user)
            .map(|indexes| indexes.iter().map(|&i| state.blocks[i].clone()).collect())
            .unwrap_or_default())
    }

    fn last_block(&self) -> StoreResult<Option<Block>> {
        let state = self
            .inner
            .read()
            .map_err(|_| StoreError::poisoned("ledger store"))?;
        Ok(state.blocks.last().cloned())
    }

    fn find_vote(&self, user: UserId, poll: PollId) -> StoreResult<Option<Block>> {
        let state = self
            .inner
            .read()
            .map_err(|_| StoreError::poisoned("ledger store"))?;
        Ok(state
            .votes
            .get(&(user, poll))
            .map(|&i| state.blocks[i].clone()))
    }

    fn block_count(&self) -> StoreResult<u64> {
        let state = self
            .inner
            .read()
            .map_err(|_| StoreError::poisoned("ledger store"))?;
        Ok(state.blocks.len() as u64)
    }
}

// ---- Polls ----

/// In-memory poll repository. Poll and option ids are allocated from
/// independent counters starting at 1.
#[derive(Debug, Default)]
pub struct InMemoryPollStore {
    inner: RwLock<PollState>,
}

#[derive(Debug, Default)]
struct PollState {
    polls: BTreeMap<PollId, Poll>,
    last_poll_id: u64,
    last_option_id: u64,
}

impl InMemoryPollStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load previously persisted polls. Id counters resume after the highest
    /// ids present.
    pub fn from_polls(polls: Vec<Poll>) -> Self {
        let mut state = PollState::default();
        for poll in polls {
            state.last_poll_id = state.last_poll_id.max(poll.id.get());
            for option in &poll.options {
                state.last_option_id = state.last_option_id.max(option.id.get());
            }
            state.polls.insert(poll.id, poll);
        }
        Self {
            inner: RwLock::new(state),
        }
    }
}

fn same_option_list(stored: &[PollOption], incoming: &[PollOption]) -> bool {
    stored.len() == incoming.len()
        && stored
            .iter()
            .zip(incoming)
            .all(|(a, b)| a.id == b.id && a.text == b.text)
}

impl PollStore for InMemoryPollStore {
    fn find_by_id(&self, id: PollId) -> StoreResult<Option<Poll>> {
        let state = self
            .inner
            .read()
            .map_err(|_| StoreError::poisoned("poll store"))?;
        Ok(state.polls.get(&id).cloned())
    }

    fn save(&self, poll: &Poll) -> StoreResult<Poll> {
        let mut state = self
            .inner
            .write()
            .map_err(|_| StoreError::poisoned("poll store"))?;

        let stored = state
            .polls
            .get_mut(&poll.id)
            .ok_or(StoreError::PollNotFound(poll.id))?;
        if !same_option_list(&stored.options, &poll.options) {
            return Err(StoreError::InvalidRecord(format!(
                "option list of {} cannot change after creation",
                poll.id
            )));
        }

        *stored = poll.clone();
        Ok(poll.clone())
    }

    fn create(&self, draft: PollDraft) -> StoreResult<Poll> {
        let mut state = self
            .inner
            .write()
            .map_err(|_| StoreError::poisoned("poll store"))?;

        state.last_poll_id += 1;
        let id = PollId::new(state.last_poll_id);

        let mut options = Vec::with_capacity(draft.option_texts.len());
        for text in draft.option_texts {
            state.last_option_id += 1;
            options.push(PollOption::new(OptionId::new(state.last_option_id), text));
        }

        let poll = Poll {
            id,
            title: draft.title,
            description: draft.description,
            enhanced_description: draft.enhanced_description,
            creator_id: draft.creator_id,
            start_time: draft.start_time,
            end_time: draft.end_time,
            active: true,
            options,
        };
        state.polls.insert(id, poll.clone());
        Ok(poll)
    }

    fn list(&self) -> StoreResult<Vec<Poll>> {
        let state = self
            .inner
            .read()
            .map_err(|_| StoreError::poisoned("poll store"))?;
        Ok(state.polls.values().cloned().collect())
    }
}

// ---- Users ----

/// In-memory user repository.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    inner: RwLock<UserState>,
}

#[derive(Debug, Default)]
struct UserState {
    users: BTreeMap<UserId, User>,
    last_id: u64,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_users(users: Vec<User>) -> Self {
        let mut state = UserState::default();
        for user in users {
            state.last_id = state.last_id.max(user.id.get());
            state.users.insert(user.id, user);
        }
        Self {
            inner: RwLock::new(state),
        }
    }
}

impl UserStore for InMemoryUserStore {
    fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        let state = self
            .inner
            .read()
            .map_err(|_| StoreError::poisoned("user store"))?;
        Ok(state.users.get(&id).cloned())
    }

    fn register(&self, display_name: &str) -> StoreResult<User> {
        let name = display_name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidRecord(
                "display name must not be empty".into(),
            ));
        }

        let mut state = self
            .inner
            .write()
            .map_err(|_| StoreError::poisoned("user store"))?;
        state.last_id += 1;
        let user = User::new(UserId::new(state.last_id), name);
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn list(&self) -> StoreResult<Vec<User>> {
        let state = self
            .inner
            .read()
            .map_err(|_| StoreError::poisoned("user store"))?;
        Ok(state.users.values().cloned().collect())
    }
}
