use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockWriteGuard};

use serde::Serialize;
use tracing::{error, info, warn};
use vc_ledger::VoteLedger;
use vc_store::{PollStore, UserStore};
use vc_types::{Block, Clock, OptionId, Poll, PollId, UserId};

use crate::config::CoordinatorConfig;
use crate::error::{Rejection, ServiceError, ServiceResult};

/// A poll and its ledger blocks, read together under the poll's lock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PollSnapshot {
    pub poll: Poll,
    /// Blocks for the poll, ascending by sequence.
    pub blocks: Vec<Block>,
}

impl PollSnapshot {
    /// Returns `true` if every cached option count matches the blocks.
    pub fn tallies_match(&self) -> bool {
        let mut counted: BTreeMap<OptionId, u64> = BTreeMap::new();
        for block in &self.blocks {
            *counted.entry(block.option_id).or_insert(0) += 1;
        }
        self.poll.total_votes() == self.blocks.len() as u64
            && self
                .poll
                .options
                .iter()
                .all(|o| counted.get(&o.id).copied().unwrap_or(0) == o.vote_count)
    }
}

/// One option count rewritten by [`CastVoteCoordinator::reconcile`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TallyCorrection {
    pub option_id: OptionId,
    pub cached: u64,
    pub actual: u64,
}

/// Validates cast attempts and turns accepted ones into a ledger block plus
/// a tally increment.
///
/// Casts for the same poll are serialized by a per-poll lock held across
/// the duplicate re-check, the append and the tally save. Casts for
/// different polls only meet at the ledger's global append point.
///
/// Every write path also holds a shared gate, which [`quiesce`](Self::quiesce)
/// takes exclusively so a reader can see all stores at one instant.
pub struct CastVoteCoordinator {
    users: Arc<dyn UserStore>,
    polls: Arc<dyn PollStore>,
    ledger: Arc<VoteLedger>,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
    gate: RwLock<()>,
    poll_locks: Mutex<HashMap<PollId, Arc<Mutex<()>>>>,
    pending: Mutex<BTreeSet<PollId>>,
}

impl CastVoteCoordinator {
    pub fn new(
        users: Arc<dyn UserStore>,
        polls: Arc<dyn PollStore>,
        ledger: Arc<VoteLedger>,
        clock: Arc<dyn Clock>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            users,
            polls,
            ledger,
            clock,
            config,
            gate: RwLock::new(()),
            poll_locks: Mutex::new(HashMap::new()),
            pending: Mutex::new(BTreeSet::new()),
        }
    }

    /// Cast `user`'s vote for `option` in `poll`.
    ///
    /// Every rejection happens before the ledger is touched. Once the block
    /// is committed the cast succeeds: if the tally cannot be saved within
    /// the retry limit, the poll is queued for [`reconcile`](Self::reconcile).
    pub fn cast(&self, user: UserId, poll: PollId, option: OptionId) -> ServiceResult<Block> {
        if self.users.find_by_id(user)?.is_none() {
            return Err(ServiceError::not_found("user", user));
        }
        let current = self.load_poll(poll)?;
        self.ensure_open(&current)?;
        self.ensure_no_vote(user, poll)?;
        if current.option(option).is_none() {
            return Err(ServiceError::not_found("option", format!("{option} in {poll}")));
        }

        let _writing = self.gate.read().map_err(|_| poisoned("write gate"))?;
        let lock = self.poll_lock(poll)?;
        let _guard = lock.lock().map_err(|_| poisoned("poll lock"))?;

        // Another cast may have landed, or the poll closed, while we waited.
        let mut current = self.load_poll(poll)?;
        self.ensure_open(&current)?;
        self.ensure_no_vote(user, poll)?;

        let block = self.ledger.append(user, poll, option)?;
        self.save_tally(&mut current, option, &block);

        info!(
            %user,
            %poll,
            %option,
            sequence = block.sequence,
            hash = %block.hash.short_hex(),
            "vote accepted"
        );
        Ok(block)
    }

    fn load_poll(&self, poll: PollId) -> ServiceResult<Poll> {
        self.polls
            .find_by_id(poll)?
            .ok_or_else(|| ServiceError::not_found("poll", poll))
    }

    fn ensure_open(&self, poll: &Poll) -> ServiceResult<()> {
        if poll.is_open_at(self.clock.now()) {
            Ok(())
        } else {
            Err(ServiceError::InvalidState(Rejection::VoteNotOpen))
        }
    }

    fn ensure_no_vote(&self, user: UserId, poll: PollId) -> ServiceResult<()> {
        match self.ledger.vote_of(user, poll)? {
            Some(_) => Err(ServiceError::InvalidState(Rejection::AlreadyVoted)),
            None => Ok(()),
        }
    }

    /// Increment the chosen option and save, retrying the same value. Runs
    /// after the block is committed, so it never fails the cast.
    fn save_tally(&self, poll: &mut Poll, option: OptionId, block: &Block) {
        if let Some(chosen) = poll.option_mut(option) {
            chosen.increment();
        }

        let attempts = self.config.tally_retry_limit.saturating_add(1);
        for attempt in 1..=attempts {
            match self.polls.save(poll) {
                Ok(_) => return,
                Err(e) => warn!(
                    poll = %poll.id,
                    attempt,
                    error = %e,
                    "tally save failed"
                ),
            }
        }

        error!(
            poll = %poll.id,
            sequence = block.sequence,
            attempts,
            "tally diverged from ledger, queued for reconciliation"
        );
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(poll.id);
    }

    fn poll_lock(&self, poll: PollId) -> ServiceResult<Arc<Mutex<()>>> {
        let mut locks = self
            .poll_locks
            .lock()
            .map_err(|_| poisoned("poll lock table"))?;
        Ok(locks.entry(poll).or_default().clone())
    }

    /// Read `poll` and its blocks with no cast for that poll in flight.
    pub fn snapshot(&self, poll: PollId) -> ServiceResult<PollSnapshot> {
        let lock = self.poll_lock(poll)?;
        let _guard = lock.lock().map_err(|_| poisoned("poll lock"))?;
        Ok(PollSnapshot {
            poll: self.load_poll(poll)?,
            blocks: self.ledger.blocks_for_poll(poll)?,
        })
    }

    /// Hold off casts, closes and reconciliations until the guard drops.
    ///
    /// Operations already past the gate finish first, so while the guard is
    /// held every committed block has its tally increment saved.
    pub fn quiesce(&self) -> ServiceResult<RwLockWriteGuard<'_, ()>> {
        self.gate.write().map_err(|_| poisoned("write gate"))
    }

    /// Queue every poll whose cached counts disagree with the ledger.
    pub fn audit_tallies(&self) -> ServiceResult<Vec<PollId>> {
        let mut diverged = Vec::new();
        for poll in self.polls.list()? {
            if !self.snapshot(poll.id)?.tallies_match() {
                diverged.push(poll.id);
            }
        }
        if !diverged.is_empty() {
            warn!(polls = diverged.len(), "cached tallies disagree with the ledger");
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(diverged.iter().copied());
        }
        Ok(diverged)
    }

    /// Deactivate `poll`. Later casts are rejected as not open.
    ///
    /// Goes through the poll lock so an in-flight cast cannot save a stale
    /// copy over the flag, nor this save drop its tally increment.
    pub fn close_poll(&self, poll: PollId) -> ServiceResult<Poll> {
        let _writing = self.gate.read().map_err(|_| poisoned("write gate"))?;
        let lock = self.poll_lock(poll)?;
        let _guard = lock.lock().map_err(|_| poisoned("poll lock"))?;

        let mut current = self.load_poll(poll)?;
        if !current.active {
            return Ok(current);
        }
        current.active = false;
        let saved = self.polls.save(&current)?;
        info!(%poll, "poll closed");
        Ok(saved)
    }

    /// Rewrite `poll`'s cached counts from the ledger.
    ///
    /// Returns the counts that changed; an empty list means the cache was
    /// already correct.
    pub fn reconcile(&self, poll: PollId) -> ServiceResult<Vec<TallyCorrection>> {
        let _writing = self.gate.read().map_err(|_| poisoned("write gate"))?;
        let lock = self.poll_lock(poll)?;
        let _guard = lock.lock().map_err(|_| poisoned("poll lock"))?;

        let mut current = self.load_poll(poll)?;
        let actual = self.ledger.tally_for(poll)?;

        let mut corrections = Vec::new();
        for option in &mut current.options {
            let count = actual.get(&option.id).copied().unwrap_or(0);
            if option.vote_count != count {
                corrections.push(TallyCorrection {
                    option_id: option.id,
                    cached: option.vote_count,
                    actual: count,
                });
                option.vote_count = count;
            }
        }

        let orphaned: u64 = actual
            .iter()
            .filter(|(id, _)| current.option(**id).is_none())
            .map(|(_, n)| n)
            .sum();
        if orphaned > 0 {
            warn!(%poll, blocks = orphaned, "ledger holds votes for options the poll lacks");
        }

        if !corrections.is_empty() {
            self.polls.save(&current)?;
            warn!(%poll, corrected = corrections.len(), "tallies rebuilt from ledger");
        }

        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&poll);
        Ok(corrections)
    }

    /// Reconcile every poll queued after a failed tally save.
    ///
    /// A poll whose reconciliation fails stays queued and the error is
    /// returned.
    pub fn reconcile_pending(&self) -> ServiceResult<BTreeMap<PollId, Vec<TallyCorrection>>> {
        let mut done = BTreeMap::new();
        for poll in self.pending_reconciliation() {
            done.insert(poll, self.reconcile(poll)?);
        }
        Ok(done)
    }

    /// Polls whose cached tally may lag the ledger.
    pub fn pending_reconciliation(&self) -> Vec<PollId> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }
}

fn poisoned(what: &str) -> ServiceError {
    ServiceError::Unavailable(format!("{what} poisoned"))
}
