use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use vc_crypto::{BlockHasher, ChainVerifier};
use vc_store::{AppendOutcome, LedgerStore};
use vc_types::{Block, BlockHash, Clock, OptionId, PollId, Timestamp, UserId};

use crate::error::LedgerError;
use crate::validation::ChainReport;

/// Ledger tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Extra append attempts after a sequence conflict before giving up.
    pub max_append_retries: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_append_retries: 5,
        }
    }
}

/// Append-only, hash-linked vote ledger.
///
/// All appends in this process funnel through one mutex, so sequence
/// assignment and linkage are race-free locally. The store's conditional
/// append catches writers outside this process; those conflicts are retried
/// against a freshly read tail.
pub struct VoteLedger {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
    append_lock: Mutex<()>,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        Self {
            store,
            clock,
            config,
            append_lock: Mutex::new(()),
        }
    }

    /// Append a block recording `user`'s vote for `option` in `poll`.
    pub fn append(
        &self,
        user: UserId,
        poll: PollId,
        option: OptionId,
    ) -> Result<Block, LedgerError> {
        let _guard = self
            .append_lock
            .lock()
            .map_err(|_| LedgerError::Unavailable("append lock poisoned".into()))?;

        let attempts = self.config.max_append_retries.saturating_add(1);
        for attempt in 1..=attempts {
            let last = self.store.last_block()?;
            let block = self.next_block(last.as_ref(), user, poll, option)?;

            match self.store.append_if_sequence_matches(&block)? {
                AppendOutcome::Committed => {
                    debug!(
                        sequence = block.sequence,
                        hash = %block.hash.short_hex(),
                        %user,
                        %poll,
                        "block appended"
                    );
                    return Ok(block);
                }
                AppendOutcome::Conflict { next_sequence } => {
                    warn!(
                        attempt,
                        attempted = block.sequence,
                        next_sequence,
                        "append conflict, re-reading tail"
                    );
                }
            }
        }

        Err(LedgerError::Conflict { attempts })
    }

    fn next_block(
        &self,
        last: Option<&Block>,
        user: UserId,
        poll: PollId,
        option: OptionId,
    ) -> Result<Block, LedgerError> {
        let (sequence, previous_hash) = ChainVerifier::next_link(last).map_err(|cause| {
            error!(%cause, "cannot extend ledger tail");
            LedgerError::Corruption {
                index: cause.index(),
                cause,
            }
        })?;
        let mut block = Block {
            sequence,
            previous_hash,
            hash: BlockHash::zero(),
            user_id: user,
            poll_id: poll,
            option_id: option,
            timestamp: next_timestamp(last, self.clock.now()),
        };
        block.hash = BlockHasher::BLOCK.digest(&block);
        Ok(block)
    }

    /// Every block cast by `user`, in any order.
    pub fn records_for_user(&self, user: UserId) -> Result<Vec<Block>, LedgerError> {
        Ok(self.store.blocks_for_user(user)?)
    }

    /// The block recording `user`'s vote in `poll`, if one exists.
    pub fn vote_of(&self, user: UserId, poll: PollId) -> Result<Option<Block>, LedgerError> {
        Ok(self.store.find_vote(user, poll)?)
    }

    /// Every block in storage order.
    pub fn blocks(&self) -> Result<Vec<Block>, LedgerError> {
        Ok(self.store.all_blocks()?)
    }

    /// Blocks for `poll`, ascending by sequence.
    pub fn blocks_for_poll(&self, poll: PollId) -> Result<Vec<Block>, LedgerError> {
        let mut blocks: Vec<Block> = self
            .store
            .all_blocks()?
            .into_iter()
            .filter(|b| b.poll_id == poll)
            .collect();
        blocks.sort_by_key(|b| b.sequence);
        Ok(blocks)
    }

    pub fn len(&self) -> Result<u64, LedgerError> {
        Ok(self.store.block_count()?)
    }

    pub fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.len()? == 0)
    }

    /// Per-option vote counts for `poll`, recomputed from the chain.
    pub fn tally_for(&self, poll: PollId) -> Result<BTreeMap<OptionId, u64>, LedgerError> {
        let mut counts = BTreeMap::new();
        for block in self.store.all_blocks()? {
            if block.poll_id == poll {
                *counts.entry(block.option_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    /// Returns `true` iff the chain is empty or fully intact.
    pub fn verify_chain(&self) -> Result<bool, LedgerError> {
        Ok(self.verify_report()?.valid)
    }

    /// Verify the whole chain and describe the first violation, if any.
    pub fn verify_report(&self) -> Result<ChainReport, LedgerError> {
        let blocks = self.store.all_blocks()?;
        let report = ChainReport::from_blocks(&blocks);
        if let Some(violation) = &report.violation {
            error!(%violation, "ledger integrity check failed");
        }
        Ok(report)
    }

    /// Like [`verify_report`](Self::verify_report), but a broken chain is an
    /// error.
    pub fn ensure_intact(&self) -> Result<ChainReport, LedgerError> {
        let report = self.verify_report()?;
        match report.violation {
            Some(cause) => Err(LedgerError::Corruption {
                index: cause.index(),
                cause,
            }),
            None => Ok(report),
        }
    }
}

/// Block timestamps never go backwards, even if the wall clock does.
fn next_timestamp(last: Option<&Block>, now: Timestamp) -> Timestamp {
    match last {
        Some(previous) if previous.timestamp > now => previous.timestamp,
        _ => now,
    }
}
