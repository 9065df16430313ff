//! Single-file JSON persistence for the in-memory stores.
//!
//! The whole state (users, polls, blocks) is written to a temporary file in
//! the target directory and atomically renamed over the previous snapshot,
//! so a crash mid-save leaves the old file intact.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vc_types::{Block, Poll, User};

use crate::error::{StoreError, StoreResult};
use crate::memory::{InMemoryLedgerStore, InMemoryPollStore, InMemoryUserStore};
use crate::traits::{PollStore, UserStore};

const SNAPSHOT_FORMAT: u32 = 1;

/// Serializable image of every store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub format: u32,
    pub users: Vec<User>,
    pub polls: Vec<Poll>,
    pub blocks: Vec<Block>,
}

impl StoreSnapshot {
    /// Capture the current contents of the in-memory stores.
    pub fn capture(
        users: &InMemoryUserStore,
        polls: &InMemoryPollStore,
        ledger: &InMemoryLedgerStore,
    ) -> StoreResult<Self> {
        Ok(Self {
            format: SNAPSHOT_FORMAT,
            users: users.list()?,
            polls: polls.list()?,
            blocks: ledger.blocks()?,
        })
    }

    /// Rebuild in-memory stores from this snapshot.
    pub fn into_stores(self) -> (InMemoryUserStore, InMemoryPollStore, InMemoryLedgerStore) {
        (
            InMemoryUserStore::from_users(self.users),
            InMemoryPollStore::from_polls(self.polls),
            InMemoryLedgerStore::from_blocks(self.blocks),
        )
    }

    /// Read a snapshot. A missing file yields an empty snapshot.
    pub fn load(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no snapshot file, starting empty");
            return Ok(Self {
                format: SNAPSHOT_FORMAT,
                ..Self::default()
            });
        }

        let data = fs::read(path)?;
        let snapshot: Self =
            serde_json::from_slice(&data).map_err(|e| StoreError::Serialization(e.to_string()))?;
        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(StoreError::Serialization(format!(
                "unsupported snapshot format {}",
                snapshot.format
            )));
        }

        info!(
            path = %path.display(),
            users = snapshot.users.len(),
            polls = snapshot.polls.len(),
            blocks = snapshot.blocks.len(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Atomically write this snapshot to `path`.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, self)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;

        debug!(path = %path.display(), blocks = self.blocks.len(), "snapshot saved");
        Ok(())
    }
}
