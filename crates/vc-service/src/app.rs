use std::sync::Arc;

use tracing::{info, warn};
use vc_ledger::{HistoryProjector, VoteLedger};
use vc_store::{
    InMemoryLedgerStore, InMemoryPollStore, InMemoryUserStore, StateLock, StoreSnapshot,
    UserStore,
};
use vc_types::{Clock, SystemClock, User};

use crate::config::VotechainConfig;
use crate::coordinator::CastVoteCoordinator;
use crate::error::ServiceResult;
use crate::insight::{DisabledInsights, InsightProvider, InsightService, TallyInsights};
use crate::lifecycle::PollLifecycle;

/// Fully wired Votechain instance over the in-memory stores.
///
/// State can be loaded from and written back to the snapshot file named in
/// `[storage] state_path`. An opened instance owns that file exclusively
/// until it is dropped.
pub struct Votechain {
    config: VotechainConfig,
    users: Arc<InMemoryUserStore>,
    polls: Arc<InMemoryPollStore>,
    blocks: Arc<InMemoryLedgerStore>,
    ledger: Arc<VoteLedger>,
    coordinator: CastVoteCoordinator,
    lifecycle: PollLifecycle,
    history: HistoryProjector,
    insights: InsightService,
    state_lock: Option<StateLock>,
}

impl Votechain {
    /// Empty instance driven by `clock`. Nothing is read from disk.
    pub fn in_memory(config: VotechainConfig, clock: Arc<dyn Clock>) -> Self {
        Self::assemble(config, clock, StoreSnapshot::default(), None)
    }

    /// Lock and load the state file (if any) and use the system clock.
    ///
    /// Fails with [`ServiceError::Unavailable`](crate::ServiceError::Unavailable)
    /// while another instance holds the same file. Polls whose cached tallies
    /// disagree with an intact loaded ledger are reconciled before returning.
    /// A ledger that fails verification is left exactly as loaded.
    pub fn open(config: VotechainConfig) -> ServiceResult<Self> {
        let lock = StateLock::acquire(&config.storage.state_path)?;
        let snapshot = StoreSnapshot::load(&config.storage.state_path)?;
        info!(
            path = %config.storage.state_path.display(),
            users = snapshot.users.len(),
            polls = snapshot.polls.len(),
            blocks = snapshot.blocks.len(),
            "state loaded"
        );
        let app = Self::assemble(config, Arc::new(SystemClock), snapshot, Some(lock));

        if !app.ledger.verify_chain()? {
            warn!("ledger failed verification, stored tallies left untouched");
        } else if !app.coordinator.audit_tallies()?.is_empty() {
            let fixed = app.coordinator.reconcile_pending()?;
            warn!(polls = fixed.len(), "stale tallies in state file reconciled");
            app.persist()?;
        }
        Ok(app)
    }

    fn assemble(
        config: VotechainConfig,
        clock: Arc<dyn Clock>,
        snapshot: StoreSnapshot,
        state_lock: Option<StateLock>,
    ) -> Self {
        let (users, polls, blocks) = snapshot.into_stores();
        let (users, polls, blocks) = (Arc::new(users), Arc::new(polls), Arc::new(blocks));

        let ledger = Arc::new(VoteLedger::new(
            blocks.clone(),
            clock.clone(),
            config.ledger.clone(),
        ));
        let provider: Arc<dyn InsightProvider> = if config.insight.enabled {
            Arc::new(TallyInsights::new(polls.clone()))
        } else {
            Arc::new(DisabledInsights)
        };

        let coordinator = CastVoteCoordinator::new(
            users.clone(),
            polls.clone(),
            ledger.clone(),
            clock.clone(),
            config.coordinator.clone(),
        );
        let lifecycle = PollLifecycle::new(
            users.clone(),
            polls.clone(),
            provider.clone(),
            clock,
            config.insight.clone(),
        );
        let history = HistoryProjector::new(ledger.clone(), users.clone(), polls.clone());
        let insights = InsightService::new(polls.clone(), provider);

        Self {
            config,
            users,
            polls,
            blocks,
            ledger,
            coordinator,
            lifecycle,
            history,
            insights,
            state_lock,
        }
    }

    /// Write every store to the state file.
    ///
    /// Casts are held off while the stores are read, so the file never
    /// records a block without its tally increment.
    pub fn persist(&self) -> ServiceResult<()> {
        let snapshot = {
            let _quiet = self.coordinator.quiesce()?;
            StoreSnapshot::capture(&self.users, &self.polls, &self.blocks)?
        };
        snapshot.save(&self.config.storage.state_path)?;
        Ok(())
    }

    /// Whether this instance holds the state file lock.
    pub fn owns_state_file(&self) -> bool {
        self.state_lock.is_some()
    }

    pub fn config(&self) -> &VotechainConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &CastVoteCoordinator {
        &self.coordinator
    }

    pub fn lifecycle(&self) -> &PollLifecycle {
        &self.lifecycle
    }

    pub fn history(&self) -> &HistoryProjector {
        &self.history
    }

    pub fn insights(&self) -> &InsightService {
        &self.insights
    }

    pub fn ledger(&self) -> &VoteLedger {
        &self.ledger
    }

    pub fn register_user(&self, display_name: &str) -> ServiceResult<User> {
        let user = self.users.register(display_name)?;
        info!(user = %user.id, "user registered");
        Ok(user)
    }

    pub fn users(&self) -> ServiceResult<Vec<User>> {
        Ok(self.users.list()?)
    }
}
