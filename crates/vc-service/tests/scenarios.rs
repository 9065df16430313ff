use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Duration};
use vc_service::{
    CreatePollRequest, Poll, Rejection, ServiceError, UserId, Votechain, VotechainConfig,
};
use vc_types::{Clock, ManualClock};

struct Harness {
    app: Votechain,
    clock: Arc<ManualClock>,
    admin: UserId,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(VotechainConfig::default())
    }

    fn with_config(config: VotechainConfig) -> Self {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp_micros(1_700_000_000_000_000).unwrap(),
        ));
        let app = Votechain::in_memory(config, clock.clone());
        let admin = app.register_user("Admin").unwrap().id;
        Self { app, clock, admin }
    }

    fn user(&self, name: &str) -> UserId {
        self.app.register_user(name).unwrap().id
    }

    /// Poll open from `start` to `start + length`, relative to the clock.
    async fn poll_at(&self, options: &[&str], start: Duration, length: Duration) -> Poll {
        let start_time = self.clock.now() + start;
        self.app
            .lifecycle()
            .create_poll(CreatePollRequest {
                creator_id: self.admin,
                title: "Scenario".into(),
                description: String::new(),
                options: options.iter().map(|s| s.to_string()).collect(),
                start_time,
                end_time: start_time + length,
                enhance_description: false,
            })
            .await
            .unwrap()
    }

    /// Poll open for the hour either side of now.
    async fn open_poll(&self, options: &[&str]) -> Poll {
        self.poll_at(options, Duration::hours(-1), Duration::hours(2))
            .await
    }

    fn assert_untouched(&self, poll: &Poll) {
        let snap = self.app.coordinator().snapshot(poll.id).unwrap();
        assert!(snap.blocks.is_empty());
        assert_eq!(snap.poll.total_votes(), 0);
    }
}

#[tokio::test]
async fn two_voters_one_duplicate() {
    let h = Harness::new();
    let u1 = h.user("U1");
    let u2 = h.user("U2");
    let p1 = h.open_poll(&["A", "B"]).await;
    let (a, b) = (p1.options[0].id, p1.options[1].id);
    let coordinator = h.app.coordinator();

    let first = coordinator.cast(u1, p1.id, a).unwrap();
    assert_eq!(first.sequence, 0);
    assert_eq!(h.app.lifecycle().get_poll(p1.id).unwrap().options[0].vote_count, 1);

    let err = coordinator.cast(u1, p1.id, b).unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(Rejection::AlreadyVoted)));
    assert!(err.is_client_error());
    assert_eq!(h.app.ledger().len().unwrap(), 1);
    let tallies: Vec<u64> = h
        .app
        .lifecycle()
        .get_poll(p1.id)
        .unwrap()
        .options
        .iter()
        .map(|o| o.vote_count)
        .collect();
    assert_eq!(tallies, vec![1, 0]);

    h.clock.advance(Duration::seconds(5));
    let second = coordinator.cast(u2, p1.id, a).unwrap();
    assert_eq!(second.sequence, 1);
    assert_eq!(second.previous_hash, first.hash);
    assert_eq!(h.app.lifecycle().get_poll(p1.id).unwrap().options[0].vote_count, 2);
    assert!(h.app.ledger().verify_chain().unwrap());
}

#[tokio::test]
async fn casts_outside_the_window_leave_no_trace() {
    let h = Harness::new();
    let voter = h.user("Early Bird");

    let upcoming = h
        .poll_at(&["Yes", "No"], Duration::hours(1), Duration::hours(1))
        .await;
    let err = h
        .app
        .coordinator()
        .cast(voter, upcoming.id, upcoming.options[0].id)
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(Rejection::VoteNotOpen)));
    h.assert_untouched(&upcoming);

    let closed = h.open_poll(&["Yes", "No"]).await;
    h.app.coordinator().close_poll(closed.id).unwrap();
    let err = h
        .app
        .coordinator()
        .cast(voter, closed.id, closed.options[0].id)
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(Rejection::VoteNotOpen)));
    h.assert_untouched(&closed);

    let ended = h.open_poll(&["Yes", "No"]).await;
    h.clock.advance(Duration::hours(1) + Duration::microseconds(1));
    let err = h
        .app
        .coordinator()
        .cast(voter, ended.id, ended.options[0].id)
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(Rejection::VoteNotOpen)));
    h.assert_untouched(&ended);

    assert!(h.app.ledger().is_empty().unwrap());
}

#[tokio::test]
async fn window_bounds_are_inclusive() {
    let h = Harness::new();
    let early = h.user("Early");
    let late = h.user("Late");
    let poll = h
        .poll_at(&["X"], Duration::zero(), Duration::minutes(10))
        .await;

    h.app
        .coordinator()
        .cast(early, poll.id, poll.options[0].id)
        .unwrap();
    h.clock.advance(Duration::minutes(10));
    h.app
        .coordinator()
        .cast(late, poll.id, poll.options[0].id)
        .unwrap();
    assert_eq!(h.app.ledger().len().unwrap(), 2);
}

#[tokio::test]
async fn concurrent_duplicate_casts_accept_exactly_one() {
    let h = Harness::new();
    let voter = h.user("Eager");
    let poll = h.open_poll(&["A", "B", "C", "D"]).await;

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let option = poll.options[i % poll.options.len()].id;
                let app = &h.app;
                let poll_id = poll.id;
                s.spawn(move || app.coordinator().cast(voter, poll_id, option))
            })
            .collect();
        handles.into_iter().map(|t| t.join().unwrap()).collect()
    });

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 1);
    assert!(results.iter().all(|r| matches!(
        r,
        Ok(_) | Err(ServiceError::InvalidState(Rejection::AlreadyVoted))
    )));

    let snap = h.app.coordinator().snapshot(poll.id).unwrap();
    assert_eq!(snap.blocks.len(), 1);
    assert_eq!(snap.poll.total_votes(), 1);
}

#[tokio::test]
async fn concurrent_voters_keep_tallies_and_chain_in_step() {
    let h = Harness::new();
    let polls = [
        h.open_poll(&["A", "B"]).await,
        h.open_poll(&["C", "D", "E"]).await,
        h.open_poll(&["F"]).await,
    ];
    let voters: Vec<UserId> = (0..12).map(|i| h.user(&format!("voter-{i}"))).collect();

    thread::scope(|s| {
        for (i, voter) in voters.iter().copied().enumerate() {
            let app = &h.app;
            let polls = &polls;
            s.spawn(move || {
                for poll in polls {
                    let option = poll.options[i % poll.options.len()].id;
                    app.coordinator().cast(voter, poll.id, option).unwrap();
                }
            });
        }
    });

    let blocks = h.app.ledger().blocks().unwrap();
    assert_eq!(blocks.len(), voters.len() * polls.len());
    assert!(blocks
        .iter()
        .enumerate()
        .all(|(i, b)| b.sequence == i as u64));
    assert!(h.app.ledger().verify_chain().unwrap());

    for poll in &polls {
        let snap = h.app.coordinator().snapshot(poll.id).unwrap();
        assert!(snap.tallies_match());
        assert_eq!(snap.poll.total_votes(), voters.len() as u64);
    }
}

#[test]
fn empty_ledger_verifies() {
    let h = Harness::new();
    let report = h.app.ledger().verify_report().unwrap();
    assert!(report.valid);
    assert_eq!(report.blocks_scanned, 0);
    assert_eq!(report.first_broken, None);
    assert!(h.app.ledger().verify_chain().unwrap());
}

#[tokio::test]
async fn history_keeps_submission_order() {
    let h = Harness::new();
    let u1 = h.user("User One");
    let u2 = h.user("User Two");
    let u3 = h.user("User Three");
    let poll = h.open_poll(&["Red", "Blue"]).await;
    let (red, blue) = (poll.options[0].id, poll.options[1].id);

    for (voter, option) in [(u3, blue), (u1, red), (u2, red)] {
        h.clock.advance(Duration::seconds(1));
        h.app.coordinator().cast(voter, poll.id, option).unwrap();
    }

    let rows: Vec<(String, String)> = h
        .app
        .history()
        .history_for(poll.id)
        .unwrap()
        .into_iter()
        .map(|e| (e.user_display_name, e.option_text))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("User Three".to_string(), "Blue".to_string()),
            ("User One".to_string(), "Red".to_string()),
            ("User Two".to_string(), "Red".to_string()),
        ]
    );
}

#[tokio::test]
async fn tampering_with_the_state_file_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = VotechainConfig::default();
    config.storage.state_path = dir.path().join("state.json");

    let h = Harness::with_config(config.clone());
    let poll = h.open_poll(&["A", "B"]).await;
    for name in ["one", "two", "three"] {
        let voter = h.user(name);
        h.app
            .coordinator()
            .cast(voter, poll.id, poll.options[0].id)
            .unwrap();
    }
    h.app.persist().unwrap();

    let text = std::fs::read_to_string(&config.storage.state_path).unwrap();
    let mut state: serde_json::Value = serde_json::from_str(&text).unwrap();
    state["blocks"][1]["option_id"] = serde_json::json!(poll.options[1].id.get());
    std::fs::write(&config.storage.state_path, state.to_string()).unwrap();

    let reopened = Votechain::open(config).unwrap();
    let report = reopened.ledger().verify_report().unwrap();
    assert!(!report.valid);
    assert_eq!(report.first_broken, Some(1));
    assert!(matches!(
        reopened.ledger().ensure_intact(),
        Err(vc_ledger::LedgerError::Corruption { index: 1, .. })
    ));
    // A tampered ledger is not trusted to rewrite the cached counts.
    let stored = reopened.lifecycle().get_poll(poll.id).unwrap();
    assert_eq!(stored.options[0].vote_count, 3);
    assert!(reopened.coordinator().pending_reconciliation().is_empty());
}

#[tokio::test]
async fn concurrent_opens_of_one_state_file_never_lose_a_vote() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = VotechainConfig::default();
    config.storage.state_path = dir.path().join("state.json");

    let h = Harness::with_config(config.clone());
    // Opened instances run on the system clock.
    let poll = h
        .poll_at(&["A", "B"], Duration::minutes(-5), Duration::days(365 * 100))
        .await;
    let (first_voter, second_voter) = (h.user("first"), h.user("second"));
    h.app.persist().unwrap();

    let first = Votechain::open(config.clone()).unwrap();
    let err = Votechain::open(config.clone()).err().unwrap();
    assert!(matches!(err, ServiceError::Unavailable(_)));
    assert!(err.is_retryable());

    first
        .coordinator()
        .cast(first_voter, poll.id, poll.options[0].id)
        .unwrap();
    first.persist().unwrap();
    drop(first);

    let second = Votechain::open(config.clone()).unwrap();
    second
        .coordinator()
        .cast(second_voter, poll.id, poll.options[1].id)
        .unwrap();
    second.persist().unwrap();
    drop(second);

    let last = Votechain::open(config).unwrap();
    let snap = last.coordinator().snapshot(poll.id).unwrap();
    assert_eq!(snap.blocks.len(), 2);
    assert_eq!(snap.poll.total_votes(), 2);
    assert!(snap.tallies_match());
    assert!(last.ledger().verify_chain().unwrap());
}

#[tokio::test]
async fn stale_tallies_in_the_state_file_are_reconciled_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = VotechainConfig::default();
    config.storage.state_path = dir.path().join("state.json");

    let h = Harness::with_config(config.clone());
    let poll = h.open_poll(&["A", "B"]).await;
    let voter = h.user("voter");
    h.app
        .coordinator()
        .cast(voter, poll.id, poll.options[1].id)
        .unwrap();
    h.app.persist().unwrap();

    // A block saved without its tally increment.
    let text = std::fs::read_to_string(&config.storage.state_path).unwrap();
    let mut state: serde_json::Value = serde_json::from_str(&text).unwrap();
    let polls = state["polls"].as_array_mut().unwrap();
    for stored in polls.iter_mut() {
        for option in stored["options"].as_array_mut().unwrap() {
            option["vote_count"] = serde_json::json!(0);
        }
    }
    std::fs::write(&config.storage.state_path, state.to_string()).unwrap();

    let reopened = Votechain::open(config.clone()).unwrap();
    let snap = reopened.coordinator().snapshot(poll.id).unwrap();
    assert!(snap.tallies_match());
    assert_eq!(snap.poll.options[1].vote_count, 1);
    assert!(reopened.coordinator().pending_reconciliation().is_empty());
    drop(reopened);

    // The repair was written back.
    let text = std::fs::read_to_string(&config.storage.state_path).unwrap();
    let state: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(state["polls"][0]["options"][1]["vote_count"], 1);
}

#[tokio::test]
async fn insights_follow_the_tallies() {
    let h = Harness::new();
    let poll = h.open_poll(&["Cats", "Dogs"]).await;
    for name in ["a", "b", "c"] {
        let voter = h.user(name);
        h.app
            .coordinator()
            .cast(voter, poll.id, poll.options[1].id)
            .unwrap();
    }

    let text = h.app.insights().insights_for(poll.id).await.unwrap();
    assert!(text.starts_with("Dogs leads with 100% of 3 vote(s)"));
}
