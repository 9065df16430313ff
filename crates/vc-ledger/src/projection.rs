use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use vc_store::{PollStore, UserStore};
use vc_types::{PollId, Timestamp, UserId};

use crate::error::LedgerError;
use crate::ledger::VoteLedger;

/// One row of a poll's vote history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VoteHistoryEntry {
    pub sequence: u64,
    pub user_id: UserId,
    pub user_display_name: String,
    pub option_text: String,
    pub timestamp: Timestamp,
}

/// Builds human-readable vote history by joining ledger blocks with user
/// and option display data.
pub struct HistoryProjector {
    ledger: Arc<VoteLedger>,
    users: Arc<dyn UserStore>,
    polls: Arc<dyn PollStore>,
}

impl HistoryProjector {
    pub fn new(
        ledger: Arc<VoteLedger>,
        users: Arc<dyn UserStore>,
        polls: Arc<dyn PollStore>,
    ) -> Self {
        Self {
            ledger,
            users,
            polls,
        }
    }

    /// Vote history of `poll`, oldest first.
    ///
    /// A poll without votes (or an id nobody voted in) yields an empty list.
    /// Blocks whose user or option can no longer be resolved are kept with a
    /// placeholder label.
    pub fn history_for(&self, poll: PollId) -> Result<Vec<VoteHistoryEntry>, LedgerError> {
        let blocks = self.ledger.blocks_for_poll(poll)?;
        if blocks.is_empty() {
            return Ok(vec![]);
        }

        let option_text: HashMap<_, _> = self
            .polls
            .find_by_id(poll)?
            .map(|p| p.options.into_iter().map(|o| (o.id, o.text)).collect())
            .unwrap_or_default();

        let mut names: HashMap<UserId, String> = HashMap::new();
        let mut entries = Vec::with_capacity(blocks.len());
        for block in blocks {
            let user_display_name = match names.get(&block.user_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self
                        .users
                        .find_by_id(block.user_id)?
                        .map(|u| u.display_name)
                        .unwrap_or_else(|| format!("unknown user {}", block.user_id));
                    names.insert(block.user_id, name.clone());
                    name
                }
            };

            entries.push(VoteHistoryEntry {
                sequence: block.sequence,
                user_id: block.user_id,
                user_display_name,
                option_text: option_text
                    .get(&block.option_id)
                    .cloned()
                    .unwrap_or_else(|| format!("unknown option {}", block.option_id)),
                timestamp: block.timestamp,
            });
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration};
    use vc_store::{InMemoryLedgerStore, InMemoryPollStore, InMemoryUserStore};
    use vc_types::{Clock, ManualClock, OptionId, PollDraft};

    use super::*;
    use crate::ledger::LedgerConfig;

    struct Fixture {
        ledger: Arc<VoteLedger>,
        users: Arc<InMemoryUserStore>,
        polls: Arc<InMemoryPollStore>,
        clock: Arc<ManualClock>,
    }

    impl Fixture {
        fn new() -> Self {
            let clock = Arc::new(ManualClock::new(
                DateTime::from_timestamp_micros(1_700_000_000_000_000).unwrap(),
            ));
            Self {
                ledger: Arc::new(VoteLedger::new(
                    Arc::new(InMemoryLedgerStore::new()),
                    clock.clone(),
                    LedgerConfig::default(),
                )),
                users: Arc::new(InMemoryUserStore::new()),
                polls: Arc::new(InMemoryPollStore::new()),
                clock,
            }
        }

        fn projector(&self) -> HistoryProjector {
            HistoryProjector::new(self.ledger.clone(), self.users.clone(), self.polls.clone())
        }

        fn poll(&self, options: &[&str]) -> vc_types::Poll {
            let now = self.clock.now();
            self.polls
                .create(PollDraft {
                    title: "History".into(),
                    description: String::new(),
                    enhanced_description: None,
                    creator_id: UserId::new(1),
                    start_time: now,
                    end_time: now + Duration::hours(1),
                    option_texts: options.iter().map(|s| s.to_string()).collect(),
                })
                .unwrap()
        }
    }

    #[test]
    fn history_follows_submission_order() {
        let fx = Fixture::new();
        let u1 = fx.users.register("User One").unwrap();
        let u2 = fx.users.register("User Two").unwrap();
        let u3 = fx.users.register("User Three").unwrap();
        let poll = fx.poll(&["A", "B"]);
        let (a, b) = (poll.options[0].id, poll.options[1].id);

        for (user, option) in [(u3.id, b), (u1.id, a), (u2.id, a)] {
            fx.clock.advance(Duration::seconds(1));
            fx.ledger.append(user, poll.id, option).unwrap();
        }

        let history = fx.projector().history_for(poll.id).unwrap();
        let rows: Vec<_> = history
            .iter()
            .map(|e| (e.user_display_name.as_str(), e.option_text.as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![("User Three", "B"), ("User One", "A"), ("User Two", "A")]
        );
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(history.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[test]
    fn history_ignores_other_polls() {
        let fx = Fixture::new();
        let u = fx.users.register("Solo").unwrap();
        let p1 = fx.poll(&["X"]);
        let p2 = fx.poll(&["Y"]);
        fx.ledger.append(u.id, p1.id, p1.options[0].id).unwrap();
        fx.ledger.append(u.id, p2.id, p2.options[0].id).unwrap();

        let history = fx.projector().history_for(p2.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].option_text, "Y");
        assert_eq!(history[0].sequence, 1);
    }

    #[test]
    fn empty_history_is_not_an_error() {
        let fx = Fixture::new();
        let poll = fx.poll(&["A"]);
        assert!(fx.projector().history_for(poll.id).unwrap().is_empty());
        assert!(fx
            .projector()
            .history_for(PollId::new(404))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn unresolvable_references_get_placeholders() {
        let fx = Fixture::new();
        fx.ledger
            .append(UserId::new(77), PollId::new(5), OptionId::new(9))
            .unwrap();

        let history = fx.projector().history_for(PollId::new(5)).unwrap();
        assert_eq!(history[0].user_display_name, "unknown user u77");
        assert_eq!(history[0].option_text, "unknown option o9");
    }
}
