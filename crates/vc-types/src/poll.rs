use serde::{Deserialize, Serialize};

use crate::ids::{OptionId, PollId, UserId};
use crate::temporal::Timestamp;

/// One selectable answer of a poll, with its running tally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: OptionId,
    pub text: String,
    pub vote_count: u64,
}

impl PollOption {
    pub fn new(id: OptionId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            vote_count: 0,
        }
    }

    /// Record one accepted cast.
    pub fn increment(&mut self) {
        self.vote_count = self.vote_count.saturating_add(1);
    }
}

/// A timed poll.
///
/// The option list is fixed when the poll is created; only the per-option
/// `vote_count` values change afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_description: Option<String>,
    pub creator_id: UserId,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub active: bool,
    pub options: Vec<PollOption>,
}

impl Poll {
    /// Returns `true` if the poll accepts casts at `now`. Both window bounds
    /// are inclusive.
    pub fn is_open_at(&self, now: Timestamp) -> bool {
        self.active && self.start_time <= now && now <= self.end_time
    }

    pub fn option(&self, id: OptionId) -> Option<&PollOption> {
        self.options.iter().find(|o| o.id == id)
    }

    pub fn option_mut(&mut self, id: OptionId) -> Option<&mut PollOption> {
        self.options.iter_mut().find(|o| o.id == id)
    }

    /// Sum of all option tallies.
    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|o| o.vote_count).sum()
    }
}

/// Everything needed to create a poll; the store assigns the ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollDraft {
    pub title: String,
    pub description: String,
    pub enhanced_description: Option<String>,
    pub creator_id: UserId,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub option_texts: Vec<String>,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::temporal::from_micros;

    fn poll(active: bool) -> Poll {
        let start = from_micros(1_000_000_000).unwrap();
        Poll {
            id: PollId::new(1),
            title: "Lunch".into(),
            description: "Where to eat".into(),
            enhanced_description: None,
            creator_id: UserId::new(1),
            start_time: start,
            end_time: start + Duration::hours(2),
            active,
            options: vec![
                PollOption::new(OptionId::new(10), "Pizza"),
                PollOption::new(OptionId::new(11), "Sushi"),
            ],
        }
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let p = poll(true);
        assert!(p.is_open_at(p.start_time));
        assert!(p.is_open_at(p.end_time));
        assert!(!p.is_open_at(p.start_time - Duration::microseconds(1)));
        assert!(!p.is_open_at(p.end_time + Duration::microseconds(1)));
    }

    #[test]
    fn inactive_poll_is_never_open() {
        let p = poll(false);
        assert!(!p.is_open_at(p.start_time + Duration::minutes(1)));
    }

    #[test]
    fn increment_counts_by_one() {
        let mut p = poll(true);
        assert_eq!(p.option(OptionId::new(10)).unwrap().vote_count, 0);
        p.option_mut(OptionId::new(10)).unwrap().increment();
        p.option_mut(OptionId::new(10)).unwrap().increment();
        assert_eq!(p.option(OptionId::new(10)).unwrap().vote_count, 2);
        assert_eq!(p.total_votes(), 2);
    }

    #[test]
    fn foreign_option_is_not_found() {
        let p = poll(true);
        assert!(p.option(OptionId::new(99)).is_none());
    }
}
