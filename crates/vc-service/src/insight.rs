//! Text-generation collaborator for description enhancement and poll
//! insights.
//!
//! Providers are opaque and may fail for any reason. Callers treat every
//! failure as "feature unavailable"; nothing here can touch poll or ledger
//! state.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use vc_store::PollStore;
use vc_types::PollId;

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InsightError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait InsightProvider: Send + Sync {
    /// Rewrite a poll description.
    async fn enhance(&self, title: &str, description: &str) -> Result<String, InsightError>;

    /// Describe the current standing of a poll.
    async fn summarize(&self, poll: PollId) -> Result<String, InsightError>;
}

/// Provider used when insights are switched off.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledInsights;

#[async_trait]
impl InsightProvider for DisabledInsights {
    async fn enhance(&self, _title: &str, _description: &str) -> Result<String, InsightError> {
        Err(InsightError::Unavailable("insights are disabled".into()))
    }

    async fn summarize(&self, _poll: PollId) -> Result<String, InsightError> {
        Err(InsightError::Unavailable("insights are disabled".into()))
    }
}

/// Local provider that summarizes standings from the cached tallies.
/// It has no text model, so enhancement is always unavailable.
pub struct TallyInsights {
    polls: Arc<dyn PollStore>,
}

impl TallyInsights {
    pub fn new(polls: Arc<dyn PollStore>) -> Self {
        Self { polls }
    }
}

#[async_trait]
impl InsightProvider for TallyInsights {
    async fn enhance(&self, _title: &str, _description: &str) -> Result<String, InsightError> {
        Err(InsightError::Unavailable(
            "no enhancement backend configured".into(),
        ))
    }

    async fn summarize(&self, poll: PollId) -> Result<String, InsightError> {
        let poll = self
            .polls
            .find_by_id(poll)
            .map_err(|e| InsightError::Failed(e.to_string()))?
            .ok_or_else(|| InsightError::Failed(format!("{poll} disappeared")))?;

        let total = poll.total_votes();
        if total == 0 {
            return Ok(format!("\"{}\" has no votes yet.", poll.title));
        }

        let mut ranked: Vec<_> = poll.options.iter().collect();
        ranked.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));
        let leader = ranked[0];
        let tied = ranked
            .iter()
            .filter(|o| o.vote_count == leader.vote_count)
            .count();

        let headline = if tied > 1 {
            format!("{tied} options are tied with {} vote(s) each", leader.vote_count)
        } else {
            format!(
                "{} leads with {}% of {} vote(s)",
                leader.text,
                leader.vote_count * 100 / total,
                total
            )
        };
        let breakdown: Vec<String> = ranked
            .iter()
            .map(|o| format!("{}: {}", o.text, o.vote_count))
            .collect();

        Ok(format!("{headline}. {}.", breakdown.join(", ")))
    }
}

/// Insight retrieval workflow.
pub struct InsightService {
    polls: Arc<dyn PollStore>,
    provider: Arc<dyn InsightProvider>,
}

impl InsightService {
    pub fn new(polls: Arc<dyn PollStore>, provider: Arc<dyn InsightProvider>) -> Self {
        Self { polls, provider }
    }

    /// Insight text for an existing poll.
    pub async fn insights_for(&self, poll: PollId) -> ServiceResult<String> {
        if self.polls.find_by_id(poll)?.is_none() {
            return Err(ServiceError::not_found("poll", poll));
        }

        self.provider.summarize(poll).await.map_err(|e| {
            warn!(%poll, error = %e, "insight provider failed");
            ServiceError::InsightUnavailable(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration};
    use vc_store::InMemoryPollStore;
    use vc_types::{PollDraft, UserId};

    use super::*;

    fn store_with_poll() -> (Arc<InMemoryPollStore>, PollId) {
        let store = Arc::new(InMemoryPollStore::new());
        let start = DateTime::from_timestamp_micros(0).unwrap();
        let poll = store
            .create(PollDraft {
                title: "Editor".into(),
                description: "Which one".into(),
                enhanced_description: None,
                creator_id: UserId::new(1),
                start_time: start,
                end_time: start + Duration::days(1),
                option_texts: vec!["Vim".into(), "Emacs".into(), "Nano".into()],
            })
            .unwrap();
        (store, poll.id)
    }

    fn vote(store: &InMemoryPollStore, poll: PollId, option_index: usize, times: u64) {
        let mut p = store.find_by_id(poll).unwrap().unwrap();
        for _ in 0..times {
            p.options[option_index].increment();
        }
        store.save(&p).unwrap();
    }

    #[tokio::test]
    async fn summary_names_the_leader() {
        let (store, poll) = store_with_poll();
        vote(&store, poll, 0, 13);
        vote(&store, poll, 1, 5);
        vote(&store, poll, 2, 2);

        let text = TallyInsights::new(store).summarize(poll).await.unwrap();
        assert!(text.starts_with("Vim leads with 65% of 20 vote(s)"));
        assert!(text.contains("Emacs: 5"));
    }

    #[tokio::test]
    async fn summary_reports_ties_and_empty_polls() {
        let (store, poll) = store_with_poll();
        let provider = TallyInsights::new(store.clone());
        assert!(provider.summarize(poll).await.unwrap().contains("no votes yet"));

        vote(&store, poll, 0, 2);
        vote(&store, poll, 2, 2);
        assert!(provider
            .summarize(poll)
            .await
            .unwrap()
            .starts_with("2 options are tied"));
    }

    #[tokio::test]
    async fn service_requires_existing_poll() {
        let (store, _) = store_with_poll();
        let service = InsightService::new(store.clone(), Arc::new(TallyInsights::new(store)));
        let err = service.insights_for(PollId::new(999)).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { entity: "poll", .. }));
    }

    #[tokio::test]
    async fn provider_failure_is_insight_unavailable() {
        let (store, poll) = store_with_poll();
        let service = InsightService::new(store, Arc::new(DisabledInsights));
        let err = service.insights_for(poll).await.unwrap_err();
        assert!(matches!(err, ServiceError::InsightUnavailable(_)));
        assert!(err.is_client_error());
    }
}
