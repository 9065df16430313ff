use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use vc_store::{PollStore, UserStore};
use vc_types::{Clock, Poll, PollDraft, PollId, Timestamp, UserId};

use crate::config::InsightConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::insight::{InsightError, InsightProvider};

/// Input for [`PollLifecycle::create_poll`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatePollRequest {
    pub creator_id: UserId,
    pub title: String,
    pub description: String,
    pub options: Vec<String>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub enhance_description: bool,
}

/// Poll creation and listing.
pub struct PollLifecycle {
    users: Arc<dyn UserStore>,
    polls: Arc<dyn PollStore>,
    insight: Arc<dyn InsightProvider>,
    clock: Arc<dyn Clock>,
    config: InsightConfig,
}

impl PollLifecycle {
    pub fn new(
        users: Arc<dyn UserStore>,
        polls: Arc<dyn PollStore>,
        insight: Arc<dyn InsightProvider>,
        clock: Arc<dyn Clock>,
        config: InsightConfig,
    ) -> Self {
        Self {
            users,
            polls,
            insight,
            clock,
            config,
        }
    }

    /// Validate and persist a new, active poll with zeroed tallies.
    ///
    /// Enhancement runs only when requested, enabled, and the description is
    /// non-empty. A failed or timed-out enhancement leaves
    /// `enhanced_description` empty and never aborts creation.
    pub async fn create_poll(&self, request: CreatePollRequest) -> ServiceResult<Poll> {
        if self.users.find_by_id(request.creator_id)?.is_none() {
            return Err(ServiceError::not_found("user", request.creator_id));
        }

        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(ServiceError::InvalidInput("title must not be empty".into()));
        }
        let options: Vec<String> = request
            .options
            .iter()
            .map(|o| o.trim().to_string())
            .collect();
        if options.is_empty() {
            return Err(ServiceError::InvalidInput(
                "a poll needs at least one option".into(),
            ));
        }
        if options.iter().any(String::is_empty) {
            return Err(ServiceError::InvalidInput("option text must not be empty".into()));
        }
        if request.end_time <= request.start_time {
            return Err(ServiceError::InvalidInput(
                "end time must be after start time".into(),
            ));
        }

        let enhanced_description = if request.enhance_description
            && self.config.enabled
            && !request.description.trim().is_empty()
        {
            self.enhance(&title, &request.description).await
        } else {
            None
        };

        let poll = self.polls.create(PollDraft {
            title,
            description: request.description,
            enhanced_description,
            creator_id: request.creator_id,
            start_time: request.start_time,
            end_time: request.end_time,
            option_texts: options,
        })?;

        info!(
            poll = %poll.id,
            creator = %poll.creator_id,
            options = poll.options.len(),
            enhanced = poll.enhanced_description.is_some(),
            "poll created"
        );
        Ok(poll)
    }

    async fn enhance(&self, title: &str, description: &str) -> Option<String> {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        match tokio::time::timeout(timeout, self.insight.enhance(title, description)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text),
            Ok(Ok(_)) => None,
            // No backend behind the provider; nothing went wrong.
            Ok(Err(InsightError::Unavailable(reason))) => {
                debug!(%reason, "description enhancement skipped");
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "description enhancement failed");
                None
            }
            Err(_) => {
                warn!(timeout_ms = self.config.timeout_ms, "description enhancement timed out");
                None
            }
        }
    }

    pub fn get_poll(&self, id: PollId) -> ServiceResult<Poll> {
        self.polls
            .find_by_id(id)?
            .ok_or_else(|| ServiceError::not_found("poll", id))
    }

    pub fn list_polls(&self) -> ServiceResult<Vec<Poll>> {
        Ok(self.polls.list()?)
    }

    /// Polls accepting casts right now.
    pub fn active_polls(&self) -> ServiceResult<Vec<Poll>> {
        let now = self.clock.now();
        Ok(self
            .polls
            .list()?
            .into_iter()
            .filter(|p| p.is_open_at(now))
            .collect())
    }
}
