//! Staff assignment selector
//!
//! Each change of the selector posts `{"user_ids": [...]}` to the form's
//! update URL. Changes are latest-wins: a new change aborts the running one,
//! and only the latest outcome moves the status indicator.

use crate::latest::{Latest, LatestWins};
use labgrid_client::{ClientError, MutationBackend};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// How long the success mark stays visible
pub const SUCCESS_VISIBLE_FOR: Duration = Duration::from_secs(2);

/// Status indicator next to the selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusIndicator {
    /// Nothing shown
    Hidden,
    /// Request running
    Spinner,
    /// Last request saved
    Success,
    /// Last request failed
    Error,
}

/// Outcome of one assignment change
#[derive(Debug, Clone, PartialEq)]
pub enum AssignOutcome {
    /// Saved
    Saved,
    /// Rejected by the backend
    Failed(ClientError),
    /// A newer change superseded this one
    Superseded,
}

#[derive(Debug, Clone, Copy)]
struct Status {
    indicator: StatusIndicator,
    since: Instant,
}

/// One staff assignment form
#[derive(Debug)]
pub struct StaffAssignment {
    update_url: String,
    backend: Arc<dyn MutationBackend>,
    latest: LatestWins,
    status: Mutex<Status>,
}

impl StaffAssignment {
    /// Create form posting to `update_url`
    #[must_use]
    pub fn new(update_url: impl Into<String>, backend: Arc<dyn MutationBackend>) -> Self {
        Self {
            update_url: update_url.into(),
            backend,
            latest: LatestWins::new(),
            status: Mutex::new(Status {
                indicator: StatusIndicator::Hidden,
                since: Instant::now(),
            }),
        }
    }

    /// Update URL
    #[inline]
    #[must_use]
    pub fn update_url(&self) -> &str {
        &self.update_url
    }

    /// Submit the selected user ids
    pub async fn assign(&self, user_ids: &[u64]) -> AssignOutcome {
        self.set_status(StatusIndicator::Spinner);
        let body = json!({ "user_ids": user_ids });
        let outcome = self
            .latest
            .run(self.backend.post_json(&self.update_url, body))
            .await;

        match outcome {
            Latest::Superseded => {
                tracing::debug!(url = %self.update_url, "assignment superseded");
                AssignOutcome::Superseded
            }
            Latest::Completed(Ok(_)) => {
                tracing::info!(url = %self.update_url, users = user_ids.len(), "staff assigned");
                self.set_status(StatusIndicator::Success);
                AssignOutcome::Saved
            }
            Latest::Completed(Err(e)) => {
                tracing::warn!(url = %self.update_url, error = %e, "staff assignment failed");
                self.set_status(StatusIndicator::Error);
                AssignOutcome::Failed(e)
            }
        }
    }

    /// Indicator as currently shown; success hides after two seconds
    #[must_use]
    pub fn status(&self) -> StatusIndicator {
        let status = *self.status.lock();
        if status.indicator == StatusIndicator::Success
            && status.since.elapsed() >= SUCCESS_VISIBLE_FOR
        {
            StatusIndicator::Hidden
        } else {
            status.indicator
        }
    }

    fn set_status(&self, indicator: StatusIndicator) {
        *self.status.lock() = Status {
            indicator,
            since: Instant::now(),
        };
    }
}
