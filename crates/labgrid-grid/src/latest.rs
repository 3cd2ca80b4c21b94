//! Latest-wins request tracking
//!
//! A field whose requests supersede each other (search box, assignment
//! selector) runs them through one [`LatestWins`]. Starting a request aborts
//! the previous one, so a stale response can never overwrite newer state.

use futures::future::{AbortHandle, Abortable};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of a tracked request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Latest<T> {
    /// Request ran to completion and was still the latest when it did
    Completed(T),
    /// A newer request started first; nothing may be applied
    Superseded,
}

impl<T> Latest<T> {
    /// Completed value, if any
    #[must_use]
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Superseded => None,
        }
    }

    /// Whether the request was superseded
    #[inline]
    #[must_use]
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }
}

/// Tracks the abort handle of the current request of one logical resource
#[derive(Debug, Default)]
pub struct LatestWins {
    ticket: AtomicU64,
    current: Mutex<Option<(u64, AbortHandle)>>,
}

impl LatestWins {
    /// Create tracker
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `request`, aborting whichever request was running before it
    pub async fn run<F: Future>(&self, request: F) -> Latest<F::Output> {
        let (handle, registration) = AbortHandle::new_pair();
        let ticket = self.ticket.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some((previous, abort)) = self.current.lock().replace((ticket, handle)) {
            tracing::debug!(previous, ticket, "aborting superseded request");
            abort.abort();
        }

        let result = Abortable::new(request, registration).await;

        // a newer request or an abort may land after the future resolved
        let mut current = self.current.lock();
        let still_latest = current.as_ref().is_some_and(|(t, _)| *t == ticket);
        if still_latest {
            *current = None;
        }
        match result {
            Ok(value) if still_latest => Latest::Completed(value),
            _ => Latest::Superseded,
        }
    }

    /// Abort the running request, if any
    pub fn abort(&self) {
        if let Some((_, abort)) = self.current.lock().take() {
            abort.abort();
        }
    }

    /// Whether a request is running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.current.lock().is_some()
    }
}
