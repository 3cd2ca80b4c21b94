//! Transient user notifications
//!
//! Success notifications expire after the configured TTL (5 s by default).
//! Error notifications stay until dismissed so field errors can be read.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use ulid::Ulid;

/// Generic message for failures without a structured payload
pub const GENERIC_ERROR: &str = "There was an error!";

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Operation succeeded
    Success,
    /// Operation failed
    Error,
}

/// One notification
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Unique id, used to dismiss
    pub id: Ulid,
    /// Severity
    pub level: Level,
    /// Text shown to the user
    pub message: String,
    created_at: Instant,
    expires_after: Option<Duration>,
}

impl Notification {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_after
            .is_some_and(|ttl| now.duration_since(self.created_at) >= ttl)
    }
}

/// Session-wide notification list
#[derive(Debug)]
pub struct NotificationCenter {
    ttl: Duration,
    items: Mutex<Vec<Notification>>,
}

impl NotificationCenter {
    /// Create center whose success notifications live for `ttl`
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            items: Mutex::new(Vec::new()),
        }
    }

    /// Push an auto-dismissing success notification
    pub fn success(&self, message: impl Into<String>) -> Ulid {
        self.push(Level::Success, message.into(), Some(self.ttl))
    }

    /// Push an error notification
    pub fn error(&self, message: impl Into<String>) -> Ulid {
        self.push(Level::Error, message.into(), None)
    }

    /// Remove one notification; returns whether it was present
    pub fn dismiss(&self, id: Ulid) -> bool {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|n| n.id != id);
        items.len() != before
    }

    /// Notifications still visible, oldest first
    #[must_use]
    pub fn active(&self) -> Vec<Notification> {
        let now = Instant::now();
        let mut items = self.items.lock();
        items.retain(|n| !n.is_expired(now));
        items.clone()
    }

    /// Messages of visible notifications at `level`
    #[must_use]
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.active()
            .into_iter()
            .filter(|n| n.level == level)
            .map(|n| n.message)
            .collect()
    }

    /// Remove everything
    pub fn clear(&self) {
        self.items.lock().clear();
    }

    fn push(&self, level: Level, message: String, expires_after: Option<Duration>) -> Ulid {
        let id = Ulid::new();
        match level {
            Level::Success => tracing::info!(%id, message = %message, "notification"),
            Level::Error => tracing::warn!(%id, message = %message, "error notification"),
        }
        self.items.lock().push(Notification {
            id,
            level,
            message,
            created_at: Instant::now(),
            expires_after,
        });
        id
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}
