//! Mutation coordinator
//!
//! Every write goes through [`MutationCoordinator`]:
//! - control-level mutations (add, bulk delete, apply markers) are exclusive
//!   per kind; a second one is refused while the first runs
//! - per-row mutations (cell update, row delete) may run concurrently, and
//!   unrelated kinds are never serialized against each other
//! - success invalidates every cached collection of the endpoint and pushes
//!   a transient notification
//! - failure pushes one notification per structured field error, or a
//!   generic one, and hands the error back to the caller
//!
//! Rows are never patched locally; the next query refetches from page one.

use crate::error::{GridError, GridResult};
use crate::form::FormError;
use crate::notify::{NotificationCenter, GENERIC_ERROR};
use labgrid_cache::InfiniteCollectionCache;
use labgrid_client::{endpoints, ClientError, ClientResult, MutationBackend};
use labgrid_types::RowId;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Kinds of mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Bulk create
    Create,
    /// Bulk delete of selected rows
    BulkDelete,
    /// Bulk create of marker analyses for selected samples
    ApplyMarkers,
    /// Single-field update from a cell
    Update,
    /// Single-row delete
    Delete,
}

impl MutationKind {
    /// Whether at most one may run at a time
    #[inline]
    #[must_use]
    pub fn is_exclusive(self) -> bool {
        matches!(self, Self::Create | Self::BulkDelete | Self::ApplyMarkers)
    }

    /// Notification shown on success
    #[must_use]
    pub fn success_message(self) -> &'static str {
        match self {
            Self::Create => "Samples added!",
            Self::BulkDelete => "Samples deleted!",
            Self::ApplyMarkers => "Markers applied!",
            Self::Update => "Changes saved!",
            Self::Delete => "Sample deleted!",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::BulkDelete => "bulk delete",
            Self::ApplyMarkers => "apply markers",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Decrements the running count of a kind when the mutation ends
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<MutationKind, usize>>,
    kind: MutationKind,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.pending.lock();
        if let Some(count) = pending.get_mut(&self.kind) {
            *count -= 1;
            if *count == 0 {
                pending.remove(&self.kind);
            }
        }
    }
}

/// Issues writes and keeps caches and notifications in step
#[derive(Debug)]
pub struct MutationCoordinator {
    backend: Arc<dyn MutationBackend>,
    cache: Arc<InfiniteCollectionCache>,
    notifications: Arc<NotificationCenter>,
    pending: Mutex<HashMap<MutationKind, usize>>,
}

impl MutationCoordinator {
    /// Create coordinator
    #[must_use]
    pub fn new(
        backend: Arc<dyn MutationBackend>,
        cache: Arc<InfiniteCollectionCache>,
        notifications: Arc<NotificationCenter>,
    ) -> Self {
        Self {
            backend,
            cache,
            notifications,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Backend used for writes
    #[inline]
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn MutationBackend> {
        &self.backend
    }

    /// Notification center fed by this coordinator
    #[inline]
    #[must_use]
    pub fn notifications(&self) -> &Arc<NotificationCenter> {
        &self.notifications
    }

    /// Whether a mutation of `kind` is running (drives disabled controls)
    #[must_use]
    pub fn is_pending(&self, kind: MutationKind) -> bool {
        self.pending.lock().contains_key(&kind)
    }

    /// Bulk create rows under `endpoint`
    ///
    /// # Errors
    /// - `GridError::MutationPending` if a create is already running
    /// - `GridError::Mutation` if the backend rejected it
    pub async fn create(&self, endpoint: &str, body: Value) -> GridResult<Value> {
        self.run(
            MutationKind::Create,
            endpoint,
            self.backend.bulk_create(endpoint, body),
        )
        .await
    }

    /// Create one marker analysis per `(sample, marker)` pair
    ///
    /// # Errors
    /// - `GridError::NothingSelected` without samples
    /// - `GridError::FormInvalid` without markers
    /// - `GridError::MutationPending` / `GridError::Mutation` as for [`create`](Self::create)
    pub async fn apply_markers(
        &self,
        order: u64,
        samples: &[RowId],
        markers: &[String],
    ) -> GridResult<Value> {
        if samples.is_empty() {
            return Err(GridError::NothingSelected);
        }
        if markers.is_empty() {
            return Err(FormError::MarkersRequired.into());
        }
        let body = json!({
            "order": order,
            "samples": samples,
            "markers": markers,
        });
        let endpoint = endpoints::SAMPLE_MARKER_ANALYSIS;
        self.run(
            MutationKind::ApplyMarkers,
            endpoint,
            self.backend.bulk_create(endpoint, body),
        )
        .await
    }

    /// Delete `ids` under `endpoint`; returns the processed ids
    ///
    /// # Errors
    /// - `GridError::NothingSelected` if `ids` is empty
    /// - `GridError::MutationPending` / `GridError::Mutation`
    pub async fn bulk_delete(&self, endpoint: &str, ids: &[RowId]) -> GridResult<Vec<RowId>> {
        if ids.is_empty() {
            return Err(GridError::NothingSelected);
        }
        self.run(
            MutationKind::BulkDelete,
            endpoint,
            self.backend.bulk_delete(endpoint, ids),
        )
        .await?;
        Ok(ids.to_vec())
    }

    /// Partially update row `id`
    ///
    /// # Errors
    /// `GridError::Mutation` if the backend rejected it
    pub async fn update(
        &self,
        endpoint: &str,
        id: RowId,
        fields: Map<String, Value>,
    ) -> GridResult<Value> {
        self.run(
            MutationKind::Update,
            endpoint,
            self.backend.patch(endpoint, id, fields),
        )
        .await
    }

    /// Delete row `id`
    ///
    /// # Errors
    /// `GridError::Mutation` if the backend rejected it
    pub async fn delete(&self, endpoint: &str, id: RowId) -> GridResult<()> {
        self.run(
            MutationKind::Delete,
            endpoint,
            self.backend.delete(endpoint, id),
        )
        .await
    }

    fn begin(&self, kind: MutationKind) -> GridResult<PendingGuard<'_>> {
        let mut pending = self.pending.lock();
        let count = pending.entry(kind).or_insert(0);
        if kind.is_exclusive() && *count > 0 {
            tracing::debug!(%kind, "mutation refused, one already running");
            return Err(GridError::MutationPending(kind));
        }
        *count += 1;
        Ok(PendingGuard {
            pending: &self.pending,
            kind,
        })
    }

    async fn run<T>(
        &self,
        kind: MutationKind,
        endpoint: &str,
        request: impl Future<Output = ClientResult<T>>,
    ) -> GridResult<T> {
        let _guard = self.begin(kind)?;
        tracing::info!(%kind, endpoint, "mutation started");

        match request.await {
            Ok(value) => {
                let invalidated = self.cache.invalidate_endpoint(endpoint);
                tracing::info!(%kind, endpoint, invalidated, "mutation succeeded");
                self.notifications.success(kind.success_message());
                Ok(value)
            }
            Err(source) => {
                tracing::warn!(%kind, endpoint, error = %source, "mutation failed");
                self.report_failure(&source);
                Err(GridError::Mutation { kind, source })
            }
        }
    }

    fn report_failure(&self, error: &ClientError) {
        let field_errors = error.field_errors();
        if field_errors.is_empty() {
            self.notifications.error(GENERIC_ERROR);
        } else {
            for entry in field_errors {
                self.notifications.error(entry.to_string());
            }
        }
    }
}
