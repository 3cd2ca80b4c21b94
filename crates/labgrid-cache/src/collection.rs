//! Infinite collection cache
//!
//! Accumulates cursor-paginated pages per [`QueryIdentity`]:
//! - rows are the flattening of every page's results, first page first
//! - `has_more` is read from the last page's `next` only
//! - at most one fetch is in flight per identity; `load_more` is a no-op
//!   while one is running or once the last page has arrived
//! - `invalidate` drops the pages and bumps the entry generation, so a
//!   response to a fetch issued before the invalidation is discarded
//!
//! Pages for identity N+1 can only be requested after page N resolved,
//! because its cursor is read from page N.

use crate::error::{CacheError, CacheResult};
use dashmap::DashMap;
use labgrid_client::{ClientError, PageSource};
use labgrid_types::{Cursor, Page, QueryIdentity, Row, RowId};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Why `load_more` issued no request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A fetch for the identity is already running
    InFlight,
    /// The last page has been loaded
    Exhausted,
}

/// Result of a `load_more` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No request was issued
    Skipped(SkipReason),
    /// A page was appended
    Appended {
        /// Rows in the appended page
        rows: usize,
        /// Whether another page follows
        has_more: bool,
    },
    /// The identity was invalidated while the request was in flight
    Discarded,
}

/// Read-only snapshot of one identity's collection
#[derive(Debug, Clone)]
pub struct CollectionView {
    pages: Vec<Arc<Page>>,
    /// Another page can be requested
    pub has_more: bool,
    /// No page loaded yet and the first fetch is running
    pub is_loading: bool,
    /// Any fetch is running
    pub is_fetching: bool,
    /// Error of the last failed fetch, cleared by the next attempt
    pub error: Option<ClientError>,
}

impl CollectionView {
    fn empty() -> Self {
        Self {
            pages: Vec::new(),
            has_more: true,
            is_loading: false,
            is_fetching: false,
            error: None,
        }
    }

    /// Flattened rows in arrival order
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.pages.iter().flat_map(|page| page.results.iter())
    }

    /// Ids of every loaded row, in order
    #[must_use]
    pub fn row_ids(&self) -> Vec<RowId> {
        self.rows().map(Row::id).collect()
    }

    /// Owned copy of the flattened rows
    #[must_use]
    pub fn to_rows(&self) -> Vec<Row> {
        self.rows().cloned().collect()
    }

    /// Row at a flattened index (for virtualized rendering)
    #[must_use]
    pub fn row_at(&self, index: usize) -> Option<&Row> {
        self.rows().nth(index)
    }

    /// Number of loaded rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.iter().map(|p| p.results.len()).sum()
    }

    /// Whether no row is loaded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of loaded pages
    #[inline]
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[derive(Debug, Default)]
struct CollectionEntry {
    generation: u64,
    pages: Vec<Arc<Page>>,
    fetching: bool,
    error: Option<ClientError>,
}

impl CollectionEntry {
    fn has_more(&self) -> bool {
        self.pages.last().map_or(true, |page| page.next.is_some())
    }

    fn next_cursor(&self) -> Option<Cursor> {
        self.pages.last().and_then(|page| page.next.clone())
    }

    fn view(&self) -> CollectionView {
        CollectionView {
            pages: self.pages.clone(),
            has_more: self.has_more(),
            is_loading: self.fetching && self.pages.is_empty(),
            is_fetching: self.fetching,
            error: self.error.clone(),
        }
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.pages.clear();
        self.fetching = false;
        self.error = None;
    }
}

/// Clears the in-flight flag if the fetch future is dropped before resolving
struct FetchGuard {
    entry: Arc<Mutex<CollectionEntry>>,
    generation: u64,
    armed: bool,
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        if self.armed {
            let mut entry = self.entry.lock();
            if entry.generation == self.generation {
                entry.fetching = false;
            }
        }
    }
}

/// Cache of paginated collections, shared by every consumer of an identity
pub struct InfiniteCollectionCache {
    source: Arc<dyn PageSource>,
    entries: DashMap<QueryIdentity, Arc<Mutex<CollectionEntry>>>,
}

impl InfiniteCollectionCache {
    /// Create cache over a page source
    #[must_use]
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self {
            source,
            entries: DashMap::new(),
        }
    }

    /// Current collection for `identity`, loading the first page if none is held
    ///
    /// Returns without fetching when pages are cached or a fetch is already
    /// running for the identity.
    ///
    /// # Errors
    /// `CacheError::PageFetch` if the first page could not be fetched
    pub async fn query(&self, identity: &QueryIdentity) -> CacheResult<CollectionView> {
        let entry = self.entry(identity);
        let needs_first_page = {
            let guard = entry.lock();
            guard.pages.is_empty() && !guard.fetching
        };

        if needs_first_page {
            tracing::debug!(identity = %identity, "cache miss, fetching first page");
            self.fetch_next(identity, &entry).await?;
        }

        let view = entry.lock().view();
        Ok(view)
    }

    /// Fetch and append the next page
    ///
    /// # Errors
    /// `CacheError::PageFetch` on failure; prior pages stay intact and the
    /// request is not retried.
    pub async fn load_more(&self, identity: &QueryIdentity) -> CacheResult<LoadOutcome> {
        let entry = self.entry(identity);
        self.fetch_next(identity, &entry).await
    }

    /// Snapshot without fetching
    #[must_use]
    pub fn snapshot(&self, identity: &QueryIdentity) -> CollectionView {
        self.entries
            .get(identity)
            .map_or_else(CollectionView::empty, |entry| entry.lock().view())
    }

    /// Drop all pages of `identity`; the next query restarts from page one
    pub fn invalidate(&self, identity: &QueryIdentity) {
        if let Some(entry) = self.entries.get(identity) {
            entry.lock().reset();
            tracing::info!(identity = %identity, "collection invalidated");
        }
    }

    /// Invalidate every identity listing `endpoint`; returns how many
    pub fn invalidate_endpoint(&self, endpoint: &str) -> usize {
        let mut count = 0;
        for entry in self.entries.iter() {
            if entry.key().is_for_endpoint(endpoint) {
                entry.value().lock().reset();
                count += 1;
            }
        }
        tracing::info!(endpoint, identities = count, "endpoint invalidated");
        count
    }

    /// Forget `identity` entirely (used when a consumer switches identity)
    pub fn remove(&self, identity: &QueryIdentity) {
        if let Some((_, entry)) = self.entries.remove(identity) {
            entry.lock().reset();
            tracing::debug!(identity = %identity, "collection removed");
        }
    }

    /// Whether any state is held for `identity`
    #[must_use]
    pub fn contains(&self, identity: &QueryIdentity) -> bool {
        self.entries.contains_key(identity)
    }

    /// Number of identities held
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no identity is held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, identity: &QueryIdentity) -> Arc<Mutex<CollectionEntry>> {
        self.entries
            .entry(identity.clone())
            .or_insert_with(|| Arc::new(Mutex::new(CollectionEntry::default())))
            .clone()
    }

    async fn fetch_next(
        &self,
        identity: &QueryIdentity,
        entry: &Arc<Mutex<CollectionEntry>>,
    ) -> CacheResult<LoadOutcome> {
        let (generation, cursor) = {
            let mut guard = entry.lock();
            if guard.fetching {
                tracing::debug!(identity = %identity, "load_more skipped, fetch in flight");
                return Ok(LoadOutcome::Skipped(SkipReason::InFlight));
            }
            if !guard.has_more() {
                tracing::debug!(identity = %identity, "load_more skipped, last page loaded");
                return Ok(LoadOutcome::Skipped(SkipReason::Exhausted));
            }
            guard.fetching = true;
            guard.error = None;
            (guard.generation, guard.next_cursor())
        };

        let mut fetch_guard = FetchGuard {
            entry: Arc::clone(entry),
            generation,
            armed: true,
        };

        let result = self.source.fetch_page(identity, cursor.as_ref()).await;
        fetch_guard.armed = false;

        let mut guard = entry.lock();
        if guard.generation != generation {
            tracing::warn!(identity = %identity, "discarding page fetched before invalidation");
            return Ok(LoadOutcome::Discarded);
        }
        guard.fetching = false;

        match result {
            Ok(page) => {
                let rows = page.results.len();
                let has_more = page.next.is_some();
                guard.pages.push(Arc::new(page));
                tracing::debug!(
                    identity = %identity,
                    rows,
                    pages = guard.pages.len(),
                    has_more,
                    "page appended"
                );
                Ok(LoadOutcome::Appended { rows, has_more })
            }
            Err(source) => {
                tracing::warn!(identity = %identity, error = %source, "page fetch failed");
                guard.error = Some(source.clone());
                Err(CacheError::PageFetch {
                    identity: identity.key().to_string(),
                    source,
                })
            }
        }
    }
}

impl fmt::Debug for InfiniteCollectionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfiniteCollectionCache")
            .field("source", &self.source)
            .field("identities", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labgrid_test_utils::{page, FakeBackend, Op};
    use pretty_assertions::assert_eq;

    fn identity() -> QueryIdentity {
        QueryIdentity::new("/api/samples/").with_param("order", "1")
    }

    fn cache_with(backend: &Arc<FakeBackend>) -> InfiniteCollectionCache {
        InfiniteCollectionCache::new(backend.clone())
    }

    #[tokio::test]
    async fn query_loads_first_page_once() {
        let backend = FakeBackend::new();
        backend.add_page(identity().key(), page(&[1, 2], Some("c2")));
        let cache = cache_with(&backend);

        let view = cache.query(&identity()).await.unwrap();
        assert_eq!(view.row_ids(), vec![RowId(1), RowId(2)]);
        assert!(view.has_more);

        let again = cache.query(&identity()).await.unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(backend.fetch_count(), 1);
    }

    #[tokio::test]
    async fn load_more_appends_until_exhausted() {
        let backend = FakeBackend::new();
        backend.add_page(identity().key(), page(&[1], Some("c2")));
        backend.add_page("c2", page(&[2], None));
        let cache = cache_with(&backend);

        cache.query(&identity()).await.unwrap();
        let outcome = cache.load_more(&identity()).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Appended { rows: 1, has_more: false });

        let view = cache.snapshot(&identity());
        assert_eq!(view.row_ids(), vec![RowId(1), RowId(2)]);
        assert!(!view.has_more);

        let skipped = cache.load_more(&identity()).await.unwrap();
        assert_eq!(skipped, LoadOutcome::Skipped(SkipReason::Exhausted));
        assert_eq!(backend.fetch_count(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_prior_pages() {
        let backend = FakeBackend::new();
        backend.add_page(identity().key(), page(&[1], Some("c2")));
        let cache = cache_with(&backend);
        cache.query(&identity()).await.unwrap();

        backend.fail_next(Op::Fetch, ClientError::Transport("offline".into()));
        let err = cache.load_more(&identity()).await.unwrap_err();
        assert!(matches!(err, CacheError::PageFetch { .. }));

        let view = cache.snapshot(&identity());
        assert_eq!(view.row_ids(), vec![RowId(1)]);
        assert!(!view.is_fetching);
        assert!(view.has_more);
        assert_eq!(view.error, Some(ClientError::Transport("offline".into())));
    }

    #[tokio::test]
    async fn invalidate_restarts_from_first_page() {
        let backend = FakeBackend::new();
        backend.add_page(identity().key(), page(&[1], Some("c2")));
        backend.add_page("c2", page(&[2], None));
        let cache = cache_with(&backend);

        cache.query(&identity()).await.unwrap();
        cache.load_more(&identity()).await.unwrap();
        cache.invalidate(&identity());

        let empty = cache.snapshot(&identity());
        assert!(empty.is_empty());
        assert!(empty.has_more);

        backend.add_page(identity().key(), page(&[1, 3], None));
        let view = cache.query(&identity()).await.unwrap();
        assert_eq!(view.row_ids(), vec![RowId(1), RowId(3)]);
        assert_eq!(backend.fetched_keys().last().map(String::as_str), Some(identity().key()));
    }

    #[tokio::test]
    async fn invalidate_endpoint_covers_every_filter_variant() {
        let backend = FakeBackend::new();
        let a = QueryIdentity::new("/api/samples/").with_param("year", "2020");
        let b = QueryIdentity::new("/api/samples/").with_param("year", "2021");
        let other = QueryIdentity::new("/api/sample-marker-analysis/");
        for id in [&a, &b, &other] {
            backend.add_page(id.key(), page(&[1], None));
        }
        let cache = cache_with(&backend);
        for id in [&a, &b, &other] {
            cache.query(id).await.unwrap();
        }

        assert_eq!(cache.invalidate_endpoint("/api/samples/"), 2);
        assert!(cache.snapshot(&a).is_empty());
        assert!(cache.snapshot(&b).is_empty());
        assert_eq!(cache.snapshot(&other).len(), 1);
    }

    #[tokio::test]
    async fn remove_forgets_identity() {
        let backend = FakeBackend::new();
        backend.add_page(identity().key(), page(&[1], None));
        let cache = cache_with(&backend);
        cache.query(&identity()).await.unwrap();

        cache.remove(&identity());
        assert!(!cache.contains(&identity()));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn page_fetched_before_invalidation_is_discarded() {
        let backend = FakeBackend::new();
        backend.add_page(identity().key(), page(&[1], Some("c2")));
        backend.add_page("c2", page(&[2], None));
        let cache = cache_with(&backend);
        cache.query(&identity()).await.unwrap();

        let gate = backend.hold(Op::Fetch);
        let id = identity();
        let (stale, fresh) = tokio::join!(cache.load_more(&id), async {
            gate.wait_entered().await;
            cache.invalidate(&identity());
            backend.add_page(identity().key(), page(&[7], None));
            let fresh = cache.query(&identity()).await;
            gate.release();
            fresh
        });

        assert_eq!(stale.unwrap(), LoadOutcome::Discarded);
        assert_eq!(fresh.unwrap().row_ids(), vec![RowId(7)]);

        let view = cache.snapshot(&identity());
        assert_eq!(view.row_ids(), vec![RowId(7)]);
        assert!(!view.is_fetching);
        assert!(!view.has_more);
    }
}
