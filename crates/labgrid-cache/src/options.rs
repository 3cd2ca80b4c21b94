//! Option list cache using moka
//!
//! Results are keyed by `(query key, search text)`. Concurrent identical
//! searches share one request; results stay fresh for the configured TTL;
//! failures are not cached.

use crate::error::{CacheError, CacheResult};
use labgrid_client::{ClientError, OptionSource};
use labgrid_types::{GridConfig, OptionItem};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Composite key of a cached option list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionKey {
    /// Source namespace
    pub query_key: String,
    /// Search text as typed
    pub input: String,
}

impl OptionKey {
    /// Create key
    #[inline]
    #[must_use]
    pub fn new(query_key: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            query_key: query_key.into(),
            input: input.into(),
        }
    }
}

/// Shared option list cache
#[derive(Debug, Clone)]
pub struct OptionCache {
    inner: Cache<OptionKey, Arc<Vec<OptionItem>>>,
}

impl OptionCache {
    /// Create cache with capacity and freshness window
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Create cache from session configuration
    #[inline]
    #[must_use]
    pub fn from_config(config: &GridConfig) -> Self {
        Self::new(config.option_cache_capacity, config.option_cache_ttl())
    }

    /// Options for `text`, searching `source` only on a miss
    ///
    /// # Errors
    /// `CacheError::OptionSearch` if the search failed
    pub async fn search(
        &self,
        source: &dyn OptionSource,
        text: &str,
    ) -> CacheResult<Arc<Vec<OptionItem>>> {
        let key = OptionKey::new(source.query_key(), text);
        self.inner
            .try_get_with(key, async {
                tracing::debug!(query_key = source.query_key(), text, "option cache miss");
                source.search(text).await.map(Arc::new)
            })
            .await
            .map_err(|e: Arc<ClientError>| CacheError::OptionSearch {
                query_key: source.query_key().to_string(),
                source: (*e).clone(),
            })
    }

    /// Cached options without searching
    #[must_use]
    pub async fn get(&self, key: &OptionKey) -> Option<Arc<Vec<OptionItem>>> {
        self.inner.get(key).await
    }

    /// Drop every cached list
    #[inline]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate entry count
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl Default for OptionCache {
    /// Cache with 1,000 lists fresh for 30 seconds
    fn default() -> Self {
        Self::new(1_000, Duration::from_secs(30))
    }
}
