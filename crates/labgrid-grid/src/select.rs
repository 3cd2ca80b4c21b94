//! Remote-backed select inputs
//!
//! A select loads its choices from an [`OptionSource`] through the shared
//! [`OptionCache`]. Keystrokes are latest-wins: typing aborts the search
//! for the previous text.

use crate::error::GridResult;
use crate::latest::{Latest, LatestWins};
use labgrid_cache::OptionCache;
use labgrid_client::OptionSource;
use labgrid_types::OptionItem;
use std::sync::Arc;

/// Option loader of one select input
#[derive(Debug)]
pub struct RemoteSelect {
    source: Arc<dyn OptionSource>,
    cache: OptionCache,
    latest: LatestWins,
}

impl RemoteSelect {
    /// Create select over `source`
    #[must_use]
    pub fn new(source: Arc<dyn OptionSource>, cache: OptionCache) -> Self {
        Self {
            source,
            cache,
            latest: LatestWins::new(),
        }
    }

    /// Cache namespace of the source
    #[inline]
    #[must_use]
    pub fn query_key(&self) -> &str {
        self.source.query_key()
    }

    /// Options for the typed text
    ///
    /// # Errors
    /// `GridError::Cache` if the search failed
    pub async fn search(&self, text: &str) -> GridResult<Latest<Arc<Vec<OptionItem>>>> {
        match self.latest.run(self.cache.search(self.source.as_ref(), text)).await {
            Latest::Completed(result) => Ok(Latest::Completed(result?)),
            Latest::Superseded => Ok(Latest::Superseded),
        }
    }
}
