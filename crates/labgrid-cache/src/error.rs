//! Error types for the caches

use labgrid_client::ClientError;

/// Errors surfaced by cache operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    /// A page fetch failed; earlier pages are kept
    #[error("page fetch failed for {identity}: {source}")]
    PageFetch {
        /// Identity key
        identity: String,
        /// Backend error
        #[source]
        source: ClientError,
    },

    /// An option search failed; nothing was cached
    #[error("option search failed for {query_key}: {source}")]
    OptionSearch {
        /// Option namespace
        query_key: String,
        /// Backend error
        #[source]
        source: ClientError,
    },
}

impl CacheError {
    /// Underlying backend error
    #[must_use]
    pub fn client_error(&self) -> &ClientError {
        match self {
            Self::PageFetch { source, .. } | Self::OptionSearch { source, .. } => source,
        }
    }
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
