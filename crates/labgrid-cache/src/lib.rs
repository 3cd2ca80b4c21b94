//! labgrid Cache
//!
//! Shared, process-wide caches consulted by every grid component:
//!
//! - [`InfiniteCollectionCache`]: pages accumulated per [`QueryIdentity`],
//!   flattened in arrival order, with at most one fetch in flight per identity
//! - [`OptionCache`]: autocomplete results keyed by `(query key, search text)`,
//!   with a freshness window and coalescing of identical in-flight searches
//!
//! # Architecture
//!
//! ```text
//! load_more(identity) → PageSource::fetch_page(cursor) → append page → CollectionView
//!          ↑                                                  │
//!          └──────── invalidate(identity) bumps generation ───┘ (late pages discarded)
//! ```
//!
//! [`QueryIdentity`]: labgrid_types::QueryIdentity

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod collection;
pub mod error;
pub mod options;

pub use collection::{CollectionView, InfiniteCollectionCache, LoadOutcome, SkipReason};
pub use error::{CacheError, CacheResult};
pub use options::{OptionCache, OptionKey};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the caches
    pub use crate::collection::{CollectionView, InfiniteCollectionCache, LoadOutcome};
    pub use crate::error::{CacheError, CacheResult};
    pub use crate::options::OptionCache;
    pub use labgrid_types::{Page, QueryIdentity, Row, RowId};
}
