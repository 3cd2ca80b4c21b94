//! labgrid Types
//!
//! The shared vocabulary of the grid layers:
//!
//! - [`Row`] / [`RowId`]: immutable server snapshots keyed by a stable id
//! - [`Page`] / [`Cursor`]: one `{results, next}` envelope of a list endpoint
//! - [`QueryIdentity`] / [`FilterSet`]: the key scoping one cached collection
//! - [`CellValue`] / [`OptionItem`]: typed values held by editable cells
//! - [`ErrorPayload`]: the structured `{type, errors}` validation body
//! - [`GridConfig`]: the explicit per-session configuration value
//!
//! # Example
//!
//! ```rust,ignore
//! use labgrid_types::{FilterOp, FilterSet, QueryIdentity};
//!
//! let mut filters = FilterSet::new();
//! filters.insert("name", FilterOp::IStartsWith, "bear");
//!
//! let identity = QueryIdentity::new("/api/samples/")
//!     .with_param("order__status__not", "draft")
//!     .with_filters(filters)
//!     .with_extra("markers", "COI");
//!
//! assert_eq!(
//!     identity.key(),
//!     "/api/samples/?order__status__not=draft&name__istartswith=bear&markers=COI"
//! );
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod page;
pub mod payload;
pub mod query;
pub mod row;
pub mod value;

pub use config::{ConfigError, Features, GridConfig, InitialData};
pub use error::{TypesError, TypesResult};
pub use page::{Cursor, Page};
pub use payload::{ErrorPayload, FieldError};
pub use query::{FilterOp, FilterSet, FilterValue, QueryIdentity};
pub use row::{Row, RowId};
pub use value::{CellKind, CellValue, OptionItem};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
