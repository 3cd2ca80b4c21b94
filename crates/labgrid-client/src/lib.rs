//! labgrid Client
//!
//! The seams between the grid and the backend:
//!
//! - [`PageSource`]: fetch one `{results, next}` page for an identity/cursor
//! - [`OptionSource`]: search an autocomplete endpoint
//! - [`MutationBackend`]: bulk create, bulk delete, patch, delete, plain POST
//!
//! [`HttpBackend`] implements all three over reqwest, attaching the session's
//! CSRF token to every mutating request.
//!
//! # Example
//!
//! ```rust,ignore
//! use labgrid_client::{HttpBackend, PageSource};
//! use labgrid_types::{GridConfig, QueryIdentity};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GridConfig::default().with_order(1).with_csrf_token("token");
//! let backend = HttpBackend::new(config.into())?;
//!
//! let identity = QueryIdentity::new("/api/samples/").with_param("order", "1");
//! let first = backend.fetch_page(&identity, None).await?;
//! println!("{} rows, more: {}", first.results.len(), !first.is_last());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod endpoints;
pub mod error;
pub mod http;
pub mod mutation;
pub mod options;
pub mod source;

pub use error::{ClientError, ClientResult};
pub use http::{HttpBackend, HttpOptionSource};
pub use mutation::MutationBackend;
pub use options::{OptionField, OptionRegistry, OptionSource};
pub use source::PageSource;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
