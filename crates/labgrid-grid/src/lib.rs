//! labgrid Grid
//!
//! Incrementally-loaded, selectable, editable data grids over a paginated
//! REST backend:
//!
//! - [`TableSession`]: one mounted table; query identity, scroll-driven
//!   loading, selection, cell drafts and bulk actions
//! - [`SelectionModel`]: selection by row id, surviving page loads
//! - [`EditableCell`] / [`DraftBook`]: explicit `Clean → Dirty → Committing`
//!   state machine per cell, committed on blur only when changed
//! - [`MutationCoordinator`]: writes, cache invalidation, notifications
//! - [`LatestWins`]: aborts superseded requests (searches, staff assignment)
//! - [`SampleForm`] / [`FilterForm`]: client-side validated forms
//!
//! # Example
//!
//! ```rust,ignore
//! use labgrid_grid::{GridContext, ScrollMetrics, TableKind};
//! use labgrid_types::GridConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let context = GridContext::http(GridConfig::default().with_order(1))?;
//! let table = context.table(TableKind::Samples);
//!
//! let view = table.mount(ScrollMetrics::new(0.0, 0.0, 800.0)).await?;
//! println!("{} rows loaded, more: {}", view.len(), view.has_more);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cell;
pub mod context;
pub mod error;
pub mod form;
pub mod latest;
pub mod mutation;
pub mod notify;
pub mod scroll;
pub mod select;
pub mod selection;
pub mod staff;
pub mod table;

pub use cell::{CellKey, CellPatch, CellState, CommitError, DraftBook, EditableCell};
pub use context::GridContext;
pub use error::{GridError, GridResult};
pub use form::{parse_pasted_column, FilterForm, FormError, SampleForm};
pub use latest::{Latest, LatestWins};
pub use mutation::{MutationCoordinator, MutationKind};
pub use notify::{Level, Notification, NotificationCenter, GENERIC_ERROR};
pub use scroll::{should_load_more, visible_range, ScrollMetrics};
pub use select::RemoteSelect;
pub use selection::{HeaderState, SelectionModel};
pub use staff::{AssignOutcome, StaffAssignment, StatusIndicator};
pub use table::{Column, CommitOutcome, TableKind, TableSession};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building grids
    pub use crate::context::GridContext;
    pub use crate::error::{GridError, GridResult};
    pub use crate::scroll::ScrollMetrics;
    pub use crate::table::{CommitOutcome, TableKind, TableSession};
    pub use labgrid_types::{CellValue, FilterOp, FilterSet, GridConfig, RowId};
}
