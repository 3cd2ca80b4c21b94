//! Error types for the grid
//!
//! Covers:
//! - backend failures surfaced at the mutation boundary
//! - mutations refused because one of the same kind is running
//! - client-side form validation (blocks submission, nothing is sent)
//! - edits addressed to cells that are not mounted or not editable

use crate::form::FormError;
use crate::mutation::MutationKind;
use labgrid_cache::CacheError;
use labgrid_client::ClientError;
use labgrid_types::{RowId, TypesError};

/// Main grid error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    /// Backend request failed outside a mutation
    #[error("request failed: {0}")]
    Client(#[from] ClientError),

    /// Collection or option cache failure
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Row data did not fit the expected shape
    #[error("bad row data: {0}")]
    Types(#[from] TypesError),

    /// Form failed client-side validation
    #[error("invalid form: {0}")]
    FormInvalid(#[from] FormError),

    /// A mutation of this kind is already running
    #[error("{0} already in progress")]
    MutationPending(MutationKind),

    /// Mutation reached the backend and failed
    #[error("{kind} failed: {source}")]
    Mutation {
        /// Mutation kind
        kind: MutationKind,
        /// Backend error
        #[source]
        source: ClientError,
    },

    /// Bulk action requires a selection
    #[error("no rows selected")]
    NothingSelected,

    /// No draft is mounted for the cell
    #[error("no cell mounted for row {row_id} field {field}")]
    UnknownCell {
        /// Row identity
        row_id: RowId,
        /// Field name
        field: String,
    },

    /// Column is not editable in this table
    #[error("column {0} is not editable")]
    NotEditable(String),

    /// No option source is registered for the column
    #[error("no option source for {0}")]
    NoOptionSource(String),

    /// Row is not in the loaded set
    #[error("row {0} is not loaded")]
    RowNotLoaded(RowId),

    /// Action is not offered by this table
    #[error("{0} is not supported by this table")]
    Unsupported(&'static str),

    /// Session configuration lacks a required value
    #[error("configuration error: {0}")]
    Config(String),
}

impl GridError {
    /// Create unknown-cell error
    #[inline]
    pub fn unknown_cell(row_id: RowId, field: impl Into<String>) -> Self {
        Self::UnknownCell {
            row_id,
            field: field.into(),
        }
    }

    /// Underlying backend error, if any
    #[must_use]
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            Self::Client(e) | Self::Mutation { source: e, .. } => Some(e),
            Self::Cache(e) => Some(e.client_error()),
            _ => None,
        }
    }

    /// Check if the action can be retried as is
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::MutationPending(_) => true,
            _ => self.client_error().is_some_and(|e| {
                matches!(e, ClientError::Transport(_)) || e.http_status().is_some_and(|s| s >= 500)
            }),
        }
    }
}

/// Result type alias for grid operations
pub type GridResult<T> = Result<T, GridError>;
