//! Error types for decoding rows and cell values

use crate::value::CellKind;

/// Errors raised while interpreting server data
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypesError {
    /// Row object carries no `id` field
    #[error("row has no 'id' field")]
    MissingRowId,

    /// Row `id` is not an unsigned integer
    #[error("invalid row id: {0}")]
    InvalidRowId(String),

    /// JSON value does not fit the cell kind
    #[error("value {value} is not a valid {kind:?} cell value")]
    ValueKind {
        /// Expected kind
        kind: CellKind,
        /// Offending JSON, rendered
        value: String,
    },

    /// Date string not in `YYYY-MM-DD` form
    #[error("invalid date: '{0}'")]
    InvalidDate(String),
}

impl TypesError {
    /// Create a value/kind mismatch error
    pub fn value_kind(kind: CellKind, value: &serde_json::Value) -> Self {
        Self::ValueKind {
            kind,
            value: value.to_string(),
        }
    }
}

/// Result type alias for type-level conversions
pub type TypesResult<T> = Result<T, TypesError>;
