//! Row snapshots
//!
//! A [`Row`] is an immutable record received from a list endpoint. Its
//! [`RowId`] is the key for virtualization, selection and drafts. Local edits
//! never touch a cached row; they live in drafts until the server confirms.

use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Stable unique row identity (the backend's integer primary key)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl RowId {
    /// Raw integer value
    #[inline]
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RowId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| TypesError::InvalidRowId(s.to_string()))
    }
}

impl From<u64> for RowId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Server row snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Row {
    id: RowId,
    fields: Map<String, Value>,
}

impl Row {
    /// Build a row from its JSON object
    ///
    /// # Errors
    /// - `TypesError::MissingRowId` if the object has no `id`
    /// - `TypesError::InvalidRowId` if `id` is not an unsigned integer
    pub fn from_object(fields: Map<String, Value>) -> Result<Self, TypesError> {
        let id = match fields.get("id") {
            None | Some(Value::Null) => return Err(TypesError::MissingRowId),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(RowId)
                .ok_or_else(|| TypesError::InvalidRowId(n.to_string()))?,
            Some(Value::String(s)) => s.parse()?,
            Some(other) => return Err(TypesError::InvalidRowId(other.to_string())),
        };
        Ok(Self { id, fields })
    }

    /// Row identity
    #[inline]
    #[must_use]
    pub fn id(&self) -> RowId {
        self.id
    }

    /// Top-level field
    #[inline]
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Nested field addressed by a dotted path (`sample.species.name`)
    ///
    /// Returns `None` when any segment is missing or traverses a non-object.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// All fields, including `id`
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl TryFrom<Map<String, Value>> for Row {
    type Error = TypesError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        Self::from_object(fields)
    }
}

impl From<Row> for Map<String, Value> {
    fn from(row: Row) -> Self {
        row.fields
    }
}
