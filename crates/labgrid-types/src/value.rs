//! Typed cell values
//!
//! Editable cells hold one of a few value kinds. Server JSON is decoded
//! per-kind with [`CellValue::from_json`], and drafts are sent back with
//! [`CellValue::to_patch_json`]: selects send their option id, multi-selects
//! the list of ids, dates the ISO `YYYY-MM-DD` form.

use crate::error::TypesError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Option offered by a remote-backed select (`{id, name}`)
///
/// Some option endpoints (markers) return only `name`; the name then acts as
/// the value sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionItem {
    /// Backend identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Display label
    pub name: String,
}

impl OptionItem {
    /// Option with an integer id
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: Some(Value::from(id)),
            name: name.into(),
        }
    }

    /// Option identified only by its name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    /// Value sent to the backend when this option is chosen
    #[must_use]
    pub fn value_key(&self) -> Value {
        match &self.id {
            Some(id) if !id.is_null() => id.clone(),
            _ => Value::String(self.name.clone()),
        }
    }
}

/// Kind of an editable cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    /// Free text
    Text,
    /// Numeric input
    Number,
    /// Calendar date
    Date,
    /// Single remote-backed option
    Select,
    /// Several remote-backed options
    MultiSelect,
}

/// Value held by a cell draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    /// No value
    Empty,
    /// Text (null on the server reads as the empty string)
    Text(String),
    /// Number
    Number(f64),
    /// Date
    Date(NaiveDate),
    /// Chosen option
    Select(OptionItem),
    /// Chosen options, in selection order
    MultiSelect(Vec<OptionItem>),
}

impl CellValue {
    /// Decode a server field for a cell of `kind`
    ///
    /// # Errors
    /// `TypesError::ValueKind` / `TypesError::InvalidDate` when the JSON does
    /// not fit the kind.
    pub fn from_json(kind: CellKind, value: &Value) -> Result<Self, TypesError> {
        match (kind, value) {
            (CellKind::Text, Value::Null) => Ok(Self::Text(String::new())),
            (CellKind::Text, Value::String(s)) => Ok(Self::Text(s.clone())),
            (CellKind::Text, Value::Number(n)) => Ok(Self::Text(n.to_string())),
            (CellKind::Number, Value::Null) => Ok(Self::Empty),
            (CellKind::Number, Value::Number(n)) => n
                .as_f64()
                .map(Self::Number)
                .ok_or_else(|| TypesError::value_kind(kind, value)),
            (CellKind::Number, Value::String(s)) if s.trim().is_empty() => Ok(Self::Empty),
            (CellKind::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Self::Number)
                .map_err(|_| TypesError::value_kind(kind, value)),
            (CellKind::Date, Value::Null) => Ok(Self::Empty),
            (CellKind::Date, Value::String(s)) if s.is_empty() => Ok(Self::Empty),
            (CellKind::Date, Value::String(s)) => Self::parse_date(s),
            (CellKind::Select, Value::Null) => Ok(Self::Empty),
            (CellKind::Select, Value::Object(_)) => serde_json::from_value(value.clone())
                .map(Self::Select)
                .map_err(|_| TypesError::value_kind(kind, value)),
            (CellKind::Select, Value::String(s)) => Ok(Self::Select(OptionItem::named(s.clone()))),
            (CellKind::MultiSelect, Value::Null) => Ok(Self::MultiSelect(Vec::new())),
            (CellKind::MultiSelect, Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(OptionItem::named(s.clone())),
                    other => serde_json::from_value(other.clone())
                        .map_err(|_| TypesError::value_kind(kind, value)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::MultiSelect),
            _ => Err(TypesError::value_kind(kind, value)),
        }
    }

    /// Parse an ISO date cell value
    ///
    /// # Errors
    /// `TypesError::InvalidDate` if `s` is not `YYYY-MM-DD`
    pub fn parse_date(s: &str) -> Result<Self, TypesError> {
        // Date-time strings keep only their date part
        let date_part = s.split('T').next().unwrap_or(s);
        NaiveDate::parse_from_str(date_part, DATE_FORMAT)
            .map(Self::Date)
            .map_err(|_| TypesError::InvalidDate(s.to_string()))
    }

    /// JSON sent in a partial update
    #[must_use]
    pub fn to_patch_json(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::Text(s) => Value::String(s.clone()),
            Self::Number(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
            Self::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
            Self::Select(option) => option.value_key(),
            Self::MultiSelect(options) => {
                Value::Array(options.iter().map(OptionItem::value_key).collect())
            }
        }
    }

    /// Kind this value belongs to, if unambiguous
    #[must_use]
    pub fn kind(&self) -> Option<CellKind> {
        match self {
            Self::Empty => None,
            Self::Text(_) => Some(CellKind::Text),
            Self::Number(_) => Some(CellKind::Number),
            Self::Date(_) => Some(CellKind::Date),
            Self::Select(_) => Some(CellKind::Select),
            Self::MultiSelect(_) => Some(CellKind::MultiSelect),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_text_reads_as_empty_string() {
        assert_eq!(
            CellValue::from_json(CellKind::Text, &Value::Null).unwrap(),
            CellValue::Text(String::new())
        );
    }

    #[test]
    fn numbers_accept_numeric_strings() {
        assert_eq!(
            CellValue::from_json(CellKind::Number, &json!("12.5")).unwrap(),
            CellValue::Number(12.5)
        );
        assert!(CellValue::from_json(CellKind::Number, &json!("abc")).is_err());
    }

    #[test]
    fn dates_round_to_iso() {
        let value = CellValue::from_json(CellKind::Date, &json!("2024-03-01")).unwrap();
        assert_eq!(value.to_patch_json(), json!("2024-03-01"));
        assert!(CellValue::from_json(CellKind::Date, &json!("01/03/2024")).is_err());
    }

    #[test]
    fn select_patches_with_option_id() {
        let value = CellValue::from_json(CellKind::Select, &json!({"id": 4, "name": "Blood"})).unwrap();
        assert_eq!(value.to_patch_json(), json!(4));
    }

    #[test]
    fn multi_select_patches_with_ids_or_names() {
        let value = CellValue::from_json(
            CellKind::MultiSelect,
            &json!([{"id": 1, "name": "COI"}, "Cytb"]),
        )
        .unwrap();
        assert_eq!(value.to_patch_json(), json!([1, "Cytb"]));
    }

    #[test]
    fn mismatched_kind_is_rejected() {
        let err = CellValue::from_json(CellKind::Select, &json!(true)).unwrap_err();
        assert!(matches!(err, TypesError::ValueKind { kind: CellKind::Select, .. }));
    }
}
