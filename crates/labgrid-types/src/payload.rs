//! Structured validation payload
//!
//! Backends reject invalid writes with
//! `{"type": "validation_error", "errors": [{"attr", "code", "detail"}]}`.
//! Entries are rendered verbatim, one message per entry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Attribute name used for errors not tied to one field
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// One field-level error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field the error belongs to
    #[serde(default)]
    pub attr: Option<String>,
    /// Machine-readable code
    pub code: String,
    /// Human-readable message
    pub detail: String,
}

impl FieldError {
    /// Create field error
    #[must_use]
    pub fn new(attr: impl Into<String>, code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            attr: Some(attr.into()),
            code: code.into(),
            detail: detail.into(),
        }
    }

    /// Whether the error names `field`
    #[must_use]
    pub fn concerns(&self, field: &str) -> bool {
        self.attr.as_deref() == Some(field)
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.attr.as_deref() {
            Some(attr) if attr != NON_FIELD_ERRORS && !attr.is_empty() => {
                write!(f, "{attr} - {}", self.detail)
            }
            _ => f.write_str(&self.detail),
        }
    }
}

/// Body of a structured 4xx response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error family (`validation_error`, `client_error`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Itemized errors
    pub errors: Vec<FieldError>,
}

impl ErrorPayload {
    /// Parse a response body; `None` when it is not structured
    #[must_use]
    pub fn from_body(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    /// Validation payload with the given entries
    #[must_use]
    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self {
            kind: "validation_error".to_string(),
            errors,
        }
    }

    /// Rendered message per entry
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Entries for one field
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
        self.errors.iter().filter(move |e| e.concerns(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_attr_and_detail() {
        let payload = ErrorPayload::from_body(
            r#"{"type":"validation_error","errors":[{"attr":"year","code":"invalid","detail":"must be numeric"}]}"#,
        )
        .unwrap();
        assert_eq!(payload.messages(), vec!["year - must be numeric".to_string()]);
        assert_eq!(payload.for_field("year").count(), 1);
    }

    #[test]
    fn non_field_errors_render_detail_only() {
        let err = FieldError {
            attr: Some(NON_FIELD_ERRORS.to_string()),
            code: "invalid".to_string(),
            detail: "order is locked".to_string(),
        };
        assert_eq!(err.to_string(), "order is locked");
    }

    #[test]
    fn unstructured_body_is_none() {
        assert!(ErrorPayload::from_body("<html>Server Error</html>").is_none());
        assert!(ErrorPayload::from_body(r#"{"detail":"Not found."}"#).is_none());
    }
}
