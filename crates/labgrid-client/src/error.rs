//! Error types for backend requests
//!
//! Mirrors how a failed request can look from the client:
//! - no response at all (transport)
//! - a 4xx carrying the structured `{type, errors}` payload
//! - any other non-success status
//! - a success whose body could not be decoded

use labgrid_types::{ErrorPayload, FieldError};

/// Errors from backend requests
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// Request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// Structured validation failure
    #[error("validation failed ({status}): {}", .payload.messages().join("; "))]
    Validation {
        /// HTTP status
        status: u16,
        /// Decoded payload
        payload: ErrorPayload,
    },

    /// Non-success status without a structured payload
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Successful response with an unexpected body
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Mutating request attempted without a CSRF token
    #[error("CSRF token not configured")]
    MissingCsrfToken,

    /// Request could not be built
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Create status error
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Whether the error carries a structured payload
    #[inline]
    #[must_use]
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Field-level errors, empty unless structured
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation { payload, .. } => &payload.errors,
            _ => &[],
        }
    }

    /// HTTP status when a response was received
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Validation { status, .. } | Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Result type alias for backend requests
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display_joins_messages() {
        let err = ClientError::Validation {
            status: 400,
            payload: ErrorPayload::validation(vec![
                FieldError::new("year", "invalid", "must be numeric"),
                FieldError::new("species", "required", "This field is required."),
            ]),
        };
        assert_eq!(
            err.to_string(),
            "validation failed (400): year - must be numeric; species - This field is required."
        );
        assert!(err.is_structured());
        assert_eq!(err.field_errors().len(), 2);
    }

    #[test]
    fn status_error_has_no_field_errors() {
        let err = ClientError::status(500, "boom");
        assert!(!err.is_structured());
        assert!(err.field_errors().is_empty());
        assert_eq!(err.http_status(), Some(500));
    }
}
