//! Cursor-paginated list envelope

use crate::row::Row;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque pointer to the next page (a full URL as issued by the backend)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(pub String);

impl Cursor {
    /// Create cursor from URL
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Cursor URL
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of a list endpoint
///
/// `next` is `None` exactly when this is the last page for its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Rows in server order
    pub results: Vec<Row>,
    /// Cursor of the following page
    #[serde(default)]
    pub next: Option<Cursor>,
}

impl Page {
    /// Create page
    #[inline]
    #[must_use]
    pub fn new(results: Vec<Row>, next: Option<Cursor>) -> Self {
        Self { results, next }
    }

    /// Whether no page follows this one
    #[inline]
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_decodes_envelope() {
        let page: Page = serde_json::from_value(json!({
            "next": "http://host/api/samples/?cursor=abc",
            "previous": null,
            "results": [{"id": 1}, {"id": 2}]
        }))
        .unwrap();

        assert_eq!(page.results.len(), 2);
        assert_eq!(
            page.next.as_ref().map(Cursor::as_str),
            Some("http://host/api/samples/?cursor=abc")
        );
        assert!(!page.is_last());
    }

    #[test]
    fn null_next_marks_last_page() {
        let page: Page = serde_json::from_value(json!({"results": [], "next": null})).unwrap();
        assert!(page.is_last());
    }
}
