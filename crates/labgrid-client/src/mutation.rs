//! Mutation seam

use crate::error::ClientResult;
use async_trait::async_trait;
use labgrid_types::RowId;
use serde_json::{Map, Value};
use std::fmt::Debug;

/// Writes against the backend
///
/// `endpoint` is a list endpoint such as `/api/samples/`; implementations
/// derive the bulk and detail paths from it.
#[async_trait]
pub trait MutationBackend: Send + Sync + Debug {
    /// `POST {endpoint}bulk/` with `body`
    async fn bulk_create(&self, endpoint: &str, body: Value) -> ClientResult<Value>;

    /// `POST {endpoint}bulk-delete/` with `{"ids": [...]}`
    async fn bulk_delete(&self, endpoint: &str, ids: &[RowId]) -> ClientResult<()>;

    /// `PATCH {endpoint}{id}/` with only the changed fields
    async fn patch(&self, endpoint: &str, id: RowId, fields: Map<String, Value>)
        -> ClientResult<Value>;

    /// `DELETE {endpoint}{id}/`
    async fn delete(&self, endpoint: &str, id: RowId) -> ClientResult<()>;

    /// `POST` a JSON body to an arbitrary path or URL
    async fn post_json(&self, url: &str, body: Value) -> ClientResult<Value>;
}
