//! Fetch cursor source

use crate::error::ClientResult;
use async_trait::async_trait;
use labgrid_types::{Cursor, Page, QueryIdentity};
use std::fmt::Debug;

/// Source of cursor-paginated pages
///
/// With `cursor == None` the first page of `identity` is returned; otherwise
/// the page the cursor points to. Implementations must not retry.
#[async_trait]
pub trait PageSource: Send + Sync + Debug {
    /// Fetch one page
    async fn fetch_page(
        &self,
        identity: &QueryIdentity,
        cursor: Option<&Cursor>,
    ) -> ClientResult<Page>;
}
