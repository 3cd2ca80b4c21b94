//! reqwest-backed implementation of the client seams

use crate::endpoints;
use crate::error::{ClientError, ClientResult};
use crate::mutation::MutationBackend;
use crate::options::{OptionField, OptionRegistry, OptionSource};
use crate::source::PageSource;
use async_trait::async_trait;
use labgrid_types::{Cursor, ErrorPayload, GridConfig, OptionItem, Page, QueryIdentity, RowId};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Header carrying the CSRF token
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// HTTP backend for one session
///
/// Cheap to clone; clones share the connection pool and configuration.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: Arc<GridConfig>,
}

impl HttpBackend {
    /// Create backend from session configuration
    ///
    /// # Errors
    /// `ClientError::InvalidRequest` if the HTTP client cannot be built
    pub fn new(config: Arc<GridConfig>) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ClientError::InvalidRequest(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Session configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Option source for one field
    #[must_use]
    pub fn option_source(&self, field: OptionField) -> HttpOptionSource {
        HttpOptionSource {
            backend: self.clone(),
            field,
        }
    }

    /// Registry with every known option field under its column name
    #[must_use]
    pub fn option_registry(&self) -> OptionRegistry {
        let mut registry = OptionRegistry::new();
        for field in OptionField::ALL {
            registry.register(field.column(), Arc::new(self.option_source(field)));
        }
        registry
    }

    fn csrf_token(&self) -> ClientResult<&str> {
        self.config
            .csrf_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ClientError::MissingCsrfToken)
    }

    fn mutating(&self, request: RequestBuilder) -> ClientResult<RequestBuilder> {
        Ok(request.header(CSRF_HEADER, self.csrf_token()?))
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, "request failed without response");
            ClientError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            if let Some(payload) = ErrorPayload::from_body(&body) {
                tracing::debug!(status = status.as_u16(), errors = payload.errors.len(), "structured error response");
                return Err(ClientError::Validation {
                    status: status.as_u16(),
                    payload,
                });
            }
        }
        tracing::warn!(status = status.as_u16(), "unstructured error response");
        Err(ClientError::status(status.as_u16(), body))
    }

    async fn json_body(response: Response) -> ClientResult<Value> {
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn search_field(&self, field: OptionField, text: &str) -> ClientResult<Vec<OptionItem>> {
        let url = self.config.url(&field.search_path(&self.config, text));
        tracing::debug!(%url, "searching options");
        let response = self.send(self.client.get(&url)).await?;
        let body: OptionsBody = response.json().await?;
        Ok(body.into_items())
    }
}

#[async_trait]
impl PageSource for HttpBackend {
    async fn fetch_page(
        &self,
        identity: &QueryIdentity,
        cursor: Option<&Cursor>,
    ) -> ClientResult<Page> {
        let url = match cursor {
            Some(cursor) => self.config.url(cursor.as_str()),
            None => self.config.url(identity.key()),
        };
        tracing::debug!(identity = %identity, %url, "fetching page");

        let response = self.send(self.client.get(&url)).await?;
        let page: Page = response.json().await?;
        Ok(page)
    }
}

#[async_trait]
impl MutationBackend for HttpBackend {
    async fn bulk_create(&self, endpoint: &str, body: Value) -> ClientResult<Value> {
        let url = self.config.url(&endpoints::bulk(endpoint));
        let request = self.mutating(self.client.post(&url).json(&body))?;
        Self::json_body(self.send(request).await?).await
    }

    async fn bulk_delete(&self, endpoint: &str, ids: &[RowId]) -> ClientResult<()> {
        let url = self.config.url(&endpoints::bulk_delete(endpoint));
        let request = self.mutating(self.client.post(&url).json(&json!({ "ids": ids })))?;
        self.send(request).await?;
        Ok(())
    }

    async fn patch(
        &self,
        endpoint: &str,
        id: RowId,
        fields: Map<String, Value>,
    ) -> ClientResult<Value> {
        let url = self.config.url(&endpoints::detail(endpoint, id));
        let request = self.mutating(self.client.patch(&url).json(&fields))?;
        Self::json_body(self.send(request).await?).await
    }

    async fn delete(&self, endpoint: &str, id: RowId) -> ClientResult<()> {
        let url = self.config.url(&endpoints::detail(endpoint, id));
        let request = self.mutating(self.client.delete(&url))?;
        self.send(request).await?;
        Ok(())
    }

    async fn post_json(&self, url: &str, body: Value) -> ClientResult<Value> {
        let url = self.config.url(url);
        let request = self.mutating(self.client.post(&url).json(&body))?;
        Self::json_body(self.send(request).await?).await
    }
}

/// Option endpoints answer with a bare array; tolerate a page envelope too.
#[derive(Deserialize)]
#[serde(untagged)]
enum OptionsBody {
    List(Vec<OptionItem>),
    Page { results: Vec<OptionItem> },
}

impl OptionsBody {
    fn into_items(self) -> Vec<OptionItem> {
        match self {
            Self::List(items) | Self::Page { results: items } => items,
        }
    }
}

/// [`OptionSource`] for one [`OptionField`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpOptionSource {
    backend: HttpBackend,
    field: OptionField,
}

impl HttpOptionSource {
    /// Field searched by this source
    #[inline]
    #[must_use]
    pub fn field(&self) -> OptionField {
        self.field
    }
}

#[async_trait]
impl OptionSource for HttpOptionSource {
    fn query_key(&self) -> &str {
        self.field.query_key()
    }

    async fn search(&self, text: &str) -> ClientResult<Vec<OptionItem>> {
        self.backend.search_field(self.field, text).await
    }
}
