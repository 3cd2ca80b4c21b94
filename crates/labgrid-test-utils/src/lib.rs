//! Testing utilities for labgrid workspace
//!
//! [`FakeBackend`] implements every client seam in memory. It records each
//! request, serves scripted pages and options, fails on demand and can hold
//! a request open (see [`Gate`]) so in-flight behaviour is observable.

#![allow(missing_docs)]

use async_trait::async_trait;
use labgrid_client::{ClientError, ClientResult, MutationBackend, OptionSource, PageSource};
use labgrid_types::{Cursor, OptionItem, Page, QueryIdentity, Row, RowId};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Operation kinds, for scripting failures and holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Fetch,
    Search,
    BulkCreate,
    BulkDelete,
    Patch,
    Delete,
    Post,
}

/// A request as seen by the fake
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Fetch { key: String },
    Search { query_key: String, text: String },
    BulkCreate { endpoint: String, body: Value },
    BulkDelete { endpoint: String, ids: Vec<RowId> },
    Patch { endpoint: String, id: RowId, fields: Map<String, Value> },
    Delete { endpoint: String, id: RowId },
    Post { url: String, body: Value },
}

impl Request {
    /// Operation kind of this request
    pub fn op(&self) -> Op {
        match self {
            Self::Fetch { .. } => Op::Fetch,
            Self::Search { .. } => Op::Search,
            Self::BulkCreate { .. } => Op::BulkCreate,
            Self::BulkDelete { .. } => Op::BulkDelete,
            Self::Patch { .. } => Op::Patch,
            Self::Delete { .. } => Op::Delete,
            Self::Post { .. } => Op::Post,
        }
    }
}

#[derive(Debug)]
struct GateInner {
    entered: Semaphore,
    open: Semaphore,
}

/// Holds one request open until released
#[derive(Debug, Clone)]
pub struct Gate {
    inner: Arc<GateInner>,
}

impl Gate {
    fn new() -> Self {
        Self {
            inner: Arc::new(GateInner {
                entered: Semaphore::new(0),
                open: Semaphore::new(0),
            }),
        }
    }

    /// Wait until the held request has started
    pub async fn wait_entered(&self) {
        if let Ok(permit) = self.inner.entered.acquire().await {
            permit.forget();
        }
    }

    /// Let the held request complete
    pub fn release(&self) {
        self.inner.open.add_permits(1);
    }

    async fn pass(&self) {
        self.inner.entered.add_permits(1);
        if let Ok(permit) = self.inner.open.acquire().await {
            permit.forget();
        }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    pages: HashMap<String, Page>,
    options: HashMap<String, Vec<OptionItem>>,
    failures: HashMap<Op, VecDeque<ClientError>>,
    holds: HashMap<Op, VecDeque<Gate>>,
    requests: Vec<Request>,
}

/// In-memory backend
#[derive(Debug, Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    /// Empty backend: no pages, no options, nothing held
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve `page` for a first-page key (identity key) or cursor URL
    pub fn add_page(&self, key: &str, page: Page) {
        self.state.lock().pages.insert(key.to_string(), page);
    }

    /// Options returned by a source; filtered by case-insensitive substring
    pub fn set_options(&self, query_key: &str, options: Vec<OptionItem>) {
        self.state.lock().options.insert(query_key.to_string(), options);
    }

    /// Fail the next call of `op` with `error`
    pub fn fail_next(&self, op: Op, error: ClientError) {
        self.state.lock().failures.entry(op).or_default().push_back(error);
    }

    /// Hold the next call of `op` open until the returned gate is released
    pub fn hold(&self, op: Op) -> Gate {
        let gate = Gate::new();
        self.state.lock().holds.entry(op).or_default().push_back(gate.clone());
        gate
    }

    /// Option source reading the options set for `query_key`
    pub fn option_source(self: &Arc<Self>, query_key: &str) -> FakeOptionSource {
        FakeOptionSource {
            backend: Arc::clone(self),
            query_key: query_key.to_string(),
        }
    }

    /// Every request seen so far, in arrival order
    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().requests.clone()
    }

    /// Requests of one kind, in arrival order
    pub fn requests_of(&self, op: Op) -> Vec<Request> {
        self.requests().into_iter().filter(|r| r.op() == op).collect()
    }

    /// Number of page fetches
    pub fn fetch_count(&self) -> usize {
        self.requests_of(Op::Fetch).len()
    }

    /// Number of option searches
    pub fn search_count(&self) -> usize {
        self.requests_of(Op::Search).len()
    }

    /// Keys (identity or cursor) of every page fetch, in order
    pub fn fetched_keys(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::Fetch { key } => Some(key),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded requests; scripted pages and options stay
    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    async fn enter(&self, request: Request) -> ClientResult<()> {
        let op = request.op();
        let gate = {
            let mut state = self.state.lock();
            state.requests.push(request);
            state.holds.get_mut(&op).and_then(VecDeque::pop_front)
        };
        if let Some(gate) = gate {
            gate.pass().await;
        }
        match self.state.lock().failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PageSource for FakeBackend {
    async fn fetch_page(
        &self,
        identity: &QueryIdentity,
        cursor: Option<&Cursor>,
    ) -> ClientResult<Page> {
        let key = cursor.map_or_else(|| identity.key().to_string(), |c| c.as_str().to_string());
        self.enter(Request::Fetch { key: key.clone() }).await?;
        self.state
            .lock()
            .pages
            .get(&key)
            .cloned()
            .ok_or_else(|| ClientError::status(404, format!("no page for {key}")))
    }
}

#[async_trait]
impl MutationBackend for FakeBackend {
    async fn bulk_create(&self, endpoint: &str, body: Value) -> ClientResult<Value> {
        self.enter(Request::BulkCreate {
            endpoint: endpoint.to_string(),
            body,
        })
        .await?;
        Ok(json!({"success": true}))
    }

    async fn bulk_delete(&self, endpoint: &str, ids: &[RowId]) -> ClientResult<()> {
        self.enter(Request::BulkDelete {
            endpoint: endpoint.to_string(),
            ids: ids.to_vec(),
        })
        .await
    }

    async fn patch(
        &self,
        endpoint: &str,
        id: RowId,
        fields: Map<String, Value>,
    ) -> ClientResult<Value> {
        let mut body = fields.clone();
        body.insert("id".into(), json!(id));
        self.enter(Request::Patch {
            endpoint: endpoint.to_string(),
            id,
            fields,
        })
        .await?;
        Ok(Value::Object(body))
    }

    async fn delete(&self, endpoint: &str, id: RowId) -> ClientResult<()> {
        self.enter(Request::Delete {
            endpoint: endpoint.to_string(),
            id,
        })
        .await
    }

    async fn post_json(&self, url: &str, body: Value) -> ClientResult<Value> {
        self.enter(Request::Post {
            url: url.to_string(),
            body,
        })
        .await?;
        Ok(json!({"success": true}))
    }
}

/// Option source served by a [`FakeBackend`]
#[derive(Debug, Clone)]
pub struct FakeOptionSource {
    backend: Arc<FakeBackend>,
    query_key: String,
}

#[async_trait]
impl OptionSource for FakeOptionSource {
    fn query_key(&self) -> &str {
        &self.query_key
    }

    async fn search(&self, text: &str) -> ClientResult<Vec<OptionItem>> {
        self.backend
            .enter(Request::Search {
                query_key: self.query_key.clone(),
                text: text.to_string(),
            })
            .await?;
        let needle = text.to_lowercase();
        Ok(self
            .backend
            .state
            .lock()
            .options
            .get(&self.query_key)
            .map(|all| {
                all.iter()
                    .filter(|o| o.name.to_lowercase().contains(&needle))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Row with the given id and extra fields
pub fn row(id: u64, fields: Value) -> Row {
    let mut object = match fields {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    object.insert("id".into(), json!(id));
    Row::from_object(object).unwrap()
}

/// Page of bare rows
pub fn page(ids: &[u64], next: Option<&str>) -> Page {
    Page::new(
        ids.iter().map(|id| row(*id, json!({}))).collect(),
        next.map(Cursor::new),
    )
}

/// Sample row as served by `/api/samples/`
pub fn sample_row(id: u64, year: u64) -> Row {
    row(
        id,
        json!({
            "guid": format!("guid-{id}"),
            "name": format!("sample-{id}"),
            "year": year,
            "notes": null,
            "species": {"id": 1, "name": "Ursus arctos"},
            "type": {"id": 2, "name": "Blood"},
            "location": null,
            "markers": [],
        }),
    )
}
