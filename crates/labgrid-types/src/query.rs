//! Query identities and filter sets
//!
//! A [`QueryIdentity`] scopes one cached collection: the endpoint, fixed
//! parameters, the user's [`FilterSet`] and repeatable extra parameters
//! (`markers=`). Two identities are equal iff their serialized keys are equal,
//! and the key doubles as the first-page request path.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

/// Lookup applied to a filtered field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    /// `field=value`
    Exact,
    /// `field__icontains=value`
    IContains,
    /// `field__istartswith=value`
    IStartsWith,
    /// `field__in=a,b,c`
    In,
    /// `field__not=value`
    Not,
}

impl FilterOp {
    /// Query-parameter suffix for this lookup
    #[inline]
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Exact => "",
            Self::IContains => "__icontains",
            Self::IStartsWith => "__istartswith",
            Self::In => "__in",
            Self::Not => "__not",
        }
    }

    /// Split a parameter name into field and lookup
    #[must_use]
    pub fn split(param: &str) -> (&str, FilterOp) {
        for op in [Self::IContains, Self::IStartsWith, Self::In, Self::Not] {
            if let Some(field) = param.strip_suffix(op.suffix()) {
                if !field.is_empty() {
                    return (field, op);
                }
            }
        }
        (param, Self::Exact)
    }
}

/// Filter value: a scalar or a list (for `__in`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Single value
    One(String),
    /// Comma-joined list
    Many(Vec<String>),
}

impl FilterValue {
    /// Whether the value would serialize to nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(v) => v.trim().is_empty(),
            Self::Many(vs) => vs.iter().all(|v| v.trim().is_empty()),
        }
    }

    fn render(&self) -> String {
        match self {
            Self::One(v) => v.trim().to_string(),
            Self::Many(vs) => vs
                .iter()
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

/// User-chosen filters, serialized in parameter-name order
///
/// Empty values are never stored; inserting one removes the parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterSet {
    entries: BTreeMap<String, FilterValue>,
}

impl FilterSet {
    /// Empty filter set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field` with lookup `op`
    pub fn insert(&mut self, field: &str, op: FilterOp, value: impl Into<FilterValue>) {
        self.insert_raw(format!("{field}{}", op.suffix()), value);
    }

    /// Set a parameter by its full name (`name__istartswith`)
    pub fn insert_raw(&mut self, param: impl Into<String>, value: impl Into<FilterValue>) {
        let param = param.into();
        let value = value.into();
        if value.is_empty() {
            self.entries.remove(&param);
        } else {
            self.entries.insert(param, value);
        }
    }

    /// Builder form of [`FilterSet::insert`]
    #[must_use]
    pub fn with(mut self, field: &str, op: FilterOp, value: impl Into<FilterValue>) -> Self {
        self.insert(field, op, value);
        self
    }

    /// Remove a parameter by its full name
    pub fn remove(&mut self, param: &str) -> Option<FilterValue> {
        self.entries.remove(param)
    }

    /// Value of a parameter by its full name
    #[must_use]
    pub fn get(&self, param: &str) -> Option<&FilterValue> {
        self.entries.get(param)
    }

    /// Whether no filter is set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of parameters
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `(param, rendered value)` pairs in serialization order
    pub fn pairs(&self) -> impl Iterator<Item = (&str, String)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.render()))
    }
}

/// Key scoping one cached collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryIdentity {
    endpoint: String,
    params: Vec<(String, String)>,
    filters: FilterSet,
    extra: Vec<(String, String)>,
    key: String,
}

impl QueryIdentity {
    /// Identity of an unfiltered endpoint
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        let mut identity = Self {
            endpoint: endpoint.into(),
            params: Vec::new(),
            filters: FilterSet::new(),
            extra: Vec::new(),
            key: String::new(),
        };
        identity.rebuild_key();
        identity
    }

    /// Add a fixed parameter (emitted before the filters)
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self.rebuild_key();
        self
    }

    /// Replace the filter set
    #[must_use]
    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self.rebuild_key();
        self
    }

    /// Add a repeatable extra parameter (emitted after the filters)
    #[must_use]
    pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self.rebuild_key();
        self
    }

    /// Drop every extra parameter named `name`
    #[must_use]
    pub fn without_extra(mut self, name: &str) -> Self {
        self.extra.retain(|(k, _)| k != name);
        self.rebuild_key();
        self
    }

    /// Endpoint path
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Current filters
    #[inline]
    #[must_use]
    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// Serialized form; also the path of the first page
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether this identity lists `endpoint`
    #[inline]
    #[must_use]
    pub fn is_for_endpoint(&self, endpoint: &str) -> bool {
        self.endpoint == endpoint
    }

    fn rebuild_key(&mut self) {
        let fixed = self.params.iter().map(|(k, v)| (k.as_str(), v.clone()));
        let extra = self.extra.iter().map(|(k, v)| (k.as_str(), v.clone()));
        let query = fixed
            .chain(self.filters.pairs())
            .chain(extra)
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{}={}", encode(k), encode(&v)))
            .collect::<Vec<_>>()
            .join("&");

        self.key = if query.is_empty() {
            self.endpoint.clone()
        } else {
            format!("{}?{}", self.endpoint, query)
        };
    }
}

impl PartialEq for QueryIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for QueryIdentity {}

impl Hash for QueryIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for QueryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}
