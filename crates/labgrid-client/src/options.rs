//! Remote option sources
//!
//! Select cells and filter fields load their choices from small autocomplete
//! endpoints. Each field is described by an [`OptionField`] variant; any
//! [`OptionSource`] implementation can back it, and an [`OptionRegistry`]
//! maps column names to sources.

use crate::endpoints;
use crate::error::ClientResult;
use async_trait::async_trait;
use labgrid_types::{FilterOp, FilterSet, GridConfig, OptionItem, QueryIdentity};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Capability: search options by free text
#[async_trait]
pub trait OptionSource: Send + Sync + Debug {
    /// Cache namespace for results of this source
    fn query_key(&self) -> &str;

    /// Options matching `text` (empty text lists the defaults)
    async fn search(&self, text: &str) -> ClientResult<Vec<OptionItem>>;
}

/// Option-backed fields known to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionField {
    /// Species, searched by name substring
    Species,
    /// Sample types, searched by name substring
    SampleType,
    /// Locations, searched by name substring
    Location,
    /// Markers of an analysis order, searched by name prefix
    Marker,
}

impl OptionField {
    /// Every field
    pub const ALL: [OptionField; 4] = [
        OptionField::Species,
        OptionField::SampleType,
        OptionField::Location,
        OptionField::Marker,
    ];

    /// Cache namespace
    #[must_use]
    pub fn query_key(self) -> &'static str {
        match self {
            Self::Species => "species",
            Self::SampleType => "sample-types",
            Self::Location => "locations",
            Self::Marker => "markers",
        }
    }

    /// List endpoint
    #[must_use]
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Species => endpoints::SPECIES,
            Self::SampleType => endpoints::SAMPLE_TYPES,
            Self::Location => endpoints::LOCATIONS,
            Self::Marker => endpoints::MARKERS,
        }
    }

    /// Lookup applied to the search text
    #[must_use]
    pub fn lookup(self) -> FilterOp {
        match self {
            Self::Marker => FilterOp::IStartsWith,
            _ => FilterOp::IContains,
        }
    }

    /// Column name this field usually backs
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Self::Species => "species",
            Self::SampleType => "type",
            Self::Location => "location",
            Self::Marker => "markers",
        }
    }

    /// Parse from a column or query-key name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.column() == name || f.query_key() == name)
    }

    /// Request path for a search
    ///
    /// Empty text omits the lookup parameter. Markers are scoped to the
    /// session's analysis order when one is configured.
    #[must_use]
    pub fn search_path(self, config: &GridConfig, text: &str) -> String {
        let mut identity = QueryIdentity::new(self.endpoint());
        if self == Self::Marker {
            if let Some(order) = config.analysis_order {
                identity = identity.with_param("analysis_order", order.to_string());
            }
        }
        identity
            .with_filters(FilterSet::new().with("name", self.lookup(), text))
            .key()
            .to_string()
    }
}

/// Column name to option source mapping
#[derive(Debug, Clone, Default)]
pub struct OptionRegistry {
    sources: HashMap<String, Arc<dyn OptionSource>>,
}

impl OptionRegistry {
    /// Empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source for `column`
    pub fn register(&mut self, column: impl Into<String>, source: Arc<dyn OptionSource>) {
        self.sources.insert(column.into(), source);
    }

    /// Source for `column`
    #[must_use]
    pub fn get(&self, column: &str) -> Option<Arc<dyn OptionSource>> {
        self.sources.get(column).cloned()
    }

    /// Registered column names
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }
}
