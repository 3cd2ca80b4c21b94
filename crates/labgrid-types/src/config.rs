//! Session configuration
//!
//! One [`GridConfig`] is built at session start and passed by reference (or
//! `Arc`) to every component that needs the order id, CSRF token or feature
//! flags. Sources:
//! - the page-embedded initial-data JSON ([`GridConfig::from_initial_data`])
//! - a TOML file ([`GridConfig::load`])
//! - builder methods on [`GridConfig::default`]

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("io error reading {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML
    #[error("invalid toml: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed initial-data JSON
    #[error("invalid initial data: {0}")]
    Json(#[from] serde_json::Error),

    /// Value out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Feature flags selecting form/table variants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    /// Sample registration requires one GUID per sample
    pub needs_guid: bool,
}

/// Per-session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Backend origin
    pub base_url: String,
    /// Order the sample tables are scoped to
    pub order: Option<u64>,
    /// Analysis order scoping marker search
    pub analysis_order: Option<u64>,
    /// Token sent as `X-CSRFToken` on mutating requests
    pub csrf_token: Option<String>,
    /// Feature flags
    pub features: Features,
    /// Near-bottom distance triggering `load_more`
    pub scroll_threshold_px: f64,
    /// Success notification lifetime
    pub notification_ttl_ms: u64,
    /// Option list freshness window
    pub option_cache_ttl_ms: u64,
    /// Maximum cached option lists
    pub option_cache_capacity: u64,
    /// HTTP request timeout
    pub request_timeout_ms: u64,
}

impl GridConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With backend origin
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// With order id
    #[inline]
    #[must_use]
    pub fn with_order(mut self, order: u64) -> Self {
        self.order = Some(order);
        self
    }

    /// With analysis order id
    #[inline]
    #[must_use]
    pub fn with_analysis_order(mut self, analysis_order: u64) -> Self {
        self.analysis_order = Some(analysis_order);
        self
    }

    /// With CSRF token
    #[inline]
    #[must_use]
    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    /// With feature flags
    #[inline]
    #[must_use]
    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    /// With notification lifetime
    #[inline]
    #[must_use]
    pub fn with_notification_ttl(mut self, ttl: Duration) -> Self {
        self.notification_ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Build from the page-embedded initial-data object
    ///
    /// # Errors
    /// `ConfigError::Json` if the text is not the expected object
    pub fn from_initial_data(json: &str) -> Result<Self, ConfigError> {
        let data: InitialData = serde_json::from_str(json)?;
        Ok(data.into_config(Self::default()))
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// `ConfigError::Toml` on syntax errors, `ConfigError::Invalid` on
    /// out-of-range values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    ///
    /// # Errors
    /// See [`GridConfig::from_toml_str`]; `ConfigError::Io` if unreadable
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".into()));
        }
        if !(self.scroll_threshold_px.is_finite() && self.scroll_threshold_px >= 0.0) {
            return Err(ConfigError::Invalid(
                "scroll_threshold_px must be a non-negative number".into(),
            ));
        }
        if self.option_cache_capacity == 0 {
            return Err(ConfigError::Invalid("option_cache_capacity must be > 0".into()));
        }
        Ok(())
    }

    /// Notification lifetime
    #[inline]
    #[must_use]
    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }

    /// Option cache freshness window
    #[inline]
    #[must_use]
    pub fn option_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.option_cache_ttl_ms)
    }

    /// HTTP request timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Absolute URL for a path or pass-through for absolute URLs
    #[must_use]
    pub fn url(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                path_or_url.trim_start_matches('/')
            )
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            order: None,
            analysis_order: None,
            csrf_token: None,
            features: Features::default(),
            scroll_threshold_px: 500.0,
            notification_ttl_ms: 5_000,
            option_cache_ttl_ms: 30_000,
            option_cache_capacity: 1_000,
            request_timeout_ms: 30_000,
        }
    }
}

/// Page-embedded initial data (`{"order": 1, "csrf": "...", "needs_guid": true}`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitialData {
    /// Order id
    #[serde(default)]
    pub order: Option<u64>,
    /// Analysis order id
    #[serde(default)]
    pub analysis_order: Option<u64>,
    /// CSRF token
    #[serde(default)]
    pub csrf: Option<String>,
    /// GUID requirement flag
    #[serde(default)]
    pub needs_guid: bool,
}

impl InitialData {
    /// Overlay onto `base`
    #[must_use]
    pub fn into_config(self, mut base: GridConfig) -> GridConfig {
        base.order = self.order.or(base.order);
        base.analysis_order = self.analysis_order.or(base.analysis_order);
        base.csrf_token = self.csrf.or(base.csrf_token);
        base.features.needs_guid = self.needs_guid;
        base
    }
}
