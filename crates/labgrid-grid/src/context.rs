//! Session context
//!
//! One [`GridContext`] is built per session from the explicit
//! [`GridConfig`] and handed to every table, form and widget. It owns the
//! process-wide caches, so every table keyed to the same identity shares
//! one collection.

use crate::error::{GridError, GridResult};
use crate::mutation::MutationCoordinator;
use crate::notify::NotificationCenter;
use crate::select::RemoteSelect;
use crate::staff::StaffAssignment;
use crate::table::{TableKind, TableSession};
use labgrid_cache::{InfiniteCollectionCache, OptionCache};
use labgrid_client::{HttpBackend, MutationBackend, OptionRegistry, PageSource};
use labgrid_types::{GridConfig, OptionItem};
use std::sync::Arc;

/// Shared components of one session
#[derive(Debug, Clone)]
pub struct GridContext {
    config: Arc<GridConfig>,
    cache: Arc<InfiniteCollectionCache>,
    options: OptionCache,
    registry: OptionRegistry,
    coordinator: Arc<MutationCoordinator>,
}

impl GridContext {
    /// Assemble a context from its seams
    #[must_use]
    pub fn new(
        config: Arc<GridConfig>,
        pages: Arc<dyn PageSource>,
        mutations: Arc<dyn MutationBackend>,
        registry: OptionRegistry,
    ) -> Self {
        let cache = Arc::new(InfiniteCollectionCache::new(pages));
        let notifications = Arc::new(NotificationCenter::new(config.notification_ttl()));
        let coordinator = Arc::new(MutationCoordinator::new(
            mutations,
            Arc::clone(&cache),
            notifications,
        ));
        Self {
            options: OptionCache::from_config(&config),
            config,
            cache,
            registry,
            coordinator,
        }
    }

    /// Context talking to the configured backend over HTTP
    ///
    /// # Errors
    /// `GridError::Client` if the HTTP client could not be built
    pub fn http(config: GridConfig) -> GridResult<Self> {
        let config = Arc::new(config);
        let backend = Arc::new(HttpBackend::new(Arc::clone(&config))?);
        let registry = backend.option_registry();
        Ok(Self::new(config, backend.clone(), backend, registry))
    }

    /// Session configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &Arc<GridConfig> {
        &self.config
    }

    /// Collection cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<InfiniteCollectionCache> {
        &self.cache
    }

    /// Option cache
    #[inline]
    #[must_use]
    pub fn options(&self) -> &OptionCache {
        &self.options
    }

    /// Option sources by column
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &OptionRegistry {
        &self.registry
    }

    /// Mutation coordinator
    #[inline]
    #[must_use]
    pub fn coordinator(&self) -> &Arc<MutationCoordinator> {
        &self.coordinator
    }

    /// Notification center
    #[inline]
    #[must_use]
    pub fn notifications(&self) -> &Arc<NotificationCenter> {
        self.coordinator.notifications()
    }

    /// Table session of `kind`
    #[must_use]
    pub fn table(&self, kind: TableKind) -> TableSession {
        TableSession::new(kind, self.clone())
    }

    /// Select input for `column`
    ///
    /// # Errors
    /// `GridError::NoOptionSource` if no source backs the column
    pub fn select(&self, column: &str) -> GridResult<RemoteSelect> {
        let source = self
            .registry
            .get(column)
            .ok_or_else(|| GridError::NoOptionSource(column.to_string()))?;
        Ok(RemoteSelect::new(source, self.options.clone()))
    }

    /// Options for `column` matching `text`, through the option cache
    ///
    /// # Errors
    /// - `GridError::NoOptionSource` if no source backs the column
    /// - `GridError::Cache` if the search failed
    pub async fn search_options(&self, column: &str, text: &str) -> GridResult<Arc<Vec<OptionItem>>> {
        let source = self
            .registry
            .get(column)
            .ok_or_else(|| GridError::NoOptionSource(column.to_string()))?;
        Ok(self.options.search(source.as_ref(), text).await?)
    }

    /// Staff assignment form posting to `update_url`
    #[must_use]
    pub fn staff_assignment(&self, update_url: impl Into<String>) -> StaffAssignment {
        StaffAssignment::new(update_url, Arc::clone(self.coordinator.backend()))
    }
}
