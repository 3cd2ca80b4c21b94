//! Table sessions
//!
//! The sample tables of the application differ only in endpoint, fixed
//! parameters, columns and the bulk actions they offer. [`TableKind`]
//! captures those differences; [`TableSession`] is the one implementation
//! driving any of them:
//!
//! ```text
//! mount ─▶ load ─▶ on_scroll ─▶ load_more ─▶ reconcile drafts
//!                      │
//! set_filters ─▶ new identity (old pages dropped, selection cleared)
//!
//! edit ─▶ blur ─▶ PATCH ─▶ invalidate endpoint ─▶ load refetches page one
//! ```

use crate::cell::{CellKey, CommitError, DraftBook, EditableCell};
use crate::context::GridContext;
use crate::error::{GridError, GridResult};
use crate::form::FormError;
use crate::scroll::{should_load_more, ScrollMetrics};
use crate::selection::{HeaderState, SelectionModel};
use labgrid_cache::{CollectionView, LoadOutcome};
use labgrid_client::endpoints;
use labgrid_types::{CellKind, CellValue, FilterOp, FilterSet, GridConfig, OptionItem, QueryIdentity, RowId};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Column of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Dotted path into the row
    pub path: &'static str,
    /// Header label
    pub header: &'static str,
    /// Editor kind; `None` for read-only columns
    pub editor: Option<CellKind>,
}

const fn read_only(path: &'static str, header: &'static str) -> Column {
    Column {
        path,
        header,
        editor: None,
    }
}

const fn editable(path: &'static str, header: &'static str, kind: CellKind) -> Column {
    Column {
        path,
        header,
        editor: Some(kind),
    }
}

const SAMPLE_COLUMNS: &[Column] = &[
    read_only("genlab_id", "Genlab ID"),
    editable("guid", "GUID", CellKind::Text),
    editable("name", "Name", CellKind::Text),
    editable("species", "Species", CellKind::Select),
    editable("type", "Sample Type", CellKind::Select),
    editable("location", "Location", CellKind::Select),
    editable("year", "Year", CellKind::Number),
    editable("pop_id", "Pop ID", CellKind::Text),
    editable("notes", "Notes", CellKind::Text),
];

const MARKER_ANALYSIS_COLUMNS: &[Column] = &[
    read_only("sample.genlab_id", "Genlab ID"),
    read_only("marker", "Marker"),
    read_only("sample.guid", "GUID"),
    read_only("sample.name", "Name"),
    read_only("sample.species.name", "Species"),
    read_only("sample.type.name", "Sample Type"),
    read_only("sample.location.name", "Location"),
    read_only("sample.year", "Year"),
];

const ANALYSIS_SAMPLE_COLUMNS: &[Column] = &[
    read_only("genlab_id", "Genlab ID"),
    read_only("guid", "GUID"),
    read_only("name", "Name"),
    read_only("species.name", "Species"),
    read_only("type.name", "Sample Type"),
    read_only("location.name", "Location"),
    read_only("year", "Year"),
    read_only("order", "Order"),
];

/// Table presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    /// Samples of the session's order, editable inline
    Samples,
    /// Marker analyses of the session's order
    SampleMarkerAnalysis,
    /// Samples of submitted orders, filtered and selected to add markers
    AnalysisSamples,
}

impl TableKind {
    /// Every preset
    pub const ALL: [TableKind; 3] = [
        TableKind::Samples,
        TableKind::SampleMarkerAnalysis,
        TableKind::AnalysisSamples,
    ];

    /// CLI name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Samples => "samples",
            Self::SampleMarkerAnalysis => "marker-analysis",
            Self::AnalysisSamples => "analysis-samples",
        }
    }

    /// Parse a CLI name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// List endpoint
    #[must_use]
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Samples | Self::AnalysisSamples => endpoints::SAMPLES,
            Self::SampleMarkerAnalysis => endpoints::SAMPLE_MARKER_ANALYSIS,
        }
    }

    /// Columns in display order
    #[must_use]
    pub fn columns(self) -> &'static [Column] {
        match self {
            Self::Samples => SAMPLE_COLUMNS,
            Self::SampleMarkerAnalysis => MARKER_ANALYSIS_COLUMNS,
            Self::AnalysisSamples => ANALYSIS_SAMPLE_COLUMNS,
        }
    }

    /// Editor kind of `field`, if editable here
    #[must_use]
    pub fn editor(self, field: &str) -> Option<CellKind> {
        self.columns()
            .iter()
            .find(|c| c.path == field)
            .and_then(|c| c.editor)
    }

    /// Whether rows carry a selection checkbox
    #[inline]
    #[must_use]
    pub fn is_selectable(self) -> bool {
        !matches!(self, Self::Samples)
    }

    /// Whether selected rows can be bulk deleted
    #[inline]
    #[must_use]
    pub fn supports_bulk_delete(self) -> bool {
        matches!(self, Self::SampleMarkerAnalysis)
    }

    /// Whether rows carry a delete button
    #[inline]
    #[must_use]
    pub fn supports_row_delete(self) -> bool {
        matches!(self, Self::Samples)
    }

    /// Whether markers can be applied to selected rows
    #[inline]
    #[must_use]
    pub fn supports_markers(self) -> bool {
        matches!(self, Self::AnalysisSamples)
    }

    /// Query identity for the given filters and markers
    #[must_use]
    pub fn identity(self, config: &GridConfig, filters: &FilterSet, markers: &[String]) -> QueryIdentity {
        let mut identity = QueryIdentity::new(self.endpoint());
        match self {
            Self::Samples | Self::SampleMarkerAnalysis => {
                if let Some(order) = config.order {
                    identity = identity.with_param("order", order.to_string());
                }
            }
            Self::AnalysisSamples => {
                identity = identity.with_param(format!("order__status{}", FilterOp::Not.suffix()), "draft");
            }
        }
        identity = identity.with_filters(filters.clone());
        for marker in markers {
            identity = identity.with_extra("markers", marker.clone());
        }
        identity
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of blurring a cell
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Draft matched the baseline; nothing was sent
    Unchanged,
    /// Update accepted
    Saved,
    /// Update rejected; the draft is kept
    Failed(CommitError),
}

/// One mounted table
#[derive(Debug)]
pub struct TableSession {
    kind: TableKind,
    context: GridContext,
    filters: RwLock<FilterSet>,
    markers: RwLock<Vec<String>>,
    identity: RwLock<QueryIdentity>,
    selection: Mutex<SelectionModel>,
    drafts: DraftBook,
}

impl TableSession {
    /// Mount a table with no filters
    #[must_use]
    pub fn new(kind: TableKind, context: GridContext) -> Self {
        let identity = kind.identity(context.config(), &FilterSet::new(), &[]);
        Self {
            kind,
            context,
            filters: RwLock::new(FilterSet::new()),
            markers: RwLock::new(Vec::new()),
            identity: RwLock::new(identity),
            selection: Mutex::new(SelectionModel::new()),
            drafts: DraftBook::new(),
        }
    }

    /// Preset
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TableKind {
        self.kind
    }

    /// Current query identity
    #[must_use]
    pub fn identity(&self) -> QueryIdentity {
        self.identity.read().clone()
    }

    /// Replace the filters; returns whether the identity changed
    ///
    /// A new identity drops the old pages, clears the selection and
    /// unmounts every draft.
    pub fn set_filters(&self, filters: FilterSet) -> bool {
        *self.filters.write() = filters;
        self.switch_identity()
    }

    /// Replace the marker filter; returns whether the identity changed
    pub fn set_markers(&self, markers: Vec<String>) -> bool {
        *self.markers.write() = markers;
        self.switch_identity()
    }

    /// Current rows and loading flags, loading the first page if needed
    ///
    /// # Errors
    /// `GridError::Cache` if the first page could not be fetched
    pub async fn load(&self) -> GridResult<CollectionView> {
        let identity = self.identity();
        let view = self.context.cache().query(&identity).await?;
        self.drafts.reconcile(view.rows());
        Ok(view)
    }

    /// Load, then check once whether the viewport needs another page
    ///
    /// # Errors
    /// `GridError::Cache` if a fetch failed
    pub async fn mount(&self, metrics: ScrollMetrics) -> GridResult<CollectionView> {
        self.load().await?;
        self.on_scroll(metrics).await?;
        Ok(self.view())
    }

    /// Snapshot without fetching
    #[must_use]
    pub fn view(&self) -> CollectionView {
        self.context.cache().snapshot(&self.identity())
    }

    /// Scroll event; loads the next page when near the bottom
    ///
    /// Returns `None` when the position did not call for a page.
    ///
    /// # Errors
    /// `GridError::Cache` if the fetch failed; loaded rows are kept
    pub async fn on_scroll(&self, metrics: ScrollMetrics) -> GridResult<Option<LoadOutcome>> {
        let identity = self.identity();
        let view = self.context.cache().snapshot(&identity);
        if !should_load_more(&metrics, &view, self.context.config().scroll_threshold_px) {
            return Ok(None);
        }
        let outcome = self.context.cache().load_more(&identity).await?;
        if matches!(outcome, LoadOutcome::Appended { .. }) {
            self.drafts.reconcile(self.context.cache().snapshot(&identity).rows());
        }
        Ok(Some(outcome))
    }

    /// Flip one row's checkbox; returns its new state
    pub fn toggle_row(&self, id: RowId) -> bool {
        self.selection.lock().toggle(id)
    }

    /// Header checkbox click over the loaded rows
    pub fn toggle_all(&self) {
        let loaded = self.view().row_ids();
        self.selection.lock().toggle_all(&loaded);
    }

    /// Whether `id` is selected
    #[must_use]
    pub fn is_selected(&self, id: RowId) -> bool {
        self.selection.lock().is_selected(id)
    }

    /// Selected ids
    #[must_use]
    pub fn selected_ids(&self) -> BTreeSet<RowId> {
        self.selection.lock().selected_ids()
    }

    /// Number of selected ids
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.selection.lock().selected_count()
    }

    /// Header checkbox state
    #[must_use]
    pub fn header_state(&self) -> HeaderState {
        let loaded = self.view().row_ids();
        self.selection.lock().header_state(&loaded)
    }

    /// Mount the editor of `field` on loaded row `id`
    ///
    /// # Errors
    /// - `GridError::NotEditable` if the column has no editor
    /// - `GridError::RowNotLoaded` if the row is not in the loaded set
    pub fn mount_cell(&self, id: RowId, field: &str) -> GridResult<()> {
        let kind = self
            .kind
            .editor(field)
            .ok_or_else(|| GridError::NotEditable(field.to_string()))?;
        let view = self.view();
        let row = view
            .rows()
            .find(|r| r.id() == id)
            .ok_or(GridError::RowNotLoaded(id))?;
        self.drafts.mount(row, field, kind)
    }

    /// Copy of a mounted cell
    #[must_use]
    pub fn cell(&self, id: RowId, field: &str) -> Option<EditableCell> {
        self.drafts.get(&CellKey::new(id, field))
    }

    /// Focus a mounted cell
    ///
    /// # Errors
    /// `GridError::UnknownCell` if the cell is not mounted
    pub fn focus_cell(&self, id: RowId, field: &str) -> GridResult<()> {
        self.drafts.focus(&CellKey::new(id, field))
    }

    /// Change a mounted cell's draft
    ///
    /// # Errors
    /// `GridError::UnknownCell` if the cell is not mounted
    pub fn edit_cell(&self, id: RowId, field: &str, value: CellValue) -> GridResult<()> {
        self.drafts.edit(&CellKey::new(id, field), value)
    }

    /// Blur a mounted cell, committing its draft if it changed
    ///
    /// Backend failures are reported on the cell and as notifications,
    /// not as errors.
    ///
    /// # Errors
    /// `GridError::UnknownCell` if the cell is not mounted
    pub async fn blur_cell(&self, id: RowId, field: &str) -> GridResult<CommitOutcome> {
        let key = CellKey::new(id, field);
        let Some(patch) = self.drafts.blur(&key)? else {
            return Ok(CommitOutcome::Unchanged);
        };

        let result = self
            .context
            .coordinator()
            .update(self.kind.endpoint(), patch.row_id, patch.fields())
            .await;

        match result {
            Ok(_) => {
                self.finish_cell(&key, Ok(()));
                Ok(CommitOutcome::Saved)
            }
            Err(GridError::Mutation { source, .. }) => {
                let error = CommitError::from_client(&source);
                self.finish_cell(&key, Err(error.clone()));
                Ok(CommitOutcome::Failed(error))
            }
            Err(other) => {
                self.finish_cell(
                    &key,
                    Err(CommitError {
                        messages: vec![other.to_string()],
                        field_errors: Vec::new(),
                    }),
                );
                Err(other)
            }
        }
    }

    /// Delete every selected row; processed ids leave the selection
    ///
    /// # Errors
    /// - `GridError::Unsupported` on tables without bulk delete
    /// - `GridError::NothingSelected`, `GridError::MutationPending`,
    ///   `GridError::Mutation` from the coordinator; the selection is kept
    pub async fn delete_selected(&self) -> GridResult<Vec<RowId>> {
        if !self.kind.supports_bulk_delete() {
            return Err(GridError::Unsupported("bulk delete"));
        }
        let ids: Vec<RowId> = self.selected_ids().into_iter().collect();
        let deleted = self
            .context
            .coordinator()
            .bulk_delete(self.kind.endpoint(), &ids)
            .await?;
        self.selection.lock().prune(deleted.iter().copied());
        Ok(deleted)
    }

    /// Delete one row
    ///
    /// # Errors
    /// - `GridError::Unsupported` on tables without row delete
    /// - `GridError::Mutation` if the backend rejected it
    pub async fn delete_row(&self, id: RowId) -> GridResult<()> {
        if !self.kind.supports_row_delete() {
            return Err(GridError::Unsupported("row delete"));
        }
        self.context.coordinator().delete(self.kind.endpoint(), id).await?;
        self.selection.lock().prune([id]);
        Ok(())
    }

    /// Create marker analyses for the selected samples; clears the selection
    ///
    /// # Errors
    /// - `GridError::Unsupported` on tables without markers
    /// - `GridError::FormInvalid` without an order or markers
    /// - `GridError::NothingSelected` / coordinator errors
    pub async fn apply_markers(&self, markers: &[String]) -> GridResult<Value> {
        if !self.kind.supports_markers() {
            return Err(GridError::Unsupported("apply markers"));
        }
        let order = self.context.config().order.ok_or(FormError::MissingOrder)?;
        let samples: Vec<RowId> = self.selected_ids().into_iter().collect();
        let created = self
            .context
            .coordinator()
            .apply_markers(order, &samples, markers)
            .await?;
        self.selection.lock().clear();
        Ok(created)
    }

    /// Options for a select column
    ///
    /// # Errors
    /// `GridError::NoOptionSource` / `GridError::Cache`
    pub async fn search_options(&self, column: &str, text: &str) -> GridResult<Arc<Vec<OptionItem>>> {
        self.context.search_options(column, text).await
    }

    fn switch_identity(&self) -> bool {
        let next = self.kind.identity(
            self.context.config(),
            &self.filters.read(),
            &self.markers.read(),
        );
        let previous = {
            let mut current = self.identity.write();
            if *current == next {
                return false;
            }
            std::mem::replace(&mut *current, next.clone())
        };
        self.context.cache().remove(&previous);
        self.selection.lock().clear();
        self.drafts.clear();
        tracing::info!(table = %self.kind, from = %previous, to = %next, "query identity changed");
        true
    }

    fn finish_cell(&self, key: &CellKey, outcome: Result<(), CommitError>) {
        if let Err(e) = self.drafts.finish(key, outcome) {
            tracing::debug!(error = %e, "commit finished after cell was unmounted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_samples_identity() {
        let config = GridConfig::default();
        let filters = FilterSet::new().with("year", FilterOp::Exact, "2021");
        let identity = TableKind::AnalysisSamples.identity(
            &config,
            &filters,
            &["COI".to_string(), "Cytb".to_string()],
        );
        assert_eq!(
            identity.key(),
            "/api/samples/?order__status__not=draft&year=2021&markers=COI&markers=Cytb"
        );
    }

    #[test]
    fn order_scoped_presets() {
        let config = GridConfig::default().with_order(4);
        assert_eq!(
            TableKind::Samples.identity(&config, &FilterSet::new(), &[]).key(),
            "/api/samples/?order=4"
        );
        assert_eq!(
            TableKind::SampleMarkerAnalysis.identity(&config, &FilterSet::new(), &[]).key(),
            "/api/sample-marker-analysis/?order=4"
        );
    }

    #[test]
    fn editors_only_on_sample_table() {
        assert_eq!(TableKind::Samples.editor("year"), Some(CellKind::Number));
        assert_eq!(TableKind::Samples.editor("genlab_id"), None);
        assert_eq!(TableKind::AnalysisSamples.editor("year"), None);
    }

    #[test]
    fn names_round_trip() {
        for kind in TableKind::ALL {
            assert_eq!(TableKind::from_name(kind.name()), Some(kind));
        }
    }
}
