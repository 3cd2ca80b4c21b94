//! Editable cells
//!
//! Each cell keeps a local draft next to the last server value. The draft is
//! only sent on blur and only if it differs from the baseline captured at
//! mount/focus:
//!
//! ```text
//!           edit                blur (changed)          success
//! Clean ──────────▶ Dirty ─────────────────────▶ Committing ──────▶ Clean
//!   ▲                 │ blur (unchanged)             │ failure
//!   └─────────────────┘                              ▼
//!                                           DirtyWithError ── edit / blur ──▶ …
//! ```
//!
//! A row refresh only replaces the draft of a `Clean` cell.

use crate::error::{GridError, GridResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use labgrid_client::ClientError;
use labgrid_types::{CellKind, CellValue, FieldError, Row, RowId, TypesError};
use serde_json::{Map, Value};

/// Error shown on a cell after a failed commit
#[derive(Debug, Clone, PartialEq)]
pub struct CommitError {
    /// Lines to display, server field errors verbatim
    pub messages: Vec<String>,
    /// Structured entries, empty for unstructured failures
    pub field_errors: Vec<FieldError>,
}

impl CommitError {
    /// Build from a backend failure
    #[must_use]
    pub fn from_client(error: &ClientError) -> Self {
        let field_errors = error.field_errors().to_vec();
        let messages = if field_errors.is_empty() {
            vec![error.to_string()]
        } else {
            field_errors.iter().map(ToString::to_string).collect()
        };
        Self {
            messages,
            field_errors,
        }
    }
}

/// Cell state machine
#[derive(Debug, Clone, PartialEq)]
pub enum CellState {
    /// Draft equals the server value
    Clean,
    /// Draft changed, not yet blurred
    Dirty,
    /// Update request in flight
    Committing,
    /// Last commit failed; the draft is kept for a retry
    DirtyWithError(CommitError),
}

impl CellState {
    /// Whether a refresh must leave the draft alone
    #[inline]
    #[must_use]
    pub fn holds_user_input(&self) -> bool {
        !matches!(self, Self::Clean)
    }
}

/// Partial update produced by a blur
#[derive(Debug, Clone, PartialEq)]
pub struct CellPatch {
    /// Row to update
    pub row_id: RowId,
    /// Changed field
    pub field: String,
    /// New value as JSON
    pub value: Value,
}

impl CellPatch {
    /// `{id, field: value}` body
    #[must_use]
    pub fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("id".into(), Value::from(self.row_id.get()));
        fields.insert(self.field.clone(), self.value.clone());
        fields
    }
}

/// Draft of one `(row, field)` cell
#[derive(Debug, Clone, PartialEq)]
pub struct EditableCell {
    row_id: RowId,
    field: String,
    kind: CellKind,
    server: CellValue,
    baseline: CellValue,
    draft: CellValue,
    sent: Option<CellValue>,
    state: CellState,
}

impl EditableCell {
    /// Mount a cell on `row.field`
    ///
    /// # Errors
    /// `TypesError` if the server value does not fit `kind`
    pub fn mount(row: &Row, field: impl Into<String>, kind: CellKind) -> Result<Self, TypesError> {
        let field = field.into();
        let server = read_field(row, &field, kind)?;
        Ok(Self {
            row_id: row.id(),
            field,
            kind,
            baseline: server.clone(),
            draft: server.clone(),
            server,
            sent: None,
            state: CellState::Clean,
        })
    }

    /// Row identity
    #[inline]
    #[must_use]
    pub fn row_id(&self) -> RowId {
        self.row_id
    }

    /// Field name
    #[inline]
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Value kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> CellKind {
        self.kind
    }

    /// Current draft
    #[inline]
    #[must_use]
    pub fn draft(&self) -> &CellValue {
        &self.draft
    }

    /// Last value confirmed by the server
    #[inline]
    #[must_use]
    pub fn server_value(&self) -> &CellValue {
        &self.server
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &CellState {
        &self.state
    }

    /// Capture the baseline a later blur compares against
    pub fn focus(&mut self) {
        if self.state == CellState::Clean {
            self.baseline = self.draft.clone();
        }
    }

    /// Replace the draft
    pub fn edit(&mut self, value: CellValue) {
        self.draft = value;
        if self.state != CellState::Committing {
            self.state = CellState::Dirty;
        }
    }

    /// Blur: returns the patch to send, if any
    ///
    /// An unchanged draft returns the cell to `Clean` without a request. A
    /// cell already committing produces nothing.
    pub fn blur(&mut self) -> Option<CellPatch> {
        if self.state == CellState::Committing {
            return None;
        }
        if self.draft == self.baseline {
            self.state = CellState::Clean;
            return None;
        }
        self.state = CellState::Committing;
        self.sent = Some(self.draft.clone());
        Some(CellPatch {
            row_id: self.row_id,
            field: self.field.clone(),
            value: self.draft.to_patch_json(),
        })
    }

    /// The update was accepted
    pub fn commit_succeeded(&mut self) {
        if let Some(sent) = self.sent.take() {
            self.server = sent;
        }
        self.baseline = self.server.clone();
        // edits made while committing stay dirty
        self.state = if self.draft == self.server {
            CellState::Clean
        } else {
            CellState::Dirty
        };
    }

    /// The update was rejected; the draft is kept
    pub fn commit_failed(&mut self, error: CommitError) {
        self.sent = None;
        self.state = CellState::DirtyWithError(error);
    }

    /// Server row was refetched
    ///
    /// # Errors
    /// `TypesError` if the new value does not fit the cell kind
    pub fn refresh(&mut self, row: &Row) -> Result<(), TypesError> {
        self.server = read_field(row, &self.field, self.kind)?;
        // a kept draft is compared against the refreshed value on blur
        self.baseline = self.server.clone();
        if self.state.holds_user_input() {
            tracing::debug!(row = %self.row_id, field = %self.field, "refresh kept local draft");
        } else {
            self.draft = self.server.clone();
        }
        Ok(())
    }
}

fn read_field(row: &Row, field: &str, kind: CellKind) -> Result<CellValue, TypesError> {
    CellValue::from_json(kind, row.get_path(field).unwrap_or(&Value::Null))
}

/// Key of a cell draft
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellKey {
    /// Row identity
    pub row_id: RowId,
    /// Field name
    pub field: String,
}

impl CellKey {
    /// Create key
    #[inline]
    #[must_use]
    pub fn new(row_id: RowId, field: impl Into<String>) -> Self {
        Self {
            row_id,
            field: field.into(),
        }
    }
}

/// Drafts of every mounted cell of a table
#[derive(Debug, Default)]
pub struct DraftBook {
    cells: DashMap<CellKey, EditableCell>,
}

impl DraftBook {
    /// Empty book
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `row.field` unless already mounted
    ///
    /// # Errors
    /// `GridError::Types` if the server value does not fit `kind`
    pub fn mount(&self, row: &Row, field: &str, kind: CellKind) -> GridResult<()> {
        if let Entry::Vacant(slot) = self.cells.entry(CellKey::new(row.id(), field)) {
            slot.insert(EditableCell::mount(row, field, kind)?);
        }
        Ok(())
    }

    /// Copy of a mounted cell
    #[must_use]
    pub fn get(&self, key: &CellKey) -> Option<EditableCell> {
        self.cells.get(key).map(|c| c.value().clone())
    }

    /// State of a mounted cell
    #[must_use]
    pub fn state(&self, key: &CellKey) -> Option<CellState> {
        self.cells.get(key).map(|c| c.state().clone())
    }

    /// Capture the focus baseline
    ///
    /// # Errors
    /// `GridError::UnknownCell` if the cell is not mounted
    pub fn focus(&self, key: &CellKey) -> GridResult<()> {
        self.with_cell(key, EditableCell::focus)
    }

    /// Replace a draft
    ///
    /// # Errors
    /// `GridError::UnknownCell` if the cell is not mounted
    pub fn edit(&self, key: &CellKey, value: CellValue) -> GridResult<()> {
        self.with_cell(key, |cell| cell.edit(value))
    }

    /// Blur a cell, returning the patch to send
    ///
    /// # Errors
    /// `GridError::UnknownCell` if the cell is not mounted
    pub fn blur(&self, key: &CellKey) -> GridResult<Option<CellPatch>> {
        self.with_cell(key, EditableCell::blur)
    }

    /// Record the outcome of a commit
    ///
    /// # Errors
    /// `GridError::UnknownCell` if the cell was unmounted meanwhile
    pub fn finish(&self, key: &CellKey, outcome: Result<(), CommitError>) -> GridResult<()> {
        self.with_cell(key, |cell| match outcome {
            Ok(()) => cell.commit_succeeded(),
            Err(error) => cell.commit_failed(error),
        })
    }

    /// Refresh every mounted cell whose row is in `rows`
    ///
    /// Cells with pending user input keep their drafts. Returns how many
    /// cells were visited.
    pub fn reconcile<'a>(&self, rows: impl IntoIterator<Item = &'a Row>) -> usize {
        let mut visited = 0;
        for row in rows {
            for mut cell in self.cells.iter_mut().filter(|c| c.key().row_id == row.id()) {
                if let Err(e) = cell.refresh(row) {
                    tracing::warn!(row = %row.id(), field = %cell.field(), error = %e, "cell refresh skipped");
                }
                visited += 1;
            }
        }
        tracing::debug!(cells = visited, "drafts reconciled");
        visited
    }

    /// Drop every draft
    #[inline]
    pub fn clear(&self) {
        self.cells.clear();
    }

    /// Number of mounted cells
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell is mounted
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn with_cell<T>(&self, key: &CellKey, f: impl FnOnce(&mut EditableCell) -> T) -> GridResult<T> {
        let mut cell = self
            .cells
            .get_mut(key)
            .ok_or_else(|| GridError::unknown_cell(key.row_id, key.field.clone()))?;
        Ok(f(&mut cell))
    }
}
