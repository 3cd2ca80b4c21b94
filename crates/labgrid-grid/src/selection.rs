//! Row selection model
//!
//! Selection is keyed by [`RowId`], not by position, so it survives page
//! loads, refetches and rows scrolling out of the virtual window. Bulk
//! toggling only ever touches the ids handed in as currently loaded; ids
//! outside that set keep their state until pruned.

use labgrid_types::RowId;
use std::collections::{BTreeSet, HashMap};

/// Tri-state of a "select all" header checkbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderState {
    /// No loaded row is selected
    Unchecked,
    /// Some but not all loaded rows are selected
    Indeterminate,
    /// Every loaded row is selected
    Checked,
}

/// Mapping from row id to selected state
#[derive(Debug, Clone, Default)]
pub struct SelectionModel {
    selected: HashMap<RowId, bool>,
}

impl SelectionModel {
    /// Empty selection
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip one row; returns its new state
    pub fn toggle(&mut self, id: RowId) -> bool {
        let state = self.selected.entry(id).or_insert(false);
        *state = !*state;
        *state
    }

    /// Set one row's state
    pub fn set(&mut self, id: RowId, selected: bool) {
        self.selected.insert(id, selected);
    }

    /// Select every loaded row, or clear them all if already all selected
    ///
    /// Ids outside `loaded` are never touched.
    pub fn toggle_all(&mut self, loaded: &[RowId]) {
        let target = !self.all_selected(loaded);
        for id in loaded {
            self.selected.insert(*id, target);
        }
    }

    /// Whether `id` is selected
    #[inline]
    #[must_use]
    pub fn is_selected(&self, id: RowId) -> bool {
        self.selected.get(&id).copied().unwrap_or(false)
    }

    /// Number of selected ids, loaded or not
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.selected.values().filter(|s| **s).count()
    }

    /// Selected ids in ascending order
    #[must_use]
    pub fn selected_ids(&self) -> BTreeSet<RowId> {
        self.selected
            .iter()
            .filter_map(|(id, s)| s.then_some(*id))
            .collect()
    }

    /// Whether every loaded row is selected (false for an empty load)
    #[must_use]
    pub fn all_selected(&self, loaded: &[RowId]) -> bool {
        !loaded.is_empty() && loaded.iter().all(|id| self.is_selected(*id))
    }

    /// Whether some but not all loaded rows are selected
    #[must_use]
    pub fn is_indeterminate(&self, loaded: &[RowId]) -> bool {
        let count = loaded.iter().filter(|id| self.is_selected(**id)).count();
        count > 0 && count < loaded.len()
    }

    /// Header checkbox state over the loaded rows
    #[must_use]
    pub fn header_state(&self, loaded: &[RowId]) -> HeaderState {
        if self.all_selected(loaded) {
            HeaderState::Checked
        } else if self.is_indeterminate(loaded) {
            HeaderState::Indeterminate
        } else {
            HeaderState::Unchecked
        }
    }

    /// Forget the given ids (rows the backend processed or removed)
    pub fn prune(&mut self, ids: impl IntoIterator<Item = RowId>) {
        for id in ids {
            self.selected.remove(&id);
        }
    }

    /// Forget everything
    #[inline]
    pub fn clear(&mut self) {
        self.selected.clear();
    }
}
