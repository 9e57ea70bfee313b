//! Row selection and optimistic row edits.
//!
//! [`Selection`] is the set of checked records, kept inside the
//! [`LoaderState`]. [`SelectionController`] is the only code that changes it,
//! and also owns the `insert`/`delete` operations a host uses to patch rows
//! locally before the backend catches up.

use crate::loader::LoaderState;
use crate::record::Record;
use std::collections::HashSet;
use tracing::trace;

/// Checked records in the order they were checked, indexed by key.
#[derive(Debug, Clone)]
pub struct Selection<T: Record> {
    items: Vec<T>,
    keys: HashSet<T::Key>,
}

impl<T: Record> Default for Selection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            keys: HashSet::new(),
        }
    }
}

impl<T: Record> Selection<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, key: &T::Key) -> bool {
        self.keys.contains(key)
    }

    fn add(&mut self, item: &T) -> bool {
        if self.keys.insert(item.key()) {
            self.items.push(item.clone());
            true
        } else {
            false
        }
    }

    fn remove(&mut self, key: &T::Key) -> bool {
        if self.keys.remove(key) {
            self.items.retain(|item| item.key() != *key);
            true
        } else {
            false
        }
    }

    fn clear(&mut self) {
        self.items.clear();
        self.keys.clear();
    }
}

/// Callback receiving the full selection after every selection operation.
pub type SelectChangeFn<T> = Box<dyn FnMut(&[T]) + Send>;

/// Applies selection and row-edit operations to a [`LoaderState`].
///
/// The change callback runs after *every* selection call, including ones
/// that left the selection as it was.
pub struct SelectionController<T: Record> {
    on_select_change: Option<SelectChangeFn<T>>,
}

impl<T: Record> Default for SelectionController<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> SelectionController<T> {
    pub fn new() -> Self {
        Self {
            on_select_change: None,
        }
    }

    /// Set the selection-change callback.
    pub fn on_select_change(mut self, callback: impl FnMut(&[T]) + Send + 'static) -> Self {
        self.on_select_change = Some(Box::new(callback));
        self
    }

    /// Check or uncheck one record. Checking an already-checked record, or
    /// unchecking one that is not checked, changes nothing.
    pub fn select_item(&mut self, state: &mut LoaderState<T>, item: &T, checked: bool) {
        let changed = if checked {
            state.selection.add(item)
        } else {
            state.selection.remove(&item.key())
        };
        trace!(key = ?item.key(), checked, changed, "select item");
        self.notify(state);
    }

    /// Check or uncheck every loaded row.
    pub fn select_all(&mut self, state: &mut LoaderState<T>, checked: bool) {
        if checked {
            for row in &state.rows {
                state.selection.add(row);
            }
        } else {
            for row in &state.rows {
                state.selection.remove(&row.key());
            }
        }
        trace!(checked, selected = state.selection.len(), "select all");
        self.notify(state);
    }

    /// Make the row at `index` the only checked record. An index past the
    /// loaded rows leaves the selection as it is.
    pub fn select_single(&mut self, state: &mut LoaderState<T>, index: usize) {
        if let Some(row) = state.rows.get(index) {
            state.selection.clear();
            state.selection.add(row);
        }
        trace!(index, "select single");
        self.notify(state);
    }

    /// Whether every loaded row is checked.
    pub fn all_selected(&self, state: &LoaderState<T>) -> bool {
        !state.rows.is_empty()
            && state
                .rows
                .iter()
                .all(|row| state.selection.contains(&row.key()))
    }

    /// Splice a record into the loaded rows. Returns the index it landed at.
    pub fn insert(&mut self, state: &mut LoaderState<T>, item: T, index: usize) -> usize {
        let at = state.insert_row(index, item);
        trace!(index = at, "row inserted");
        at
    }

    /// Remove the loaded row at `index`.
    pub fn delete(&mut self, state: &mut LoaderState<T>, index: usize) -> Option<T> {
        let removed = state.remove_row(index);
        trace!(index, removed = removed.is_some(), "row deleted");
        removed
    }

    fn notify(&mut self, state: &LoaderState<T>) {
        if let Some(callback) = self.on_select_change.as_mut() {
            callback(state.selection.items());
        }
    }
}
