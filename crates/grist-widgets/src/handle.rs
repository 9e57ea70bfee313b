//! Imperative control surface shared by every row view.

use crate::loader::Reset;
use crate::record::Record;
use crate::window::Align;
use grist_core::Command;

/// Operations a host can invoke directly on a grid, list, or bare
/// [`RowsAdapter`](crate::adapter::RowsAdapter).
///
/// Operations that may scroll or reload return a [`Command`] that must be
/// handed back to the runtime; dropping it would leave a started fetch
/// without anyone to deliver its result. Each view also exposes the same
/// operations as messages, for hosts that prefer to stay message-driven.
pub trait RowsHandle<T: Record> {
    /// Message type of the commands this handle returns.
    type Message: Send + 'static;

    /// Drop loaded rows and start paging again, applying `overrides`.
    fn reset(&mut self, overrides: Reset<T>) -> Command<Self::Message>;

    /// Re-fetch the most recent page in place.
    fn refresh(&mut self) -> Command<Self::Message>;

    /// Make the row at `index` the single selected record.
    fn select(&mut self, index: usize);

    /// Check or uncheck every loaded row.
    fn select_all(&mut self, checked: bool);

    /// Check or uncheck one record.
    fn select_item(&mut self, item: &T, checked: bool);

    /// Splice a record into the loaded rows; returns where it landed.
    fn insert(&mut self, item: T, index: usize) -> usize;

    /// Remove the loaded row at `index`.
    fn delete(&mut self, index: usize) -> Option<T>;

    /// Scroll to an absolute line offset.
    fn scroll_to(&mut self, offset: u32) -> Command<Self::Message>;

    /// Scroll the item at `index` into view.
    fn scroll_to_item(&mut self, index: usize, align: Align) -> Command<Self::Message>;

    /// Forget cached item heights from `index` onwards.
    fn reset_after_index(&mut self, index: usize);
}
