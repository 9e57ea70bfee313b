//! Data widgets for **grist**: a virtualized grid and list over records that
//! are paged in from a data source as the user scrolls.
//!
//! The grid and list share one engine, [`RowsAdapter`](adapter::RowsAdapter),
//! which ties together a page [`Loader`](loader::Loader), a
//! [`SelectionController`](selection::SelectionController) and a
//! [`VirtualWindow`](window::VirtualWindow). Both implement
//! [`grist_core::Component`] and the imperative
//! [`RowsHandle`](handle::RowsHandle).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`record`] | The [`Record`](record::Record) trait: rows with a stable key |
//! | [`source`] | Page requests, the data source contract, an in-memory source |
//! | [`loader`] | Loader state and the load coordinator |
//! | [`selection`] | Selection bookkeeping and row edits |
//! | [`window`] | Visible-range computation over measured item heights |
//! | [`adapter`] | The shared grid/list engine and its messages |
//! | [`handle`] | Imperative operations on a grid or list |
//! | [`grid`] | [`DataGrid`](grid::DataGrid): columns, header, checkboxes |
//! | [`list`] | [`DataList`](list::DataList): delegate-drawn, variable-height rows |
//! | [`key`] | Key bindings and help-line rendering |
//! | [`notification`] | Shared notification queue and toast view |

pub mod adapter;
pub mod grid;
pub mod handle;
pub mod key;
pub mod list;
pub mod loader;
pub mod notification;
pub mod record;
pub mod selection;
pub mod source;
pub mod window;

pub use adapter::{ItemKey, RowsAdapter, SelectionMode};
pub use grid::{Column, DataGrid};
pub use handle::RowsHandle;
pub use list::{DataList, LabelDelegate, RowContext, RowDelegate};
pub use loader::{LoadOutcome, Loader, LoaderConfig, LoaderState, PageLoaded, Reset};
pub use notification::{Level, Notifier, NotifierView};
pub use record::Record;
pub use selection::{Selection, SelectionController};
pub use source::{DataSource, FetchError, FetchResult, MemorySource, PageRequest};
pub use window::{Align, VirtualWindow, VisibleRange};
