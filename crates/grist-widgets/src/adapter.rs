//! The engine behind [`DataGrid`](crate::grid::DataGrid) and
//! [`DataList`](crate::list::DataList): a [`Loader`], a
//! [`SelectionController`], a [`VirtualWindow`] and a row cursor, kept in
//! step with each other.
//!
//! Whenever the window reports a new visible range, the adapter first asks
//! the loader whether the last visible row is close enough to the end to
//! prefetch, then forwards the range to the host's callback. The same check
//! runs after every merge, so a page that does not fill the viewport pulls
//! in the next one.

use crate::handle::RowsHandle;
use crate::key::RowKeyBindings;
use crate::loader::{LoadOutcome, Loader, LoaderState, PageLoaded, Reset};
use crate::record::Record;
use crate::selection::SelectionController;
use crate::source::FetchError;
use crate::window::{Align, VirtualWindow, VisibleRange};
use crossterm::event::KeyEvent;
use grist_core::Command;
use std::sync::Arc;
use tracing::trace;

/// How rows can be checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Rows cannot be selected.
    None,
    /// Selecting a row replaces the selection.
    #[default]
    Single,
    /// Rows are checked and unchecked independently.
    Multi,
}

/// Stable identity of a rendered slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKey<K> {
    /// A loaded row, keyed by its record key.
    Row(K),
    /// The trailing "more rows" slot, keyed by its index.
    Placeholder(usize),
}

/// Messages understood by grids and lists.
///
/// `CursorMoved`, `Confirm` and `FetchFailed` are notifications: the view
/// emits them for the parent to observe and ignores them when they are fed
/// back in.
#[derive(Debug)]
pub enum Message<T: Record> {
    /// A key press forwarded to the view.
    KeyPress(KeyEvent),
    /// Mouse wheel event. `up` is true for scroll-up.
    MouseWheel { up: bool },
    /// A page fetch completed.
    Loaded(PageLoaded<T>),
    /// Re-read the viewport, e.g. after a terminal resize.
    Sync,
    Reset(Reset<T>),
    Refresh,
    /// Make the row at this index the single selected record.
    Select(usize),
    SelectAll(bool),
    SelectItem(T, bool),
    Insert(T, usize),
    Delete(usize),
    ScrollTo(u32),
    ScrollToItem(usize, Align),
    ResetAfterIndex(usize),
    /// Emitted when the cursor lands on a row.
    CursorMoved(usize),
    /// Emitted when the confirm key is pressed on a row.
    Confirm(usize),
    /// Emitted when a page fetch fails.
    FetchFailed(Arc<FetchError>),
}

/// Lift a loader command into view messages.
pub fn lift<T: Record>(cmd: Command<PageLoaded<T>>) -> Command<Message<T>> {
    cmd.map(Message::Loaded)
}

/// Callback receiving every new visible range.
pub type RangeFn = Box<dyn FnMut(VisibleRange) + Send>;

type ItemHeightFn<T> = Box<dyn Fn(Option<&T>) -> u16 + Send>;

/// Loader, selection, geometry and cursor for one row view.
pub struct RowsAdapter<T: Record> {
    loader: Loader<T>,
    controller: SelectionController<T>,
    window: VirtualWindow,
    cursor: usize,
    mode: SelectionMode,
    item_height: ItemHeightFn<T>,
    on_visible_range: Option<RangeFn>,
}

impl<T: Record> RowsAdapter<T> {
    pub fn new(loader: Loader<T>) -> Self {
        Self {
            loader,
            controller: SelectionController::new(),
            window: VirtualWindow::new(),
            cursor: 0,
            mode: SelectionMode::default(),
            item_height: Box::new(|_| 1),
            on_visible_range: None,
        }
    }

    pub fn with_controller(mut self, controller: SelectionController<T>) -> Self {
        self.controller = controller;
        self
    }

    pub fn with_selection_mode(mut self, mode: SelectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Height in lines of a row (`Some`) or of the placeholder (`None`).
    pub fn with_item_height(mut self, height: impl Fn(Option<&T>) -> u16 + Send + 'static) -> Self {
        self.item_height = Box::new(height);
        self
    }

    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.window = self.window.with_overscan(overscan);
        self
    }

    pub fn on_visible_range(mut self, callback: impl FnMut(VisibleRange) + Send + 'static) -> Self {
        self.on_visible_range = Some(Box::new(callback));
        self
    }

    pub fn loader(&self) -> &Loader<T> {
        &self.loader
    }

    pub fn state(&self) -> &LoaderState<T> {
        self.loader.state()
    }

    pub fn rows(&self) -> &[T] {
        self.loader.rows()
    }

    pub fn window(&self) -> &VirtualWindow {
        &self.window
    }

    pub fn selection_mode(&self) -> SelectionMode {
        self.mode
    }

    /// Index of the row under the cursor, if any row is loaded.
    pub fn cursor(&self) -> Option<usize> {
        (!self.rows().is_empty()).then_some(self.cursor)
    }

    pub fn current_row(&self) -> Option<&T> {
        self.rows().get(self.cursor)
    }

    pub fn is_selected(&self, row: &T) -> bool {
        self.state().selection().contains(&row.key())
    }

    /// Whether every loaded row is selected.
    pub fn all_selected(&self) -> bool {
        self.controller.all_selected(self.loader.state())
    }

    /// Identity of the slot at `index`.
    pub fn item_key(&self, index: usize) -> Option<ItemKey<T::Key>> {
        match self.rows().get(index) {
            Some(row) => Some(ItemKey::Row(row.key())),
            None if self.state().is_placeholder(index) => Some(ItemKey::Placeholder(index)),
            None => None,
        }
    }

    /// Bind to a live view: auto-load the first page if due.
    pub fn attach(&mut self) -> Command<PageLoaded<T>> {
        let load = self.loader.attach();
        Command::batch([load, self.sync(false)])
    }

    pub fn detach(&mut self) {
        self.loader.detach();
    }

    /// Merge a fetch result and re-run the prefetch check.
    pub fn handle_loaded(&mut self, msg: PageLoaded<T>) -> (LoadOutcome, Command<PageLoaded<T>>) {
        let before = self.rows().len();
        let outcome = self.loader.apply(msg);
        let first_changed = match outcome {
            LoadOutcome::Appended { .. } => before,
            LoadOutcome::Refreshed { replaced, .. } => before - replaced,
            _ => return (outcome, Command::none()),
        };
        self.window.reset_after_index(first_changed);
        let cmd = self.sync(true);
        (outcome, cmd)
    }

    fn remeasure(&mut self) {
        let count = self.loader.item_count();
        let rows = self.loader.rows();
        let height = &self.item_height;
        self.window.measure(count, |index| height(rows.get(index)));
        self.cursor = self.cursor.min(rows.len().saturating_sub(1));
    }

    /// Re-measure, then report a changed visible range. With `force`, the
    /// prefetch check runs even if the range did not change.
    pub fn sync(&mut self, force: bool) -> Command<PageLoaded<T>> {
        self.remeasure();
        let range = match self.window.observe() {
            Some(range) => {
                let cmd = self.loader.maybe_prefetch(range.visible_stop);
                if let Some(callback) = self.on_visible_range.as_mut() {
                    callback(range);
                }
                return cmd;
            }
            None if force => self.window.visible_range(),
            None => None,
        };
        range.map_or_else(Command::none, |range| {
            self.loader.maybe_prefetch(range.visible_stop)
        })
    }

    /// Record the viewport height measured by the view.
    pub fn set_viewport_height(&self, height: u16) {
        self.window.set_viewport_height(height);
    }

    /// Rows that fit in the viewport, for page-wise movement.
    pub fn page_len(&self) -> usize {
        self.window
            .visible_range()
            .map_or(1, |r| r.visible_stop - r.visible_start + 1)
            .max(1)
    }

    /// Move the cursor to `index` (clamped to loaded rows) and scroll it
    /// into view.
    pub fn move_cursor_to(&mut self, index: usize) -> Command<PageLoaded<T>> {
        let len = self.rows().len();
        if len == 0 {
            return Command::none();
        }
        self.cursor = index.min(len - 1);
        self.window.scroll_to_item(self.cursor, Align::Auto);
        trace!(cursor = self.cursor, "cursor moved");
        self.sync(false)
    }

    /// Move the cursor by `delta` rows.
    pub fn move_cursor_by(&mut self, delta: isize) -> Command<PageLoaded<T>> {
        self.move_cursor_to(self.cursor.saturating_add_signed(delta))
    }

    /// Scroll by `delta` lines, leaving the cursor where it is.
    pub fn scroll_lines(&mut self, delta: i32) -> Command<PageLoaded<T>> {
        self.window.scroll_by(delta);
        self.sync(false)
    }

    /// Space-bar behavior: toggle in multi mode, select in single mode.
    pub fn toggle_current(&mut self) {
        let Some(row) = self.current_row().cloned() else {
            return;
        };
        match self.mode {
            SelectionMode::None => {}
            SelectionMode::Single => self.select(self.cursor),
            SelectionMode::Multi => {
                let checked = !self.is_selected(&row);
                self.select_item(&row, checked);
            }
        }
    }

    /// Select everything, or clear when everything is already selected.
    pub fn toggle_all(&mut self) {
        if self.mode != SelectionMode::Multi {
            return;
        }
        let checked = !self.all_selected();
        self.select_all(checked);
    }
}

impl<T: Record> RowsAdapter<T> {
    /// Shared `update` of grids and lists.
    pub fn update(
        &mut self,
        msg: Message<T>,
        bindings: &RowKeyBindings,
        focused: bool,
        wheel_delta: u16,
    ) -> Command<Message<T>> {
        match msg {
            Message::KeyPress(key) if focused => self.handle_key(key, bindings),
            Message::KeyPress(_) => Command::none(),
            Message::MouseWheel { up } => {
                let lines = i32::from(wheel_delta);
                lift(self.scroll_lines(if up { -lines } else { lines }))
            }
            Message::Loaded(page) => {
                let (outcome, cmd) = self.handle_loaded(page);
                match outcome {
                    LoadOutcome::Failed(err) => {
                        Command::batch([lift(cmd), Command::message(Message::FetchFailed(err))])
                    }
                    _ => lift(cmd),
                }
            }
            Message::Sync => lift(self.sync(false)),
            Message::Reset(overrides) => lift(self.reset(overrides)),
            Message::Refresh => lift(self.refresh()),
            Message::Select(index) => {
                self.select(index);
                Command::none()
            }
            Message::SelectAll(checked) => {
                self.select_all(checked);
                Command::none()
            }
            Message::SelectItem(item, checked) => {
                self.select_item(&item, checked);
                Command::none()
            }
            Message::Insert(item, index) => {
                self.insert(item, index);
                lift(self.sync(false))
            }
            Message::Delete(index) => {
                self.delete(index);
                lift(self.sync(false))
            }
            Message::ScrollTo(offset) => lift(self.scroll_to(offset)),
            Message::ScrollToItem(index, align) => lift(self.scroll_to_item(index, align)),
            Message::ResetAfterIndex(index) => {
                self.reset_after_index(index);
                lift(self.sync(false))
            }
            Message::CursorMoved(_) | Message::Confirm(_) | Message::FetchFailed(_) => {
                Command::none()
            }
        }
    }

    fn moved(&self, cmd: Command<PageLoaded<T>>) -> Command<Message<T>> {
        let notify = self
            .cursor()
            .map_or_else(Command::none, |i| Command::message(Message::CursorMoved(i)));
        Command::batch([lift(cmd), notify])
    }

    fn handle_key(&mut self, key: KeyEvent, bindings: &RowKeyBindings) -> Command<Message<T>> {
        let page = self.page_len() as isize;
        let half = (page / 2).max(1);

        if bindings.up.matches(&key) {
            let cmd = self.move_cursor_by(-1);
            self.moved(cmd)
        } else if bindings.down.matches(&key) {
            let cmd = self.move_cursor_by(1);
            self.moved(cmd)
        } else if bindings.page_up.matches(&key) {
            let cmd = self.move_cursor_by(-page);
            self.moved(cmd)
        } else if bindings.page_down.matches(&key) {
            let cmd = self.move_cursor_by(page);
            self.moved(cmd)
        } else if bindings.half_up.matches(&key) {
            let cmd = self.move_cursor_by(-half);
            self.moved(cmd)
        } else if bindings.half_down.matches(&key) {
            let cmd = self.move_cursor_by(half);
            self.moved(cmd)
        } else if bindings.first.matches(&key) {
            let cmd = self.move_cursor_to(0);
            self.moved(cmd)
        } else if bindings.last.matches(&key) {
            let cmd = self.move_cursor_to(usize::MAX);
            self.moved(cmd)
        } else if bindings.confirm.matches(&key) {
            match self.cursor() {
                Some(i) => {
                    if self.mode == SelectionMode::Single {
                        self.select(i);
                    }
                    Command::message(Message::Confirm(i))
                }
                None => Command::none(),
            }
        } else if bindings.toggle.matches(&key) {
            self.toggle_current();
            Command::none()
        } else if bindings.select_all.matches(&key) {
            self.toggle_all();
            Command::none()
        } else if bindings.refresh.matches(&key) {
            lift(self.refresh())
        } else {
            Command::none()
        }
    }
}

impl<T: Record> RowsHandle<T> for RowsAdapter<T> {
    type Message = PageLoaded<T>;

    fn reset(&mut self, overrides: Reset<T>) -> Command<PageLoaded<T>> {
        self.cursor = 0;
        self.window.reset_after_index(0);
        self.window.scroll_to(0);
        let load = self.loader.reset(overrides);
        Command::batch([load, self.sync(false)])
    }

    fn refresh(&mut self) -> Command<PageLoaded<T>> {
        self.loader.refresh_current_page()
    }

    fn select(&mut self, index: usize) {
        self.controller
            .select_single(self.loader.state_mut(), index);
    }

    fn select_all(&mut self, checked: bool) {
        self.controller.select_all(self.loader.state_mut(), checked);
    }

    fn select_item(&mut self, item: &T, checked: bool) {
        self.controller
            .select_item(self.loader.state_mut(), item, checked);
    }

    fn insert(&mut self, item: T, index: usize) -> usize {
        let at = self.controller.insert(self.loader.state_mut(), item, index);
        self.window.reset_after_index(at);
        self.remeasure();
        at
    }

    fn delete(&mut self, index: usize) -> Option<T> {
        let removed = self.controller.delete(self.loader.state_mut(), index)?;
        self.window.reset_after_index(index);
        self.remeasure();
        Some(removed)
    }

    fn scroll_to(&mut self, offset: u32) -> Command<PageLoaded<T>> {
        self.window.scroll_to(offset);
        self.sync(false)
    }

    fn scroll_to_item(&mut self, index: usize, align: Align) -> Command<PageLoaded<T>> {
        self.window.scroll_to_item(index, align);
        self.sync(false)
    }

    fn reset_after_index(&mut self, index: usize) {
        self.window.reset_after_index(index);
        self.remeasure();
    }
}
