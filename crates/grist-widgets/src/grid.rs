//! A virtualized, incrementally loaded data grid.
//!
//! [`DataGrid`] renders only the rows inside its viewport, fetches further
//! pages as the cursor or scroll position nears the end of what is loaded,
//! and shows a placeholder row while more data exists.

use grist_core::command::Command;
use grist_core::component::Component;
use ratatui::layout::{Alignment, Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{
    Block, Borders, Cell as RatatuiCell, Paragraph, Row, Scrollbar, ScrollbarOrientation,
    ScrollbarState, Table as RatatuiTable, TableState,
};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

pub use crate::adapter::Message;

use crate::adapter::{lift, RowsAdapter, SelectionMode};
use crate::handle::RowsHandle;
use crate::key::RowKeyBindings;
use crate::loader::{Loader, LoaderState, Reset};
use crate::record::Record;
use crate::selection::SelectionController;
use crate::window::{Align, VisibleRange};

/// Key bindings for [`DataGrid`].
pub type GridKeyBindings = RowKeyBindings;

/// One grid column: a header and a function rendering a record's cell.
pub struct Column<T> {
    pub title: String,
    pub width: Constraint,
    value: Box<dyn Fn(&T) -> String + Send>,
}

impl<T> Column<T> {
    pub fn new(
        title: impl Into<String>,
        width: Constraint,
        value: impl Fn(&T) -> String + Send + 'static,
    ) -> Self {
        Self {
            title: title.into(),
            width,
            value: Box::new(value),
        }
    }

    pub fn value(&self, record: &T) -> String {
        (self.value)(record)
    }
}

/// Visual styling for [`DataGrid`].
#[derive(Debug, Clone)]
pub struct GridStyle {
    pub header: Style,
    pub normal: Style,
    /// Row under the cursor.
    pub cursor: Style,
    /// Rows in the selection.
    pub selected: Style,
    /// The trailing "more rows" slot.
    pub placeholder: Style,
    pub empty: Style,
    pub focused_border: Style,
    pub unfocused_border: Style,
    /// Symbol rendered to the left of the cursor row.
    pub highlight_symbol: String,
    /// Text of the placeholder row while a page is loading.
    pub loading_text: String,
    /// Text of the placeholder row while idle.
    pub more_text: String,
    /// Shown when the data source has no rows at all.
    pub empty_text: String,
}

impl Default for GridStyle {
    fn default() -> Self {
        Self {
            header: Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
            normal: Style::default(),
            cursor: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            selected: Style::default().fg(Color::Green),
            placeholder: Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
            empty: Style::default().fg(Color::DarkGray),
            focused_border: Style::default().fg(Color::Cyan),
            unfocused_border: Style::default().fg(Color::DarkGray),
            highlight_symbol: "▸ ".to_string(),
            loading_text: "Loading…".to_string(),
            more_text: "…".to_string(),
            empty_text: "No records".to_string(),
        }
    }
}

/// A data grid over records paged in by a [`Loader`].
///
/// # Example
///
/// ```ignore
/// let loader = Loader::new(source, LoaderConfig::default().with_batch_size(100));
/// let mut grid = DataGrid::new(loader, vec![
///     Column::new("Name", Constraint::Min(20), |c: &Customer| c.name.clone()),
///     Column::new("City", Constraint::Length(12), |c: &Customer| c.city.clone()),
/// ])
/// .with_title("Customers")
/// .with_selection_mode(SelectionMode::Multi);
/// grid.focus();
/// let cmd = grid.attach().map(Msg::Grid);
/// ```
pub struct DataGrid<T: Record> {
    rows: RowsAdapter<T>,
    columns: Vec<Column<T>>,
    title: String,
    focus: bool,
    style: GridStyle,
    key_bindings: GridKeyBindings,
    wheel_delta: u16,
}

impl<T: Record> DataGrid<T> {
    pub fn new(loader: Loader<T>, columns: Vec<Column<T>>) -> Self {
        Self {
            rows: RowsAdapter::new(loader),
            columns,
            title: String::new(),
            focus: false,
            style: GridStyle::default(),
            key_bindings: GridKeyBindings::default(),
            wheel_delta: 3,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_style(mut self, style: GridStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_key_bindings(mut self, key_bindings: GridKeyBindings) -> Self {
        self.key_bindings = key_bindings;
        self
    }

    /// `Multi` adds a checkbox column.
    pub fn with_selection_mode(mut self, mode: SelectionMode) -> Self {
        self.rows = self.rows.with_selection_mode(mode);
        self
    }

    /// Lines scrolled per mouse wheel notch.
    pub fn with_wheel_delta(mut self, lines: u16) -> Self {
        self.wheel_delta = lines;
        self
    }

    /// Called with the full selection after every selection change.
    pub fn on_select_change(mut self, callback: impl FnMut(&[T]) + Send + 'static) -> Self {
        self.rows = self
            .rows
            .with_controller(SelectionController::new().on_select_change(callback));
        self
    }

    /// Called with each new visible range, after the prefetch check.
    pub fn on_visible_range(
        mut self,
        callback: impl FnMut(VisibleRange) + Send + 'static,
    ) -> Self {
        self.rows = self.rows.on_visible_range(callback);
        self
    }

    pub fn focus(&mut self) {
        self.focus = true;
    }

    pub fn blur(&mut self) {
        self.focus = false;
    }

    pub fn adapter(&self) -> &RowsAdapter<T> {
        &self.rows
    }

    pub fn state(&self) -> &LoaderState<T> {
        self.rows.state()
    }

    pub fn records(&self) -> &[T] {
        self.rows.rows()
    }

    pub fn selected_items(&self) -> &[T] {
        self.rows.state().selected_items()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.rows.cursor()
    }

    pub fn current_record(&self) -> Option<&T> {
        self.rows.current_row()
    }

    pub fn key_bindings(&self) -> &GridKeyBindings {
        &self.key_bindings
    }

    /// Bind the grid to the running program; fetches the first page when
    /// auto-load is on.
    pub fn attach(&mut self) -> Command<Message<T>> {
        lift(self.rows.attach())
    }

    /// Unbind the grid. Fetches still in flight are discarded on arrival.
    pub fn detach(&mut self) {
        self.rows.detach();
    }

    fn placeholder_text(&self) -> &str {
        if self.rows.state().is_loading() {
            &self.style.loading_text
        } else {
            &self.style.more_text
        }
    }
}

impl<T: Record> RowsHandle<T> for DataGrid<T> {
    type Message = Message<T>;

    fn reset(&mut self, overrides: Reset<T>) -> Command<Message<T>> {
        lift(self.rows.reset(overrides))
    }

    fn refresh(&mut self) -> Command<Message<T>> {
        lift(self.rows.refresh())
    }

    fn select(&mut self, index: usize) {
        self.rows.select(index);
    }

    fn select_all(&mut self, checked: bool) {
        self.rows.select_all(checked);
    }

    fn select_item(&mut self, item: &T, checked: bool) {
        self.rows.select_item(item, checked);
    }

    fn insert(&mut self, item: T, index: usize) -> usize {
        self.rows.insert(item, index)
    }

    fn delete(&mut self, index: usize) -> Option<T> {
        self.rows.delete(index)
    }

    fn scroll_to(&mut self, offset: u32) -> Command<Message<T>> {
        lift(self.rows.scroll_to(offset))
    }

    fn scroll_to_item(&mut self, index: usize, align: Align) -> Command<Message<T>> {
        lift(self.rows.scroll_to_item(index, align))
    }

    fn reset_after_index(&mut self, index: usize) {
        self.rows.reset_after_index(index);
    }
}

impl<T: Record> Component for DataGrid<T> {
    type Message = Message<T>;

    fn update(&mut self, msg: Message<T>) -> Command<Message<T>> {
        self.rows
            .update(msg, &self.key_bindings, self.focus, self.wheel_delta)
    }

    fn view(&self, frame: &mut Frame, area: Rect) {
        let border_style = if self.focus {
            self.style.focused_border
        } else {
            self.style.unfocused_border
        };
        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style);
        if !self.title.is_empty() {
            let state = self.rows.state();
            let more = if state.has_next_page() { "+" } else { "" };
            block = block.title(format!(" {} ({}{more}) ", self.title, state.rows().len()));
        }
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if inner.height == 0 || inner.width == 0 {
            return;
        }

        // One line for the header.
        let data_height = inner.height.saturating_sub(1);
        self.rows.set_viewport_height(data_height);

        let multi = self.rows.selection_mode() == SelectionMode::Multi;
        let mut header_cells = Vec::with_capacity(self.columns.len() + 1);
        let mut widths = Vec::with_capacity(self.columns.len() + 1);
        if multi {
            let mark = if self.rows.all_selected() { "[x]" } else { "[ ]" };
            header_cells.push(RatatuiCell::from(mark).style(self.style.header));
            widths.push(Constraint::Length(3));
        }
        for column in &self.columns {
            header_cells.push(RatatuiCell::from(column.title.as_str()).style(self.style.header));
            widths.push(column.width);
        }
        let header = Row::new(header_cells).height(1);

        let state = self.rows.state();
        if state.rows().is_empty() && !state.has_next_page() {
            let table = RatatuiTable::new(Vec::<Row>::new(), &widths).header(header);
            frame.render_widget(table, inner);
            let body = Rect {
                y: inner.y + 1,
                height: data_height,
                ..inner
            };
            let empty = Paragraph::new(Line::from(self.style.empty_text.as_str()))
                .style(self.style.empty)
                .alignment(Alignment::Center);
            frame.render_widget(empty, body);
            return;
        }

        let Some(range) = self.rows.window().visible_range() else {
            return;
        };
        let mut body = Vec::with_capacity(range.visible_stop - range.visible_start + 1);
        let mut placeholder_line = None;
        for index in range.visible_start..=range.visible_stop {
            match state.rows().get(index) {
                Some(record) => {
                    let checked = self.rows.is_selected(record);
                    let mut cells = Vec::with_capacity(widths.len());
                    if multi {
                        cells.push(RatatuiCell::from(if checked { "[x]" } else { "[ ]" }));
                    }
                    cells.extend(self.columns.iter().map(|c| RatatuiCell::from(c.value(record))));
                    let style = if checked && !multi {
                        self.style.selected
                    } else {
                        self.style.normal
                    };
                    body.push(Row::new(cells).style(style));
                }
                None => {
                    // Drawn over the whole row once the table is rendered.
                    placeholder_line = Some(body.len());
                    body.push(Row::default().style(self.style.placeholder));
                }
            }
        }

        let mut table_state = TableState::default();
        if let Some(cursor) = self.rows.cursor() {
            if (range.visible_start..=range.visible_stop).contains(&cursor) {
                table_state.select(Some(cursor - range.visible_start));
            }
        }

        let table = RatatuiTable::new(body, &widths)
            .header(header)
            .row_highlight_style(self.style.cursor)
            .highlight_symbol(self.style.highlight_symbol.as_str());
        frame.render_stateful_widget(table, inner, &mut table_state);

        if let Some(line) = placeholder_line.and_then(|l| u16::try_from(l).ok()) {
            if line < data_height {
                let gutter = if table_state.selected().is_some() {
                    self.style.highlight_symbol.width() as u16
                } else {
                    0
                };
                let row_area = Rect {
                    x: inner.x.saturating_add(gutter).min(inner.right()),
                    y: inner.y + 1 + line,
                    width: inner.width.saturating_sub(gutter),
                    height: 1,
                };
                let placeholder = Paragraph::new(self.placeholder_text().to_string())
                    .style(self.style.placeholder);
                frame.render_widget(placeholder, row_area);
            }
        }

        let window = self.rows.window();
        if window.total_height() > u32::from(data_height) {
            let mut scrollbar_state = ScrollbarState::new(window.max_scroll() as usize)
                .position(window.scroll_offset() as usize);
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight);
            frame.render_stateful_widget(scrollbar, area, &mut scrollbar_state);
        }
    }

    fn focused(&self) -> bool {
        self.focus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoaderConfig;
    use crate::record::fixtures::{rows, Row as Rec};
    use crate::source::{FetchError, MemorySource, PageRequest};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use grist_core::testing::{buffer_to_string, render_buffer, Effects};
    use std::sync::{Arc, Mutex};

    fn key(code: KeyCode) -> Message<Rec> {
        Message::KeyPress(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(c: char) -> Message<Rec> {
        Message::KeyPress(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    fn columns() -> Vec<Column<Rec>> {
        vec![
            Column::new("Id", Constraint::Length(4), |r: &Rec| r.id.to_string()),
            Column::new("Name", Constraint::Min(8), |r: &Rec| r.name.clone()),
        ]
    }

    fn grid(total: u32, batch: usize) -> DataGrid<Rec> {
        let loader = Loader::new(
            MemorySource::new(rows(0..total)),
            LoaderConfig::default().with_batch_size(batch),
        );
        let mut grid = DataGrid::new(loader, columns()).with_title("Rows");
        grid.focus();
        grid
    }

    /// Feed a command's effects back into the grid until it goes quiet.
    /// Returns the notifications the grid emitted.
    async fn settle(grid: &mut DataGrid<Rec>, cmd: Command<Message<Rec>>) -> Vec<Message<Rec>> {
        let mut effects = Effects::of(cmd);
        let mut emitted = Vec::new();
        loop {
            let messages = effects.take_messages();
            if !messages.is_empty() {
                for msg in messages {
                    match msg {
                        Message::CursorMoved(_)
                        | Message::Confirm(_)
                        | Message::FetchFailed(_) => emitted.push(msg),
                        other => effects.absorb(grid.update(other)),
                    }
                }
                continue;
            }
            match effects.resolve_next().await {
                Some(msg) => effects.absorb(grid.update(msg)),
                None => break,
            }
        }
        emitted
    }

    fn render(grid: &DataGrid<Rec>, width: u16, height: u16) -> String {
        buffer_to_string(&render_buffer(width, height, |frame| {
            let area = frame.area();
            grid.view(frame, area)
        }))
    }

    #[tokio::test]
    async fn renders_first_page_with_placeholder() {
        let mut g = grid(100, 5);
        // Height 8: borders (2) + header (1) + 5 data lines.
        let _ = render(&g, 30, 8);
        let cmd = g.attach();
        settle(&mut g, cmd).await;

        // The first page only just covers the viewport, so one more page
        // was prefetched.
        let out = render(&g, 30, 8);
        assert!(out.contains("Rows (10+)"), "{out}");
        assert!(out.contains("Name"));
        assert!(out.contains("row 0"));
        assert!(out.contains("row 4"));
        assert!(!out.contains("row 5"));
    }

    #[tokio::test]
    async fn placeholder_row_is_rendered_when_visible() {
        let mut g = grid(100, 3);
        let _ = render(&g, 30, 10);
        let cmd = g.attach();
        let first = Effects::of(cmd).resolve_next().await.expect("first page requested");
        // Merge only the first page, then look at the placeholder before the
        // prefetch it triggered completes.
        let pending = g.update(first);
        assert!(pending.is_async());
        let out = render(&g, 30, 10);
        assert!(out.contains("row 2"));
        assert!(out.contains("Loading…"), "{out}");
    }

    #[tokio::test]
    async fn empty_source_shows_empty_text() {
        let mut g = grid(0, 5);
        let cmd = g.attach();
        settle(&mut g, cmd).await;
        let out = render(&g, 30, 6);
        assert!(out.contains("No records"), "{out}");
        assert!(out.contains("Rows (0)"));
    }

    #[tokio::test]
    async fn moving_down_emits_cursor_and_prefetches() {
        let mut g = grid(40, 10);
        let _ = render(&g, 30, 6);
        let cmd = g.attach();
        settle(&mut g, cmd).await;
        assert_eq!(g.records().len(), 10);

        let cmd = g.update(key(KeyCode::Down));
        let emitted = settle(&mut g, cmd).await;
        assert!(matches!(emitted.as_slice(), [Message::CursorMoved(1)]));

        let cmd = g.update(key(KeyCode::End));
        settle(&mut g, cmd).await;
        assert_eq!(g.records().len(), 20);
        assert_eq!(g.cursor(), Some(9));
    }

    #[tokio::test]
    async fn unfocused_grid_ignores_keys() {
        let mut g = grid(40, 10);
        let cmd = g.attach();
        settle(&mut g, cmd).await;
        g.blur();
        assert!(g.update(key(KeyCode::Down)).is_none());
        assert_eq!(g.cursor(), Some(0));
    }

    #[tokio::test]
    async fn confirm_selects_in_single_mode() {
        let mut g = grid(10, 20);
        let cmd = g.attach();
        settle(&mut g, cmd).await;
        g.update(key(KeyCode::Down));
        let cmd = g.update(key(KeyCode::Enter));
        assert!(matches!(cmd.into_message(), Some(Message::Confirm(1))));
        assert_eq!(g.selected_items().len(), 1);
        assert_eq!(g.selected_items()[0].id, 1);
    }

    #[tokio::test]
    async fn multi_mode_toggles_and_renders_checkboxes() {
        let changes = Arc::new(Mutex::new(0));
        let counter = changes.clone();
        let loader = Loader::new(
            MemorySource::new(rows(0..3)),
            LoaderConfig::default().with_batch_size(10),
        );
        let mut g = DataGrid::new(loader, columns())
            .with_selection_mode(SelectionMode::Multi)
            .on_select_change(move |_| *counter.lock().unwrap() += 1);
        g.focus();
        let cmd = g.attach();
        settle(&mut g, cmd).await;

        g.update(key(KeyCode::Char(' ')));
        let out = render(&g, 30, 7);
        assert!(out.contains("[x]"));
        assert_eq!(g.selected_items().len(), 1);

        g.update(ctrl('a'));
        assert_eq!(g.selected_items().len(), 3);
        g.update(ctrl('a'));
        assert!(g.selected_items().is_empty());
        assert_eq!(*changes.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn failed_fetch_is_reported() {
        let source = |_req: PageRequest, _last: Option<Rec>| async {
            Err::<Option<Vec<Rec>>, _>(FetchError::message("backend down"))
        };
        let mut g = DataGrid::new(Loader::new(source, LoaderConfig::default()), columns());
        let cmd = g.attach();
        let emitted = settle(&mut g, cmd).await;
        match emitted.as_slice() {
            [Message::FetchFailed(err)] => assert_eq!(err.to_string(), "backend down"),
            other => panic!("unexpected notifications: {other:?}"),
        }
        assert!(!g.state().is_loading());
    }

    #[tokio::test]
    async fn handle_messages_reset_and_edit_rows() {
        let mut g = grid(30, 10);
        let cmd = g.attach();
        settle(&mut g, cmd).await;

        g.update(Message::Insert(Rec::named(99, "new"), 0));
        assert_eq!(g.records()[0].id, 99);
        g.update(Message::Delete(0));
        assert_eq!(g.records()[0].id, 0);

        g.update(Message::SelectItem(Rec::new(3), true));
        g.update(Message::Select(5));
        assert_eq!(g.selected_items()[0].id, 5);

        let cmd = g.update(Message::Reset(Reset::new()));
        assert!(g.records().is_empty());
        settle(&mut g, cmd).await;
        assert_eq!(g.records().first().map(|r| r.id), Some(0));
        assert_eq!(g.state().epoch(), 1);
    }

    #[tokio::test]
    async fn wheel_scrolls_without_moving_cursor() {
        let mut g = grid(10, 10);
        let _ = render(&g, 30, 6);
        let cmd = g.attach();
        settle(&mut g, cmd).await;
        g.update(Message::MouseWheel { up: false });
        assert_eq!(g.adapter().window().scroll_offset(), 3);
        assert_eq!(g.cursor(), Some(0));
        let out = render(&g, 30, 6);
        assert!(out.contains("row 3"));
        assert!(!out.contains("row 0 "));
    }

    #[tokio::test]
    async fn scroll_to_item_brings_row_into_view() {
        let mut g = grid(50, 50);
        let _ = render(&g, 30, 6);
        let cmd = g.attach();
        settle(&mut g, cmd).await;
        let cmd = g.scroll_to_item(20, Align::Start);
        settle(&mut g, cmd).await;
        let out = render(&g, 30, 6);
        assert!(out.contains("row 20"), "{out}");
    }
}
