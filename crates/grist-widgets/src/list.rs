//! A virtualized, incrementally loaded list with variable row heights.
//!
//! Rows are drawn by a [`RowDelegate`], which also reports each row's height
//! so the list can scroll by line rather than by row.

use std::sync::Arc;

use grist_core::command::Command;
use grist_core::component::Component;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
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

/// Key bindings for [`DataList`].
pub type ListKeyBindings = RowKeyBindings;

/// What a delegate knows about the row it is drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowContext {
    /// Index of the row among the loaded rows.
    pub index: usize,
    pub is_cursor: bool,
    pub is_selected: bool,
    /// Columns available to the row, after the highlight gutter.
    pub width: u16,
}

/// Draws list rows.
///
/// `render` should return exactly `height(item)` lines; extra lines are cut
/// and missing ones are left blank. Heights are cached, so a delegate whose
/// row heights change must be followed by
/// [`RowsHandle::reset_after_index`].
///
/// # Example
///
/// ```ignore
/// struct OrderDelegate;
///
/// impl RowDelegate<Order> for OrderDelegate {
///     fn height(&self, _order: &Order) -> u16 {
///         2
///     }
///
///     fn render(&self, order: &Order, _ctx: RowContext) -> Vec<Line<'static>> {
///         vec![
///             Line::from(order.number.clone()),
///             Line::styled(order.customer.clone(), Style::default().fg(Color::DarkGray)),
///         ]
///     }
/// }
/// ```
pub trait RowDelegate<T>: Send + Sync + 'static {
    fn height(&self, _item: &T) -> u16 {
        1
    }

    fn render(&self, item: &T, ctx: RowContext) -> Vec<Line<'static>>;
}

/// One-line delegate backed by a label function.
pub struct LabelDelegate<T> {
    label: Box<dyn Fn(&T) -> String + Send + Sync>,
}

impl<T> LabelDelegate<T> {
    pub fn new(label: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        Self {
            label: Box::new(label),
        }
    }
}

impl<T: 'static> RowDelegate<T> for LabelDelegate<T> {
    fn render(&self, item: &T, _ctx: RowContext) -> Vec<Line<'static>> {
        vec![Line::from((self.label)(item))]
    }
}

/// Visual styling for [`DataList`].
#[derive(Debug, Clone)]
pub struct ListStyle {
    pub cursor: Style,
    pub selected: Style,
    pub placeholder: Style,
    pub empty: Style,
    pub focused_border: Style,
    pub unfocused_border: Style,
    pub highlight_symbol: String,
    /// Multi-select checkbox marks, checked then unchecked.
    pub checkboxes: (String, String),
    pub loading_text: String,
    pub more_text: String,
    pub empty_text: String,
}

impl Default for ListStyle {
    fn default() -> Self {
        Self {
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
            checkboxes: ("[x] ".to_string(), "[ ] ".to_string()),
            loading_text: "Loading…".to_string(),
            more_text: "…".to_string(),
            empty_text: "Nothing here".to_string(),
        }
    }
}

/// A list over records paged in by a [`Loader`].
pub struct DataList<T: Record> {
    rows: RowsAdapter<T>,
    delegate: Arc<dyn RowDelegate<T>>,
    title: Option<String>,
    focus: bool,
    style: ListStyle,
    key_bindings: ListKeyBindings,
    wheel_delta: u16,
}

impl<T: Record> DataList<T> {
    pub fn new(loader: Loader<T>, delegate: impl RowDelegate<T>) -> Self {
        let delegate: Arc<dyn RowDelegate<T>> = Arc::new(delegate);
        let heights = Arc::clone(&delegate);
        Self {
            rows: RowsAdapter::new(loader)
                .with_item_height(move |row| row.map_or(1, |r| heights.height(r))),
            delegate,
            title: None,
            focus: false,
            style: ListStyle::default(),
            key_bindings: ListKeyBindings::default(),
            wheel_delta: 3,
        }
    }

    /// Draw a bordered block with this title around the list.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_style(mut self, style: ListStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_key_bindings(mut self, key_bindings: ListKeyBindings) -> Self {
        self.key_bindings = key_bindings;
        self
    }

    pub fn with_selection_mode(mut self, mode: SelectionMode) -> Self {
        self.rows = self.rows.with_selection_mode(mode);
        self
    }

    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.rows = self.rows.with_overscan(overscan);
        self
    }

    pub fn with_wheel_delta(mut self, lines: u16) -> Self {
        self.wheel_delta = lines;
        self
    }

    pub fn on_select_change(mut self, callback: impl FnMut(&[T]) + Send + 'static) -> Self {
        self.rows = self
            .rows
            .with_controller(SelectionController::new().on_select_change(callback));
        self
    }

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

    pub fn key_bindings(&self) -> &ListKeyBindings {
        &self.key_bindings
    }

    pub fn attach(&mut self) -> Command<Message<T>> {
        lift(self.rows.attach())
    }

    pub fn detach(&mut self) {
        self.rows.detach();
    }

    fn gutter(&self) -> u16 {
        let mut width = self.style.highlight_symbol.width();
        if self.rows.selection_mode() == SelectionMode::Multi {
            width += self.style.checkboxes.0.width();
        }
        u16::try_from(width).unwrap_or(u16::MAX)
    }

    /// Lines of the slot at `index`, padded or cut to its measured height.
    fn slot_lines(&self, index: usize, width: u16) -> Vec<Line<'static>> {
        let height = usize::from(self.rows.window().item_height(index).unwrap_or(1));
        let Some(record) = self.rows.rows().get(index) else {
            let text = if self.rows.state().is_loading() {
                &self.style.loading_text
            } else {
                &self.style.more_text
            };
            let mut lines = vec![Line::styled(
                format!("{}{text}", " ".repeat(usize::from(self.gutter()))),
                self.style.placeholder,
            )];
            lines.resize(height, Line::default());
            return lines;
        };

        let ctx = RowContext {
            index,
            is_cursor: self.rows.cursor() == Some(index),
            is_selected: self.rows.is_selected(record),
            width: width.saturating_sub(self.gutter()),
        };
        let mut lines = self.delegate.render(record, ctx);
        lines.resize(height, Line::default());

        let multi = self.rows.selection_mode() == SelectionMode::Multi;
        let blank_symbol = " ".repeat(self.style.highlight_symbol.width());
        for (i, line) in lines.iter_mut().enumerate() {
            let mut prefix = Vec::with_capacity(2);
            prefix.push(Span::raw(if ctx.is_cursor && i == 0 {
                self.style.highlight_symbol.clone()
            } else {
                blank_symbol.clone()
            }));
            if multi {
                let (on, off) = &self.style.checkboxes;
                prefix.push(Span::raw(match (i, ctx.is_selected) {
                    (0, true) => on.clone(),
                    (0, false) => off.clone(),
                    _ => " ".repeat(on.width()),
                }));
            }
            let mut spans = prefix;
            spans.append(&mut line.spans);
            *line = Line::from(spans).style(line.style);
            if ctx.is_cursor {
                *line = std::mem::take(line).patch_style(self.style.cursor);
            } else if ctx.is_selected && !multi {
                *line = std::mem::take(line).patch_style(self.style.selected);
            }
        }
        lines
    }
}

impl<T: Record> RowsHandle<T> for DataList<T> {
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

impl<T: Record> Component for DataList<T> {
    type Message = Message<T>;

    fn update(&mut self, msg: Message<T>) -> Command<Message<T>> {
        self.rows
            .update(msg, &self.key_bindings, self.focus, self.wheel_delta)
    }

    fn view(&self, frame: &mut Frame, area: Rect) {
        let inner = match &self.title {
            Some(title) => {
                let border_style = if self.focus {
                    self.style.focused_border
                } else {
                    self.style.unfocused_border
                };
                let block = Block::default()
                    .borders(Borders::ALL)
                    .border_style(border_style)
                    .title(format!(" {title} "));
                let inner = block.inner(area);
                frame.render_widget(block, area);
                inner
            }
            None => area,
        };
        if inner.height == 0 || inner.width == 0 {
            return;
        }
        self.rows.set_viewport_height(inner.height);

        let state = self.rows.state();
        if state.rows().is_empty() && !state.has_next_page() {
            let empty = Paragraph::new(Line::from(self.style.empty_text.as_str()))
                .style(self.style.empty)
                .alignment(Alignment::Center);
            frame.render_widget(empty, inner);
            return;
        }

        let window = self.rows.window();
        let Some(range) = window.visible_range() else {
            return;
        };
        let overflow = window.total_height() > u32::from(inner.height);
        let body = if overflow {
            Rect {
                width: inner.width.saturating_sub(1),
                ..inner
            }
        } else {
            inner
        };

        let mut lines = Vec::with_capacity(usize::from(inner.height));
        for index in range.visible_start..=range.visible_stop {
            lines.extend(self.slot_lines(index, body.width));
        }
        let skip = usize::from(window.first_item_clip()).min(lines.len());
        lines.drain(..skip);
        lines.truncate(usize::from(body.height));
        frame.render_widget(Paragraph::new(lines), body);

        if overflow {
            let mut scrollbar_state = ScrollbarState::new(window.max_scroll() as usize)
                .position(window.scroll_offset() as usize);
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(None)
                .end_symbol(None);
            frame.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
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
    use crate::record::fixtures::{rows, Row};
    use crate::source::MemorySource;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use grist_core::testing::{buffer_to_string, render_buffer, Effects};

    /// Two lines for even ids, one for odd.
    struct Tall;

    impl RowDelegate<Row> for Tall {
        fn height(&self, row: &Row) -> u16 {
            if row.id % 2 == 0 {
                2
            } else {
                1
            }
        }

        fn render(&self, row: &Row, _ctx: RowContext) -> Vec<Line<'static>> {
            let mut lines = vec![Line::from(row.name.clone())];
            if row.id % 2 == 0 {
                lines.push(Line::from(format!("  detail {}", row.id)));
            }
            lines
        }
    }

    fn list<D: RowDelegate<Row>>(total: u32, batch: usize, delegate: D) -> DataList<Row> {
        let loader = Loader::new(
            MemorySource::new(rows(0..total)),
            LoaderConfig::default().with_batch_size(batch),
        );
        let mut list = DataList::new(loader, delegate).with_overscan(0);
        list.focus();
        list
    }

    async fn settle(list: &mut DataList<Row>, cmd: Command<Message<Row>>) {
        let mut effects = Effects::of(cmd);
        loop {
            let messages = effects.take_messages();
            if !messages.is_empty() {
                for msg in messages {
                    effects.absorb(list.update(msg));
                }
                continue;
            }
            match effects.resolve_next().await {
                Some(msg) => effects.absorb(list.update(msg)),
                None => break,
            }
        }
    }

    fn render(list: &DataList<Row>, width: u16, height: u16) -> String {
        buffer_to_string(&render_buffer(width, height, |frame| {
            let area = frame.area();
            list.view(frame, area)
        }))
    }

    fn key(code: KeyCode) -> Message<Row> {
        Message::KeyPress(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[tokio::test]
    async fn variable_heights_are_measured_from_the_delegate() {
        let mut l = list(6, 10, Tall);
        let _ = render(&l, 20, 4);
        let cmd = l.attach();
        settle(&mut l, cmd).await;

        // 2 + 1 + 2 + 1 + 2 + 1
        assert_eq!(l.adapter().window().total_height(), 9);
        let out = render(&l, 20, 4);
        assert!(out.contains("row 0"));
        assert!(out.contains("detail 0"));
        assert!(out.contains("row 2"));
        assert!(!out.contains("detail 2"), "{out}");
    }

    #[tokio::test]
    async fn partially_scrolled_row_is_clipped() {
        let mut l = list(6, 10, Tall);
        let _ = render(&l, 20, 3);
        let cmd = l.attach();
        settle(&mut l, cmd).await;

        let cmd = l.scroll_to(1);
        settle(&mut l, cmd).await;
        let out = render(&l, 20, 3);
        let first = out.lines().next().unwrap_or_default();
        assert!(first.contains("detail 0"), "{out}");
        assert!(!out.contains("row 0"));
        assert!(out.contains("row 1"));
    }

    #[tokio::test]
    async fn cursor_row_gets_highlight_symbol() {
        let mut l = list(5, 10, LabelDelegate::new(|r: &Row| r.name.clone()));
        let cmd = l.attach();
        settle(&mut l, cmd).await;
        l.update(key(KeyCode::Down));
        let out = render(&l, 20, 5);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[1].starts_with("▸ row 1"), "{out}");
        assert!(lines[0].starts_with("  row 0"));
    }

    #[tokio::test]
    async fn wide_highlight_symbol_keeps_rows_aligned() {
        let style = ListStyle {
            highlight_symbol: "＞".to_string(),
            ..ListStyle::default()
        };
        let mut l = list(3, 10, LabelDelegate::new(|r: &Row| r.name.clone())).with_style(style);
        let cmd = l.attach();
        settle(&mut l, cmd).await;
        l.update(key(KeyCode::Down));

        let buf = render_buffer(20, 3, |frame| {
            let area = frame.area();
            l.view(frame, area)
        });
        let text_column = |y: u16| (0..20).find(|&x| buf[(x, y)].symbol() == "r");
        assert_eq!(text_column(1), Some(2), "{}", buffer_to_string(&buf));
        assert_eq!(text_column(0), text_column(1));
        assert_eq!(text_column(2), text_column(1));
    }

    #[tokio::test]
    async fn multi_mode_draws_checkboxes() {
        let mut l = list(3, 10, LabelDelegate::new(|r: &Row| r.name.clone()))
            .with_selection_mode(SelectionMode::Multi);
        let cmd = l.attach();
        settle(&mut l, cmd).await;
        l.update(key(KeyCode::Char(' ')));
        let out = render(&l, 20, 3);
        assert!(out.contains("[x] row 0"), "{out}");
        assert!(out.contains("[ ] row 1"));
    }

    #[tokio::test]
    async fn placeholder_and_empty_states() {
        let mut l = list(100, 2, LabelDelegate::new(|r: &Row| r.name.clone()))
            .with_title("Rows");
        let _ = render(&l, 20, 12);
        let cmd = l.attach();
        let first = Effects::of(cmd).resolve_next().await.expect("first page");
        let _pending = l.update(first);
        let out = render(&l, 20, 12);
        assert!(out.contains("Loading…"), "{out}");

        let mut empty = list(0, 5, LabelDelegate::new(|r: &Row| r.name.clone()));
        let cmd = empty.attach();
        settle(&mut empty, cmd).await;
        assert!(render(&empty, 20, 3).contains("Nothing here"));
    }

    #[tokio::test]
    async fn edits_keep_geometry_in_step() {
        let mut l = list(4, 10, LabelDelegate::new(|r: &Row| r.name.clone()));
        let cmd = l.attach();
        settle(&mut l, cmd).await;
        assert_eq!(l.adapter().window().total_height(), 4);

        l.delete(1);
        l.insert(Row::named(7, "seven"), 3);
        assert_eq!(l.records().iter().map(|r| r.id).collect::<Vec<_>>(), vec![0, 2, 3, 7]);
        l.reset_after_index(0);
        assert_eq!(l.adapter().window().total_height(), 4);
    }
}
