//! Application-wide notifications rendered as toasts.
//!
//! [`Notifier`] is a cheap, cloneable handle to one queue. Create it once at
//! the top of the application and pass clones to whatever needs to report
//! something; draw the queue with a [`NotifierView`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use grist_core::command::Command;
use grist_core::component::Component;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Oldest notices are dropped beyond this many.
pub const DEFAULT_CAPACITY: usize = 16;
/// Time-to-live of notices posted without an explicit one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    pub fn label(self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Success => "ok",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }
}

/// One queued notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub level: Level,
    pub text: String,
    pub created: Instant,
    /// `None` keeps the notice until it is dismissed.
    pub ttl: Option<Duration>,
}

impl Notice {
    pub fn is_expired(&self, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.saturating_duration_since(self.created) >= ttl)
    }
}

#[derive(Debug)]
struct Queue {
    notices: VecDeque<Notice>,
    next_id: u64,
    capacity: usize,
    default_ttl: Option<Duration>,
}

/// Shared handle to the notification queue.
#[derive(Debug, Clone)]
pub struct Notifier {
    queue: Arc<Mutex<Queue>>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(Queue {
                notices: VecDeque::new(),
                next_id: 1,
                capacity: DEFAULT_CAPACITY,
                default_ttl: Some(DEFAULT_TTL),
            })),
        }
    }

    pub fn with_capacity(self, capacity: usize) -> Self {
        self.lock().capacity = capacity.max(1);
        self
    }

    /// Time-to-live for notices posted through [`notify`](Self::notify) and
    /// the level shortcuts. `None` makes them sticky.
    pub fn with_default_ttl(self, ttl: Option<Duration>) -> Self {
        self.lock().default_ttl = ttl;
        self
    }

    // A panic while holding the lock cannot leave the queue inconsistent,
    // so a poisoned lock is used as is.
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Post a notice with the default time-to-live. Returns its id.
    pub fn notify(&self, level: Level, text: impl Into<String>) -> u64 {
        let ttl = self.lock().default_ttl;
        self.notify_for(level, text, ttl)
    }

    /// Post a notice with an explicit time-to-live.
    pub fn notify_for(&self, level: Level, text: impl Into<String>, ttl: Option<Duration>) -> u64 {
        let mut queue = self.lock();
        let id = queue.next_id;
        queue.next_id += 1;
        queue.notices.push_back(Notice {
            id,
            level,
            text: text.into(),
            created: Instant::now(),
            ttl,
        });
        while queue.notices.len() > queue.capacity {
            queue.notices.pop_front();
        }
        tracing::debug!(id, level = level.label(), "notice posted");
        id
    }

    pub fn info(&self, text: impl Into<String>) -> u64 {
        self.notify(Level::Info, text)
    }

    pub fn success(&self, text: impl Into<String>) -> u64 {
        self.notify(Level::Success, text)
    }

    pub fn warn(&self, text: impl Into<String>) -> u64 {
        self.notify(Level::Warning, text)
    }

    pub fn error(&self, text: impl Into<String>) -> u64 {
        self.notify(Level::Error, text)
    }

    /// Remove a notice. Returns false if it was already gone.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut queue = self.lock();
        let before = queue.notices.len();
        queue.notices.retain(|n| n.id != id);
        queue.notices.len() != before
    }

    /// Remove the most recent notice.
    pub fn dismiss_latest(&self) -> Option<Notice> {
        self.lock().notices.pop_back()
    }

    pub fn dismiss_all(&self) {
        self.lock().notices.clear();
    }

    /// Snapshot of the queue, oldest first.
    pub fn notices(&self) -> Vec<Notice> {
        self.lock().notices.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().notices.is_empty()
    }

    /// Drop notices whose time-to-live has elapsed at `now`. Returns how many
    /// were removed.
    pub fn prune(&self, now: Instant) -> usize {
        let mut queue = self.lock();
        let before = queue.notices.len();
        queue.notices.retain(|n| !n.is_expired(now));
        before - queue.notices.len()
    }
}

/// Messages for [`NotifierView`].
#[derive(Debug, Clone)]
pub enum Message {
    Dismiss(u64),
    DismissLatest,
    /// Periodic expiry check.
    Prune(Instant),
}

#[derive(Debug, Clone)]
pub struct NotifierStyle {
    pub info: Style,
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub text: Style,
    /// Widest a toast may grow, borders included.
    pub max_width: u16,
    /// Toasts shown at once, newest first.
    pub max_visible: usize,
}

impl Default for NotifierStyle {
    fn default() -> Self {
        Self {
            info: Style::default().fg(Color::Blue),
            success: Style::default().fg(Color::Green),
            warning: Style::default().fg(Color::Yellow),
            error: Style::default().fg(Color::Red),
            text: Style::default(),
            max_width: 48,
            max_visible: 3,
        }
    }
}

impl NotifierStyle {
    fn border(&self, level: Level) -> Style {
        match level {
            Level::Info => self.info,
            Level::Success => self.success,
            Level::Warning => self.warning,
            Level::Error => self.error,
        }
    }
}

/// Renders the notifier's queue as toasts stacked in the top-right corner
/// of its area. Draw it last so toasts sit above everything else.
pub struct NotifierView {
    notifier: Notifier,
    style: NotifierStyle,
    interval: Duration,
}

impl NotifierView {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            notifier,
            style: NotifierStyle::default(),
            interval: Duration::from_millis(250),
        }
    }

    pub fn with_style(mut self, style: NotifierStyle) -> Self {
        self.style = style;
        self
    }

    /// How often expired notices are pruned.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Start the expiry timer. Call once from the host's `init`.
    pub fn start(&self) -> Command<Message> {
        Command::tick(self.interval, Message::Prune)
    }

    fn toast_width(&self, text: &str, area: Rect) -> u16 {
        let wanted = u16::try_from(text.width()).unwrap_or(u16::MAX).saturating_add(4);
        wanted.min(self.style.max_width).min(area.width)
    }
}

impl Component for NotifierView {
    type Message = Message;

    fn update(&mut self, msg: Message) -> Command<Message> {
        match msg {
            Message::Dismiss(id) => {
                self.notifier.dismiss(id);
                Command::none()
            }
            Message::DismissLatest => {
                self.notifier.dismiss_latest();
                Command::none()
            }
            Message::Prune(now) => {
                self.notifier.prune(now);
                self.start()
            }
        }
    }

    fn view(&self, frame: &mut Frame, area: Rect) {
        let notices = self.notifier.notices();
        let mut y = area.y;
        for notice in notices.iter().rev().take(self.style.max_visible) {
            if y + 3 > area.bottom() {
                break;
            }
            let width = self.toast_width(&notice.text, area);
            if width < 5 {
                break;
            }
            let rect = Rect::new(area.right() - width, y, width, 3);
            let text = truncate(&notice.text, usize::from(width - 4));
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(self.style.border(notice.level))
                .title(format!(" {} ", notice.level.label()));
            frame.render_widget(Clear, rect);
            frame.render_widget(
                Paragraph::new(format!(" {text}"))
                    .style(self.style.text)
                    .block(block),
                rect,
            );
            y += 3;
        }
    }
}

/// Cut `text` to at most `width` columns, ending in `…` when shortened.
fn truncate(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use grist_core::testing::{buffer_to_string, render_buffer};

    #[test]
    fn notices_get_increasing_ids() {
        let n = Notifier::new();
        let a = n.info("first");
        let b = n.error("second");
        assert!(b > a);
        let levels: Vec<Level> = n.notices().iter().map(|n| n.level).collect();
        assert_eq!(levels, vec![Level::Info, Level::Error]);
    }

    #[test]
    fn clones_share_one_queue() {
        let n = Notifier::new();
        let other = n.clone();
        other.warn("disk almost full");
        assert_eq!(n.len(), 1);
        n.dismiss_all();
        assert!(other.is_empty());
    }

    #[test]
    fn capacity_drops_oldest() {
        let n = Notifier::new().with_capacity(2);
        n.info("a");
        n.info("b");
        n.info("c");
        let texts: Vec<String> = n.notices().into_iter().map(|n| n.text).collect();
        assert_eq!(texts, vec!["b", "c"]);
    }

    #[test]
    fn prune_removes_only_expired() {
        let n = Notifier::new();
        n.notify_for(Level::Info, "short", Some(Duration::from_secs(1)));
        n.notify_for(Level::Error, "sticky", None);
        n.notify_for(Level::Info, "long", Some(Duration::from_secs(60)));

        let later = Instant::now() + Duration::from_secs(2);
        assert_eq!(n.prune(later), 1);
        let texts: Vec<String> = n.notices().into_iter().map(|n| n.text).collect();
        assert_eq!(texts, vec!["sticky", "long"]);
    }

    #[test]
    fn dismiss_by_id_and_latest() {
        let n = Notifier::new();
        let a = n.info("a");
        n.info("b");
        assert!(n.dismiss(a));
        assert!(!n.dismiss(a));
        assert_eq!(n.dismiss_latest().map(|n| n.text), Some("b".to_string()));
        assert!(n.is_empty());
    }

    #[test]
    fn truncates_by_display_width() {
        assert_eq!(truncate("hello", 5), "hello");
        assert_eq!(truncate("hello world", 6), "hello…");
        // Wide characters take two columns each.
        assert_eq!(truncate("日本語テキスト", 5), "日本…");
    }

    #[test]
    fn view_renders_newest_first() {
        let n = Notifier::new();
        n.info("loaded 50 rows");
        n.error("backend down");
        let view = NotifierView::new(n);
        let out = buffer_to_string(&render_buffer(40, 8, |frame| {
            let area = frame.area();
            view.view(frame, area)
        }));
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].contains("error"), "{out}");
        assert!(lines[1].contains("backend down"));
        assert!(lines[4].contains("loaded 50 rows"));
    }

    #[test]
    fn update_dismisses_and_reschedules_prune() {
        let n = Notifier::new();
        n.info("a");
        let id = n.info("b");
        let mut view = NotifierView::new(n.clone());

        assert!(view.update(Message::Dismiss(id)).is_none());
        assert_eq!(n.len(), 1);

        let cmd = view.update(Message::Prune(Instant::now() + Duration::from_secs(10)));
        assert!(n.is_empty());
        assert!(cmd.is_async());
    }
}
