use crossterm::event::{KeyEvent, KeyEventKind, MouseEvent};

/// Terminal input delivered to [`Model::on_event`](crate::Model::on_event).
///
/// Each variant wraps the corresponding [`crossterm::event::Event`] payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// A key press. Release and repeat events are filtered out by the runtime.
    Key(KeyEvent),
    /// A mouse event (only delivered when mouse capture is enabled).
    Mouse(MouseEvent),
    /// Terminal resized to (columns, rows).
    Resize(u16, u16),
    /// Terminal window gained focus.
    FocusGained,
    /// Terminal window lost focus.
    FocusLost,
    /// Bracketed paste content.
    Paste(String),
}

impl TerminalEvent {
    /// Convert a raw crossterm event, dropping key releases so components
    /// see exactly one event per key press on every platform.
    pub fn from_crossterm(event: crossterm::event::Event) -> Option<Self> {
        use crossterm::event::Event;
        match event {
            Event::Key(k) if k.kind == KeyEventKind::Release => None,
            Event::Key(k) => Some(TerminalEvent::Key(k)),
            Event::Mouse(m) => Some(TerminalEvent::Mouse(m)),
            Event::Resize(w, h) => Some(TerminalEvent::Resize(w, h)),
            Event::FocusGained => Some(TerminalEvent::FocusGained),
            Event::FocusLost => Some(TerminalEvent::FocusLost),
            Event::Paste(s) => Some(TerminalEvent::Paste(s)),
        }
    }
}
