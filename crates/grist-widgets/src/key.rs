//! Key bindings for row navigation and selection, plus a help-line renderer.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::style::Style;
use ratatui::text::{Line, Span};

/// One or more key combinations bound to a described action.
#[derive(Debug, Clone)]
pub struct Binding {
    pub keys: Vec<KeyCombination>,
    /// Shown in the help line.
    pub description: String,
    /// Disabled bindings never match.
    pub enabled: bool,
}

/// A key code with the exact modifiers that must be held.
///
/// Shift is ignored for character keys, since the character itself already
/// encodes it (`G` arrives as shift+`G`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombination {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl Binding {
    pub fn new(key: KeyCombination, description: impl Into<String>) -> Self {
        Self::with_keys(vec![key], description)
    }

    pub fn with_keys(keys: Vec<KeyCombination>, description: impl Into<String>) -> Self {
        Self {
            keys,
            description: description.into(),
            enabled: true,
        }
    }

    pub fn matches(&self, event: &KeyEvent) -> bool {
        self.enabled && self.keys.iter().any(|k| k.matches(event))
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Label of the first key, e.g. `ctrl+r`.
    pub fn label(&self) -> String {
        self.keys.first().map(KeyCombination::label).unwrap_or_default()
    }
}

impl KeyCombination {
    pub fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::NONE,
        }
    }

    pub fn ctrl(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::CONTROL,
        }
    }

    pub fn alt(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::ALT,
        }
    }

    pub fn matches(&self, event: &KeyEvent) -> bool {
        let mut modifiers = event.modifiers;
        if matches!(event.code, KeyCode::Char(_)) {
            modifiers.remove(KeyModifiers::SHIFT);
        }
        self.code == event.code && modifiers == self.modifiers
    }

    /// Short human-readable form.
    pub fn label(&self) -> String {
        let key = match self.code {
            KeyCode::Up => "↑".to_string(),
            KeyCode::Down => "↓".to_string(),
            KeyCode::Left => "←".to_string(),
            KeyCode::Right => "→".to_string(),
            KeyCode::PageUp => "pgup".to_string(),
            KeyCode::PageDown => "pgdn".to_string(),
            KeyCode::Home => "home".to_string(),
            KeyCode::End => "end".to_string(),
            KeyCode::Enter => "enter".to_string(),
            KeyCode::Esc => "esc".to_string(),
            KeyCode::Tab => "tab".to_string(),
            KeyCode::Char(' ') => "space".to_string(),
            KeyCode::Char(c) => c.to_string(),
            KeyCode::F(n) => format!("f{n}"),
            other => format!("{other:?}").to_lowercase(),
        };
        let mut label = String::new();
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            label.push_str("ctrl+");
        }
        if self.modifiers.contains(KeyModifiers::ALT) {
            label.push_str("alt+");
        }
        label.push_str(&key);
        label
    }
}

/// Types that expose their bindings for help display.
pub trait KeyMap {
    /// The most important bindings, for a one-line hint.
    fn short_help(&self) -> Vec<&Binding>;
}

/// Render `key description` pairs separated by ` • `, skipping disabled
/// bindings.
pub fn help_line(keymap: &dyn KeyMap, key_style: Style, desc_style: Style) -> Line<'static> {
    let mut spans = Vec::new();
    for binding in keymap.short_help().into_iter().filter(|b| b.enabled) {
        if !spans.is_empty() {
            spans.push(Span::styled(" • ", desc_style));
        }
        spans.push(Span::styled(binding.label(), key_style));
        spans.push(Span::styled(format!(" {}", binding.description), desc_style));
    }
    Line::from(spans)
}

/// Bindings shared by [`DataGrid`](crate::grid::DataGrid) and
/// [`DataList`](crate::list::DataList).
#[derive(Debug, Clone)]
pub struct RowKeyBindings {
    pub up: Binding,
    pub down: Binding,
    pub page_up: Binding,
    pub page_down: Binding,
    pub half_up: Binding,
    pub half_down: Binding,
    pub first: Binding,
    pub last: Binding,
    /// Activate the row under the cursor.
    pub confirm: Binding,
    /// Check or uncheck the row under the cursor.
    pub toggle: Binding,
    /// Check or uncheck every loaded row.
    pub select_all: Binding,
    /// Re-fetch the most recent page.
    pub refresh: Binding,
}

impl Default for RowKeyBindings {
    fn default() -> Self {
        Self {
            up: Binding::with_keys(
                vec![
                    KeyCombination::new(KeyCode::Up),
                    KeyCombination::new(KeyCode::Char('k')),
                ],
                "up",
            ),
            down: Binding::with_keys(
                vec![
                    KeyCombination::new(KeyCode::Down),
                    KeyCombination::new(KeyCode::Char('j')),
                ],
                "down",
            ),
            page_up: Binding::with_keys(
                vec![
                    KeyCombination::new(KeyCode::PageUp),
                    KeyCombination::ctrl(KeyCode::Char('b')),
                ],
                "page up",
            ),
            page_down: Binding::with_keys(
                vec![
                    KeyCombination::new(KeyCode::PageDown),
                    KeyCombination::ctrl(KeyCode::Char('f')),
                ],
                "page down",
            ),
            half_up: Binding::new(KeyCombination::ctrl(KeyCode::Char('u')), "half page up"),
            half_down: Binding::new(KeyCombination::ctrl(KeyCode::Char('d')), "half page down"),
            first: Binding::with_keys(
                vec![
                    KeyCombination::new(KeyCode::Home),
                    KeyCombination::new(KeyCode::Char('g')),
                ],
                "first",
            ),
            last: Binding::with_keys(
                vec![
                    KeyCombination::new(KeyCode::End),
                    KeyCombination::new(KeyCode::Char('G')),
                ],
                "last",
            ),
            confirm: Binding::new(KeyCombination::new(KeyCode::Enter), "open"),
            toggle: Binding::new(KeyCombination::new(KeyCode::Char(' ')), "select"),
            select_all: Binding::new(KeyCombination::ctrl(KeyCode::Char('a')), "select all"),
            refresh: Binding::new(KeyCombination::ctrl(KeyCode::Char('r')), "refresh"),
        }
    }
}

impl KeyMap for RowKeyBindings {
    fn short_help(&self) -> Vec<&Binding> {
        vec![
            &self.up,
            &self.down,
            &self.confirm,
            &self.toggle,
            &self.select_all,
            &self.refresh,
        ]
    }
}
