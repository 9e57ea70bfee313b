//! # Customers
//!
//! A data grid over ten thousand customers served by a slow, occasionally
//! failing backend:
//! - pages load as you scroll, with a placeholder row while one is in flight
//! - `o` flips the sort order and `a` toggles an "active only" filter, both
//!   through `Reset` so stale pages are discarded
//! - failed fetches show up as toasts; the next scroll retries
//!
//! Run with: `cargo run --example customers`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use grist::crossterm::event::{KeyCode, MouseEventKind};
use grist::ratatui::layout::{Constraint, Layout};
use grist::ratatui::style::{Color, Modifier, Style};
use grist::ratatui::text::Span;
use grist::ratatui::Frame;
use grist::widgets::grid::{self, Column, DataGrid};
use grist::widgets::key::{help_line, Binding, KeyCombination, KeyMap};
use grist::widgets::notification::{self, Notifier, NotifierView};
use grist::widgets::{
    DataSource, FetchError, FetchResult, Loader, LoaderConfig, PageRequest, Record, Reset,
    SelectionMode,
};
use grist::{Command, Component, Model, ProgramOptions, TerminalEvent};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Serialize)]
struct Customer {
    id: u32,
    name: String,
    city: String,
    active: bool,
}

impl Record for Customer {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }
}

const CITIES: [&str; 6] = ["Lisbon", "Oslo", "Austin", "Osaka", "Lagos", "Quito"];

fn customers() -> Vec<Customer> {
    (0..10_000)
        .map(|id| Customer {
            id,
            name: format!("Customer {id:05}"),
            city: CITIES[id as usize % CITIES.len()].to_string(),
            active: id % 3 != 0,
        })
        .collect()
}

/// Pretend backend: answers after a delay and fails every seventh request.
struct Backend {
    rows: Arc<Vec<Customer>>,
    requests: AtomicUsize,
}

impl DataSource<Customer> for Backend {
    fn load(
        &self,
        request: PageRequest,
        _last_item: Option<Customer>,
    ) -> BoxFuture<'static, FetchResult<Customer>> {
        let rows = Arc::clone(&self.rows);
        let n = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        Box::pin(async move {
            grist::tokio::time::sleep(Duration::from_millis(400)).await;
            if n % 7 == 0 {
                return Err(FetchError::message(format!(
                    "backend timed out on page {}",
                    request.page
                )));
            }
            tracing::debug!(
                request = %serde_json::to_string(&request).unwrap_or_default(),
                "serving page"
            );
            let active_only = request
                .query
                .as_ref()
                .and_then(|q| q.get("active"))
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let mut matching: Vec<&Customer> =
                rows.iter().filter(|c| !active_only || c.active).collect();
            if request.order_by_asc == Some(false) {
                matching.reverse();
            }
            let page = matching
                .into_iter()
                .skip(request.offset())
                .take(request.batch_size)
                .cloned()
                .collect();
            Ok(Some(page))
        })
    }
}

/// Keys handled by the app itself rather than the grid.
struct AppKeys {
    order: Binding,
    filter: Binding,
    dismiss: Binding,
    quit: Binding,
}

impl Default for AppKeys {
    fn default() -> Self {
        Self {
            order: Binding::new(KeyCombination::new(KeyCode::Char('o')), "sort order"),
            filter: Binding::new(KeyCombination::new(KeyCode::Char('a')), "active only"),
            dismiss: Binding::new(KeyCombination::new(KeyCode::Esc), "dismiss"),
            quit: Binding::new(KeyCombination::new(KeyCode::Char('q')), "quit"),
        }
    }
}

impl KeyMap for AppKeys {
    fn short_help(&self) -> Vec<&Binding> {
        vec![&self.order, &self.filter, &self.dismiss, &self.quit]
    }
}

struct App {
    grid: DataGrid<Customer>,
    toasts: NotifierView,
    notifier: Notifier,
    keys: AppKeys,
    ascending: bool,
    active_only: bool,
}

enum Msg {
    Grid(grid::Message<Customer>),
    Toast(notification::Message),
    ToggleOrder,
    ToggleActive,
    Quit,
}

impl App {
    fn reload(&mut self) -> Command<Msg> {
        let overrides = Reset::new()
            .order_by("id")
            .order_by_asc(self.ascending)
            .query(json!({ "active": self.active_only }));
        self.grid.update(grid::Message::Reset(overrides)).map(Msg::Grid)
    }
}

impl Model for App {
    type Message = Msg;
    type Flags = ();

    fn init(_: ()) -> (Self, Command<Msg>) {
        let config = LoaderConfig::default()
            .with_batch_size(40)
            .with_order_by("id", true);
        let backend = Backend {
            rows: Arc::new(customers()),
            requests: AtomicUsize::new(0),
        };
        let loader = Loader::new(backend, config);
        let mut grid = DataGrid::new(
            loader,
            vec![
                Column::new("Id", Constraint::Length(6), |c: &Customer| c.id.to_string()),
                Column::new("Name", Constraint::Min(16), |c: &Customer| c.name.clone()),
                Column::new("City", Constraint::Length(10), |c: &Customer| c.city.clone()),
                Column::new("Active", Constraint::Length(6), |c: &Customer| {
                    (if c.active { "yes" } else { "no" }).to_string()
                }),
            ],
        )
        .with_title("Customers")
        .with_selection_mode(SelectionMode::Multi);
        grid.focus();

        let notifier = Notifier::new();
        let toasts = NotifierView::new(notifier.clone());
        let cmd = Command::batch([
            grid.attach().map(Msg::Grid),
            toasts.start().map(Msg::Toast),
        ]);
        (
            App {
                grid,
                toasts,
                notifier,
                keys: AppKeys::default(),
                ascending: true,
                active_only: false,
            },
            cmd,
        )
    }

    fn update(&mut self, msg: Msg) -> Command<Msg> {
        match msg {
            Msg::Grid(grid::Message::FetchFailed(err)) => {
                self.notifier.error(format!("{err} (move the cursor to retry)"));
                Command::none()
            }
            Msg::Grid(grid::Message::Confirm(index)) => {
                if let Some(customer) = self.grid.records().get(index) {
                    self.notifier.info(format!("Opened {}", customer.name));
                }
                Command::none()
            }
            Msg::Grid(m) => self.grid.update(m).map(Msg::Grid),
            Msg::Toast(m) => self.toasts.update(m).map(Msg::Toast),
            Msg::ToggleOrder => {
                self.ascending = !self.ascending;
                self.reload()
            }
            Msg::ToggleActive => {
                self.active_only = !self.active_only;
                self.reload()
            }
            Msg::Quit => Command::quit(),
        }
    }

    fn view(&self, frame: &mut Frame) {
        let [body, footer] =
            Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(frame.area());
        self.grid.view(frame, body);

        let key_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
        let desc_style = Style::default().fg(Color::DarkGray);
        let mut help = help_line(self.grid.key_bindings(), key_style, desc_style);
        help.spans.push(Span::styled(" • ", desc_style));
        help.spans
            .extend(help_line(&self.keys, key_style, desc_style).spans);
        frame.render_widget(help, footer);

        self.toasts.view(frame, body);
    }

    fn on_event(&self, event: TerminalEvent) -> Option<Msg> {
        match event {
            TerminalEvent::Key(key) => {
                if self.keys.quit.matches(&key) {
                    Some(Msg::Quit)
                } else if self.keys.dismiss.matches(&key) {
                    Some(Msg::Toast(notification::Message::DismissLatest))
                } else if self.keys.order.matches(&key) {
                    Some(Msg::ToggleOrder)
                } else if self.keys.filter.matches(&key) {
                    Some(Msg::ToggleActive)
                } else {
                    Some(Msg::Grid(grid::Message::KeyPress(key)))
                }
            }
            TerminalEvent::Mouse(mouse) => match mouse.kind {
                MouseEventKind::ScrollUp => Some(Msg::Grid(grid::Message::MouseWheel { up: true })),
                MouseEventKind::ScrollDown => {
                    Some(Msg::Grid(grid::Message::MouseWheel { up: false }))
                }
                _ => None,
            },
            TerminalEvent::Resize(..) => Some(Msg::Grid(grid::Message::Sync)),
            _ => None,
        }
    }
}

#[grist::tokio::main]
async fn main() -> Result<(), grist::ProgramError> {
    let options = ProgramOptions {
        title: Some("grist: customers".to_string()),
        log_file: Some("customers.log".into()),
        ..ProgramOptions::default()
    };
    grist::run_with::<App>((), options).await?;
    Ok(())
}
