//! # Orders
//!
//! A list of orders drawn by a custom delegate with two-line rows:
//! - `n` inserts a new order under the cursor, `d` deletes the current one
//! - space checks orders, ctrl+a checks every loaded order
//! - `e` toggles a compact one-line layout, which re-measures every row
//!
//! Run with: `cargo run --example orders`

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use grist::crossterm::event::KeyCode;
use grist::ratatui::layout::{Constraint, Layout};
use grist::ratatui::style::{Color, Style};
use grist::ratatui::text::{Line, Span};
use grist::ratatui::widgets::Paragraph;
use grist::ratatui::Frame;
use grist::widgets::list::{self, DataList, RowContext, RowDelegate};
use grist::widgets::notification::{self, Notifier, NotifierView};
use grist::widgets::{
    FetchResult, Loader, LoaderConfig, PageRequest, Record, RowsHandle, SelectionMode,
};
use grist::{Command, Component, Model, TerminalEvent};

#[derive(Debug, Clone)]
struct Order {
    number: u32,
    customer: String,
    total_cents: u64,
}

impl Record for Order {
    type Key = u32;

    fn key(&self) -> u32 {
        self.number
    }
}

async fn fetch_orders(request: PageRequest, last: Option<Order>) -> FetchResult<Order> {
    grist::tokio::time::sleep(Duration::from_millis(250)).await;
    // Keyset pagination: continue after the last order we have.
    let start = last.map_or(1000, |o| o.number + 1);
    let end = 1000 + 500;
    let page = (start..end)
        .take(request.batch_size)
        .map(|number| Order {
            number,
            customer: format!("Customer {}", number % 97),
            total_cents: u64::from(number) * 137 % 50_000,
        })
        .collect();
    Ok(Some(page))
}

/// Two lines per order, or one when compact.
struct OrderDelegate {
    compact: Arc<AtomicBool>,
}

impl RowDelegate<Order> for OrderDelegate {
    fn height(&self, _order: &Order) -> u16 {
        if self.compact.load(Ordering::Relaxed) {
            1
        } else {
            2
        }
    }

    fn render(&self, order: &Order, ctx: RowContext) -> Vec<Line<'static>> {
        let total = format!(
            "{}.{:02}",
            order.total_cents / 100,
            order.total_cents % 100
        );
        let head = Line::from(vec![
            Span::raw(format!("#{} ", order.number)),
            Span::styled(total, Style::default().fg(Color::Yellow)),
        ]);
        if self.compact.load(Ordering::Relaxed) {
            return vec![head];
        }
        let detail_style = if ctx.is_cursor {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray)
        };
        vec![head, Line::styled(format!("  {}", order.customer), detail_style)]
    }
}

struct App {
    orders: DataList<Order>,
    compact: Arc<AtomicBool>,
    toasts: NotifierView,
    notifier: Notifier,
    next_number: u32,
}

enum Msg {
    Orders(list::Message<Order>),
    Toast(notification::Message),
    New,
    DeleteCurrent,
    ToggleCompact,
    Quit,
}

impl Model for App {
    type Message = Msg;
    type Flags = ();

    fn init(_: ()) -> (Self, Command<Msg>) {
        let compact = Arc::new(AtomicBool::new(false));
        let loader = Loader::new(fetch_orders, LoaderConfig::default().with_batch_size(25));
        let mut orders = DataList::new(
            loader,
            OrderDelegate {
                compact: Arc::clone(&compact),
            },
        )
        .with_title("Orders")
        .with_selection_mode(SelectionMode::Multi);
        orders.focus();

        let notifier = Notifier::new();
        let toasts = NotifierView::new(notifier.clone());
        let cmd = Command::batch([
            orders.attach().map(Msg::Orders),
            toasts.start().map(Msg::Toast),
        ]);
        (
            App {
                orders,
                compact,
                toasts,
                notifier,
                next_number: 9000,
            },
            cmd,
        )
    }

    fn update(&mut self, msg: Msg) -> Command<Msg> {
        match msg {
            Msg::Orders(list::Message::FetchFailed(err)) => {
                self.notifier.error(err.to_string());
                Command::none()
            }
            Msg::Orders(m) => self.orders.update(m).map(Msg::Orders),
            Msg::Toast(m) => self.toasts.update(m).map(Msg::Toast),
            Msg::New => {
                let order = Order {
                    number: self.next_number,
                    customer: "Walk-in".to_string(),
                    total_cents: 0,
                };
                self.next_number += 1;
                let at = self.orders.cursor().unwrap_or(0);
                let at = self.orders.insert(order, at);
                self.notifier.success(format!("Order inserted at row {at}"));
                self.orders.update(list::Message::Sync).map(Msg::Orders)
            }
            Msg::DeleteCurrent => {
                if let Some(index) = self.orders.cursor() {
                    if let Some(order) = self.orders.delete(index) {
                        self.notifier.warn(format!("Deleted order #{}", order.number));
                    }
                }
                self.orders.update(list::Message::Sync).map(Msg::Orders)
            }
            Msg::ToggleCompact => {
                self.compact.fetch_xor(true, Ordering::Relaxed);
                self.orders
                    .update(list::Message::ResetAfterIndex(0))
                    .map(Msg::Orders)
            }
            Msg::Quit => Command::quit(),
        }
    }

    fn view(&self, frame: &mut Frame) {
        let [body, footer] =
            Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(frame.area());
        self.orders.view(frame, body);
        let checked = self.orders.selected_items().len();
        frame.render_widget(
            Paragraph::new(format!(
                "{checked} checked • n new • d delete • e compact • q quit"
            ))
            .style(Style::default().fg(Color::DarkGray)),
            footer,
        );
        self.toasts.view(frame, body);
    }

    fn on_event(&self, event: TerminalEvent) -> Option<Msg> {
        match event {
            TerminalEvent::Key(key) => match key.code {
                KeyCode::Char('q') => Some(Msg::Quit),
                KeyCode::Char('n') => Some(Msg::New),
                KeyCode::Char('d') if key.modifiers.is_empty() => Some(Msg::DeleteCurrent),
                KeyCode::Char('e') => Some(Msg::ToggleCompact),
                KeyCode::Esc => Some(Msg::Toast(notification::Message::DismissLatest)),
                _ => Some(Msg::Orders(list::Message::KeyPress(key))),
            },
            TerminalEvent::Resize(..) => Some(Msg::Orders(list::Message::Sync)),
            _ => None,
        }
    }
}

#[grist::tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    grist::run::<App>(()).await?;
    Ok(())
}
