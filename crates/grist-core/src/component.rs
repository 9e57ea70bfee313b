use crate::command::Command;
use ratatui::{layout::Rect, Frame};

/// A reusable sub-model that renders into a given [`Rect`] area.
///
/// `Component` mirrors [`Model`](crate::Model) but its
/// [`view`](Component::view) receives an `area`, so a parent decides where
/// each child draws. Grids, lists and notification toasts in
/// `grist-widgets` are all components.
///
/// # Composition pattern
///
/// Wrap the child's message type in a variant of the parent message and
/// lift commands with [`Command::map`]:
///
/// ```rust,ignore
/// use grist_core::{Command, Component, Model};
/// use grist_widgets::grid::{self, DataGrid};
///
/// struct App {
///     customers: DataGrid<Customer>,
/// }
///
/// enum AppMsg {
///     Customers(grid::Message<Customer>),
/// }
///
/// impl Model for App {
///     // ...
///     fn update(&mut self, msg: AppMsg) -> Command<AppMsg> {
///         match msg {
///             AppMsg::Customers(m) => self.customers.update(m).map(AppMsg::Customers),
///         }
///     }
///
///     fn view(&self, frame: &mut Frame) {
///         self.customers.view(frame, frame.area());
///     }
/// }
/// ```
pub trait Component: Send + 'static {
    /// The component's internal message type.
    type Message: Send + 'static;

    /// Process a message, mutate state, and return a [`Command`] for side
    /// effects. The parent lifts the command with [`Command::map`].
    fn update(&mut self, msg: Self::Message) -> Command<Self::Message>;

    /// Render into `area`. Implementations must stay inside the rectangle.
    fn view(&self, frame: &mut Frame, area: Rect);

    /// Whether this component currently has focus. Parents use this as a
    /// routing hint for keyboard input.
    fn focused(&self) -> bool {
        false
    }
}
