use crate::command::Command;
use crate::event::TerminalEvent;
use ratatui::Frame;

/// The top-level application trait, following the [Elm Architecture].
///
/// The runtime drives a continuous **init -> update -> view** cycle:
///
/// 1. [`init`](Model::init) creates the initial state and may return a
///    [`Command`] for early side effects. This is where grids are attached
///    so their first page starts loading.
/// 2. [`view`](Model::view) renders the current state to a [`ratatui::Frame`].
/// 3. Terminal input is offered to [`on_event`](Model::on_event), which maps
///    it to a message (or ignores it).
/// 4. [`update`](Model::update) processes each message, mutates state, and
///    optionally returns a [`Command`] for further work. Results of async
///    commands come back through `update` as ordinary messages.
/// 5. Steps 2--4 repeat until the program exits.
///
/// # Example
///
/// ```rust,ignore
/// use grist_core::{Command, Model, TerminalEvent};
/// use ratatui::Frame;
/// use ratatui::widgets::Paragraph;
///
/// struct Counter {
///     count: i32,
/// }
///
/// enum Msg {
///     Increment,
/// }
///
/// impl Model for Counter {
///     type Message = Msg;
///     type Flags = ();
///
///     fn init(_flags: ()) -> (Self, Command<Msg>) {
///         (Counter { count: 0 }, Command::none())
///     }
///
///     fn update(&mut self, msg: Msg) -> Command<Msg> {
///         match msg {
///             Msg::Increment => self.count += 1,
///         }
///         Command::none()
///     }
///
///     fn view(&self, frame: &mut Frame) {
///         frame.render_widget(
///             Paragraph::new(format!("Count: {}", self.count)),
///             frame.area(),
///         );
///     }
///
///     fn on_event(&self, event: TerminalEvent) -> Option<Msg> {
///         match event {
///             TerminalEvent::Key(_) => Some(Msg::Increment),
///             _ => None,
///         }
///     }
/// }
/// ```
///
/// [Elm Architecture]: https://guide.elm-lang.org/architecture/
pub trait Model: Sized + Send + 'static {
    /// The application's message type.
    type Message: Send + 'static;

    /// Initialization data passed to [`Model::init`]. Use `()` when no
    /// startup data is needed.
    type Flags: Send + 'static;

    /// Create the initial model state and an optional startup command.
    fn init(flags: Self::Flags) -> (Self, Command<Self::Message>);

    /// Process a message, mutate state, and return a command for side effects.
    fn update(&mut self, msg: Self::Message) -> Command<Self::Message>;

    /// Render the current state. Must be a pure function of `&self`.
    fn view(&self, frame: &mut Frame);

    /// Map a terminal event into a message.
    ///
    /// The default implementation ignores every event.
    fn on_event(&self, event: TerminalEvent) -> Option<Self::Message> {
        let _ = event;
        None
    }
}
