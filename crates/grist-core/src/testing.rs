//! Headless harnesses for exercising models and components in unit tests.

use crate::command::{Action, Command, CommandInner};
use crate::model::Model;
use futures::future::BoxFuture;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::Terminal;
use std::collections::VecDeque;

/// The executed form of a [`Command`] tree, held for inspection.
///
/// Synchronous messages are collected in order; async futures are queued
/// *without being polled*, so a test controls exactly when (and in which
/// order) each one completes. This is how overlapping loads, late results
/// and unmount races are replayed deterministically.
pub struct Effects<Msg: Send + 'static> {
    messages: VecDeque<Msg>,
    futures: VecDeque<BoxFuture<'static, Msg>>,
    quit: bool,
}

impl<Msg: Send + 'static> Default for Effects<Msg> {
    fn default() -> Self {
        Self {
            messages: VecDeque::new(),
            futures: VecDeque::new(),
            quit: false,
        }
    }
}

impl<Msg: Send + 'static> Effects<Msg> {
    /// Flatten a command into a fresh set of effects.
    pub fn of(cmd: Command<Msg>) -> Self {
        let mut effects = Self::default();
        effects.absorb(cmd);
        effects
    }

    /// Add the effects of another command.
    pub fn absorb(&mut self, cmd: Command<Msg>) {
        match cmd.inner {
            CommandInner::None => {}
            CommandInner::Action(Action::Message(msg)) => self.messages.push_back(msg),
            CommandInner::Action(Action::Quit) => self.quit = true,
            CommandInner::Future(fut) => self.futures.push_back(fut),
            CommandInner::Batch(cmds) => {
                for cmd in cmds {
                    self.absorb(cmd);
                }
            }
        }
    }

    /// Number of async futures waiting to be resolved.
    pub fn pending_futures(&self) -> usize {
        self.futures.len()
    }

    /// Whether a quit command was seen.
    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    /// Pop the oldest synchronous message.
    pub fn next_message(&mut self) -> Option<Msg> {
        self.messages.pop_front()
    }

    /// Take every synchronous message collected so far.
    pub fn take_messages(&mut self) -> Vec<Msg> {
        self.messages.drain(..).collect()
    }

    /// Remove the oldest future without running it (simulates a request
    /// that never completes).
    pub fn take_future(&mut self) -> Option<BoxFuture<'static, Msg>> {
        self.futures.pop_front()
    }

    /// Await the oldest queued future and return its message.
    pub async fn resolve_next(&mut self) -> Option<Msg> {
        let fut = self.futures.pop_front()?;
        Some(fut.await)
    }

    /// Await the newest queued future and return its message, for tests
    /// that need completions out of initiation order.
    pub async fn resolve_last(&mut self) -> Option<Msg> {
        let fut = self.futures.pop_back()?;
        Some(fut.await)
    }
}

/// A headless test harness that drives a [`Model`] without a real terminal.
///
/// `TestProgram` runs the init/update/view cycle inside a plain test.
/// Synchronous commands are queued and flushed with
/// [`drain_messages`](TestProgram::drain_messages); async commands are
/// queued and completed one at a time with
/// [`resolve_next`](TestProgram::resolve_next) or all at once with
/// [`settle`](TestProgram::settle) (both need a `#[tokio::test]` runtime
/// only if the futures themselves use tokio).
///
/// # Example
///
/// ```rust,ignore
/// use grist_core::testing::TestProgram;
///
/// let mut prog = TestProgram::<CustomersApp>::new(source);
/// assert_eq!(prog.pending_futures(), 1); // first page requested on init
/// prog.settle().await;
/// assert_eq!(prog.model().grid.loader().rows().len(), 50);
///
/// let output = prog.render_string(60, 10);
/// assert!(output.contains("Ada Lovelace"));
/// ```
pub struct TestProgram<M: Model> {
    model: M,
    effects: Effects<M::Message>,
}

impl<M: Model> TestProgram<M> {
    /// Create a test program by calling [`Model::init`] with the given flags.
    pub fn new(flags: M::Flags) -> Self {
        let (model, init_cmd) = M::init(flags);
        Self {
            model,
            effects: Effects::of(init_cmd),
        }
    }

    /// Send a message, triggering a single update cycle.
    pub fn send(&mut self, msg: M::Message) {
        let cmd = self.model.update(msg);
        self.effects.absorb(cmd);
    }

    /// Process pending synchronous messages until none are produced.
    pub fn drain_messages(&mut self) {
        while let Some(msg) = self.effects.next_message() {
            self.send(msg);
        }
    }

    /// Number of async commands waiting to complete.
    pub fn pending_futures(&self) -> usize {
        self.effects.pending_futures()
    }

    /// Whether the model has asked to quit.
    pub fn quit_requested(&self) -> bool {
        self.effects.quit_requested()
    }

    /// Complete the oldest async command, feed its message to `update`, and
    /// drain the synchronous messages that follow. Returns `false` when
    /// nothing was pending.
    pub async fn resolve_next(&mut self) -> bool {
        match self.effects.resolve_next().await {
            Some(msg) => {
                self.send(msg);
                self.drain_messages();
                true
            }
            None => false,
        }
    }

    /// Resolve async commands (including ones spawned by earlier
    /// resolutions) until the queue is empty or `limit` futures have run.
    /// Returns how many were resolved.
    pub async fn settle_with_limit(&mut self, limit: usize) -> usize {
        self.drain_messages();
        let mut resolved = 0;
        while resolved < limit && self.resolve_next().await {
            resolved += 1;
        }
        resolved
    }

    /// [`settle_with_limit`](TestProgram::settle_with_limit) with a generous
    /// cap, so a model that keeps prefetching cannot hang a test.
    pub async fn settle(&mut self) -> usize {
        self.settle_with_limit(1_000).await
    }

    /// Get a shared reference to the model for assertions.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Get a mutable reference to the model for direct test setup.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Render the model to a ratatui [`Buffer`] of the given dimensions.
    pub fn render(&self, width: u16, height: u16) -> Buffer {
        render_buffer(width, height, |frame| self.model.view(frame))
    }

    /// Render the model and return the visible content as a plain string,
    /// one line per buffer row.
    pub fn render_string(&self, width: u16, height: u16) -> String {
        buffer_to_string(&self.render(width, height))
    }
}

/// Render anything that draws into a frame, for component-level tests.
pub fn render_buffer(
    width: u16,
    height: u16,
    draw: impl FnOnce(&mut ratatui::Frame),
) -> Buffer {
    let backend = ratatui::backend::TestBackend::new(width, height);
    let mut terminal = Terminal::new(backend).expect("test backend never fails");
    terminal.draw(draw).expect("test backend never fails");
    terminal.backend().buffer().clone()
}

/// Flatten a buffer into newline-separated rows of cell symbols.
pub fn buffer_to_string(buf: &Buffer) -> String {
    let area: Rect = buf.area;
    let mut output = String::new();
    for y in area.top()..area.bottom() {
        for x in area.left()..area.right() {
            output.push_str(buf[(x, y)].symbol());
        }
        if y + 1 < area.bottom() {
            output.push('\n');
        }
    }
    output
}
