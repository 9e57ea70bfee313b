//! Core runtime for **grist**, a terminal component library for
//! data-driven business applications.
//!
//! `grist-core` provides the traits, types, and runtime every grist
//! application is built on. The design follows the [Elm Architecture]: an
//! application is a pure **init -> update -> view** cycle, and side effects
//! (most importantly, fetching pages of records) are pushed to the edges
//! through [`Command`]s.
//!
//! # Key types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Model`] | Top-level application trait (init / update / view / on_event) |
//! | [`Component`] | Reusable sub-model that renders into a [`ratatui::layout::Rect`] |
//! | [`Command`] | Describes a side effect to be executed by the runtime |
//! | [`Program`] | Wires a [`Model`] to a real terminal and drives the event loop |
//! | [`TestProgram`](testing::TestProgram) | Headless harness that resolves async commands on demand |
//!
//! # Concurrency
//!
//! `update` always runs on the program's loop task, one message at a time.
//! The only suspension points are the futures wrapped by
//! [`Command::perform`]; their outputs are queued back as messages. State
//! owned by a model is therefore never observed half-updated.
//!
//! [Elm Architecture]: https://guide.elm-lang.org/architecture/

pub mod command;
pub mod component;
pub mod event;
pub mod model;
pub mod runtime;
pub mod telemetry;
pub mod testing;

pub use command::Command;
pub use component::Component;
pub use event::TerminalEvent;
pub use model::Model;
pub use runtime::{Program, ProgramError, ProgramHandle, ProgramOptions};
pub use telemetry::{init_file_logging, LogConfig};

/// Run a grist application with default options.
pub async fn run<M: Model>(flags: M::Flags) -> Result<M, ProgramError> {
    Program::<M>::new(flags)?.run().await
}

/// Run with custom options.
pub async fn run_with<M: Model>(
    flags: M::Flags,
    options: ProgramOptions,
) -> Result<M, ProgramError> {
    Program::<M>::with_options(flags, options)?.run().await
}
