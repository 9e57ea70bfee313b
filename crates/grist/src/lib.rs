//! **grist** -- terminal data grids and lists that page records in as you
//! scroll.
//!
//! This is the umbrella crate that re-exports everything you need from a
//! single dependency:
//!
//! ```toml
//! [dependencies]
//! grist = "0.1"
//! ```
//!
//! # Re-exports
//!
//! * All public items from [`grist_core`] are available at the crate root
//!   ([`Model`], [`Component`], [`Command`], [`Program`], [`run`],
//!   [`run_with`], etc.).
//! * The [`widgets`] module re-exports everything from [`grist_widgets`]
//!   (the loader, the data grid and list, the notifier).
//! * [`ratatui`], [`crossterm`], and [`tokio`] are re-exported so downstream
//!   crates do not need to depend on them directly.
//!
//! # Quick start
//!
//! ```ignore
//! use grist::widgets::{Column, DataGrid, Loader, LoaderConfig, MemorySource, Record};
//! use grist::{Command, Component, Model};
//! use ratatui::layout::Constraint;
//! use ratatui::Frame;
//!
//! #[derive(Debug, Clone)]
//! struct City { id: u32, name: String }
//!
//! impl Record for City {
//!     type Key = u32;
//!     fn key(&self) -> u32 { self.id }
//! }
//!
//! struct App { grid: DataGrid<City> }
//!
//! enum Msg { Grid(grist::widgets::grid::Message<City>) }
//!
//! impl Model for App {
//!     type Message = Msg;
//!     type Flags = Vec<City>;
//!
//!     fn init(cities: Vec<City>) -> (Self, Command<Msg>) {
//!         let loader = Loader::new(MemorySource::new(cities), LoaderConfig::default());
//!         let mut grid = DataGrid::new(loader, vec![
//!             Column::new("City", Constraint::Min(10), |c: &City| c.name.clone()),
//!         ]);
//!         grid.focus();
//!         let cmd = grid.attach().map(Msg::Grid);
//!         (App { grid }, cmd)
//!     }
//!
//!     fn update(&mut self, msg: Msg) -> Command<Msg> {
//!         match msg {
//!             Msg::Grid(m) => self.grid.update(m).map(Msg::Grid),
//!         }
//!     }
//!
//!     fn view(&self, frame: &mut Frame) {
//!         self.grid.view(frame, frame.area());
//!     }
//! }
//! ```

pub use grist_core::*;
pub mod widgets {
    pub use grist_widgets::*;
}

// Re-export dependencies for use in demos and downstream crates
pub use crossterm;
pub use ratatui;
pub use tokio;
