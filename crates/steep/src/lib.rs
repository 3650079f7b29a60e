//! **steep** -- An Elm Architecture runtime for interactive terminal
//! applications.
//!
//! This is the umbrella crate that re-exports everything you need to build a
//! steep application from a single dependency:
//!
//! ```toml
//! [dependencies]
//! steep = "0.1"
//! ```
//!
//! # Re-exports
//!
//! * All public items from [`steep_core`] are available at the crate root
//!   ([`Model`], [`Command`], [`Event`], [`Program`], [`run`], [`run_with`],
//!   etc.).
//! * [`ratatui`], [`crossterm`], and [`tokio`] are re-exported so downstream
//!   crates do not need to depend on them directly.  Use
//!   [`canvas::render_widget`] to draw ratatui widgets from a view.
//!
//! # Quick start
//!
//! ```ignore
//! use steep::{Command, Event, Model};
//!
//! struct Hello;
//!
//! enum Msg {
//!     Event(Event),
//! }
//!
//! impl From<Event> for Msg {
//!     fn from(event: Event) -> Self {
//!         Msg::Event(event)
//!     }
//! }
//!
//! impl Model for Hello {
//!     type Message = Msg;
//!
//!     fn update(&mut self, msg: Msg) -> Command<Msg> {
//!         match msg {
//!             Msg::Event(Event::Key(_)) => Command::quit(),
//!             Msg::Event(_) => Command::none(),
//!         }
//!     }
//!
//!     fn view(&self) -> String {
//!         "Hello, steep! Press any key to quit.".to_string()
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     steep::run(Hello).await.unwrap();
//! }
//! ```

pub use steep_core::*;

// Re-export dependencies for use in demos and downstream crates
pub use crossterm;
pub use ratatui;
pub use tokio;
