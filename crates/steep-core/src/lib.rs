//! Core runtime for the **steep** terminal application framework.
//!
//! `steep-core` drives an application written in the [Elm Architecture]: the
//! application supplies an **init -> update -> view** cycle, and the runtime
//! supplies the event loop, terminal lifecycle and concurrency around it.
//! Side effects are pushed to the edges through [`Command`]s.
//!
//! # Key types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Model`] | Application trait (init / update / view) |
//! | [`Command`] | Describes a side effect to be executed by the runtime |
//! | [`Event`] | Runtime-originated input: keys, mouse, resizes, control echoes |
//! | [`Program`] | Wires a [`Model`] to a terminal and drives the event loop |
//! | [`ProgramHandle`] | Sends messages to, quits, or kills a program from outside |
//! | [`Renderer`] | Paints frames and owns terminal modes |
//! | [`EventSource`] | Produces input events |
//! | [`TestProgram`](testing::TestProgram) | Headless harness for unit-testing a [`Model`] |
//!
//! # Architecture
//!
//! Every producer (terminal input, resize and signal watchers, finished
//! commands, [`ProgramHandle::send`]) feeds one message bus.  The event loop
//! is the bus's only reader: it applies runtime control messages, then calls
//! [`Model::update`] and [`Model::view`] for one message at a time.  Commands
//! returned by `update` go to a dispatcher that runs each on its own task and
//! feeds the result back into the bus.
//!
//! # Quick example
//!
//! ```ignore
//! use steep_core::{Command, Event, Model};
//! use crossterm::event::KeyCode;
//!
//! struct Counter { count: i32 }
//!
//! enum Msg { Event(Event) }
//!
//! impl From<Event> for Msg {
//!     fn from(event: Event) -> Self { Msg::Event(event) }
//! }
//!
//! impl Model for Counter {
//!     type Message = Msg;
//!
//!     fn update(&mut self, msg: Msg) -> Command<Msg> {
//!         match msg {
//!             Msg::Event(Event::Key(key)) => match key.code {
//!                 KeyCode::Up => self.count += 1,
//!                 KeyCode::Down => self.count -= 1,
//!                 KeyCode::Char('q') => return Command::quit(),
//!                 _ => {}
//!             },
//!             Msg::Event(_) => {}
//!         }
//!         Command::none()
//!     }
//!
//!     fn view(&self) -> String {
//!         format!("Count: {}\n\nup/down to change, q to quit", self.count)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), steep_core::ProgramError> {
//!     steep_core::run(Counter { count: 0 }).await?;
//!     Ok(())
//! }
//! ```
//!
//! [Elm Architecture]: https://guide.elm-lang.org/architecture/

pub mod canvas;
pub mod command;
pub mod event;
pub mod input;
pub mod logging;
pub mod model;
pub mod program;
pub mod renderer;
pub mod testing;

mod dispatcher;
mod event_loop;
mod handlers;
mod panic;
mod watchers;

pub use command::{Command, ExecCommand, MouseMode, TerminalCommand};
pub use event::Event;
pub use input::{ChannelEvents, EventSource, EventStream, InputSource, TerminalEvents};
pub use logging::{log_to_file, LogError};
pub use model::Model;
pub use program::{run, run_with, Program, ProgramError, ProgramHandle, ProgramOptions};
pub use renderer::{OutputTarget, Renderer, StandardRenderer};
