use crate::command::Command;
use crate::event::Event;

/// The application contract, following the [Elm Architecture].
///
/// Every steep application implements `Model`. The runtime drives a continuous
/// **init -> update -> view** cycle:
///
/// 1. [`init`](Model::init) is called once before the first frame and may
///    return a [`Command`] for early side effects (e.g. fetching data).
/// 2. [`view`](Model::view) renders the current state to a string.
/// 3. Events arrive as messages: terminal input and resizes (converted from
///    [`Event`]), command results, and messages injected through a
///    [`ProgramHandle`](crate::ProgramHandle).
/// 4. [`update`](Model::update) processes each message, replaces state, and
///    optionally returns a [`Command`] for further work.
/// 5. Steps 2--4 repeat until the program exits.
///
/// The event loop is the only place `update` and `view` are called, and it
/// handles one message at a time: a model never observes concurrent access.
///
/// # Example
///
/// ```rust,ignore
/// use steep_core::{Command, Event, Model};
///
/// struct Counter {
///     count: i32,
/// }
///
/// #[derive(Debug)]
/// enum Msg {
///     Increment,
///     Event(Event),
/// }
///
/// impl From<Event> for Msg {
///     fn from(event: Event) -> Self {
///         Msg::Event(event)
///     }
/// }
///
/// impl Model for Counter {
///     type Message = Msg;
///
///     fn update(&mut self, msg: Msg) -> Command<Msg> {
///         if let Msg::Increment = msg {
///             self.count += 1;
///         }
///         Command::none()
///     }
///
///     fn view(&self) -> String {
///         format!("Count: {}", self.count)
///     }
/// }
/// ```
///
/// [Elm Architecture]: https://guide.elm-lang.org/architecture/
pub trait Model: Send + 'static {
    /// The application's message type.
    ///
    /// Every event that can affect the application state is represented as a
    /// value of this type.  Runtime events are converted through
    /// `From<Event>`; map the ones you do not care about to a no-op variant.
    type Message: From<Event> + Send + 'static;

    /// Return a command to run at startup.
    ///
    /// Called once, after the terminal is set up and before the first frame
    /// is rendered.  The command runs without blocking startup.  The default
    /// implementation does nothing.
    fn init(&self) -> Command<Self::Message> {
        Command::none()
    }

    /// Process a message, replace state, and return a command for side effects.
    ///
    /// This is the heart of the application logic.  After `update` returns,
    /// the runtime hands the command to the dispatcher and calls
    /// [`view`](Model::view) to re-render.
    fn update(&mut self, msg: Self::Message) -> Command<Self::Message>;

    /// Render the current state as the full text of one frame.
    ///
    /// This should be a pure function of `&self`.  The runtime calls `view`
    /// after every update, on the initial render, and once more when the
    /// program quits.
    fn view(&self) -> String;
}
