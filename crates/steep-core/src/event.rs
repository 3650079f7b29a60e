use crate::command::TerminalCommand;
use crossterm::event::{KeyEvent, MouseEvent};

/// Events originating from the runtime rather than from the application.
///
/// `Event` reaches your model through its `Message` type: every
/// [`Model::Message`](crate::Model::Message) implements `From<Event>`, and the
/// event loop converts each event before calling
/// [`Model::update`](crate::Model::update).
///
/// Besides terminal input, the runtime echoes the control messages it
/// intercepts ([`Terminal`](Event::Terminal), [`Exec`](Event::Exec),
/// [`Sequence`](Event::Sequence)) after their effect has been applied, so an
/// application can react to, say, entering the alternate screen.
///
/// # Example
///
/// ```rust,ignore
/// use steep_core::Event;
///
/// enum Msg {
///     Event(Event),
///     Increment,
/// }
///
/// impl From<Event> for Msg {
///     fn from(event: Event) -> Self {
///         Msg::Event(event)
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A keyboard event.
    Key(KeyEvent),
    /// A mouse event.
    Mouse(MouseEvent),
    /// Bracketed paste content.
    Paste(String),
    /// Terminal window gained focus.
    FocusGained,
    /// Terminal window lost focus.
    FocusLost,
    /// The terminal has the given dimensions, in cells.
    Resize {
        /// Number of columns.
        width: u16,
        /// Number of rows.
        height: u16,
    },
    /// A terminal control message was applied.
    Terminal(TerminalCommand),
    /// An external process started through [`Command::exec`](crate::Command::exec)
    /// handed the terminal back.
    Exec {
        /// The program that was run.
        program: String,
    },
    /// A [`Command::sequence`](crate::Command::sequence) was scheduled.
    Sequence {
        /// Number of commands in the sequence.
        len: usize,
    },
}

impl From<crossterm::event::Event> for Event {
    fn from(event: crossterm::event::Event) -> Self {
        match event {
            crossterm::event::Event::Key(k) => Event::Key(k),
            crossterm::event::Event::Mouse(m) => Event::Mouse(m),
            crossterm::event::Event::Resize(width, height) => Event::Resize { width, height },
            crossterm::event::Event::FocusGained => Event::FocusGained,
            crossterm::event::Event::FocusLost => Event::FocusLost,
            crossterm::event::Event::Paste(s) => Event::Paste(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers};

    #[test]
    fn converts_crossterm_resize() {
        let event = Event::from(crossterm::event::Event::Resize(80, 24));
        assert_eq!(
            event,
            Event::Resize {
                width: 80,
                height: 24
            }
        );
    }

    #[test]
    fn converts_crossterm_key() {
        let key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        let event = Event::from(crossterm::event::Event::Key(key));
        assert_eq!(event, Event::Key(key));
    }
}
