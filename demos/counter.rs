//! # Counter Example
//!
//! A minimal counter app demonstrating the core steep architecture:
//! - Implementing the [`Model`] trait with `update` and `view`
//! - Mapping runtime [`Event`]s to application messages with `From<Event>`
//! - Drawing a ratatui widget into the frame with [`canvas::render_widget`]
//! - Using `Command::none()` and `Command::quit()`
//!
//! Run with: `cargo run --example counter`

use steep::crossterm::event::{KeyCode, KeyModifiers};
use steep::ratatui::layout::Alignment;
use steep::ratatui::text::Line;
use steep::ratatui::widgets::{Block, Paragraph};
use steep::{canvas, Command, Event, Model, ProgramOptions};

/// A minimal counter app that validates the core loop.
struct Counter {
    count: i64,
    width: u16,
}

#[derive(Debug)]
enum Msg {
    Increment,
    Decrement,
    Reset,
    Quit,
    Noop,
    Resized(u16),
}

// Runtime events arrive through this conversion. Anything the app does not
// care about becomes a no-op.
impl From<Event> for Msg {
    fn from(event: Event) -> Self {
        match event {
            Event::Key(key) => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => Msg::Quit,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Msg::Quit,
                KeyCode::Up | KeyCode::Char('k') => Msg::Increment,
                KeyCode::Down | KeyCode::Char('j') => Msg::Decrement,
                KeyCode::Char('r') => Msg::Reset,
                _ => Msg::Noop,
            },
            Event::Resize { width, .. } => Msg::Resized(width),
            _ => Msg::Noop,
        }
    }
}

impl Model for Counter {
    type Message = Msg;

    // Each match arm handles a single message variant. Most arms mutate state
    // and fall through to Command::none(), but Quit returns early with
    // Command::quit() to exit the event loop.
    fn update(&mut self, msg: Msg) -> Command<Msg> {
        match msg {
            Msg::Increment => self.count += 1,
            Msg::Decrement => self.count -= 1,
            Msg::Reset => self.count = 0,
            Msg::Quit => return Command::quit(),
            Msg::Noop => {}
            Msg::Resized(width) => self.width = width,
        }
        Command::none()
    }

    fn view(&self) -> String {
        let text = vec![
            Line::from(format!("Count: {}", self.count)),
            Line::raw(""),
            Line::from("↑/k inc  ↓/j dec  r reset  q quit"),
        ];
        let paragraph = Paragraph::new(text)
            .block(Block::bordered().title(" Counter "))
            .alignment(Alignment::Center);
        canvas::render_widget(paragraph, self.width.min(50), 5)
    }
}

#[steep::tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = ProgramOptions {
        alt_screen: true,
        ..ProgramOptions::default()
    };
    let model = steep::run_with(Counter { count: 0, width: 40 }, options).await?;
    println!("Final count: {}", model.count);
    Ok(())
}
