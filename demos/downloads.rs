//! # Downloads Example
//!
//! Simulates a queue of downloads running inline (no alt screen):
//! - [`Command::sequence`] fetches packages strictly one after another
//! - [`Command::println`] leaves a permanent line above the live frame
//! - [`Command::tick`] drives a spinner while work is in flight
//! - [`ProgramHandle::send`] injects messages from outside the program
//!
//! Run with: `cargo run --example downloads`

use std::time::{Duration, Instant};
use steep::crossterm::event::KeyCode;
use steep::{Command, Event, Model, Program, ProgramOptions};

const PACKAGES: &[&str] = &["vim-mode", "ripgrep", "tree-sitter", "fd", "bat", "hyperfine"];
const SPINNER: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

struct Downloads {
    done: usize,
    frame: usize,
    started: Instant,
    note: Option<String>,
}

#[derive(Debug)]
enum Msg {
    Installed(&'static str),
    Spin,
    Note(String),
    Quit,
    Noop,
}

impl From<Event> for Msg {
    fn from(event: Event) -> Self {
        match event {
            Event::Key(key) if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) => Msg::Quit,
            _ => Msg::Noop,
        }
    }
}

fn install(name: &'static str, delay: u64) -> Command<Msg> {
    Command::perform(
        async move {
            steep::tokio::time::sleep(Duration::from_millis(delay)).await;
            name
        },
        Msg::Installed,
    )
}

fn spin() -> Command<Msg> {
    Command::tick(Duration::from_millis(80), |_| Msg::Spin)
}

impl Model for Downloads {
    type Message = Msg;

    fn init(&self) -> Command<Msg> {
        let installs = PACKAGES
            .iter()
            .copied()
            .enumerate()
            .map(|(i, name)| install(name, 300 + 150 * (i as u64 % 3)));
        Command::batch([Command::sequence(installs), spin()])
    }

    fn update(&mut self, msg: Msg) -> Command<Msg> {
        match msg {
            Msg::Installed(name) => {
                self.done += 1;
                let line = Command::printf(format_args!("✓ {name}"));
                if self.done == PACKAGES.len() {
                    return Command::sequence([
                        line,
                        Command::printf(format_args!(
                            "Done! Installed {} packages in {:.1?}",
                            PACKAGES.len(),
                            self.started.elapsed()
                        )),
                        Command::quit(),
                    ]);
                }
                line
            }
            Msg::Spin => {
                self.frame = (self.frame + 1) % SPINNER.len();
                spin()
            }
            Msg::Note(note) => {
                self.note = Some(note);
                Command::none()
            }
            Msg::Quit => Command::quit(),
            Msg::Noop => Command::none(),
        }
    }

    fn view(&self) -> String {
        if self.done == PACKAGES.len() {
            return String::new();
        }
        let current = PACKAGES[self.done];
        let mut view = format!(
            "{} Installing {current}  [{}/{}]",
            SPINNER[self.frame],
            self.done,
            PACKAGES.len()
        );
        if let Some(note) = &self.note {
            view.push('\n');
            view.push_str(note);
        }
        view
    }
}

#[steep::tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let model = Downloads {
        done: 0,
        frame: 0,
        started: Instant::now(),
        note: None,
    };
    let program = Program::with_options(model, ProgramOptions::default());
    let handle = program.handle();
    steep::tokio::spawn(async move {
        steep::tokio::time::sleep(Duration::from_millis(700)).await;
        handle.send(Msg::Note("(mirror switched to a faster host)".to_string()));
    });
    program.run().await?;
    Ok(())
}
