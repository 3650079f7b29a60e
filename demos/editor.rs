//! # Editor Example
//!
//! Hands the terminal to `$EDITOR` (falling back to `vi`) with
//! [`Command::exec`], then picks up where it left off once the editor exits.
//! Also shows suspending with ctrl+z and logging to a file.
//!
//! Run with: `cargo run --example editor`

use std::process::ExitStatus;
use steep::crossterm::event::{KeyCode, KeyModifiers};
use steep::{Command, Event, ExecCommand, Model, ProgramOptions};

struct Editor {
    file: std::path::PathBuf,
    altscreen: bool,
    status: String,
}

#[derive(Debug)]
enum Msg {
    OpenEditor,
    EditorFinished(std::io::Result<ExitStatus>),
    ToggleAltScreen,
    Suspend,
    Quit,
    Noop,
}

impl From<Event> for Msg {
    fn from(event: Event) -> Self {
        match event {
            Event::Key(key) => match key.code {
                KeyCode::Char('e') => Msg::OpenEditor,
                KeyCode::Char('a') => Msg::ToggleAltScreen,
                KeyCode::Char('z') if key.modifiers.contains(KeyModifiers::CONTROL) => Msg::Suspend,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Msg::Quit,
                KeyCode::Char('q') | KeyCode::Esc => Msg::Quit,
                _ => Msg::Noop,
            },
            _ => Msg::Noop,
        }
    }
}

impl Model for Editor {
    type Message = Msg;

    fn update(&mut self, msg: Msg) -> Command<Msg> {
        match msg {
            Msg::OpenEditor => {
                let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
                let cmd = ExecCommand::new(editor).arg(self.file.display().to_string());
                return Command::exec(cmd, Msg::EditorFinished);
            }
            Msg::EditorFinished(Ok(status)) if status.success() => {
                self.status = "editor closed".to_string();
                return Command::printf(format_args!("edited {}", self.file.display()));
            }
            Msg::EditorFinished(Ok(status)) => {
                self.status = format!("editor exited with {status}");
            }
            Msg::EditorFinished(Err(err)) => {
                self.status = format!("could not start editor: {err}");
            }
            Msg::ToggleAltScreen => {
                self.altscreen = !self.altscreen;
                return if self.altscreen {
                    Command::enter_alt_screen()
                } else {
                    Command::exit_alt_screen()
                };
            }
            Msg::Suspend => return Command::suspend(),
            Msg::Quit => return Command::quit(),
            Msg::Noop => {}
        }
        Command::none()
    }

    fn view(&self) -> String {
        let mode = if self.altscreen { "alt screen" } else { "inline" };
        format!(
            "Editing {} ({mode})\n{}\n\ne open editor  a toggle alt screen  ctrl+z suspend  q quit",
            self.file.display(),
            self.status,
        )
    }
}

#[steep::tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Ok(path) = std::env::var("STEEP_LOG") {
        steep::log_to_file(path)?;
    }
    let file = std::env::temp_dir().join("steep-editor-demo.txt");
    let model = Editor {
        file,
        altscreen: false,
        status: String::new(),
    };
    steep::run_with(model, ProgramOptions::default()).await?;
    Ok(())
}
