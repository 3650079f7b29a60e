use crate::event::Event;
use crate::program::ProgramError;
use futures::future::BoxFuture;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::oneshot;

/// A deferred side effect returned from [`Model::update`](crate::Model::update)
/// or [`Model::init`](crate::Model::init).
///
/// When the runtime executes a command it produces at most one message, which
/// re-enters the event loop like any other.  Commands run off the event loop,
/// so a slow command never delays state transitions.
///
/// # Examples
///
/// ```rust,ignore
/// // Do nothing:
/// let cmd = Command::none();
///
/// // Run an async task and map the result to a message:
/// let cmd = Command::perform(
///     async { fetch_data().await },
///     |data| Msg::DataLoaded(data),
/// );
///
/// // Quit the program:
/// let cmd = Command::quit();
/// ```
pub struct Command<Msg: Send + 'static> {
    pub(crate) inner: CommandInner<Msg>,
}

pub(crate) enum CommandInner<Msg: Send + 'static> {
    None,
    /// The message is known up front; executing the command just delivers it.
    Ready(Message<Msg>),
    Future(BoxFuture<'static, Option<Message<Msg>>>),
}

/// A value travelling on the program's message bus.
pub(crate) enum Message<Msg: Send + 'static> {
    App(Msg),
    Event(Event),
    Control(Control<Msg>),
}

pub(crate) type ExitCallback<Msg> =
    Box<dyn FnOnce(std::io::Result<std::process::ExitStatus>) -> Msg + Send>;

pub(crate) type Reply = oneshot::Sender<Result<(), ProgramError>>;

/// Runtime-reserved messages, intercepted by the event loop before the
/// application sees them.
pub(crate) enum Control<Msg: Send + 'static> {
    Quit,
    Terminal(TerminalCommand),
    Exec {
        cmd: ExecCommand,
        on_exit: ExitCallback<Msg>,
    },
    Batch(Vec<Command<Msg>>),
    Sequence(Vec<Command<Msg>>),
    ReleaseTerminal(Reply),
    RestoreTerminal(Reply),
}

/// Terminal control messages applied by the event loop through the renderer.
///
/// Sent via [`Command::terminal`] or convenience methods such as
/// [`Command::enter_alt_screen`] and [`Command::hide_cursor`].  After the
/// effect is applied the command is echoed to the model as
/// [`Event::Terminal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalCommand {
    /// Switch to the alternate screen buffer.
    EnterAltScreen,
    /// Return to the primary screen buffer.
    ExitAltScreen,
    /// Enable mouse event reporting with the specified mode.
    EnableMouse(MouseMode),
    /// Disable mouse event reporting, whatever the mode.
    DisableMouse,
    /// Make the terminal cursor visible.
    ShowCursor,
    /// Hide the terminal cursor.
    HideCursor,
    /// Set the terminal window title.
    SetTitle(String),
    /// Clear the entire terminal screen.
    ClearScreen,
    /// Print a line above the managed frame (ignored on the alt screen).
    Println(String),
    /// Force a full redraw of the next frame.
    Repaint,
    /// Suspend the process (SIGTSTP on Unix) and resume afterwards.
    Suspend,
}

/// Configuration for executing an external process via [`Command::exec`].
///
/// Build an `ExecCommand` using the builder pattern: call [`ExecCommand::new`],
/// then chain [`arg`](ExecCommand::arg), [`args`](ExecCommand::args),
/// [`env`](ExecCommand::env) and [`working_dir`](ExecCommand::working_dir) as
/// needed.
#[derive(Debug, Clone)]
pub struct ExecCommand {
    /// The command to execute.
    pub program: String,
    /// Arguments to the command.
    pub args: Vec<String>,
    /// Extra environment variables for the child.
    pub env: Vec<(String, String)>,
    /// Working directory (None = inherit).
    pub working_dir: Option<PathBuf>,
}

impl ExecCommand {
    /// Create a new `ExecCommand` for the given program name or path.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            working_dir: None,
        }
    }

    /// Append a single argument to the command.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append multiple arguments to the command.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the working directory for the child process.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub(crate) fn to_process(&self) -> tokio::process::Command {
        let mut process = tokio::process::Command::new(&self.program);
        process.args(&self.args);
        process.envs(self.env.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = &self.working_dir {
            process.current_dir(dir);
        }
        process
            .stdin(std::process::Stdio::inherit())
            .stdout(std::process::Stdio::inherit())
            .stderr(std::process::Stdio::inherit());
        process
    }
}

/// Mouse reporting modes for the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseMode {
    /// Click, release, wheel, drag.
    CellMotion,
    /// All of above + hover.
    AllMotion,
}

impl<Msg: Send + 'static> Command<Msg> {
    /// No-op command.
    pub fn none() -> Self {
        Command {
            inner: CommandInner::None,
        }
    }

    /// Run an async future, map the result to a message.
    pub fn perform<F, T>(future: F, map: impl FnOnce(T) -> Msg + Send + 'static) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Command {
            inner: CommandInner::Future(Box::pin(async move {
                Some(Message::App(map(future.await)))
            })),
        }
    }

    /// Run a blocking closure on tokio's blocking pool and deliver its result.
    ///
    /// If the closure panics no message is delivered.
    pub fn blocking(f: impl FnOnce() -> Msg + Send + 'static) -> Self {
        Command {
            inner: CommandInner::Future(Box::pin(async move {
                tokio::task::spawn_blocking(f).await.ok().map(Message::App)
            })),
        }
    }

    /// Send a message immediately.
    pub fn message(msg: Msg) -> Self {
        Self::ready(Message::App(msg))
    }

    /// Quit the program gracefully, rendering the final state first.
    pub fn quit() -> Self {
        Self::control(Control::Quit)
    }

    /// Run multiple commands concurrently, with no ordering between them.
    pub fn batch(cmds: impl IntoIterator<Item = Command<Msg>>) -> Self {
        Self::group(cmds, Control::Batch)
    }

    /// Run commands one at a time, in order -- each command's message is
    /// delivered before the next command starts.
    pub fn sequence(cmds: impl IntoIterator<Item = Command<Msg>>) -> Self {
        Self::group(cmds, Control::Sequence)
    }

    fn group(
        cmds: impl IntoIterator<Item = Command<Msg>>,
        wrap: fn(Vec<Command<Msg>>) -> Control<Msg>,
    ) -> Self {
        let mut cmds: Vec<_> = cmds.into_iter().filter(|cmd| !cmd.is_none()).collect();
        match cmds.len() {
            0 => Command::none(),
            1 => cmds.pop().unwrap_or_else(Command::none),
            _ => Self::control(wrap(cmds)),
        }
    }

    /// Terminal management command.
    pub fn terminal(cmd: TerminalCommand) -> Self {
        Self::control(Control::Terminal(cmd))
    }

    /// Execute an external process (e.g., `$EDITOR`), handing it the terminal.
    ///
    /// The runtime releases the terminal before running the process and takes
    /// it back afterwards.  The event loop waits for the process to exit; the
    /// callback receives its exit status.
    pub fn exec(
        cmd: ExecCommand,
        on_exit: impl FnOnce(std::io::Result<std::process::ExitStatus>) -> Msg + Send + 'static,
    ) -> Self {
        Self::control(Control::Exec {
            cmd,
            on_exit: Box::new(on_exit),
        })
    }

    /// One-shot timer: fires once after `duration`, mapping the instant to a message.
    pub fn tick(duration: Duration, map: impl FnOnce(Instant) -> Msg + Send + 'static) -> Self {
        Command {
            inner: CommandInner::Future(Box::pin(async move {
                tokio::time::sleep(duration).await;
                Some(Message::App(map(Instant::now())))
            })),
        }
    }

    /// Timer aligned to the system clock: fires at the next multiple of
    /// `interval` since the Unix epoch.  Return it again from `update` to keep
    /// ticking.
    pub fn every(interval: Duration, map: impl FnOnce(SystemTime) -> Msg + Send + 'static) -> Self {
        Command {
            inner: CommandInner::Future(Box::pin(async move {
                tokio::time::sleep(until_next_multiple(SystemTime::now(), interval)).await;
                Some(Message::App(map(SystemTime::now())))
            })),
        }
    }

    /// Query the current window size. The callback receives (columns, rows).
    pub fn window_size(map: impl FnOnce(u16, u16) -> Msg + Send + 'static) -> Self {
        Command {
            inner: CommandInner::Future(Box::pin(async move {
                let size = crossterm::terminal::size().unwrap_or((80, 24));
                Some(Message::App(map(size.0, size.1)))
            })),
        }
    }

    /// Print a line above the program's output (ignored on the alt screen).
    pub fn println(text: impl Into<String>) -> Self {
        Command::terminal(TerminalCommand::Println(text.into()))
    }

    /// Print formatted text above the program's output on its own line.
    ///
    /// ```rust,ignore
    /// Command::printf(format_args!("fetched {} items", n))
    /// ```
    pub fn printf(args: std::fmt::Arguments<'_>) -> Self {
        Command::terminal(TerminalCommand::Println(args.to_string()))
    }

    // Convenience terminal command constructors

    /// Switch to the alternate screen buffer.
    pub fn enter_alt_screen() -> Self {
        Command::terminal(TerminalCommand::EnterAltScreen)
    }

    /// Return to the primary screen buffer.
    pub fn exit_alt_screen() -> Self {
        Command::terminal(TerminalCommand::ExitAltScreen)
    }

    /// Enable mouse reporting in cell-motion mode (click, release, wheel, drag).
    pub fn enable_mouse_cell_motion() -> Self {
        Command::terminal(TerminalCommand::EnableMouse(MouseMode::CellMotion))
    }

    /// Enable mouse reporting in all-motion mode (includes hover events).
    pub fn enable_mouse_all_motion() -> Self {
        Command::terminal(TerminalCommand::EnableMouse(MouseMode::AllMotion))
    }

    /// Disable mouse event reporting.
    pub fn disable_mouse() -> Self {
        Command::terminal(TerminalCommand::DisableMouse)
    }

    /// Make the terminal cursor visible.
    pub fn show_cursor() -> Self {
        Command::terminal(TerminalCommand::ShowCursor)
    }

    /// Hide the terminal cursor.
    pub fn hide_cursor() -> Self {
        Command::terminal(TerminalCommand::HideCursor)
    }

    /// Set the terminal window title.
    pub fn set_window_title(title: impl Into<String>) -> Self {
        Command::terminal(TerminalCommand::SetTitle(title.into()))
    }

    /// Clear the entire terminal screen.
    pub fn clear_screen() -> Self {
        Command::terminal(TerminalCommand::ClearScreen)
    }

    /// Suspend the process (send SIGTSTP on Unix).
    pub fn suspend() -> Self {
        Command::terminal(TerminalCommand::Suspend)
    }

    /// Transform the message type (for component composition).
    pub fn map<NewMsg: Send + 'static>(
        self,
        f: impl Fn(Msg) -> NewMsg + Send + Sync + 'static,
    ) -> Command<NewMsg> {
        self.map_with(Arc::new(f))
    }

    fn map_with<NewMsg: Send + 'static>(
        self,
        f: Arc<dyn Fn(Msg) -> NewMsg + Send + Sync>,
    ) -> Command<NewMsg> {
        let inner = match self.inner {
            CommandInner::None => CommandInner::None,
            CommandInner::Ready(msg) => CommandInner::Ready(map_message(msg, f)),
            CommandInner::Future(fut) => CommandInner::Future(Box::pin(async move {
                fut.await.map(|msg| map_message(msg, f))
            })),
        };
        Command { inner }
    }

    pub(crate) fn ready(msg: Message<Msg>) -> Self {
        Command {
            inner: CommandInner::Ready(msg),
        }
    }

    fn control(control: Control<Msg>) -> Self {
        Self::ready(Message::Control(control))
    }

    /// Execute the command in place, yielding its message (if any).
    pub(crate) async fn resolve(self) -> Option<Message<Msg>> {
        match self.inner {
            CommandInner::None => None,
            CommandInner::Ready(msg) => Some(msg),
            CommandInner::Future(fut) => fut.await,
        }
    }

    // --- Inspection methods (useful for testing) ---

    /// Returns `true` if this is a no-op command.
    pub fn is_none(&self) -> bool {
        matches!(self.inner, CommandInner::None)
    }

    /// Returns `true` if this command quits the program.
    pub fn is_quit(&self) -> bool {
        matches!(
            self.inner,
            CommandInner::Ready(Message::Control(Control::Quit))
        )
    }

    /// If this command is an immediate message, return it.
    pub fn into_message(self) -> Option<Msg> {
        match self.inner {
            CommandInner::Ready(Message::App(msg)) => Some(msg),
            _ => None,
        }
    }

    /// If this command is a batch, return the inner commands.
    pub fn into_batch(self) -> Option<Vec<Command<Msg>>> {
        match self.inner {
            CommandInner::Ready(Message::Control(Control::Batch(cmds))) => Some(cmds),
            _ => None,
        }
    }
}

fn map_message<Msg: Send + 'static, NewMsg: Send + 'static>(
    msg: Message<Msg>,
    f: Arc<dyn Fn(Msg) -> NewMsg + Send + Sync>,
) -> Message<NewMsg> {
    let control = match msg {
        Message::App(msg) => return Message::App(f(msg)),
        Message::Event(event) => return Message::Event(event),
        Message::Control(control) => control,
    };
    Message::Control(match control {
        Control::Quit => Control::Quit,
        Control::Terminal(tcmd) => Control::Terminal(tcmd),
        Control::Exec { cmd, on_exit } => Control::Exec {
            cmd,
            on_exit: Box::new(move |result| f(on_exit(result))),
        },
        Control::Batch(cmds) => Control::Batch(
            cmds.into_iter()
                .map(|cmd| cmd.map_with(f.clone()))
                .collect(),
        ),
        Control::Sequence(cmds) => Control::Sequence(
            cmds.into_iter()
                .map(|cmd| cmd.map_with(f.clone()))
                .collect(),
        ),
        Control::ReleaseTerminal(reply) => Control::ReleaseTerminal(reply),
        Control::RestoreTerminal(reply) => Control::RestoreTerminal(reply),
    })
}

fn until_next_multiple(now: SystemTime, interval: Duration) -> Duration {
    let period = interval.as_nanos().max(1);
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
    let remaining = period - since_epoch % period;
    Duration::from_nanos(u64::try_from(remaining).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_none_is_none() {
        let cmd: Command<()> = Command::none();
        assert!(cmd.is_none());
    }

    #[test]
    fn command_message_is_ready() {
        let cmd: Command<i32> = Command::message(42);
        assert_eq!(cmd.into_message(), Some(42));
    }

    #[test]
    fn command_quit_creates_quit() {
        let cmd: Command<()> = Command::quit();
        assert!(cmd.is_quit());
    }

    #[test]
    fn command_batch_empty_returns_none() {
        let cmd: Command<()> = Command::batch(vec![]);
        assert!(cmd.is_none());
    }

    #[test]
    fn command_batch_drops_none_commands() {
        let cmd: Command<i32> = Command::batch(vec![Command::none(), Command::none()]);
        assert!(cmd.is_none());
    }

    #[test]
    fn command_batch_single_unwraps() {
        let cmd: Command<i32> = Command::batch(vec![Command::none(), Command::message(1)]);
        assert_eq!(cmd.into_message(), Some(1));
    }

    #[test]
    fn command_batch_multiple() {
        let cmd: Command<i32> = Command::batch(vec![Command::message(1), Command::message(2)]);
        assert_eq!(cmd.into_batch().map(|cmds| cmds.len()), Some(2));
    }

    #[test]
    fn command_sequence_is_not_a_batch() {
        let cmd: Command<i32> = Command::sequence(vec![Command::message(1), Command::message(2)]);
        assert!(matches!(
            cmd.inner,
            CommandInner::Ready(Message::Control(Control::Sequence(ref cmds))) if cmds.len() == 2
        ));
    }

    #[test]
    fn command_sequence_empty_returns_none() {
        let cmd: Command<()> = Command::sequence(vec![]);
        assert!(cmd.is_none());
    }

    #[test]
    fn command_map_message() {
        let cmd: Command<i32> = Command::message(42);
        let mapped: Command<String> = cmd.map(|n| n.to_string());
        assert_eq!(mapped.into_message().as_deref(), Some("42"));
    }

    #[test]
    fn command_map_quit_stays_quit() {
        let cmd: Command<i32> = Command::quit();
        let mapped: Command<String> = cmd.map(|n| n.to_string());
        assert!(mapped.is_quit());
    }

    #[test]
    fn command_map_terminal_preserves_command() {
        let cmd: Command<i32> = Command::enter_alt_screen();
        let mapped: Command<String> = cmd.map(|n| n.to_string());
        assert!(matches!(
            mapped.inner,
            CommandInner::Ready(Message::Control(Control::Terminal(
                TerminalCommand::EnterAltScreen
            )))
        ));
    }

    #[test]
    fn command_map_batch() {
        let cmd: Command<i32> = Command::batch(vec![Command::message(1), Command::message(2)]);
        let mapped: Command<String> = cmd.map(|n| n.to_string());
        let cmds = mapped.into_batch().unwrap_or_default();
        let msgs: Vec<_> = cmds.into_iter().filter_map(Command::into_message).collect();
        assert_eq!(msgs, vec!["1".to_string(), "2".to_string()]);
    }

    #[tokio::test]
    async fn command_map_future() {
        let cmd: Command<i32> = Command::perform(async { 20 }, |n| n + 1);
        let mapped: Command<String> = cmd.map(|n| n.to_string());
        match mapped.resolve().await {
            Some(Message::App(s)) => assert_eq!(s, "21"),
            _ => panic!("Expected mapped future message"),
        }
    }

    #[tokio::test]
    async fn command_blocking_runs_closure() {
        let cmd: Command<u8> = Command::blocking(|| 7);
        assert!(matches!(cmd.resolve().await, Some(Message::App(7))));
    }

    #[test]
    fn terminal_command_constructors() {
        let cmd: Command<()> = Command::enable_mouse_all_motion();
        assert!(matches!(
            cmd.inner,
            CommandInner::Ready(Message::Control(Control::Terminal(
                TerminalCommand::EnableMouse(MouseMode::AllMotion)
            )))
        ));

        let cmd: Command<()> = Command::set_window_title("test");
        match cmd.inner {
            CommandInner::Ready(Message::Control(Control::Terminal(TerminalCommand::SetTitle(
                s,
            )))) => assert_eq!(s, "test"),
            _ => panic!("Expected SetTitle"),
        }
    }

    #[test]
    fn printf_formats_line() {
        let cmd: Command<()> = Command::printf(format_args!("{} items", 3));
        match cmd.inner {
            CommandInner::Ready(Message::Control(Control::Terminal(TerminalCommand::Println(
                s,
            )))) => assert_eq!(s, "3 items"),
            _ => panic!("Expected Println"),
        }
    }

    #[test]
    fn every_waits_until_next_multiple() {
        let now = UNIX_EPOCH + Duration::from_millis(10_250);
        assert_eq!(
            until_next_multiple(now, Duration::from_secs(1)),
            Duration::from_millis(750)
        );
        let aligned = UNIX_EPOCH + Duration::from_secs(10);
        assert_eq!(
            until_next_multiple(aligned, Duration::from_secs(1)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn exec_command_builder() {
        let cmd = ExecCommand::new("vim")
            .arg("-n")
            .args(["a.txt", "b.txt"])
            .env("TERM", "xterm")
            .working_dir("/tmp");
        assert_eq!(cmd.program, "vim");
        assert_eq!(cmd.args, vec!["-n", "a.txt", "b.txt"]);
        assert_eq!(cmd.env, vec![("TERM".to_string(), "xterm".to_string())]);
        assert_eq!(cmd.working_dir, Some(PathBuf::from("/tmp")));
    }
}
