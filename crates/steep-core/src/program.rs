use crate::command::{Command, Control, Message, MouseMode, Reply, TerminalCommand};
use crate::event_loop::Runtime;
use crate::handlers::Handlers;
use crate::input::{Input, InputSource};
use crate::model::Model;
use crate::renderer::{OutputTarget, Renderer, StandardRenderer};
use crate::{dispatcher, watchers};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Errors that can end a [`Program`] run.
#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    /// The program was stopped with [`ProgramHandle::kill`] before it could
    /// quit gracefully.
    #[error("program was killed")]
    Killed,
    /// A background watcher or the input reader failed at the OS boundary.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A terminal could not be opened for input.
    #[error("could not open a TTY for input: {0}")]
    InputTty(#[source] std::io::Error),
    /// The terminal could not be put into raw mode.
    #[error("could not enable raw mode: {0}")]
    RawMode(#[source] std::io::Error),
    /// `update`, `view` or `init` panicked.  The terminal was restored
    /// before this error was returned.
    ///
    /// The panic is recovered rather than resumed, so it surfaces here as an
    /// ordinary error.  The message and backtrace are also printed to stderr
    /// once the terminal is back to normal; treat this variant as a report,
    /// not as something to retry.
    #[error("program panicked: {message}")]
    Panicked {
        /// The panic payload and location.
        message: String,
        /// Backtrace captured at the panic site.
        backtrace: String,
    },
    /// A request was made through a [`ProgramHandle`] after the program
    /// stopped.
    #[error("program is not running")]
    NotRunning,
}

/// Configuration options for a [`Program`].
///
/// All fields have sensible defaults (see [`Default`] impl).  Use struct
/// update syntax to override only the options you need:
///
/// # Example
///
/// ```rust,ignore
/// use steep_core::{ProgramOptions, OutputTarget};
///
/// let opts = ProgramOptions {
///     alt_screen: true,
///     mouse_cell_motion: true,
///     title: Some("My App".into()),
///     output: OutputTarget::Stderr,
///     ..ProgramOptions::default()
/// };
/// ```
pub struct ProgramOptions {
    /// Start in the alternate screen (default: false).
    pub alt_screen: bool,
    /// Enable cell-motion mouse reporting at startup.
    pub mouse_cell_motion: bool,
    /// Enable all-motion mouse reporting at startup.  Ignored when
    /// `mouse_cell_motion` is also set.
    pub mouse_all_motion: bool,
    /// Enable bracketed paste (default: true).
    pub bracketed_paste: bool,
    /// Where input events come from (default: stdin, falling back to the
    /// controlling TTY when stdin is not a terminal).
    pub input: InputSource,
    /// Output target: stdout (default) or stderr.
    pub output: OutputTarget,
    /// Custom renderer.  When `None` a [`StandardRenderer`] painting to
    /// `output` is used.
    pub renderer: Option<Box<dyn Renderer>>,
    /// Quit on SIGINT/SIGTERM (default: true).
    pub handle_signals: bool,
    /// Catch panics in `init`, `update` and `view` and restore the terminal
    /// (default: true).
    pub catch_panics: bool,
    /// Drop redundant SGR sequences from rendered frames (default: true).
    pub ansi_compression: bool,
    /// Target frames per second for the default renderer (default: 60, max: 120).
    pub fps: u32,
    /// Set terminal title.
    pub title: Option<String>,
}

impl Default for ProgramOptions {
    fn default() -> Self {
        Self {
            alt_screen: false,
            mouse_cell_motion: false,
            mouse_all_motion: false,
            bracketed_paste: true,
            input: InputSource::default(),
            output: OutputTarget::default(),
            renderer: None,
            handle_signals: true,
            catch_panics: true,
            ansi_compression: true,
            fps: 60,
            title: None,
        }
    }
}

impl ProgramOptions {
    /// The mouse mode to enable at startup.  Cell motion wins when both
    /// modes are requested.
    pub fn mouse_mode(&self) -> Option<MouseMode> {
        if self.mouse_cell_motion {
            Some(MouseMode::CellMotion)
        } else if self.mouse_all_motion {
            Some(MouseMode::AllMotion)
        } else {
            None
        }
    }
}

/// The program's message bus.  Every producer (watchers, commands, handles)
/// sends through a clone of this.
pub(crate) struct Bus<Msg: Send + 'static> {
    tx: mpsc::UnboundedSender<Message<Msg>>,
    token: CancellationToken,
}

impl<Msg: Send + 'static> Clone for Bus<Msg> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            token: self.token.clone(),
        }
    }
}

impl<Msg: Send + 'static> Bus<Msg> {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Message<Msg>>, token: CancellationToken) -> Self {
        Self { tx, token }
    }

    /// Enqueue a message.  A no-op once the program has stopped.
    pub(crate) fn send(&self, msg: Message<Msg>) {
        if self.token.is_cancelled() {
            return;
        }
        let _ = self.tx.send(msg);
    }

    /// Whether the program has stopped accepting messages.
    pub(crate) fn is_closed(&self) -> bool {
        self.token.is_cancelled() || self.tx.is_closed()
    }
}

/// A cloneable handle to a [`Program`] for external control.
///
/// `ProgramHandle` is [`Clone`] and can safely be sent across threads or into
/// async tasks.  Every method is safe to call after the program has stopped:
/// messages are silently dropped and terminal requests report
/// [`ProgramError::NotRunning`].
///
/// Obtain a handle by calling [`Program::handle`] before entering the run
/// loop.
pub struct ProgramHandle<Msg: Send + 'static> {
    bus: Bus<Msg>,
}

impl<Msg: Send + 'static> Clone for ProgramHandle<Msg> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
        }
    }
}

impl<Msg: Send + 'static> ProgramHandle<Msg> {
    /// Send a message to the program.
    ///
    /// The message is enqueued on an unbounded channel and processed after
    /// every message sent before it.  Never blocks.
    pub fn send(&self, msg: Msg) {
        self.bus.send(Message::App(msg));
    }

    /// Request a graceful quit.  The final state is rendered before
    /// [`Program::run`] returns.
    pub fn quit(&self) {
        self.bus.send(Message::Control(Control::Quit));
    }

    /// Stop the program immediately, without a final render.
    /// [`Program::run`] returns [`ProgramError::Killed`].
    pub fn kill(&self) {
        self.bus.token.cancel();
    }

    /// Print a line above the program's output (ignored on the alt screen).
    pub fn println(&self, text: impl Into<String>) {
        self.bus.send(Message::Control(Control::Terminal(
            TerminalCommand::Println(text.into()),
        )));
    }

    /// Print formatted text above the program's output.
    pub fn printf(&self, args: std::fmt::Arguments<'_>) {
        self.println(args.to_string());
    }

    /// Hand the terminal back to its pre-program state, e.g. before running
    /// another interactive process.
    ///
    /// Input reading stops and SIGINT/SIGTERM no longer quit the program
    /// until [`restore_terminal`](Self::restore_terminal) is called.
    pub async fn release_terminal(&self) -> Result<(), ProgramError> {
        self.request(Control::ReleaseTerminal).await
    }

    /// Take the terminal back after [`release_terminal`](Self::release_terminal).
    pub async fn restore_terminal(&self) -> Result<(), ProgramError> {
        self.request(Control::RestoreTerminal).await
    }

    async fn request(&self, control: fn(Reply) -> Control<Msg>) -> Result<(), ProgramError> {
        let (reply, response) = oneshot::channel();
        self.bus.send(Message::Control(control(reply)));
        response.await.unwrap_or(Err(ProgramError::NotRunning))
    }
}

/// The program runtime.  Owns the model and drives it with terminal input,
/// command results and external messages until it quits.
///
/// # Example
///
/// ```rust,ignore
/// use steep_core::{Program, ProgramError};
///
/// #[tokio::main]
/// async fn main() -> Result<(), ProgramError> {
///     let model = Program::new(MyApp::default()).run().await?;
///     // `model` is the final state after quit
///     Ok(())
/// }
/// ```
pub struct Program<M: Model> {
    model: M,
    options: ProgramOptions,
    bus: Bus<M::Message>,
    msg_rx: mpsc::UnboundedReceiver<Message<M::Message>>,
    token: CancellationToken,
}

impl<M: Model> Program<M> {
    /// Create a new program with default options.
    pub fn new(model: M) -> Self {
        Self::with_options(model, ProgramOptions::default())
    }

    /// Create a new program with custom options.
    pub fn with_options(model: M, options: ProgramOptions) -> Self {
        let (tx, msg_rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        Self {
            model,
            options,
            bus: Bus::new(tx, token.clone()),
            msg_rx,
            token,
        }
    }

    /// Get a handle for external control.
    pub fn handle(&self) -> ProgramHandle<M::Message> {
        ProgramHandle {
            bus: self.bus.clone(),
        }
    }

    /// Run the program until it quits, returning the final model.
    ///
    /// The terminal is restored before this returns, whatever the outcome.
    pub async fn run(self) -> Result<M, ProgramError> {
        let Program {
            model,
            options,
            bus,
            msg_rx,
            token,
        } = self;
        // Background tasks observe the token; make sure they stop even if
        // this future is dropped mid-run.
        let _guard = token.clone().drop_guard();
        if token.is_cancelled() {
            return Err(ProgramError::Killed);
        }

        let mouse = options.mouse_mode();
        let ProgramOptions {
            alt_screen,
            bracketed_paste,
            input,
            output,
            renderer,
            handle_signals,
            catch_panics,
            ansi_compression,
            fps,
            title,
            ..
        } = options;

        let input = Input::resolve(input)?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        let ignore_signals = Arc::new(AtomicBool::new(false));
        let mut handlers = Handlers::new();

        if handle_signals {
            handlers.spawn(watchers::watch_signals(
                bus.clone(),
                err_tx.clone(),
                ignore_signals.clone(),
                token.clone(),
            ));
        }

        let renderer: Box<dyn Renderer> = match renderer {
            Some(renderer) => renderer,
            None => Box::new(StandardRenderer::new(output, fps, ansi_compression)),
        };

        let mut rt = Runtime {
            model,
            bus,
            msg_rx,
            cmd_tx,
            err_tx,
            err_rx,
            renderer,
            input,
            subscription: None,
            token: token.clone(),
            ignore_signals,
            catch_panics,
            bracketed_paste,
            raw_mode: false,
            mouse: None,
            alt_screen_was_active: false,
        };

        if let Err(err) = rt.init_terminal() {
            tracing::debug!(target: "steep::program", %err, "terminal setup failed");
            token.cancel();
            handlers.shutdown().await;
            return Err(err);
        }

        if alt_screen {
            rt.renderer.enter_alt_screen();
        }
        if let Some(mode) = mouse {
            rt.enable_mouse(mode);
        }
        if let Some(title) = &title {
            rt.renderer.set_window_title(title);
        }

        let result = rt
            .drive(cmd_rx, &mut handlers, output.is_terminal())
            .await;

        // Teardown runs exactly once, whatever ended the run.
        let forced = matches!(
            result,
            Err(ProgramError::Killed | ProgramError::Panicked { .. })
        );
        token.cancel();
        if let Some(mut subscription) = rt.subscription.take() {
            if subscription.cancel() {
                subscription.wait().await;
            }
        }
        handlers.shutdown().await;
        if forced {
            rt.renderer.kill();
        } else {
            rt.renderer.stop();
        }
        let restored = rt.restore_terminal_state().await;

        if let Err(ProgramError::Panicked { message, backtrace }) = &result {
            eprintln!("Caught panic:\n\n{message}\n\nRestoring terminal...\n\n{backtrace}");
        }
        tracing::debug!(target: "steep::program", ok = result.is_ok(), "program stopped");

        result?;
        restored?;
        Ok(rt.model)
    }
}

impl<M: Model> Runtime<M> {
    /// Startup steps after the terminal is set up, then the event loop and
    /// the final render.
    async fn drive(
        &mut self,
        cmd_rx: mpsc::UnboundedReceiver<Command<M::Message>>,
        handlers: &mut Handlers,
        watch_resize: bool,
    ) -> Result<(), ProgramError> {
        let model = &self.model;
        let init = crate::panic::guarded(self.catch_panics, || model.init())?;
        if !init.is_none() {
            let _ = self.cmd_tx.send(init);
        }

        self.renderer.start();
        self.render()?;

        self.subscribe_input()?;

        if watch_resize {
            handlers.spawn(watchers::watch_resize(
                self.bus.clone(),
                self.err_tx.clone(),
                self.token.clone(),
            ));
        }
        handlers.spawn(dispatcher::dispatch(
            cmd_rx,
            self.bus.clone(),
            self.token.clone(),
        ));
        tracing::debug!(target: "steep::program", "program started");

        match self.event_loop().await {
            Ok(()) if self.token.is_cancelled() => Err(ProgramError::Killed),
            Ok(()) => self.render(),
            Err(err @ ProgramError::Panicked { .. }) => Err(err),
            // A failing watcher still gets the final frame.
            Err(err) => {
                self.render()?;
                Err(err)
            }
        }
    }
}

/// Run `model` with default options.  Shorthand for
/// `Program::new(model).run().await`.
pub async fn run<M: Model>(model: M) -> Result<M, ProgramError> {
    Program::new(model).run().await
}

/// Run `model` with the given options.
pub async fn run_with<M: Model>(model: M, options: ProgramOptions) -> Result<M, ProgramError> {
    Program::with_options(model, options).run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::input;
    use crate::testing::{RecordingRenderer, RendererCall};
    use std::time::Duration;

    fn headless(renderer: &RecordingRenderer) -> ProgramOptions {
        ProgramOptions {
            input: InputSource::Disabled,
            handle_signals: false,
            renderer: Some(Box::new(renderer.clone())),
            ..ProgramOptions::default()
        }
    }

    struct Counter {
        count: i32,
    }

    enum CounterMsg {
        Inc,
        Noop,
        Event(Event),
    }

    impl From<Event> for CounterMsg {
        fn from(event: Event) -> Self {
            CounterMsg::Event(event)
        }
    }

    impl Model for Counter {
        type Message = CounterMsg;

        fn update(&mut self, msg: CounterMsg) -> Command<CounterMsg> {
            match msg {
                CounterMsg::Inc => self.count += 1,
                CounterMsg::Noop | CounterMsg::Event(_) => {}
            }
            Command::none()
        }

        fn view(&self) -> String {
            format!("count: {}", self.count)
        }
    }

    #[tokio::test]
    async fn counter_quits_with_final_render() {
        let renderer = RecordingRenderer::new();
        let program = Program::with_options(Counter { count: 0 }, headless(&renderer));
        let handle = program.handle();
        for msg in [
            CounterMsg::Inc,
            CounterMsg::Inc,
            CounterMsg::Noop,
            CounterMsg::Inc,
        ] {
            handle.send(msg);
        }
        handle.quit();

        let model = program.run().await.unwrap();
        assert_eq!(model.count, 3);
        assert_eq!(renderer.last_frame().as_deref(), Some("count: 3"));
        assert!(renderer.calls().contains(&RendererCall::Stop));
        assert!(!renderer.calls().contains(&RendererCall::Kill));
    }

    /// Records every message it sees, quits on `Done`.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<u32>,
        events: Vec<Event>,
        exited: Option<bool>,
        expect: usize,
    }

    enum RecMsg {
        Push(u32),
        Done,
        Batch(u32),
        Sequence(u32),
        Exec,
        Exited(bool),
        Boom,
        Event(Event),
    }

    impl From<Event> for RecMsg {
        fn from(event: Event) -> Self {
            RecMsg::Event(event)
        }
    }

    impl Model for Recorder {
        type Message = RecMsg;

        fn update(&mut self, msg: RecMsg) -> Command<RecMsg> {
            match msg {
                RecMsg::Push(n) => {
                    self.seen.push(n);
                    if self.expect > 0 && self.seen.len() == self.expect {
                        return Command::quit();
                    }
                }
                RecMsg::Done => return Command::quit(),
                RecMsg::Batch(k) => {
                    self.expect = k as usize;
                    return Command::batch((1..=k).map(|i| {
                        Command::perform(
                            async move {
                                tokio::time::sleep(Duration::from_millis(u64::from(i % 3))).await;
                                i
                            },
                            RecMsg::Push,
                        )
                    }));
                }
                RecMsg::Sequence(k) => {
                    self.expect = k as usize;
                    return Command::sequence((0..k).map(|i| {
                        Command::perform(
                            async move {
                                let delay = u64::from(k - i) * 5;
                                tokio::time::sleep(Duration::from_millis(delay)).await;
                                i
                            },
                            RecMsg::Push,
                        )
                    }));
                }
                RecMsg::Exec => {
                    return Command::exec(crate::ExecCommand::new("true"), |status| {
                        RecMsg::Exited(status.map(|s| s.success()).unwrap_or(false))
                    });
                }
                RecMsg::Exited(ok) => {
                    self.exited = Some(ok);
                    return Command::quit();
                }
                RecMsg::Boom => panic!("boom"),
                RecMsg::Event(event) => {
                    if !matches!(event, Event::Resize { .. }) {
                        self.events.push(event);
                    }
                }
            }
            Command::none()
        }

        fn view(&self) -> String {
            format!("{:?}", self.seen)
        }
    }

    #[tokio::test]
    async fn messages_are_processed_in_send_order() {
        let renderer = RecordingRenderer::new();
        let program = Program::with_options(Recorder::default(), headless(&renderer));
        let handle = program.handle();
        for n in 0..50 {
            handle.send(RecMsg::Push(n));
        }
        handle.send(RecMsg::Done);

        let model = program.run().await.unwrap();
        assert_eq!(model.seen, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn send_after_termination_is_a_noop() {
        let renderer = RecordingRenderer::new();
        let program = Program::with_options(Recorder::default(), headless(&renderer));
        let handle = program.handle();
        handle.send(RecMsg::Done);
        program.run().await.unwrap();

        handle.send(RecMsg::Push(1));
        handle.quit();
        handle.println("late");
        assert!(matches!(
            handle.release_terminal().await,
            Err(ProgramError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn kill_before_run_reports_killed() {
        let renderer = RecordingRenderer::new();
        let program = Program::with_options(Recorder::default(), headless(&renderer));
        program.handle().kill();

        assert!(matches!(program.run().await, Err(ProgramError::Killed)));
        assert!(renderer.frames().is_empty());
    }

    #[tokio::test]
    async fn kill_while_running_skips_final_render() {
        let renderer = RecordingRenderer::new();
        let program = Program::with_options(Recorder::default(), headless(&renderer));
        let handle = program.handle();
        let run = tokio::spawn(program.run());

        tokio::time::sleep(Duration::from_millis(20)).await;
        let frames_before = renderer.frames().len();
        handle.kill();

        let result = run.await.unwrap();
        assert!(matches!(result, Err(ProgramError::Killed)));
        assert_eq!(renderer.frames().len(), frames_before);
        let calls = renderer.calls();
        assert!(calls.contains(&RendererCall::Kill));
        assert!(!calls.contains(&RendererCall::Stop));
        assert!(calls.contains(&RendererCall::ShowCursor));
    }

    #[tokio::test]
    async fn batch_results_are_all_delivered() {
        let renderer = RecordingRenderer::new();
        let program = Program::with_options(Recorder::default(), headless(&renderer));
        program.handle().send(RecMsg::Batch(5));

        let model = program.run().await.unwrap();
        assert_eq!(model.seen.len(), 5);
        assert_eq!(model.seen.iter().sum::<u32>(), 15);
    }

    #[tokio::test]
    async fn sequence_preserves_order_despite_latency() {
        let renderer = RecordingRenderer::new();
        let program = Program::with_options(Recorder::default(), headless(&renderer));
        program.handle().send(RecMsg::Sequence(5));

        let model = program.run().await.unwrap();
        assert_eq!(model.seen, vec![0, 1, 2, 3, 4]);
        assert!(model.events.contains(&Event::Sequence { len: 5 }));
    }

    #[tokio::test]
    async fn cell_motion_wins_over_all_motion() {
        let renderer = RecordingRenderer::new();
        let options = ProgramOptions {
            mouse_cell_motion: true,
            mouse_all_motion: true,
            ..headless(&renderer)
        };
        assert_eq!(options.mouse_mode(), Some(MouseMode::CellMotion));
        let program = Program::with_options(Recorder::default(), options);
        program.handle().send(RecMsg::Done);
        program.run().await.unwrap();

        let calls = renderer.calls();
        assert!(calls.contains(&RendererCall::EnableMouseCellMotion));
        assert!(!calls.contains(&RendererCall::EnableMouseAllMotion));
    }

    #[tokio::test]
    async fn release_and_restore_round_trip_alt_screen() {
        let renderer = RecordingRenderer::new();
        let options = ProgramOptions {
            alt_screen: true,
            mouse_cell_motion: true,
            ..headless(&renderer)
        };
        let program = Program::with_options(Recorder::default(), options);
        let handle = program.handle();
        let run = tokio::spawn(program.run());

        handle.release_terminal().await.unwrap();
        assert!(!renderer.alt_screen_active());
        handle.restore_terminal().await.unwrap();
        assert!(renderer.alt_screen_active());
        handle.quit();
        run.await.unwrap().unwrap();

        let calls = renderer.calls();
        let count = |call: &RendererCall| calls.iter().filter(|c| *c == call).count();
        assert_eq!(count(&RendererCall::EnterAltScreen), 2);
        assert_eq!(count(&RendererCall::EnableMouseCellMotion), 2);
        assert!(count(&RendererCall::ExitAltScreen) >= 2);
    }

    #[tokio::test]
    async fn restore_without_alt_screen_requests_repaint() {
        let renderer = RecordingRenderer::new();
        let program = Program::with_options(Recorder::default(), headless(&renderer));
        let handle = program.handle();
        let run = tokio::spawn(program.run());

        handle.release_terminal().await.unwrap();
        handle.restore_terminal().await.unwrap();
        handle.quit();
        let model = run.await.unwrap().unwrap();

        assert!(renderer.calls().contains(&RendererCall::Repaint));
        assert!(!renderer.calls().contains(&RendererCall::EnterAltScreen));
        assert!(model
            .events
            .contains(&Event::Terminal(TerminalCommand::Repaint)));
    }

    #[tokio::test]
    async fn panic_in_update_restores_terminal() {
        let renderer = RecordingRenderer::new();
        let program = Program::with_options(Recorder::default(), headless(&renderer));
        program.handle().send(RecMsg::Boom);

        match program.run().await {
            Err(ProgramError::Panicked { message, .. }) => assert!(message.contains("boom")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a panic to be reported"),
        }
        let calls = renderer.calls();
        assert!(calls.contains(&RendererCall::Kill));
        assert!(calls.contains(&RendererCall::ShowCursor));
    }

    #[tokio::test]
    async fn control_messages_are_echoed_to_the_model() {
        let renderer = RecordingRenderer::new();
        let program = Program::with_options(Recorder::default(), headless(&renderer));
        let handle = program.handle();
        handle.println("hello");
        handle.send(RecMsg::Done);

        let model = program.run().await.unwrap();
        assert_eq!(
            model.events,
            vec![Event::Terminal(TerminalCommand::Println("hello".into()))]
        );
        assert!(renderer
            .calls()
            .contains(&RendererCall::PrintLine("hello".into())));
    }

    struct Starter {
        started: bool,
    }

    enum StarterMsg {
        Started,
        Event(Event),
    }

    impl From<Event> for StarterMsg {
        fn from(event: Event) -> Self {
            StarterMsg::Event(event)
        }
    }

    impl Model for Starter {
        type Message = StarterMsg;

        fn init(&self) -> Command<StarterMsg> {
            Command::batch([
                Command::set_window_title("starter"),
                Command::perform(async {}, |()| StarterMsg::Started),
            ])
        }

        fn update(&mut self, msg: StarterMsg) -> Command<StarterMsg> {
            match msg {
                StarterMsg::Started => {
                    self.started = true;
                    Command::quit()
                }
                StarterMsg::Event(_) => Command::none(),
            }
        }

        fn view(&self) -> String {
            format!("started: {}", self.started)
        }
    }

    #[tokio::test]
    async fn init_command_is_dispatched() {
        let renderer = RecordingRenderer::new();
        let model = Program::with_options(Starter { started: false }, headless(&renderer))
            .run()
            .await
            .unwrap();
        assert!(model.started);
        assert_eq!(renderer.frames().first().map(String::as_str), Some("started: false"));
        assert_eq!(renderer.last_frame().as_deref(), Some("started: true"));
        assert!(renderer
            .calls()
            .contains(&RendererCall::SetWindowTitle("starter".into())));
    }

    #[tokio::test]
    async fn input_errors_end_the_run() {
        let renderer = RecordingRenderer::new();
        let (tx, events) = input::channel();
        let options = ProgramOptions {
            input: InputSource::Custom(Box::new(events)),
            ..headless(&renderer)
        };
        tx.send(Err(std::io::Error::other("device gone"))).unwrap();

        let result = Program::with_options(Recorder::default(), options).run().await;
        assert!(matches!(result, Err(ProgramError::Io(_))));
    }

    #[tokio::test]
    async fn input_errors_still_render_the_final_frame() {
        let renderer = RecordingRenderer::new();
        let (tx, events) = input::channel();
        let options = ProgramOptions {
            input: InputSource::Custom(Box::new(events)),
            ..headless(&renderer)
        };
        tx.send(Err(std::io::Error::other("device gone"))).unwrap();

        let result = Program::with_options(Recorder::default(), options).run().await;
        assert!(matches!(result, Err(ProgramError::Io(_))));

        let calls = renderer.calls();
        assert!(calls.contains(&RendererCall::Stop));
        assert!(!calls.contains(&RendererCall::Kill));
        assert!(renderer.frames().len() >= 2);
    }

    #[tokio::test]
    async fn custom_input_reaches_the_model() {
        let renderer = RecordingRenderer::new();
        let (tx, events) = input::channel();
        let options = ProgramOptions {
            input: InputSource::Custom(Box::new(events)),
            ..headless(&renderer)
        };
        let program = Program::with_options(Recorder::default(), options);
        let handle = program.handle();
        tx.send(Ok(Event::FocusGained)).unwrap();
        let run = tokio::spawn(program.run());

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.send(RecMsg::Done);
        let model = run.await.unwrap().unwrap();
        assert_eq!(model.events, vec![Event::FocusGained]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exec_hands_over_the_terminal() {
        let renderer = RecordingRenderer::new();
        let program = Program::with_options(Recorder::default(), headless(&renderer));
        program.handle().send(RecMsg::Exec);

        let model = program.run().await.unwrap();
        assert_eq!(model.exited, Some(true));
        assert!(model.events.contains(&Event::Exec {
            program: "true".into()
        }));
        let calls = renderer.calls();
        let starts = calls.iter().filter(|c| **c == RendererCall::Start).count();
        assert_eq!(starts, 2);
    }
}
