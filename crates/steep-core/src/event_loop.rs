use crate::command::{Command, Control, ExecCommand, ExitCallback, Message, MouseMode, TerminalCommand};
use crate::event::Event;
use crate::input::{Input, Subscription};
use crate::model::Model;
use crate::program::{Bus, ProgramError};
use crate::renderer::Renderer;
use futures::future::{join_all, BoxFuture};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Everything the event loop owns while a program runs.
///
/// The model, the renderer and the terminal modes are only ever touched from
/// the task driving [`Runtime::event_loop`], or from teardown after every
/// background task has been joined.
pub(crate) struct Runtime<M: Model> {
    pub(crate) model: M,
    pub(crate) bus: Bus<M::Message>,
    pub(crate) msg_rx: mpsc::UnboundedReceiver<Message<M::Message>>,
    pub(crate) cmd_tx: mpsc::UnboundedSender<Command<M::Message>>,
    pub(crate) err_tx: mpsc::UnboundedSender<ProgramError>,
    pub(crate) err_rx: mpsc::UnboundedReceiver<ProgramError>,
    pub(crate) renderer: Box<dyn Renderer>,
    pub(crate) input: Option<Input>,
    pub(crate) subscription: Option<Subscription>,
    pub(crate) token: CancellationToken,
    pub(crate) ignore_signals: Arc<AtomicBool>,
    pub(crate) catch_panics: bool,
    pub(crate) bracketed_paste: bool,
    pub(crate) raw_mode: bool,
    /// Mouse mode requested by the application, re-applied after a restore.
    pub(crate) mouse: Option<MouseMode>,
    pub(crate) alt_screen_was_active: bool,
}

/// What the loop does after a control message has been applied.
enum Flow {
    /// Stop the loop.
    Quit,
    /// Let the model observe the control message as an event.
    Forward(Event),
    /// Fully consumed by the runtime.
    Handled,
}

impl<M: Model> Runtime<M> {
    /// Process bus messages one at a time until the program quits, is
    /// killed, or a background task reports an error.
    ///
    /// Returns `Ok(())` both on quit and on kill; the caller tells them apart
    /// through the cancellation token.
    pub(crate) async fn event_loop(&mut self) -> Result<(), ProgramError> {
        loop {
            let msg = tokio::select! {
                biased;

                _ = self.token.cancelled() => return Ok(()),
                Some(err) = self.err_rx.recv() => {
                    tracing::debug!(target: "steep::program", %err, "background task failed");
                    return Err(err);
                }
                msg = self.msg_rx.recv() => match msg {
                    Some(msg) => msg,
                    None => return Ok(()),
                },
            };

            let msg = match msg {
                Message::App(msg) => msg,
                Message::Event(event) => self.on_event(event),
                Message::Control(control) => match self.on_control(control).await? {
                    Flow::Quit => return Ok(()),
                    Flow::Forward(event) => M::Message::from(event),
                    Flow::Handled => continue,
                },
            };
            self.transition(msg)?;
        }
    }

    /// Run `update`, hand its command to the dispatcher, then render.
    fn transition(&mut self, msg: M::Message) -> Result<(), ProgramError> {
        let model = &mut self.model;
        let cmd = crate::panic::guarded(self.catch_panics, || model.update(msg))?;
        if !cmd.is_none() {
            let _ = self.cmd_tx.send(cmd);
        }
        self.render()
    }

    pub(crate) fn render(&mut self) -> Result<(), ProgramError> {
        let model = &self.model;
        let frame = crate::panic::guarded(self.catch_panics, || model.view())?;
        self.renderer.write(frame);
        Ok(())
    }

    fn on_event(&mut self, event: Event) -> M::Message {
        if let Event::Resize { width, height } = event {
            self.renderer.resize(width, height);
        }
        M::Message::from(event)
    }

    async fn on_control(&mut self, control: Control<M::Message>) -> Result<Flow, ProgramError> {
        match control {
            Control::Quit => {
                tracing::debug!(target: "steep::program", "quit requested");
                Ok(Flow::Quit)
            }
            Control::Batch(cmds) => {
                for cmd in cmds {
                    let _ = self.cmd_tx.send(cmd);
                }
                Ok(Flow::Handled)
            }
            Control::Sequence(cmds) => {
                let len = cmds.len();
                let bus = self.bus.clone();
                tokio::spawn(async move { run_in_order(cmds, &bus).await });
                Ok(Flow::Forward(Event::Sequence { len }))
            }
            Control::Terminal(cmd) => {
                self.apply(&cmd).await?;
                Ok(Flow::Forward(Event::Terminal(cmd)))
            }
            Control::Exec { cmd, on_exit } => {
                let program = cmd.program.clone();
                self.exec(cmd, on_exit).await;
                Ok(Flow::Forward(Event::Exec { program }))
            }
            Control::ReleaseTerminal(reply) => {
                let _ = reply.send(self.release_terminal().await);
                Ok(Flow::Handled)
            }
            Control::RestoreTerminal(reply) => {
                let _ = reply.send(self.restore_terminal().await);
                Ok(Flow::Handled)
            }
        }
    }

    async fn apply(&mut self, cmd: &TerminalCommand) -> Result<(), ProgramError> {
        match cmd {
            TerminalCommand::EnterAltScreen => self.renderer.enter_alt_screen(),
            TerminalCommand::ExitAltScreen => self.renderer.exit_alt_screen(),
            TerminalCommand::EnableMouse(mode) => self.enable_mouse(*mode),
            TerminalCommand::DisableMouse => {
                self.mouse = None;
                self.renderer.disable_mouse_cell_motion();
                self.renderer.disable_mouse_all_motion();
            }
            TerminalCommand::ShowCursor => self.renderer.show_cursor(),
            TerminalCommand::HideCursor => self.renderer.hide_cursor(),
            TerminalCommand::SetTitle(title) => self.renderer.set_window_title(title),
            TerminalCommand::ClearScreen => self.renderer.clear_screen(),
            TerminalCommand::Println(text) => self.renderer.print_line(text.clone()),
            TerminalCommand::Repaint => self.renderer.repaint(),
            TerminalCommand::Suspend => self.suspend().await?,
        }
        Ok(())
    }

    pub(crate) fn enable_mouse(&mut self, mode: MouseMode) {
        match (self.mouse, mode) {
            (Some(MouseMode::AllMotion), MouseMode::CellMotion) => {
                self.renderer.disable_mouse_all_motion();
            }
            (Some(MouseMode::CellMotion), MouseMode::AllMotion) => {
                self.renderer.disable_mouse_cell_motion();
            }
            _ => {}
        }
        match mode {
            MouseMode::CellMotion => self.renderer.enable_mouse_cell_motion(),
            MouseMode::AllMotion => self.renderer.enable_mouse_all_motion(),
        }
        self.mouse = Some(mode);
    }

    /// Run an external process with the terminal handed over to it.  Blocks
    /// the loop until the process exits; the callback's message is delivered
    /// through the bus.
    async fn exec(&mut self, cmd: ExecCommand, on_exit: ExitCallback<M::Message>) {
        tracing::debug!(target: "steep::program", program = %cmd.program, "exec");
        if let Err(err) = self.release_terminal().await {
            self.bus.send(Message::App(on_exit(Err(io::Error::other(err)))));
            return;
        }
        let status = cmd.to_process().status().await;
        let restored = self.restore_terminal().await;
        let result = match (status, restored) {
            (Err(err), _) => Err(err),
            (Ok(_), Err(err)) => Err(io::Error::other(err)),
            (Ok(status), Ok(())) => Ok(status),
        };
        self.bus.send(Message::App(on_exit(result)));
    }

    async fn suspend(&mut self) -> Result<(), ProgramError> {
        self.release_terminal().await?;
        #[cfg(unix)]
        {
            unsafe {
                libc::raise(libc::SIGTSTP);
            }
        }
        self.restore_terminal().await
    }

    /// Raw mode on a terminal input, hidden cursor, bracketed paste.
    pub(crate) fn init_terminal(&mut self) -> Result<(), ProgramError> {
        let is_terminal = self.input.as_ref().is_some_and(|input| input.is_terminal);
        if is_terminal && !self.raw_mode {
            crossterm::terminal::enable_raw_mode().map_err(ProgramError::RawMode)?;
            self.raw_mode = true;
        }
        self.renderer.hide_cursor();
        if self.bracketed_paste {
            self.renderer.enable_bracketed_paste();
        }
        Ok(())
    }

    pub(crate) fn subscribe_input(&mut self) -> Result<(), ProgramError> {
        if let Some(input) = self.input.as_mut() {
            let events = input.source.subscribe()?;
            self.subscription = Some(Subscription::start(
                events,
                self.bus.clone(),
                self.err_tx.clone(),
                &self.token,
            ));
        }
        Ok(())
    }

    /// Give the terminal back to the user: stop input, stop rendering and
    /// undo every terminal mode the program set.
    pub(crate) async fn release_terminal(&mut self) -> Result<(), ProgramError> {
        tracing::debug!(target: "steep::program", "releasing terminal");
        self.ignore_signals.store(true, Ordering::SeqCst);
        if let Some(mut subscription) = self.subscription.take() {
            if subscription.cancel() {
                subscription.wait().await;
            }
        }
        self.alt_screen_was_active = self.renderer.alt_screen();
        self.renderer.stop();
        self.restore_terminal_state().await
    }

    /// Take the terminal back after [`release_terminal`](Self::release_terminal).
    pub(crate) async fn restore_terminal(&mut self) -> Result<(), ProgramError> {
        tracing::debug!(target: "steep::program", "restoring terminal");
        self.ignore_signals.store(false, Ordering::SeqCst);
        self.init_terminal()?;
        self.subscribe_input()?;
        if self.alt_screen_was_active {
            self.renderer.enter_alt_screen();
        } else {
            self.bus.send(Message::Control(Control::Terminal(TerminalCommand::Repaint)));
        }
        if let Some(mode) = self.mouse {
            match mode {
                MouseMode::CellMotion => self.renderer.enable_mouse_cell_motion(),
                MouseMode::AllMotion => self.renderer.enable_mouse_all_motion(),
            }
        }
        self.renderer.start();
        Ok(())
    }

    /// Best-effort cleanup: every step runs even if an earlier one failed.
    /// Only a failure to leave raw mode is reported.
    pub(crate) async fn restore_terminal_state(&mut self) -> Result<(), ProgramError> {
        self.renderer.disable_bracketed_paste();
        self.renderer.show_cursor();
        self.renderer.disable_mouse_cell_motion();
        self.renderer.disable_mouse_all_motion();
        if self.renderer.alt_screen() {
            self.renderer.exit_alt_screen();
            // Some terminals need a moment to switch buffers.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        if self.raw_mode {
            self.raw_mode = false;
            crossterm::terminal::disable_raw_mode()?;
        }
        Ok(())
    }
}

/// Resolve `cmds` one after another, delivering each message before the
/// next command starts.  Nested batches run concurrently and are awaited as
/// a unit; nested sequences run in place.
fn run_in_order<'a, Msg: Send + 'static>(
    cmds: Vec<Command<Msg>>,
    bus: &'a Bus<Msg>,
) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        for cmd in cmds {
            if bus.is_closed() {
                return;
            }
            match cmd.resolve().await {
                None => {}
                Some(Message::Control(Control::Batch(cmds))) => {
                    join_all(cmds.into_iter().map(|cmd| async move {
                        if let Some(msg) = cmd.resolve().await {
                            bus.send(msg);
                        }
                    }))
                    .await;
                }
                Some(Message::Control(Control::Sequence(cmds))) => run_in_order(cmds, bus).await,
                Some(msg) => bus.send(msg),
            }
        }
    })
}
