//! Test support: a headless model driver and a recording renderer.

use crate::command::{Command, CommandInner, Control, Message};
use crate::model::Model;
use crate::renderer::Renderer;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A headless test harness that drives a [`Model`] without a terminal.
///
/// `TestProgram` lets you exercise every part of the init/update/view cycle in
/// a plain `#[test]` function -- no tokio runtime or TTY required.  Immediate
/// messages (e.g. [`Command::message`]), including those inside batches and
/// sequences, are collected and can be flushed with
/// [`drain_messages`](TestProgram::drain_messages).  Quit requests are
/// recorded; asynchronous commands and terminal commands are ignored.
///
/// # Example
///
/// ```rust,ignore
/// use steep_core::testing::TestProgram;
///
/// let mut prog = TestProgram::new(Counter::default()); // calls Counter::init
/// prog.send(CounterMsg::Increment);                    // triggers update
/// prog.send(CounterMsg::Increment);
/// assert_eq!(prog.model().count, 2);                   // inspect state
/// assert!(prog.view().contains("Count: 2"));
/// ```
pub struct TestProgram<M: Model> {
    model: M,
    pending_messages: Vec<M::Message>,
    quit_requested: bool,
}

impl<M: Model> TestProgram<M> {
    /// Create a test program and call [`Model::init`].
    ///
    /// Immediate messages produced by `init` are collected into the
    /// pending-message queue.  Call
    /// [`drain_messages`](TestProgram::drain_messages) to process them.
    pub fn new(model: M) -> Self {
        let init_cmd = model.init();
        let mut program = Self {
            model,
            pending_messages: Vec::new(),
            quit_requested: false,
        };
        program.collect_sync_messages(init_cmd);
        program
    }

    /// Send a message, triggering a single update cycle.
    ///
    /// The message is passed to [`Model::update`] immediately.  Any
    /// immediate messages returned by `update` are enqueued; call
    /// [`drain_messages`](TestProgram::drain_messages) to flush them.
    pub fn send(&mut self, msg: M::Message) {
        let cmd = self.model.update(msg);
        self.collect_sync_messages(cmd);
    }

    /// Process all pending immediate messages.
    ///
    /// Repeatedly drains the pending queue, calling [`Model::update`] for each
    /// message, until no new immediate messages are generated.
    pub fn drain_messages(&mut self) {
        while !self.pending_messages.is_empty() {
            let messages: Vec<_> = self.pending_messages.drain(..).collect();
            for msg in messages {
                let cmd = self.model.update(msg);
                self.collect_sync_messages(cmd);
            }
        }
    }

    /// Get a shared reference to the model for assertions.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Get a mutable reference to the model for direct test setup.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Render the current frame.
    pub fn view(&self) -> String {
        self.model.view()
    }

    /// Whether any processed command asked the program to quit.
    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Take back the model.
    pub fn into_model(self) -> M {
        self.model
    }

    fn collect_sync_messages(&mut self, cmd: Command<M::Message>) {
        let CommandInner::Ready(msg) = cmd.inner else {
            // Async commands can't be executed synchronously in tests
            return;
        };
        match msg {
            Message::App(msg) => self.pending_messages.push(msg),
            Message::Event(event) => self.pending_messages.push(M::Message::from(event)),
            Message::Control(Control::Quit) => self.quit_requested = true,
            Message::Control(Control::Batch(cmds) | Control::Sequence(cmds)) => {
                for cmd in cmds {
                    self.collect_sync_messages(cmd);
                }
            }
            Message::Control(_) => {}
        }
    }
}

/// One call made on a [`RecordingRenderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererCall {
    Start,
    Stop,
    Kill,
    Write(String),
    Repaint,
    ClearScreen,
    EnterAltScreen,
    ExitAltScreen,
    ShowCursor,
    HideCursor,
    EnableMouseCellMotion,
    DisableMouseCellMotion,
    EnableMouseAllMotion,
    DisableMouseAllMotion,
    EnableBracketedPaste,
    DisableBracketedPaste,
    PrintLine(String),
    Resize(u16, u16),
    SetWindowTitle(String),
}

/// A [`Renderer`] that records every call instead of drawing.
///
/// Clones share the same record, so keep one clone for assertions and hand
/// another to [`ProgramOptions::renderer`](crate::ProgramOptions::renderer).
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    state: Arc<Mutex<Recording>>,
}

#[derive(Default)]
struct Recording {
    calls: Vec<RendererCall>,
    alt_screen: bool,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<RendererCall> {
        self.lock().calls.clone()
    }

    /// Every frame written so far, in order.
    pub fn frames(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RendererCall::Write(frame) => Some(frame.clone()),
                _ => None,
            })
            .collect()
    }

    /// The most recently written frame.
    pub fn last_frame(&self) -> Option<String> {
        self.frames().pop()
    }

    /// Whether the alt screen is currently active.
    pub fn alt_screen_active(&self) -> bool {
        self.lock().alt_screen
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: RendererCall) {
        self.lock().calls.push(call);
    }
}

impl Renderer for RecordingRenderer {
    fn start(&mut self) {
        self.record(RendererCall::Start);
    }

    fn stop(&mut self) {
        self.record(RendererCall::Stop);
    }

    fn kill(&mut self) {
        self.record(RendererCall::Kill);
    }

    fn write(&mut self, frame: String) {
        self.record(RendererCall::Write(frame));
    }

    fn repaint(&mut self) {
        self.record(RendererCall::Repaint);
    }

    fn clear_screen(&mut self) {
        self.record(RendererCall::ClearScreen);
    }

    fn alt_screen(&self) -> bool {
        self.alt_screen_active()
    }

    fn enter_alt_screen(&mut self) {
        let mut recording = self.lock();
        recording.alt_screen = true;
        recording.calls.push(RendererCall::EnterAltScreen);
    }

    fn exit_alt_screen(&mut self) {
        let mut recording = self.lock();
        recording.alt_screen = false;
        recording.calls.push(RendererCall::ExitAltScreen);
    }

    fn show_cursor(&mut self) {
        self.record(RendererCall::ShowCursor);
    }

    fn hide_cursor(&mut self) {
        self.record(RendererCall::HideCursor);
    }

    fn enable_mouse_cell_motion(&mut self) {
        self.record(RendererCall::EnableMouseCellMotion);
    }

    fn disable_mouse_cell_motion(&mut self) {
        self.record(RendererCall::DisableMouseCellMotion);
    }

    fn enable_mouse_all_motion(&mut self) {
        self.record(RendererCall::EnableMouseAllMotion);
    }

    fn disable_mouse_all_motion(&mut self) {
        self.record(RendererCall::DisableMouseAllMotion);
    }

    fn enable_bracketed_paste(&mut self) {
        self.record(RendererCall::EnableBracketedPaste);
    }

    fn disable_bracketed_paste(&mut self) {
        self.record(RendererCall::DisableBracketedPaste);
    }

    fn print_line(&mut self, text: String) {
        self.record(RendererCall::PrintLine(text));
    }

    fn resize(&mut self, width: u16, height: u16) {
        self.record(RendererCall::Resize(width, height));
    }

    fn set_window_title(&mut self, title: &str) {
        self.record(RendererCall::SetWindowTitle(title.to_string()));
    }
}
