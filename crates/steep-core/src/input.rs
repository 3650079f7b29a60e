//! Input sources and the cancellable read loop feeding the message bus.

use crate::command::Message;
use crate::event::Event;
use crate::program::{Bus, ProgramError};
use futures::stream::{BoxStream, StreamExt};
use std::fs::File;
use std::io::{self, IsTerminal};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

/// A stream of decoded input events.
pub type EventStream = BoxStream<'static, io::Result<Event>>;

/// Produces decoded input events for a program.
///
/// `subscribe` is called once at startup and again every time the terminal
/// is restored after a release, so implementations must support being
/// subscribed more than once.  Dropping the returned stream cancels any
/// read in progress.
pub trait EventSource: Send {
    /// Start reading events.
    fn subscribe(&mut self) -> io::Result<EventStream>;
}

/// Where a [`Program`](crate::Program) reads input from.
#[derive(Default)]
pub enum InputSource {
    /// Standard input.  When stdin is not a terminal (input was piped or
    /// redirected) the controlling TTY is opened instead.
    #[default]
    Stdin,
    /// Always read from a freshly opened controlling TTY.
    Tty,
    /// A custom event source.  The terminal is not put into raw mode.
    Custom(Box<dyn EventSource>),
    /// No input at all.
    Disabled,
}

/// Terminal events decoded by crossterm.
///
/// Resize events are dropped on Unix, where the resize watcher reports them.
///
/// crossterm is built with `use-dev-tty`, so on Unix its reader polls the
/// controlling terminal rather than fd 0.  That is what lets piped or
/// redirected invocations still receive keys.  When a TTY was opened
/// explicitly the handle is kept for the lifetime of the source so the
/// device stays open while crossterm reads from it.
#[derive(Default)]
pub struct TerminalEvents {
    _tty: Option<File>,
}

impl TerminalEvents {
    /// Read events from the terminal.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tty(tty: File) -> Self {
        Self { _tty: Some(tty) }
    }
}

impl EventSource for TerminalEvents {
    fn subscribe(&mut self) -> io::Result<EventStream> {
        let events = crossterm::event::EventStream::new().filter_map(|event| async move {
            match event {
                #[cfg(unix)]
                Ok(crossterm::event::Event::Resize(..)) => None,
                Ok(event) => Some(Ok(Event::from(event))),
                Err(err) => Some(Err(err)),
            }
        });
        Ok(events.boxed())
    }
}

/// Programmatic input, fed through the sender returned by [`channel`].
///
/// Useful for driving a program from tests or from another process.
#[derive(Clone)]
pub struct ChannelEvents {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<io::Result<Event>>>>,
}

/// Create a programmatic input source and the sender that feeds it.
///
/// Sending an `Err` makes the program stop with [`ProgramError::Io`].
pub fn channel() -> (mpsc::UnboundedSender<io::Result<Event>>, ChannelEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        tx,
        ChannelEvents {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

impl EventSource for ChannelEvents {
    fn subscribe(&mut self) -> io::Result<EventStream> {
        let events = futures::stream::unfold(self.rx.clone(), |rx| async move {
            let next = rx.lock().await.recv().await;
            next.map(|event| (event, rx))
        });
        Ok(events.boxed())
    }
}

/// A resolved input source.
pub(crate) struct Input {
    pub(crate) source: Box<dyn EventSource>,
    /// Whether the source is a terminal, i.e. raw mode applies.
    pub(crate) is_terminal: bool,
}

impl Input {
    pub(crate) fn resolve(source: InputSource) -> Result<Option<Input>, ProgramError> {
        let terminal = |source: TerminalEvents| {
            Some(Input {
                source: Box::new(source),
                is_terminal: true,
            })
        };
        match source {
            InputSource::Stdin if io::stdin().is_terminal() => Ok(terminal(TerminalEvents::new())),
            InputSource::Stdin | InputSource::Tty => {
                tracing::debug!(target: "steep::program", "opening TTY for input");
                let tty = open_tty().map_err(ProgramError::InputTty)?;
                Ok(terminal(TerminalEvents::with_tty(tty)))
            }
            InputSource::Custom(source) => Ok(Some(Input {
                source,
                is_terminal: false,
            })),
            InputSource::Disabled => Ok(None),
        }
    }
}

#[cfg(unix)]
fn open_tty() -> io::Result<File> {
    std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/tty")
}

#[cfg(windows)]
fn open_tty() -> io::Result<File> {
    std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("CONIN$")
}

/// A running read loop forwarding input events to the bus.
pub(crate) struct Subscription {
    cancel: CancellationToken,
    done: oneshot::Receiver<()>,
}

impl Subscription {
    pub(crate) fn start<Msg: Send + 'static>(
        mut events: EventStream,
        bus: Bus<Msg>,
        errs: mpsc::UnboundedSender<ProgramError>,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let (done_tx, done) = oneshot::channel();
        let token = cancel.clone();
        tokio::spawn(async move {
            let _done = done_tx;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = events.next() => match event {
                        Some(Ok(event)) => bus.send(Message::Event(event)),
                        Some(Err(err)) => {
                            if !token.is_cancelled() {
                                tracing::warn!(target: "steep::watch", %err, "input read failed");
                                let _ = errs.send(ProgramError::Io(err));
                            }
                            break;
                        }
                        None => {
                            tracing::debug!(target: "steep::watch", "input closed");
                            break;
                        }
                    },
                }
            }
        });
        Self { cancel, done }
    }

    /// Cancel the read loop.  Returns `true` if it was still running, in
    /// which case [`wait`](Self::wait) returns once it has stopped.
    pub(crate) fn cancel(&mut self) -> bool {
        self.cancel.cancel();
        matches!(
            self.done.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        )
    }

    pub(crate) async fn wait(self) {
        let _ = self.done.await;
    }
}
