//! Background watchers turning OS notifications into bus messages.

use crate::command::{Control, Message};
use crate::event::Event;
use crate::program::{Bus, ProgramError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Quit on SIGINT or SIGTERM.
///
/// While `ignore` is set (the terminal is released to another process)
/// signals are observed and dropped.
pub(crate) async fn watch_signals<Msg: Send + 'static>(
    bus: Bus<Msg>,
    errs: mpsc::UnboundedSender<ProgramError>,
    ignore: Arc<AtomicBool>,
    token: CancellationToken,
) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut interrupt, mut terminate) =
            match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                (Ok(interrupt), Ok(terminate)) => (interrupt, terminate),
                (Err(err), _) | (_, Err(err)) => {
                    tracing::warn!(target: "steep::watch", %err, "could not register signal handlers");
                    let _ = errs.send(ProgramError::Io(err));
                    return;
                }
            };
        loop {
            let name = tokio::select! {
                _ = token.cancelled() => return,
                _ = interrupt.recv() => "SIGINT",
                _ = terminate.recv() => "SIGTERM",
            };
            if ignore.load(Ordering::SeqCst) {
                tracing::debug!(target: "steep::watch", signal = name, "terminal released, ignoring signal");
                continue;
            }
            tracing::debug!(target: "steep::watch", signal = name, "quitting on signal");
            bus.send(Message::Control(Control::Quit));
            return;
        }
    }

    #[cfg(not(unix))]
    {
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                received = tokio::signal::ctrl_c() => {
                    if let Err(err) = received {
                        let _ = errs.send(ProgramError::Io(err));
                        return;
                    }
                }
            }
            if ignore.load(Ordering::SeqCst) {
                continue;
            }
            bus.send(Message::Control(Control::Quit));
            return;
        }
    }
}

/// Report the terminal size once, then again on every change.
///
/// Only spawned when the output is a terminal.  A failure to read the size
/// or to subscribe to resize notifications ends the run.
pub(crate) async fn watch_resize<Msg: Send + 'static>(
    bus: Bus<Msg>,
    errs: mpsc::UnboundedSender<ProgramError>,
    token: CancellationToken,
) {
    if !send_size(&bus, &errs) {
        return;
    }

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        use tokio_stream::{wrappers::SignalStream, StreamExt};

        let mut changes = match signal(SignalKind::window_change()) {
            Ok(changes) => SignalStream::new(changes),
            Err(err) => {
                tracing::warn!(target: "steep::watch", %err, "could not watch for resizes");
                let _ = errs.send(ProgramError::Io(err));
                return;
            }
        };
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                change = changes.next() => {
                    if change.is_none() || !send_size(&bus, &errs) {
                        return;
                    }
                }
            }
        }
    }

    // Elsewhere crossterm reports resizes as input events.
    #[cfg(not(unix))]
    {
        token.cancelled().await;
    }
}

fn send_size<Msg: Send + 'static>(
    bus: &Bus<Msg>,
    errs: &mpsc::UnboundedSender<ProgramError>,
) -> bool {
    match crossterm::terminal::size() {
        Ok((width, height)) => {
            bus.send(Message::Event(Event::Resize { width, height }));
            true
        }
        Err(err) => {
            tracing::warn!(target: "steep::watch", %err, "could not read terminal size");
            let _ = errs.send(ProgramError::Io(err));
            false
        }
    }
}
