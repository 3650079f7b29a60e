use crate::command::{Command, CommandInner};
use crate::program::Bus;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Execute commands off the event loop until the program stops.
///
/// Each asynchronous command gets its own task and delivers its message
/// through the bus.  Those tasks are not tracked: shutdown never waits for a
/// slow command, and a command still running when the program stops simply
/// has its message dropped.
pub(crate) async fn dispatch<Msg: Send + 'static>(
    mut cmds: mpsc::UnboundedReceiver<Command<Msg>>,
    bus: Bus<Msg>,
    token: CancellationToken,
) {
    loop {
        let cmd = tokio::select! {
            _ = token.cancelled() => break,
            cmd = cmds.recv() => match cmd {
                Some(cmd) => cmd,
                None => break,
            },
        };
        match cmd.inner {
            CommandInner::None => {}
            CommandInner::Ready(msg) => bus.send(msg),
            CommandInner::Future(fut) => {
                let bus = bus.clone();
                tokio::spawn(async move {
                    if let Some(msg) = fut.await {
                        bus.send(msg);
                    }
                });
            }
        }
    }
    tracing::debug!(target: "steep::dispatch", "dispatcher stopped");
}
