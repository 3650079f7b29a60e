//! Shutdown barrier for the program's background tasks.

use futures::future::join_all;
use std::future::Future;
use tokio::sync::oneshot;

/// Tracks background tasks so teardown can wait for all of them to finish
/// before the terminal is restored.
///
/// Each spawned task owns the sending half of a completion channel.  The
/// sender is dropped exactly once, when the task returns (or is aborted by
/// the runtime), which is what [`shutdown`](Handlers::shutdown) waits for.
#[derive(Default)]
pub(crate) struct Handlers {
    done: Vec<oneshot::Receiver<()>>,
}

impl Handlers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` on the current runtime and register it with the barrier.
    pub(crate) fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _done = tx;
            task.await;
        });
        self.done.push(rx);
    }

    /// Wait until every registered task has finished.
    ///
    /// Tasks are expected to observe the program's cancellation token; the
    /// wait is only as long as the slowest task takes to notice it.
    pub(crate) async fn shutdown(self) {
        let pending = self.done.len();
        // A closed channel and a sent value both mean the task is gone.
        join_all(self.done).await;
        tracing::debug!(target: "steep::program", tasks = pending, "background tasks joined");
    }
}
