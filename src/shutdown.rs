//! A paired controller/worker handle for shutting down a single background
//! task, generalized from the bus pump's own shutdown needs so the same
//! pair can signal any task-plus-waiter relationship in this crate.
//!
//! Built on `tokio::sync::watch` rather than a raw `oneshot`, following the
//! same primitive `ShutdownService` uses for its own stop signal: a `watch`
//! channel lets any number of controller clones and waiters observe the
//! same stop/done transition without coordinating who "owns" the receiver.

use tokio::sync::watch;

/// Creates a linked controller/worker pair. The controller signals stop and
/// waits for completion; the worker observes the stop signal and reports
/// completion exactly once.
pub fn shutdown_pair() -> (ShutdownController, ShutdownWorker) {
    let (stop_tx, stop_rx) = watch::channel(false);
    let (done_tx, done_rx) = watch::channel(false);
    (
        ShutdownController { stop_tx, done_rx },
        ShutdownWorker { stop_rx, done_tx },
    )
}

/// Held by the orchestrator managing a background task's lifetime.
#[derive(Clone)]
pub struct ShutdownController {
    stop_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl ShutdownController {
    /// Signals the worker to stop. Idempotent.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// True once `stop` has been called.
    pub fn is_stopping(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Awaits the worker's `done()` call. Resolves immediately if the
    /// worker has already finished.
    pub async fn wait(&self) {
        let mut rx = self.done_rx.clone();
        let _ = rx.wait_for(|&done| done).await;
    }

    /// Signals stop, then awaits completion.
    pub async fn stop_and_wait(&self) {
        self.stop();
        self.wait().await;
    }

    /// A clone of the underlying stop signal, for callers that need to race
    /// it against something else in a `select!` without going through
    /// `is_stopping`'s synchronous snapshot.
    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    /// Resolves once `stop` has been called. Unlike `wait`, this does not
    /// require the worker to have finished — useful for callers (like a
    /// publisher) that just need to stop racing against a channel send once
    /// shutdown has started.
    pub async fn stopping(&self) {
        let mut rx = self.stop_signal();
        let _ = rx.wait_for(|&stop| stop).await;
    }

    /// An owned future equivalent to `wait`, usable by callers that don't
    /// hold a borrow of the controller (e.g. `tokio::spawn`ed waiters).
    pub fn wait_owned(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.done_rx.clone();
        async move {
            let _ = rx.wait_for(|&done| done).await;
        }
    }
}

/// Held by the task being shut down.
pub struct ShutdownWorker {
    stop_rx: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
}

impl ShutdownWorker {
    /// Resolves once the controller calls `stop`. Intended for use as a
    /// `select!` arm inside the worker's own loop.
    pub async fn stopping(&self) {
        let mut rx = self.stop_rx.clone();
        let _ = rx.wait_for(|&stop| stop).await;
    }

    /// Reports that the worker has finished. Consumes the worker so a
    /// second call is a compile error rather than a runtime bug.
    pub fn done(self) {
        let _ = self.done_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_resolves_after_done() {
        let (ctl, worker) = shutdown_pair();
        let handle = tokio::spawn(async move {
            worker.stopping().await;
            worker.done();
        });

        ctl.stop();
        ctl.wait().await;
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn wait_resolves_immediately_if_already_done() {
        let (ctl, worker) = shutdown_pair();
        worker.done();
        ctl.wait().await;
    }

    #[tokio::test]
    async fn stop_and_wait_is_idempotent() {
        let (ctl, worker) = shutdown_pair();
        tokio::spawn(async move {
            worker.stopping().await;
            worker.done();
        });

        ctl.stop_and_wait().await;
        ctl.stop_and_wait().await;
    }

    #[tokio::test]
    async fn wait_owned_works_from_another_task() {
        let (ctl, worker) = shutdown_pair();
        let waiter = tokio::spawn(ctl.wait_owned());
        ctl.stop();
        worker.done();
        waiter.await.unwrap();
    }
}
