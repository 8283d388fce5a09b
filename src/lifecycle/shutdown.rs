//! Shutdown coordination.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Stop signal for one long-running server task.
///
/// Clones share the same signal; triggering is idempotent.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Future that resolves once [`trigger`](Self::trigger) was called.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        self.token.clone().cancelled_owned()
    }
}

/// How a server task ended during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Finished on its own before the deadline.
    Drained,
    /// Still running at the deadline and aborted.
    Aborted,
    /// Ended before shutdown began.
    AlreadyStopped,
}

/// Summary returned once both servers are down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub http: DrainOutcome,
    pub rpc: DrainOutcome,
    pub elapsed: Duration,
}

impl ShutdownReport {
    /// `true` when no task had to be aborted.
    pub fn graceful(&self) -> bool {
        self.http != DrainOutcome::Aborted && self.rpc != DrainOutcome::Aborted
    }
}

/// Wait for `task` until `deadline`, aborting it if it is still running then.
pub(crate) async fn drain_until<T>(task: Option<JoinHandle<T>>, deadline: Instant) -> DrainOutcome {
    let Some(mut task) = task else {
        return DrainOutcome::AlreadyStopped;
    };
    match tokio::time::timeout_at(deadline.into(), &mut task).await {
        Ok(_) => DrainOutcome::Drained,
        Err(_) => {
            task.abort();
            let _ = task.await;
            DrainOutcome::Aborted
        }
    }
}
