//! Fire-once launcher for delayed and retry runs.
//!
//! Every launch is its own tokio task that sleeps for the delay and then
//! drives the run to completion. Nothing is handed back to the caller, so a
//! launch cannot be cancelled. The spawned tasks are tracked only so that
//! [`DelayedLauncher::drain`] can wait for them during shutdown.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error};

pub struct DelayedLauncher {
    tracker: TaskTracker,
    /// Runtime that was current at construction; used when `launch` is
    /// called from a thread outside any runtime.
    runtime: Option<Handle>,
}

impl Default for DelayedLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayedLauncher {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
            runtime: Handle::try_current().ok(),
        }
    }

    /// Launcher that falls back to `runtime` off-runtime.
    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            tracker: TaskTracker::new(),
            runtime: Some(runtime),
        }
    }

    /// Run `run` once after `delay`.
    ///
    /// Spawns on the calling thread's runtime, else on the one captured at
    /// construction. Returns `false`, dropping `run`, if there is neither.
    pub fn launch<F>(&self, delay: Duration, run: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Some(handle) = Handle::try_current().ok().or_else(|| self.runtime.clone()) else {
            error!("no tokio runtime available, launch dropped");
            return false;
        };
        self.tracker.spawn_on(
            async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                run.await;
            },
            &handle,
        );
        true
    }

    /// Launches that have not finished yet (sleeping or running).
    pub fn outstanding(&self) -> usize {
        self.tracker.len()
    }

    /// Wait up to `timeout` for every outstanding launch to finish.
    ///
    /// Returns `false` on timeout; the remaining launches keep running.
    /// The launcher stays usable afterwards.
    pub async fn drain(&self, timeout: Duration) -> bool {
        debug!(outstanding = self.tracker.len(), timeout = ?timeout, "draining launcher");
        self.tracker.close();
        let drained = tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok();
        self.tracker.reopen();
        drained
    }
}

/// Delay from now until `at`, clamped to zero for instants in the past.
pub fn delay_until(at: DateTime<Utc>) -> Duration {
    (at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}
