use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ixpay_core::TaskConfig;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

use crate::engine::{CronEngine, ScheduleEngine};
use crate::error::Result;
use crate::launcher::{delay_until, DelayedLauncher};
use crate::metrics::TaskMetrics;
use crate::registry::{ScheduledEntry, TaskRegistry};
use crate::retry::{FailedTask, TaskInfo};
use crate::task::{ScheduledTask, Task};

use super::execution::Executor;
use super::status::TaskStatus;

/// In-process scheduler for recurring and one-shot tasks with bounded manual
/// retry of failures.
pub struct TaskOrchestrator {
    config: TaskConfig,
    registry: TaskRegistry,
    launcher: DelayedLauncher,
    executor: Arc<Executor>,
}

impl TaskOrchestrator {
    /// Orchestrator backed by a [`CronEngine`].
    pub fn new(config: TaskConfig) -> Self {
        Self::with_engine(Arc::new(CronEngine::new()), config)
    }

    /// Orchestrator on a caller-supplied engine.
    ///
    /// The tokio runtime current at this call, if any, is captured so that
    /// [`add_one_time`](Self::add_one_time) also works from threads outside
    /// the runtime. Built off-runtime, use [`with_runtime`](Self::with_runtime).
    pub fn with_engine(engine: Arc<dyn ScheduleEngine>, config: TaskConfig) -> Self {
        Self {
            executor: Arc::new(Executor::new(&config)),
            registry: TaskRegistry::new(engine),
            launcher: DelayedLauncher::new(),
            config,
        }
    }

    /// Launch one-time and retry runs on `runtime` when called off-runtime.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.launcher = DelayedLauncher::with_runtime(runtime);
        self
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// Start the engine's dispatch loop.
    pub async fn start(&self) {
        self.registry.engine().start().await;
        info!(max_attempts = self.config.max_attempts, "task orchestrator started");
    }

    /// Stop the engine's dispatch loop.
    ///
    /// In-flight runs and pending one-time or retry launches are neither
    /// waited for nor interrupted; use [`shutdown`](Self::shutdown) to drain.
    pub async fn stop(&self) {
        self.registry.engine().stop().await;
        info!(outstanding = self.launcher.outstanding(), "task orchestrator stopped");
    }

    /// [`stop`](Self::stop), then wait up to `drain_timeout` for outstanding
    /// one-time and retry launches. Returns `false` if the wait timed out.
    pub async fn shutdown(&self) -> bool {
        self.stop().await;
        let drained = self.launcher.drain(self.config.drain_timeout).await;
        if drained {
            info!("task orchestrator drained");
        } else {
            warn!(
                outstanding = self.launcher.outstanding(),
                timeout = ?self.config.drain_timeout,
                "task orchestrator drain timed out"
            );
        }
        drained
    }

    /// Register a recurring task.
    ///
    /// Fails with `AlreadyExists` if the name is already scheduled and with
    /// `InvalidSchedule` if the expression does not parse. Failures of the
    /// task body are never reported here.
    pub async fn add_scheduled(&self, scheduled: ScheduledTask) -> Result<()> {
        let name = scheduled.task.name().to_string();
        let job = self.executor.scheduled_job(Arc::clone(&scheduled.task));

        match self.registry.add_scheduled(&name, &scheduled.cron_expr, job).await {
            Ok(entry) => {
                info!(task = %name, cron_expr = %scheduled.cron_expr, %entry, "scheduled task added");
                Ok(())
            }
            Err(e) => {
                error!(task = %name, error = %e, "failed to add scheduled task");
                Err(e)
            }
        }
    }

    /// Unregister a recurring task. A run already in flight finishes normally.
    pub async fn remove(&self, name: &str) -> Result<()> {
        match self.registry.remove(name).await {
            Ok(_) => {
                info!(task = %name, "scheduled task removed");
                Ok(())
            }
            Err(e) => {
                error!(task = %name, error = %e, "failed to remove scheduled task");
                Err(e)
            }
        }
    }

    /// Run `task` exactly once after `delay`. Cannot be cancelled.
    ///
    /// Callable from any thread once a runtime is known (see
    /// [`with_engine`](Self::with_engine)); without one the submission is
    /// logged and dropped.
    pub fn add_one_time(&self, task: Arc<dyn Task>, delay: Duration) {
        let name = task.name().to_string();
        let executor = Arc::clone(&self.executor);
        if self.launcher.launch(delay, executor.run_one_time(task)) {
            info!(task = %name, delay_ms = delay.as_millis() as u64, "one-time task submitted");
        } else {
            error!(task = %name, "one-time task dropped, no tokio runtime");
        }
    }

    /// Run `task` exactly once at `at`; instants in the past run immediately.
    pub fn add_one_time_at(&self, task: Arc<dyn Task>, at: DateTime<Utc>) {
        self.add_one_time(task, delay_until(at));
    }

    /// Run a scheduled task once right now, inline, leaving its schedule
    /// untouched. `false` if the name is not scheduled.
    pub async fn run_now(&self, name: &str) -> bool {
        let found = self.registry.run_now(name).await;
        if !found {
            error!(task = %name, "task not found");
        }
        found
    }

    /// Launch one more run of a failed task.
    ///
    /// `true` means the retry was accepted, not that it succeeded; the
    /// outcome shows up in the logs and in [`list_failed`](Self::list_failed).
    pub async fn retry(&self, name: &str) -> bool {
        match self.executor.retries.admit(name).await {
            Ok(info) => {
                info!(
                    task = %name,
                    attempt = info.attempts.saturating_add(1),
                    max_attempts = info.max_attempts,
                    "retrying failed task"
                );
                let executor = Arc::clone(&self.executor);
                self.launcher.launch(Duration::ZERO, executor.run_retry(info))
            }
            Err(reason) => {
                error!(task = %name, %reason, "retry refused");
                false
            }
        }
    }

    /// Point-in-time copy of every failure record.
    pub async fn list_failed(&self) -> Vec<TaskInfo> {
        self.executor.retries.list_failed().await
    }

    /// Serializable form of [`list_failed`](Self::list_failed).
    pub async fn failed_tasks(&self) -> Vec<FailedTask> {
        self.list_failed().await.iter().map(TaskInfo::snapshot).collect()
    }

    pub async fn failed_task(&self, name: &str) -> Option<TaskInfo> {
        self.executor.retries.get(name).await
    }

    /// Drop a failure record without running the task, e.g. to give an
    /// exhausted task a fresh history. `false` if there was no record.
    pub async fn clear_failed(&self, name: &str) -> bool {
        let cleared = self.executor.retries.resolve(name).await.is_some();
        if cleared {
            info!(task = %name, "failure record cleared");
        }
        cleared
    }

    /// Every registered recurring task with its next fire time.
    pub async fn scheduled_tasks(&self) -> Vec<ScheduledEntry> {
        self.registry.entries().await
    }

    pub async fn is_scheduled(&self, name: &str) -> bool {
        self.registry.contains(name).await
    }

    pub async fn status(&self, name: &str) -> TaskStatus {
        let live = self.registry.get(name).await;
        let failure = self.executor.retries.get(name).await;
        TaskStatus::new(name, live, failure)
    }

    pub async fn metrics(&self) -> TaskMetrics {
        self.executor.metrics.lock().await.snapshot()
    }

    /// One-time and retry launches that have not finished yet.
    pub fn outstanding(&self) -> usize {
        self.launcher.outstanding()
    }
}
