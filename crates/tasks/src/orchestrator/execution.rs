use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use ixpay_core::TaskConfig;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::engine::{Firing, Job};
use crate::error::TaskError;
use crate::metrics::MetricsRecorder;
use crate::retry::{RetryTracker, TaskInfo};
use crate::task::{Task, TaskContext, Trigger};

/// State shared by every execution path: engine ticks, `run_now`, one-time
/// launches and retries all funnel through [`Executor::execute`].
pub(crate) struct Executor {
    pub(crate) retries: RetryTracker,
    pub(crate) metrics: Mutex<MetricsRecorder>,
    pub(crate) max_attempts: u32,
}

impl Executor {
    pub(crate) fn new(config: &TaskConfig) -> Self {
        Self {
            retries: RetryTracker::new(),
            metrics: Mutex::new(MetricsRecorder::new(config.metrics_capacity)),
            max_attempts: config.max_attempts,
        }
    }

    /// Engine callback for a recurring task.
    pub(crate) fn scheduled_job(self: &Arc<Self>, task: Arc<dyn Task>) -> Job {
        let executor = Arc::clone(self);
        Arc::new(move |firing: Firing| {
            let executor = Arc::clone(&executor);
            let task = Arc::clone(&task);
            let trigger = match firing {
                Firing::Tick => Trigger::Scheduled,
                Firing::Immediate => Trigger::Manual,
            };
            async move {
                executor.execute(task, trigger, 1).await;
            }
            .boxed()
        })
    }

    /// Single run of a delayed task.
    pub(crate) async fn run_one_time(self: Arc<Self>, task: Arc<dyn Task>) {
        self.execute(task, Trigger::OneTime, 1).await;
    }

    /// One retry of a failure record; success clears the record.
    pub(crate) async fn run_retry(self: Arc<Self>, info: TaskInfo) {
        let name = info.name().to_string();
        let attempt = info.attempts.saturating_add(1);
        if self.execute(Arc::clone(&info.task), Trigger::Retry, attempt).await {
            self.retries.resolve(&name).await;
            info!(task = %name, attempt, "retry succeeded, failure record cleared");
        }
    }

    /// Run the body once, log the outcome, update metrics, and record a
    /// failure. Returns whether the body succeeded.
    pub(crate) async fn execute(&self, task: Arc<dyn Task>, trigger: Trigger, attempt: u32) -> bool {
        let name = task.name().to_string();
        let ctx = TaskContext::new(&name, trigger, attempt);
        info!(task = %name, %trigger, attempt, run_id = %ctx.run_id, "running task");

        let started = Instant::now();
        let result = match AssertUnwindSafe(task.run(&ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(anyhow::anyhow!("task panicked: {}", panic_message(&*panic))),
        };
        let elapsed = started.elapsed();

        self.metrics
            .lock()
            .await
            .record_run(&name, trigger, elapsed, result.is_ok());

        match result {
            Ok(()) => {
                info!(
                    task = %name,
                    %trigger,
                    run_id = %ctx.run_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "task completed successfully"
                );
                true
            }
            Err(e) => {
                let err = TaskError::execution(&name, &e);
                error!(task = %name, %trigger, run_id = %ctx.run_id, error = %err, "task failed");

                // The registry and the failure map are locked independently, so
                // a task removed from the registry while this run was in flight
                // still gets a failure record here. The two maps answer
                // different questions and this is accepted.
                let attempts = self
                    .retries
                    .record_failure(&task, self.max_attempts, &format!("{:#}", e))
                    .await;
                if attempts >= self.max_attempts {
                    warn!(task = %name, attempts, "task exhausted its retry attempts");
                }
                false
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
