use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// What caused a particular run of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// A cron tick from the schedule engine.
    Scheduled,
    /// `run_now` on a registered task.
    Manual,
    /// The single run of a delayed task.
    OneTime,
    /// A manual retry of a failure record.
    Retry,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trigger::Scheduled => "scheduled",
            Trigger::Manual => "manual",
            Trigger::OneTime => "one_time",
            Trigger::Retry => "retry",
        };
        f.write_str(s)
    }
}

/// Execution scope handed to [`Task::run`].
#[derive(Debug, Clone, Serialize)]
pub struct TaskContext {
    /// Unique per invocation, for correlating log lines.
    pub run_id: Uuid,
    pub task_name: String,
    pub trigger: Trigger,
    /// 1 for normal runs; for a retry, the attempt number this run represents.
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
}

impl TaskContext {
    pub fn new(task_name: impl Into<String>, trigger: Trigger, attempt: u32) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task_name: task_name.into(),
            trigger,
            attempt,
            started_at: Utc::now(),
        }
    }
}

/// A unit of work the orchestrator can schedule, delay, or retry.
///
/// The orchestrator only ever sees `Arc<dyn Task>`; any `Err` from `run`
/// counts as a failure and goes through the same bounded-retry handling.
#[async_trait]
pub trait Task: Send + Sync {
    /// Unique name used as the registry and failure-record key.
    fn name(&self) -> &str;

    async fn run(&self, ctx: &TaskContext) -> anyhow::Result<()>;
}

/// A recurring task paired with its cron expression.
#[derive(Clone)]
pub struct ScheduledTask {
    pub task: Arc<dyn Task>,
    pub cron_expr: String,
}

impl ScheduledTask {
    pub fn new(task: Arc<dyn Task>, cron_expr: impl Into<String>) -> Self {
        Self {
            task,
            cron_expr: cron_expr.into(),
        }
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("task", &self.task.name())
            .field("cron_expr", &self.cron_expr)
            .finish()
    }
}

/// Adapts an async closure into a [`Task`].
///
/// ```ignore
/// let task = FnTask::new("heartbeat", |ctx| async move {
///     tracing::info!(run_id = %ctx.run_id, "tick");
///     Ok(())
/// });
/// ```
pub struct FnTask<F> {
    name: String,
    f: F,
}

impl<F, Fut> FnTask<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    pub fn shared(name: impl Into<String>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &TaskContext) -> anyhow::Result<()> {
        (self.f)(ctx.clone()).await
    }
}
