//! In-process task orchestration: recurring cron tasks, delayed one-shot
//! tasks, and bounded manual retry of failures.

pub mod engine;
pub mod error;
pub mod launcher;
pub mod metrics;
pub mod orchestrator;
pub mod registry;
pub mod retry;
pub mod task;

pub use engine::{CronEngine, EntryId, Firing, Job, ScheduleEngine};
pub use error::{Result, TaskError};
pub use metrics::{TaskMetrics, TaskStats};
pub use orchestrator::{FailureState, TaskOrchestrator, TaskStatus};
pub use registry::ScheduledEntry;
pub use retry::{FailedTask, RetryRefusal, TaskInfo};
pub use task::{FnTask, ScheduledTask, Task, TaskContext, Trigger};
