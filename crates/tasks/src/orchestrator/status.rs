use serde::Serialize;

use crate::registry::LiveEntry;
use crate::retry::TaskInfo;

/// Failure side of a task's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FailureState {
    /// No failure record.
    Healthy,
    /// Failed, still retryable.
    Failed { attempts: u32, max_attempts: u32 },
    /// Failed and at the attempt ceiling; retries are refused.
    Exhausted { attempts: u32, max_attempts: u32 },
}

impl FailureState {
    fn from_record(info: Option<&TaskInfo>) -> Self {
        match info {
            None => Self::Healthy,
            Some(info) if info.is_exhausted() => Self::Exhausted {
                attempts: info.attempts,
                max_attempts: info.max_attempts,
            },
            Some(info) => Self::Failed {
                attempts: info.attempts,
                max_attempts: info.max_attempts,
            },
        }
    }
}

/// Combined view of one task name across the registry and the failure map.
///
/// The two maps are read one after the other, not atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStatus {
    pub name: String,
    /// Cron expression if the task is currently scheduled.
    pub cron_expr: Option<String>,
    pub failure: FailureState,
}

impl TaskStatus {
    pub(crate) fn new(name: &str, live: Option<LiveEntry>, failure: Option<TaskInfo>) -> Self {
        Self {
            name: name.to_string(),
            cron_expr: live.map(|entry| entry.cron_expr),
            failure: FailureState::from_record(failure.as_ref()),
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.cron_expr.is_some()
    }

    /// Neither scheduled nor carrying a failure record.
    pub fn is_idle(&self) -> bool {
        !self.is_scheduled() && self.failure == FailureState::Healthy
    }
}
