//! Failure records and manual-retry admission.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::task::Task;

/// Failure record for one task name.
///
/// `attempts` only grows until the record is removed by a successful retry.
/// `max_attempts` is fixed when the record is created.
#[derive(Clone)]
pub struct TaskInfo {
    pub task: Arc<dyn Task>,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
    pub last_error: String,
    pub attempts: u32,
    pub max_attempts: u32,
}

impl TaskInfo {
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// No further retry will be accepted.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub fn snapshot(&self) -> FailedTask {
        FailedTask {
            name: self.name().to_string(),
            first_failed_at: self.first_failed_at,
            last_failed_at: self.last_failed_at,
            last_error: self.last_error.clone(),
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            exhausted: self.is_exhausted(),
        }
    }
}

impl fmt::Debug for TaskInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskInfo")
            .field("task", &self.name())
            .field("first_failed_at", &self.first_failed_at)
            .field("last_failed_at", &self.last_failed_at)
            .field("last_error", &self.last_error)
            .field("attempts", &self.attempts)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

/// Serializable view of a [`TaskInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTask {
    pub name: String,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
    pub last_error: String,
    pub attempts: u32,
    pub max_attempts: u32,
    pub exhausted: bool,
}

/// Why a retry request was turned down.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryRefusal {
    #[error("no failure record")]
    NotFound,

    #[error("reached maximum retry attempts ({attempts}/{max_attempts})")]
    Exhausted { attempts: u32, max_attempts: u32 },
}

/// Owns the failure records.
#[derive(Default)]
pub struct RetryTracker {
    failed: RwLock<HashMap<String, TaskInfo>>,
}

impl RetryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failed run of `task` and return the attempt count.
    ///
    /// The first failure creates the record with `attempts = 1` and the given
    /// ceiling; later failures only bump `attempts`.
    pub async fn record_failure(&self, task: &Arc<dyn Task>, max_attempts: u32, error: &str) -> u32 {
        let now = Utc::now();
        let mut failed = self.failed.write().await;
        let info = failed
            .entry(task.name().to_string())
            .and_modify(|info| {
                info.attempts = info.attempts.saturating_add(1);
                info.last_failed_at = now;
                info.last_error = error.to_string();
            })
            .or_insert_with(|| TaskInfo {
                task: Arc::clone(task),
                first_failed_at: now,
                last_failed_at: now,
                last_error: error.to_string(),
                attempts: 1,
                max_attempts,
            });
        info.attempts
    }

    /// Check whether `name` may be retried and hand back its record.
    pub async fn admit(&self, name: &str) -> Result<TaskInfo, RetryRefusal> {
        let failed = self.failed.read().await;
        let info = failed.get(name).ok_or(RetryRefusal::NotFound)?;
        if info.is_exhausted() {
            return Err(RetryRefusal::Exhausted {
                attempts: info.attempts,
                max_attempts: info.max_attempts,
            });
        }
        Ok(info.clone())
    }

    /// Drop the record, after a successful retry or when an operator clears it.
    pub async fn resolve(&self, name: &str) -> Option<TaskInfo> {
        self.failed.write().await.remove(name)
    }

    /// Point-in-time copy of every record, sorted by name.
    pub async fn list_failed(&self) -> Vec<TaskInfo> {
        let mut out: Vec<TaskInfo> = self.failed.read().await.values().cloned().collect();
        out.sort_by(|a, b| a.name().cmp(b.name()));
        out
    }

    pub async fn get(&self, name: &str) -> Option<TaskInfo> {
        self.failed.read().await.get(name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.failed.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.failed.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::FnTask;

    fn failing(name: &str) -> Arc<dyn Task> {
        FnTask::shared(name, |_| async { anyhow::bail!("boom") })
    }

    #[tokio::test]
    async fn first_failure_creates_record() {
        let tracker = RetryTracker::new();
        let task = failing("c");

        assert_eq!(tracker.record_failure(&task, 3, "boom").await, 1);

        let info = tracker.get("c").await.unwrap();
        assert_eq!(info.attempts, 1);
        assert_eq!(info.max_attempts, 3);
        assert_eq!(info.first_failed_at, info.last_failed_at);
        assert!(!info.is_exhausted());
    }

    #[tokio::test]
    async fn later_failures_keep_first_ceiling() {
        let tracker = RetryTracker::new();
        let task = failing("c");

        tracker.record_failure(&task, 3, "first").await;
        assert_eq!(tracker.record_failure(&task, 10, "second").await, 2);

        let info = tracker.get("c").await.unwrap();
        assert_eq!(info.max_attempts, 3);
        assert_eq!(info.last_error, "second");
        assert!(info.last_failed_at >= info.first_failed_at);
    }

    #[tokio::test]
    async fn admit_refuses_unknown_and_exhausted() {
        let tracker = RetryTracker::new();
        assert_eq!(tracker.admit("nope").await.unwrap_err(), RetryRefusal::NotFound);

        let task = failing("c");
        tracker.record_failure(&task, 2, "x").await;
        assert!(tracker.admit("c").await.is_ok());

        tracker.record_failure(&task, 2, "x").await;
        assert_eq!(
            tracker.admit("c").await.unwrap_err(),
            RetryRefusal::Exhausted { attempts: 2, max_attempts: 2 }
        );
        // exhausted records stay listed
        assert_eq!(tracker.list_failed().await.len(), 1);
    }

    #[tokio::test]
    async fn resolve_removes_record() {
        let tracker = RetryTracker::new();
        let task = failing("c");
        tracker.record_failure(&task, 3, "x").await;

        assert!(tracker.resolve("c").await.is_some());
        assert!(tracker.is_empty().await);
        assert!(tracker.resolve("c").await.is_none());
    }

    #[tokio::test]
    async fn snapshot_is_sorted_and_serializable() {
        let tracker = RetryTracker::new();
        tracker.record_failure(&failing("b"), 3, "x").await;
        tracker.record_failure(&failing("a"), 3, "y").await;

        let list = tracker.list_failed().await;
        let names: Vec<&str> = list.iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let json = serde_json::to_value(list[0].snapshot()).unwrap();
        assert_eq!(json["name"], "a");
        assert_eq!(json["attempts"], 1);
        assert_eq!(json["max_attempts"], 3);
        assert_eq!(json["exhausted"], false);
    }
}
