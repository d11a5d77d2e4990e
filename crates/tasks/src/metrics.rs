use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::Serialize;

use crate::task::Trigger;

/// Counters for one task name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskStats {
    /// Finished runs (success or failure).
    pub runs: u64,
    pub failures: u64,
    /// Runs started by a manual retry.
    pub retries: u64,
    pub avg_duration: Duration,
    pub last_run: Option<DateTime<Utc>>,
}

impl TaskStats {
    fn record(&mut self, trigger: Trigger, duration: Duration, ok: bool) {
        self.runs += 1;
        if !ok {
            self.failures += 1;
        }
        if trigger == Trigger::Retry {
            self.retries += 1;
        }
        self.last_run = Some(Utc::now());

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        self.avg_duration = if self.runs == 1 {
            duration
        } else {
            let prev_nanos = self.avg_duration.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / self.runs as f64;
            Duration::from_nanos(avg_nanos as u64)
        };
    }
}

/// Point-in-time copy of the execution counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskMetrics {
    /// Finished runs across every task, including names no longer tracked.
    pub total_runs: u64,
    pub total_failures: u64,
    /// Per-name counters for the most recently run task names.
    pub tasks: HashMap<String, TaskStats>,
    /// Task names dropped from `tasks` to stay within capacity.
    pub evicted: u64,
}

impl TaskMetrics {
    pub fn runs_of(&self, task_name: &str) -> u64 {
        self.tasks.get(task_name).map_or(0, |s| s.runs)
    }

    pub fn failures_of(&self, task_name: &str) -> u64 {
        self.tasks.get(task_name).map_or(0, |s| s.failures)
    }

    pub fn retries_of(&self, task_name: &str) -> u64 {
        self.tasks.get(task_name).map_or(0, |s| s.retries)
    }
}

/// Live counters behind [`TaskMetrics`].
///
/// Per-name stats sit in an LRU so that one-time tasks named per request
/// (one name per payment, say) cannot grow the table without bound.
pub struct MetricsRecorder {
    tasks: LruCache<String, TaskStats>,
    total_runs: u64,
    total_failures: u64,
    evicted: u64,
}

impl MetricsRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            tasks: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            total_runs: 0,
            total_failures: 0,
            evicted: 0,
        }
    }

    /// Record one finished run.
    pub fn record_run(&mut self, task_name: &str, trigger: Trigger, duration: Duration, ok: bool) {
        self.total_runs += 1;
        if !ok {
            self.total_failures += 1;
        }

        if let Some(stats) = self.tasks.get_mut(task_name) {
            stats.record(trigger, duration, ok);
            return;
        }
        let mut stats = TaskStats::default();
        stats.record(trigger, duration, ok);
        if self.tasks.push(task_name.to_string(), stats).is_some() {
            self.evicted += 1;
        }
    }

    pub fn tracked(&self) -> usize {
        self.tasks.len()
    }

    pub fn snapshot(&self) -> TaskMetrics {
        TaskMetrics {
            total_runs: self.total_runs,
            total_failures: self.total_failures,
            tasks: self
                .tasks
                .iter()
                .map(|(name, stats)| (name.clone(), stats.clone()))
                .collect(),
            evicted: self.evicted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_single_run() {
        let mut m = MetricsRecorder::new(8);
        m.record_run("t", Trigger::Scheduled, Duration::from_millis(100), true);

        let snap = m.snapshot();
        assert_eq!(snap.runs_of("t"), 1);
        assert_eq!(snap.failures_of("t"), 0);
        assert!(snap.tasks["t"].last_run.is_some());
        assert_eq!(snap.tasks["t"].avg_duration, Duration::from_millis(100));
    }

    #[test]
    fn failures_and_retries_are_counted() {
        let mut m = MetricsRecorder::new(8);
        m.record_run("t", Trigger::OneTime, Duration::from_millis(10), false);
        m.record_run("t", Trigger::Retry, Duration::from_millis(10), false);
        m.record_run("t", Trigger::Retry, Duration::from_millis(10), true);

        let snap = m.snapshot();
        assert_eq!(snap.runs_of("t"), 3);
        assert_eq!(snap.failures_of("t"), 2);
        assert_eq!(snap.retries_of("t"), 2);
        assert_eq!(snap.total_failures, 2);
    }

    #[test]
    fn average_duration_is_rolling() {
        let mut m = MetricsRecorder::new(8);
        m.record_run("t", Trigger::Manual, Duration::from_millis(100), true);
        m.record_run("t", Trigger::Manual, Duration::from_millis(200), true);

        let avg = m.snapshot().tasks["t"].avg_duration.as_millis();
        assert!((140..=160).contains(&avg), "expected ~150ms, got {}ms", avg);
    }

    #[test]
    fn per_name_table_is_bounded() {
        let mut m = MetricsRecorder::new(4);
        for i in 0..100 {
            m.record_run(&format!("payment-timeout-{i}"), Trigger::OneTime, Duration::ZERO, true);
        }

        let snap = m.snapshot();
        assert_eq!(m.tracked(), 4);
        assert_eq!(snap.tasks.len(), 4);
        assert_eq!(snap.total_runs, 100);
        assert_eq!(snap.evicted, 96);
        assert!(snap.tasks.contains_key("payment-timeout-99"));
        assert!(!snap.tasks.contains_key("payment-timeout-0"));
    }

    #[test]
    fn recently_run_names_survive_eviction() {
        let mut m = MetricsRecorder::new(2);
        m.record_run("heartbeat", Trigger::Scheduled, Duration::ZERO, true);
        m.record_run("a", Trigger::OneTime, Duration::ZERO, true);
        m.record_run("heartbeat", Trigger::Scheduled, Duration::ZERO, true);
        m.record_run("b", Trigger::OneTime, Duration::ZERO, true);

        let snap = m.snapshot();
        assert_eq!(snap.runs_of("heartbeat"), 2);
        assert_eq!(snap.runs_of("a"), 0);
        assert_eq!(snap.runs_of("b"), 1);
    }

    #[test]
    fn zero_capacity_still_tracks_one_name() {
        let mut m = MetricsRecorder::new(0);
        m.record_run("t", Trigger::Manual, Duration::ZERO, true);
        assert_eq!(m.tracked(), 1);
    }
}
