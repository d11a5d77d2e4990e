//! Name → schedule-engine handle bookkeeping for recurring tasks.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::engine::{EntryId, Job, ScheduleEngine};
use crate::error::{Result, TaskError};

/// Bookkeeping for one registered recurring task.
#[derive(Debug, Clone)]
pub struct LiveEntry {
    pub entry_id: EntryId,
    pub cron_expr: String,
    pub registered_at: DateTime<Utc>,
}

/// Read view of a registered recurring task.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledEntry {
    pub name: String,
    pub cron_expr: String,
    pub registered_at: DateTime<Utc>,
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Authority for "is this task currently scheduled".
///
/// Holds at most one [`LiveEntry`] per task name.
pub struct TaskRegistry {
    engine: Arc<dyn ScheduleEngine>,
    entries: RwLock<HashMap<String, LiveEntry>>,
}

impl TaskRegistry {
    pub fn new(engine: Arc<dyn ScheduleEngine>) -> Self {
        Self {
            engine,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &Arc<dyn ScheduleEngine> {
        &self.engine
    }

    /// Register `job` under `name`.
    ///
    /// The write lock is held across the duplicate check and the engine
    /// registration so two concurrent adds of one name cannot both win.
    pub async fn add_scheduled(&self, name: &str, cron_expr: &str, job: Job) -> Result<EntryId> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(name) {
            return Err(TaskError::AlreadyExists(name.to_string()));
        }

        let entry_id = self.engine.add_job(cron_expr, job).await?;
        entries.insert(
            name.to_string(),
            LiveEntry {
                entry_id,
                cron_expr: cron_expr.to_string(),
                registered_at: Utc::now(),
            },
        );

        debug!(task = %name, entry = %entry_id, "registry entry added");
        Ok(entry_id)
    }

    /// Drop the entry and cancel its engine handle. An in-flight run is not
    /// interrupted.
    pub async fn remove(&self, name: &str) -> Result<LiveEntry> {
        let entry = self
            .entries
            .write()
            .await
            .remove(name)
            .ok_or_else(|| TaskError::NotFound(name.to_string()))?;

        self.engine.remove(entry.entry_id).await;
        debug!(task = %name, entry = %entry.entry_id, "registry entry removed");
        Ok(entry)
    }

    /// Force one inline run through the engine. `false` if `name` is unknown.
    pub async fn run_now(&self, name: &str) -> bool {
        let entry_id = match self.entries.read().await.get(name) {
            Some(entry) => entry.entry_id,
            None => return false,
        };
        self.engine.invoke_now(entry_id).await
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.entries.read().await.contains_key(name)
    }

    pub async fn get(&self, name: &str) -> Option<LiveEntry> {
        self.entries.read().await.get(name).cloned()
    }

    /// Registered task names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of every registered task with its next fire time, sorted by name.
    pub async fn entries(&self) -> Vec<ScheduledEntry> {
        let snapshot: Vec<(String, LiveEntry)> = self
            .entries
            .read()
            .await
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect();

        let mut out = Vec::with_capacity(snapshot.len());
        for (name, entry) in snapshot {
            out.push(ScheduledEntry {
                next_run_at: self.engine.next_run(entry.entry_id).await,
                name,
                cron_expr: entry.cron_expr,
                registered_at: entry.registered_at,
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
