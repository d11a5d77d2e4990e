//! Cron schedule engine.
//!
//! The orchestrator talks to the engine only through [`ScheduleEngine`]:
//! register a job under a cron expression, cancel it, start and stop the
//! dispatch loop, and force one inline run. [`CronEngine`] is the default
//! implementation, a single tokio task that sleeps until the earliest due
//! entry and spawns each due job so a slow body never holds up a tick.

pub(crate) mod cron;
mod dispatch;


use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;

use crate::error::Result;

pub use self::cron::{normalize_cron, parse_schedule};
pub use self::dispatch::CronEngine;

/// Handle for a registered engine entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry-{}", self.0)
    }
}

/// Why the engine is running a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Firing {
    /// The dispatch loop reached a matching time.
    Tick,
    /// [`ScheduleEngine::invoke_now`].
    Immediate,
}

/// Job callback: each call produces one run of the job.
pub type Job = Arc<dyn Fn(Firing) -> BoxFuture<'static, ()> + Send + Sync>;

#[async_trait]
pub trait ScheduleEngine: Send + Sync {
    /// Parse `expr` and register `job` to fire on every match.
    async fn add_job(&self, expr: &str, job: Job) -> Result<EntryId>;

    /// Cancel an entry. Returns `false` if it was not registered.
    async fn remove(&self, id: EntryId) -> bool;

    /// Start the dispatch loop. No-op if already running.
    async fn start(&self);

    /// Stop the dispatch loop. In-flight runs are left alone.
    async fn stop(&self);

    /// Run the entry's job once, inline, without touching its schedule.
    async fn invoke_now(&self, id: EntryId) -> bool;

    /// Next fire time of an entry, if known.
    async fn next_run(&self, id: EntryId) -> Option<DateTime<Utc>>;
}
