use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ::cron::Schedule;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::error::Result;

use super::cron::{normalize_cron, parse_schedule};
use super::{EntryId, Firing, Job, ScheduleEngine};

/// Upper bound on how long the loop sleeps when nothing is scheduled.
const IDLE_WAIT: Duration = Duration::from_secs(60);

struct CronEntry {
    expr: String,
    schedule: Schedule,
    next: Option<DateTime<Utc>>,
    job: Job,
}

struct Shared {
    entries: RwLock<HashMap<EntryId, CronEntry>>,
    next_id: AtomicU64,
    /// Wakes the dispatch loop when the entry set changes.
    wake: Notify,
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// [`ScheduleEngine`] backed by the `cron` crate and one tokio dispatch task.
pub struct CronEngine {
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl CronEngine {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                wake: Notify::new(),
            }),
            running: Mutex::new(None),
        }
    }

    /// Whether the dispatch loop is currently running.
    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Number of registered entries.
    pub async fn len(&self) -> usize {
        self.shared.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.shared.entries.read().await.is_empty()
    }

    /// Normalized expression of an entry.
    pub async fn expression(&self, id: EntryId) -> Option<String> {
        self.shared.entries.read().await.get(&id).map(|e| e.expr.clone())
    }
}

impl Default for CronEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScheduleEngine for CronEngine {
    async fn add_job(&self, expr: &str, job: Job) -> Result<EntryId> {
        let schedule = parse_schedule(expr)?;
        let id = EntryId(self.shared.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let next = schedule.upcoming(Utc).next();

        self.shared.entries.write().await.insert(
            id,
            CronEntry {
                expr: normalize_cron(expr),
                schedule,
                next,
                job,
            },
        );
        self.shared.wake.notify_one();

        debug!(entry = %id, cron = %expr, next = ?next, "cron entry added");
        Ok(id)
    }

    async fn remove(&self, id: EntryId) -> bool {
        let removed = self.shared.entries.write().await.remove(&id).is_some();
        if removed {
            self.shared.wake.notify_one();
            debug!(entry = %id, "cron entry removed");
        }
        removed
    }

    async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return;
        }

        // Entries registered while stopped are due from now, not from when
        // they were added.
        let count = {
            let now = Utc::now();
            let mut entries = self.shared.entries.write().await;
            for entry in entries.values_mut() {
                entry.next = entry.schedule.after(&now).next();
            }
            entries.len()
        };

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(dispatch_loop(Arc::clone(&self.shared), cancel.clone()));
        *running = Some(Running { cancel, handle });

        info!(entries = count, "cron engine started");
    }

    async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        running.cancel.cancel();
        let _ = running.handle.await;
        info!("cron engine stopped");
    }

    async fn invoke_now(&self, id: EntryId) -> bool {
        let job = self.shared.entries.read().await.get(&id).map(|e| Arc::clone(&e.job));
        match job {
            Some(job) => {
                job(Firing::Immediate).await;
                true
            }
            None => false,
        }
    }

    async fn next_run(&self, id: EntryId) -> Option<DateTime<Utc>> {
        self.shared.entries.read().await.get(&id).and_then(|e| e.next)
    }
}

async fn dispatch_loop(shared: Arc<Shared>, cancel: CancellationToken) {
    loop {
        let wait = match fire_due(&shared).await {
            Some(at) => (at - Utc::now()).to_std().unwrap_or(Duration::ZERO),
            None => IDLE_WAIT,
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = shared.wake.notified() => {}
            _ = tokio::time::sleep(wait) => {}
        }
    }
}

/// Spawn every due job and advance its next fire time.
/// Returns the earliest upcoming fire time across all entries.
async fn fire_due(shared: &Shared) -> Option<DateTime<Utc>> {
    let now = Utc::now();
    let mut entries = shared.entries.write().await;

    for (id, entry) in entries.iter_mut() {
        if matches!(entry.next, Some(at) if at <= now) {
            trace!(entry = %id, "cron entry fired");
            // Runs of the same entry may overlap if a body outlasts the interval.
            tokio::spawn((entry.job)(Firing::Tick));
            entry.next = entry.schedule.after(&now).next();
        }
    }

    entries.values().filter_map(|e| e.next).min()
}
