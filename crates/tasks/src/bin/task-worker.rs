//! task-worker — standalone host for the task orchestrator.
//!
//! Registers a heartbeat task on a cron schedule and, optionally, a warm-up
//! task that runs once after a delay. Runs until SIGINT/SIGTERM, then stops
//! the engine and drains outstanding one-time and retry launches.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use ixpay_core::config::{load_dotenv, Config};
use ixpay_core::logging::init_tracing;
use ixpay_tasks::{FnTask, ScheduledTask, TaskContext, TaskOrchestrator};

// ── CLI ─────────────────────────────────────────────────────────────

/// Task worker — runs recurring and one-time background tasks.
#[derive(Parser, Debug)]
#[command(name = "task-worker", version, about)]
struct Cli {
    /// Cron expression for the heartbeat task (5 or 6 fields).
    #[arg(long, env = "TASK_HEARTBEAT_CRON", default_value = "*/30 * * * * *")]
    heartbeat_cron: String,

    /// Delay before the one-time warm-up task runs, in milliseconds. 0 disables it.
    #[arg(long, env = "TASK_WARMUP_DELAY_MS", default_value_t = 0)]
    warmup_delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    let config = Config::from_env();
    init_tracing(&config.logging)?;
    config.log_summary();

    let cli = Cli::parse();

    let orchestrator = TaskOrchestrator::new(config.tasks.clone());
    orchestrator.start().await;

    let heartbeat = FnTask::shared("heartbeat", |ctx: TaskContext| async move {
        info!(run_id = %ctx.run_id, trigger = %ctx.trigger, "heartbeat");
        Ok(())
    });
    orchestrator
        .add_scheduled(ScheduledTask::new(heartbeat, cli.heartbeat_cron.clone()))
        .await
        .with_context(|| format!("registering heartbeat with {:?}", cli.heartbeat_cron))?;

    if cli.warmup_delay_ms > 0 {
        let warmup = FnTask::shared("warmup", |ctx: TaskContext| async move {
            info!(run_id = %ctx.run_id, "warm-up complete");
            Ok(())
        });
        orchestrator.add_one_time(warmup, Duration::from_millis(cli.warmup_delay_ms));
    }

    info!(scheduled = orchestrator.scheduled_tasks().await.len(), "task-worker running");

    shutdown_signal().await?;
    info!("shutdown signal received");

    if !orchestrator.shutdown().await {
        warn!(outstanding = orchestrator.outstanding(), "exiting with launches still pending");
    }

    let failed = orchestrator.failed_tasks().await;
    if !failed.is_empty() {
        warn!(failed = %serde_json::to_string(&failed)?, "unresolved task failures at exit");
    }

    info!("task-worker exited cleanly");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() -> std::io::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            res = ctrl_c => res?,
            _ = sigterm.recv() => {},
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await
    }
}
