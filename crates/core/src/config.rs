use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub logging: LoggingConfig,
    pub tasks: TaskConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `IXPAY_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("IXPAY_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            logging: LoggingConfig::from_env_profiled(p),
            tasks: TaskConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  logging:  level={}, format={}", self.logging.level, self.logging.format);
        tracing::info!(
            "  tasks:    max_attempts={}, drain_timeout={}s, metrics_capacity={}",
            self.tasks.max_attempts,
            self.tasks.drain_timeout.as_secs(),
            self.tasks.metrics_capacity
        );
    }

    /// Config view for status endpoints.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "logging": { "level": self.logging.level, "format": self.logging.format },
            "tasks": {
                "max_attempts": self.tasks.max_attempts,
                "drain_timeout_secs": self.tasks.drain_timeout.as_secs(),
                "metrics_capacity": self.tasks.metrics_capacity,
            },
        })
    }
}

// ── Logging ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// `json` or `compact`.
    pub format: String,
}

impl LoggingConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            level: profiled_env_or(p, "LOG_LEVEL", "info"),
            format: profiled_env_or(p, "LOG_FORMAT", "compact").to_lowercase(),
        }
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

// ── Tasks ─────────────────────────────────────────────────────

/// Default ceiling for failure records on both the cron and delayed paths.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Task names kept in the per-name metrics table.
pub const DEFAULT_METRICS_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Attempt ceiling applied to every new failure record.
    pub max_attempts: u32,
    /// How long `shutdown()` waits for outstanding one-time and retry runs.
    pub drain_timeout: Duration,
    /// Most recently run task names that keep per-name metrics.
    pub metrics_capacity: usize,
}

impl TaskConfig {
    fn from_env_profiled(p: &str) -> Self {
        let max_attempts = match profiled_env_u32(p, "TASK_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS) {
            0 => DEFAULT_MAX_ATTEMPTS,
            n => n,
        };
        Self {
            max_attempts,
            drain_timeout: Duration::from_secs(profiled_env_u64(p, "TASK_DRAIN_TIMEOUT_SECS", 10)),
            metrics_capacity: profiled_env_usize(p, "TASK_METRICS_CAPACITY", DEFAULT_METRICS_CAPACITY),
        }
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            drain_timeout: Duration::from_secs(10),
            metrics_capacity: DEFAULT_METRICS_CAPACITY,
        }
    }
}
