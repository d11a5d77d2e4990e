//! Public face of the task subsystem.
//!
//! [`TaskOrchestrator`] composes the schedule engine, the registry, the
//! delayed launcher and the retry tracker. Construct one at process start
//! and share it by reference (or `Arc`) with every caller.
//!
//! Per task the lifecycle is:
//!
//! ```text
//! Idle ─add─▶ Scheduled ─tick/run_now─▶ Running ─ok─▶ Scheduled (recurring) / Done (one-time)
//!                                          │
//!                                          └─err─▶ Failed(1) ─retry─▶ Running ─ok─▶ Recovered
//!                                                     ▲                   │
//!                                                     └──────err──────────┘  (attempts + 1)
//!                                          Failed(max) = Exhausted: listed, retry refused
//! ```
//!
//! Split into focused submodules:
//! - `core`: struct, constructors, and the public operations
//! - `execution`: the single run path shared by ticks, one-time runs and retries
//! - `status`: derived per-task state

mod core;
mod execution;
mod status;

pub use self::core::TaskOrchestrator;
pub use self::status::{FailureState, TaskStatus};
