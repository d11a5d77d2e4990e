pub mod config;
pub mod error;
pub mod logging;

pub use config::{Config, LoggingConfig, TaskConfig};
pub use error::*;
