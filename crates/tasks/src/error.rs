/// Errors surfaced by the task orchestrator.
///
/// Registration problems are returned synchronously. `Execution` is only
/// built for logs and reports; a failing task body never reaches the caller
/// that registered it.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task {0} already exists")]
    AlreadyExists(String),

    #[error("task {0} not found")]
    NotFound(String),

    #[error("invalid cron expression {expr:?}: {source}")]
    InvalidSchedule {
        expr: String,
        #[source]
        source: cron::error::Error,
    },

    #[error("task {task} failed: {message}")]
    Execution { task: String, message: String },
}

impl TaskError {
    pub fn execution(task: &str, err: &anyhow::Error) -> Self {
        Self::Execution {
            task: task.to_string(),
            message: format!("{:#}", err),
        }
    }
}

pub type Result<T, E = TaskError> = std::result::Result<T, E>;
