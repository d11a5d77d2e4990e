use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Logging setup failed: {0}")]
    Logging(String),
}
