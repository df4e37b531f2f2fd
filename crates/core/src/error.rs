use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error("{0}")]
    Other(String),
}
