use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    /// Bad input — rejected before any execution is created, never retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Something broke while computing or building the report.
    #[error("Report generation failed: {0}")]
    Generation(String),

    /// The generate+deliver sequence exceeded its wall-clock ceiling.
    #[error("Report generation timed out after {minutes} minutes")]
    Timeout { minutes: u64 },

    /// The execution state machine rejected a transition.
    #[error("Illegal execution transition: {0}")]
    IllegalTransition(String),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(uuid::Uuid),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<cdrstats_core::CoreError> for ReportError {
    fn from(err: cdrstats_core::CoreError) -> Self {
        match err {
            cdrstats_core::CoreError::InvalidPeriod(msg) => ReportError::Validation(msg),
            other => ReportError::Generation(other.to_string()),
        }
    }
}
