use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Job queue is full")]
    QueueFull,

    #[error("Job queue is closed")]
    QueueClosed,

    #[error(transparent)]
    Report(#[from] cdrstats_report::ReportError),
}
