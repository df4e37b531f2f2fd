//! Recurring report scheduling and job execution.
//!
//! This crate provides:
//! - A per-job cron schedule table evaluated in local time
//! - A bounded job queue fed by the scheduler loop and the on-demand path
//! - A job runner driving generate → deliver → backfill under one
//!   wall-clock ceiling, with backoff retries for scheduled jobs

pub mod error;
pub mod runner;
pub mod schedule;

pub use error::SchedulerError;
pub use runner::{
    enqueue, job_queue, scheduler_loop, worker_loop, DirectoryRecipients, JobOutcome, JobRequest,
    JobRunner, RetryPolicy,
};
pub use schedule::{JobDefinition, JobSchedule, JobScheduleEntry};
