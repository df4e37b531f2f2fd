//! Execution-log and delivery-audit records.
//!
//! A [`ReportExecution`] tracks one run of the generate-and-deliver
//! pipeline through a small state machine:
//!
//! ```text
//! Pending → Running → { Completed, Failed }
//! ```
//!
//! Terminal states accept no further transitions. Delivery statistics may
//! still be backfilled onto a terminal row — a resend reuses the original
//! execution id without re-running the state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which report variant an execution produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportKind {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportKind::Daily => write!(f, "Daily"),
            ReportKind::Weekly => write!(f, "Weekly"),
            ReportKind::Monthly => write!(f, "Monthly"),
            ReportKind::Custom => write!(f, "Custom"),
        }
    }
}

/// How an execution was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerType {
    Scheduled,
    OnDemand,
    ManualRerun,
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerType::Scheduled => write!(f, "Scheduled"),
            TriggerType::OnDemand => write!(f, "OnDemand"),
            TriggerType::ManualRerun => write!(f, "ManualRerun"),
        }
    }
}

/// Execution state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        matches!(
            (self, next),
            (ExecutionStatus::Pending, ExecutionStatus::Running)
                | (ExecutionStatus::Running, ExecutionStatus::Completed)
                | (ExecutionStatus::Running, ExecutionStatus::Failed)
        )
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "Pending"),
            ExecutionStatus::Running => write!(f, "Running"),
            ExecutionStatus::Completed => write!(f, "Completed"),
            ExecutionStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Why a failed execution failed. Timeouts are kept distinct so a slow run
/// is distinguishable from a broken one in the history view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Generation,
    Timeout,
}

/// One run of the generate-and-deliver pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportExecution {
    pub id: Uuid,
    pub report_kind: ReportKind,
    pub trigger: TriggerType,
    /// Reporting period, UTC, end exclusive.
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub status: ExecutionStatus,
    pub failure: Option<FailureKind>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub generation_ms: Option<i64>,
    pub delivery_ms: Option<i64>,
    pub records_processed: Option<i64>,
    pub recipients_count: Option<i64>,
    pub successful_deliveries: Option<i64>,
    pub failed_deliveries: Option<i64>,
    pub file_name: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReportExecution {
    /// A fresh Pending execution for the given period.
    pub fn new(
        report_kind: ReportKind,
        trigger: TriggerType,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            report_kind,
            trigger,
            period_start,
            period_end,
            status: ExecutionStatus::Pending,
            failure: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            generation_ms: None,
            delivery_ms: None,
            records_processed: None,
            recipients_count: None,
            successful_deliveries: None,
            failed_deliveries: None,
            file_name: None,
            file_size_bytes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per-recipient delivery state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "Pending"),
            DeliveryStatus::Sent => write!(f, "Sent"),
            DeliveryStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Audit row for one recipient in one send batch. Mutated in place across
/// retry attempts; a later resend of the same execution creates new rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAudit {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub recipient: String,
    pub status: DeliveryStatus,
    pub attempt_count: u32,
    pub first_attempt_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub smtp_code: Option<String>,
    pub subject: Option<String>,
    pub attachment_name: Option<String>,
    pub attachment_size_bytes: Option<i64>,
    /// False once retry attempts are exhausted.
    pub can_retry: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryAudit {
    pub fn pending(execution_id: Uuid, recipient: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            execution_id,
            recipient: recipient.to_string(),
            status: DeliveryStatus::Pending,
            attempt_count: 0,
            first_attempt_at: None,
            last_attempt_at: None,
            delivered_at: None,
            error_message: None,
            smtp_code: None,
            subject: None,
            attachment_name: None,
            attachment_size_bytes: None,
            can_retry: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per-agent break rollup shown in reports. Derived at report time, never
/// persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorBreakSummary {
    pub operator_name: String,
    pub phone_number: String,
    pub break_count: usize,
    pub total_duration_minutes: f64,
    pub breaks: Vec<BreakDetail>,
}

/// One break row inside an [`OperatorBreakSummary`], with local times for
/// display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakDetail {
    pub start_local: DateTime<chrono::FixedOffset>,
    pub end_local: Option<DateTime<chrono::FixedOffset>>,
    pub duration_minutes: f64,
    pub reason: Option<String>,
}
