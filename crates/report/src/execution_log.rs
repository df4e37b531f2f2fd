//! Persisted execution log for report runs.
//!
//! The log is the audit and de-duplication boundary for the whole
//! pipeline: the scheduler may deliver a job more than once, but every run
//! is visible here with its full state history. Transitions are validated
//! against the state machine in `cdrstats_core::execution`; terminal rows
//! only ever change through delivery-stat backfill.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use cdrstats_core::{ExecutionStatus, FailureKind, ReportExecution};

use crate::error::ReportError;

/// Delivery counters backfilled onto an execution after a send batch.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryStats {
    pub recipients_count: i64,
    pub successful_deliveries: i64,
    pub failed_deliveries: i64,
    pub delivery_ms: i64,
}

/// Completion payload recorded when a run finishes successfully.
#[derive(Debug, Clone)]
pub struct CompletionStats {
    pub generation_ms: i64,
    pub records_processed: i64,
    pub file_name: String,
    pub file_size_bytes: i64,
}

#[async_trait]
pub trait ExecutionLogStore: Send + Sync {
    /// Persist a new Pending execution.
    async fn create(&self, execution: ReportExecution) -> Result<(), ReportError>;

    /// Pending → Running, stamping `started_at`.
    async fn mark_running(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), ReportError>;

    /// Running → Completed with generation results.
    async fn complete(
        &self,
        id: Uuid,
        stats: CompletionStats,
        now: DateTime<Utc>,
    ) -> Result<(), ReportError>;

    /// Running → Failed with a failure kind and message.
    async fn fail(
        &self,
        id: Uuid,
        kind: FailureKind,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ReportError>;

    /// Backfill delivery counters. Allowed on terminal rows; the status is
    /// left untouched so a resend never re-runs the state machine.
    async fn backfill_delivery(
        &self,
        id: Uuid,
        stats: DeliveryStats,
        now: DateTime<Utc>,
    ) -> Result<(), ReportError>;

    async fn get(&self, id: Uuid) -> Result<Option<ReportExecution>, ReportError>;

    /// Most recent executions, newest first.
    async fn recent(&self, count: usize) -> Result<Vec<ReportExecution>, ReportError>;
}

/// RwLock-backed execution log used by tests and the demo wiring.
#[derive(Default)]
pub struct MemoryExecutionLog {
    executions: RwLock<HashMap<Uuid, ReportExecution>>,
}

impl MemoryExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    async fn transition(
        &self,
        id: Uuid,
        next: ExecutionStatus,
        apply: impl FnOnce(&mut ReportExecution),
    ) -> Result<(), ReportError> {
        let mut executions = self.executions.write().await;
        let execution = executions
            .get_mut(&id)
            .ok_or(ReportError::ExecutionNotFound(id))?;

        if !execution.status.can_transition_to(next) {
            return Err(ReportError::IllegalTransition(format!(
                "{} → {} for execution {}",
                execution.status, next, id
            )));
        }

        execution.status = next;
        apply(execution);
        Ok(())
    }
}

#[async_trait]
impl ExecutionLogStore for MemoryExecutionLog {
    async fn create(&self, execution: ReportExecution) -> Result<(), ReportError> {
        let mut executions = self.executions.write().await;
        if executions.contains_key(&execution.id) {
            return Err(ReportError::Store(format!(
                "execution {} already exists",
                execution.id
            )));
        }
        executions.insert(execution.id, execution);
        Ok(())
    }

    async fn mark_running(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), ReportError> {
        self.transition(id, ExecutionStatus::Running, |e| {
            e.started_at = Some(now);
            e.updated_at = now;
        })
        .await
    }

    async fn complete(
        &self,
        id: Uuid,
        stats: CompletionStats,
        now: DateTime<Utc>,
    ) -> Result<(), ReportError> {
        self.transition(id, ExecutionStatus::Completed, |e| {
            e.completed_at = Some(now);
            e.generation_ms = Some(stats.generation_ms);
            e.records_processed = Some(stats.records_processed);
            e.file_name = Some(stats.file_name);
            e.file_size_bytes = Some(stats.file_size_bytes);
            e.updated_at = now;
        })
        .await
    }

    async fn fail(
        &self,
        id: Uuid,
        kind: FailureKind,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ReportError> {
        let message = message.to_string();
        self.transition(id, ExecutionStatus::Failed, |e| {
            e.completed_at = Some(now);
            e.failure = Some(kind);
            e.error_message = Some(message);
            e.updated_at = now;
        })
        .await
    }

    async fn backfill_delivery(
        &self,
        id: Uuid,
        stats: DeliveryStats,
        now: DateTime<Utc>,
    ) -> Result<(), ReportError> {
        let mut executions = self.executions.write().await;
        let execution = executions
            .get_mut(&id)
            .ok_or(ReportError::ExecutionNotFound(id))?;
        execution.recipients_count = Some(stats.recipients_count);
        execution.successful_deliveries = Some(stats.successful_deliveries);
        execution.failed_deliveries = Some(stats.failed_deliveries);
        execution.delivery_ms = Some(stats.delivery_ms);
        execution.updated_at = now;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ReportExecution>, ReportError> {
        Ok(self.executions.read().await.get(&id).cloned())
    }

    async fn recent(&self, count: usize) -> Result<Vec<ReportExecution>, ReportError> {
        let mut executions: Vec<ReportExecution> =
            self.executions.read().await.values().cloned().collect();
        executions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        executions.truncate(count);
        Ok(executions)
    }
}
