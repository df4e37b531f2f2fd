//! Report delivery engine.
//!
//! Recipients are processed strictly one at a time — the upstream relay
//! rate-limits bursts, so there is no parallel fan-out. Each recipient gets
//! its own audit row, up to `max_attempts` transport attempts with a fixed
//! wait between failures (no wait after the final attempt), and a short
//! pause before the next recipient. One recipient failing never aborts the
//! rest of the batch; the aggregate result separates full success from
//! partial success.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use cdrstats_core::{DeliveryAudit, DeliveryConfig, DeliveryStatus};

use crate::audit::DeliveryAuditStore;
use crate::traits::{EmailMessage, MailTransport, NotifyError};

/// Retry and pacing knobs for one send batch.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub recipient_delay: Duration,
}

impl DeliveryPolicy {
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            recipient_delay: Duration::from_millis(config.recipient_delay_ms),
        }
    }

    /// Zero-delay policy for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_delay: Duration::ZERO,
            recipient_delay: Duration::ZERO,
        }
    }
}

impl Default for DeliveryPolicy {
    /// 3 attempts, 5 minutes between retries, 2 seconds between recipients.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(300),
            recipient_delay: Duration::from_secs(2),
        }
    }
}

/// Outcome for a single recipient.
#[derive(Debug, Clone)]
pub struct RecipientDeliveryStatus {
    pub recipient: String,
    pub status: DeliveryStatus,
    pub attempt_count: u32,
    pub delivered_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub smtp_code: Option<String>,
    pub can_retry: bool,
}

/// Aggregate outcome of one send batch.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub execution_id: Uuid,
    pub statuses: Vec<RecipientDeliveryStatus>,
    pub successful_deliveries: u32,
    pub failed_deliveries: u32,
    pub duration_ms: i64,
}

impl DeliveryReport {
    /// Every recipient was delivered.
    pub fn is_success(&self) -> bool {
        self.failed_deliveries == 0
    }

    /// Some recipients were delivered, some were not.
    pub fn is_partial_success(&self) -> bool {
        self.successful_deliveries > 0 && self.failed_deliveries > 0
    }

    pub fn total_recipients(&self) -> u32 {
        self.statuses.len() as u32
    }
}

/// The content sent to every recipient of one batch.
#[derive(Debug, Clone)]
pub struct ReportEmail {
    pub subject: String,
    pub html_body: String,
    pub attachment_path: Option<String>,
}

pub struct DeliveryEngine {
    transport: Arc<dyn MailTransport>,
    audits: Arc<dyn DeliveryAuditStore>,
    policy: DeliveryPolicy,
}

impl DeliveryEngine {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        audits: Arc<dyn DeliveryAuditStore>,
        policy: DeliveryPolicy,
    ) -> Self {
        Self {
            transport,
            audits,
            policy,
        }
    }

    /// Send one rendered report to every recipient, sequentially.
    pub async fn send_report(
        &self,
        execution_id: Uuid,
        email: &ReportEmail,
        recipients: &[String],
    ) -> DeliveryReport {
        let started = Instant::now();
        let mut statuses = Vec::with_capacity(recipients.len());
        let mut successful = 0;
        let mut failed = 0;

        if recipients.is_empty() {
            warn!(execution_id = %execution_id, "no recipients for report delivery");
        } else {
            info!(
                execution_id = %execution_id,
                recipients = recipients.len(),
                subject = %email.subject,
                "starting report delivery"
            );
        }

        for (position, recipient) in recipients.iter().enumerate() {
            let status = self
                .send_to_recipient(execution_id, email, recipient)
                .await;

            if status.status == DeliveryStatus::Sent {
                successful += 1;
            } else {
                failed += 1;
            }
            statuses.push(status);

            // Pace recipients; no pause after the last one.
            if position + 1 < recipients.len() {
                tokio::time::sleep(self.policy.recipient_delay).await;
            }
        }

        let duration_ms = started.elapsed().as_millis() as i64;
        info!(
            execution_id = %execution_id,
            successful,
            failed,
            duration_ms,
            "report delivery finished"
        );

        DeliveryReport {
            execution_id,
            statuses,
            successful_deliveries: successful,
            failed_deliveries: failed,
            duration_ms,
        }
    }

    /// Deliver to one recipient with bounded retries, mutating one audit
    /// row across attempts.
    async fn send_to_recipient(
        &self,
        execution_id: Uuid,
        email: &ReportEmail,
        recipient: &str,
    ) -> RecipientDeliveryStatus {
        let now = Utc::now();
        let mut audit = DeliveryAudit::pending(execution_id, recipient, now);
        audit.subject = Some(email.subject.clone());
        if let Some(path) = &email.attachment_path {
            audit.attachment_name = std::path::Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string());
            audit.attachment_size_bytes = tokio::fs::metadata(path)
                .await
                .ok()
                .map(|m| m.len() as i64);
        }
        if let Err(err) = self.audits.create(audit.clone()).await {
            warn!(recipient, error = %err, "failed to persist delivery audit row");
        }

        let mut status = RecipientDeliveryStatus {
            recipient: recipient.to_string(),
            status: DeliveryStatus::Pending,
            attempt_count: 0,
            delivered_at: None,
            error_message: None,
            smtp_code: None,
            can_retry: true,
        };

        let message = EmailMessage {
            to: vec![recipient.to_string()],
            subject: email.subject.clone(),
            html_body: email.html_body.clone(),
            attachment_paths: email.attachment_path.iter().cloned().collect(),
        };

        for attempt in 1..=self.policy.max_attempts {
            let attempt_at = Utc::now();
            audit.attempt_count = attempt;
            audit.last_attempt_at = Some(attempt_at);
            if attempt == 1 {
                audit.first_attempt_at = Some(attempt_at);
            }
            status.attempt_count = attempt;

            match self.transport.send(&message).await {
                Ok(()) => {
                    let delivered_at = Utc::now();
                    audit.status = DeliveryStatus::Sent;
                    audit.delivered_at = Some(delivered_at);
                    audit.updated_at = delivered_at;
                    if let Err(err) = self.audits.update(audit.clone()).await {
                        warn!(recipient, error = %err, "failed to update delivery audit row");
                    }

                    status.status = DeliveryStatus::Sent;
                    status.delivered_at = Some(delivered_at);
                    debug!(recipient, attempt, "email delivered");
                    return status;
                }
                Err(err) => {
                    warn!(
                        recipient,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %err,
                        "email delivery attempt failed"
                    );
                    status.error_message = Some(err.to_string());
                    status.smtp_code = err.smtp_code().map(str::to_string);
                    audit.error_message = Some(err.to_string());
                    audit.smtp_code = status.smtp_code.clone();

                    // Wait before retrying; nothing to wait for after the
                    // last attempt.
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                }
            }
        }

        audit.status = DeliveryStatus::Failed;
        audit.can_retry = false;
        audit.updated_at = Utc::now();
        if let Err(err) = self.audits.update(audit).await {
            warn!(recipient, error = %err, "failed to update delivery audit row");
        }

        status.status = DeliveryStatus::Failed;
        status.can_retry = false;
        error!(
            recipient,
            attempts = self.policy.max_attempts,
            "email delivery exhausted all attempts"
        );
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryDeliveryAuditStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transport that fails a configurable number of times per recipient
    /// before succeeding, or always when `fail_for` matches.
    struct FlakyTransport {
        failures_before_success: usize,
        attempts: AtomicUsize,
        always_fail_recipient: Option<String>,
    }

    impl FlakyTransport {
        fn failing(n: usize) -> Self {
            Self {
                failures_before_success: n,
                attempts: AtomicUsize::new(0),
                always_fail_recipient: None,
            }
        }
    }

    #[async_trait::async_trait]
    impl MailTransport for FlakyTransport {
        async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
            if let Some(bad) = &self.always_fail_recipient {
                if message.to.contains(bad) {
                    return Err(NotifyError::Smtp {
                        message: "mailbox unavailable".to_string(),
                        code: Some("550".to_string()),
                    });
                }
                return Ok(());
            }
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures_before_success {
                Err(NotifyError::smtp("connection reset"))
            } else {
                Ok(())
            }
        }
    }

    fn email() -> ReportEmail {
        ReportEmail {
            subject: "[Call Center] Daily Call Report".to_string(),
            html_body: "<p>report</p>".to_string(),
            attachment_path: None,
        }
    }

    #[tokio::test]
    async fn fails_twice_then_succeeds_in_three_attempts() {
        let transport = Arc::new(FlakyTransport::failing(2));
        let audits = Arc::new(MemoryDeliveryAuditStore::new());
        let engine = DeliveryEngine::new(transport.clone(), audits.clone(), DeliveryPolicy::immediate(3));
        let execution_id = Uuid::new_v4();

        let report = engine
            .send_report(execution_id, &email(), &["ops@example.com".to_string()])
            .await;

        assert!(report.is_success());
        assert!(!report.is_partial_success());
        let status = &report.statuses[0];
        assert_eq!(status.status, DeliveryStatus::Sent);
        assert_eq!(status.attempt_count, 3);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);

        let audit = &audits.by_execution(execution_id).await.unwrap()[0];
        assert_eq!(audit.status, DeliveryStatus::Sent);
        assert_eq!(audit.attempt_count, 3);
        let first = audit.first_attempt_at.unwrap();
        let last = audit.last_attempt_at.unwrap();
        let delivered = audit.delivered_at.unwrap();
        assert!(first <= last && last <= delivered);
    }

    #[tokio::test]
    async fn exhausted_attempts_mark_failed_without_retry() {
        let transport = Arc::new(FlakyTransport::failing(99));
        let audits = Arc::new(MemoryDeliveryAuditStore::new());
        let engine = DeliveryEngine::new(transport.clone(), audits.clone(), DeliveryPolicy::immediate(3));
        let execution_id = Uuid::new_v4();

        let report = engine
            .send_report(execution_id, &email(), &["ops@example.com".to_string()])
            .await;

        assert!(!report.is_success());
        assert_eq!(report.failed_deliveries, 1);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);

        let status = &report.statuses[0];
        assert_eq!(status.status, DeliveryStatus::Failed);
        assert!(!status.can_retry);
        assert!(status.error_message.as_deref().unwrap().contains("connection reset"));

        let audit = &audits.by_execution(execution_id).await.unwrap()[0];
        assert_eq!(audit.status, DeliveryStatus::Failed);
        assert!(!audit.can_retry);
    }

    #[tokio::test]
    async fn one_bad_recipient_does_not_block_the_rest() {
        let transport = Arc::new(FlakyTransport {
            failures_before_success: 0,
            attempts: AtomicUsize::new(0),
            always_fail_recipient: Some("bad@example.com".to_string()),
        });
        let audits = Arc::new(MemoryDeliveryAuditStore::new());
        let engine = DeliveryEngine::new(transport, audits.clone(), DeliveryPolicy::immediate(3));
        let execution_id = Uuid::new_v4();

        let recipients = vec![
            "bad@example.com".to_string(),
            "good@example.com".to_string(),
        ];
        let report = engine.send_report(execution_id, &email(), &recipients).await;

        assert!(report.is_partial_success());
        assert_eq!(report.successful_deliveries, 1);
        assert_eq!(report.failed_deliveries, 1);
        assert_eq!(report.total_recipients(), 2);

        let failed = report
            .statuses
            .iter()
            .find(|s| s.recipient == "bad@example.com")
            .unwrap();
        assert_eq!(failed.smtp_code.as_deref(), Some("550"));

        let good = report
            .statuses
            .iter()
            .find(|s| s.recipient == "good@example.com")
            .unwrap();
        assert_eq!(good.status, DeliveryStatus::Sent);
        assert_eq!(good.attempt_count, 1);
    }

    #[tokio::test]
    async fn empty_recipient_list_yields_empty_success() {
        let transport = Arc::new(FlakyTransport::failing(0));
        let audits = Arc::new(MemoryDeliveryAuditStore::new());
        let engine = DeliveryEngine::new(transport, audits, DeliveryPolicy::immediate(3));

        let report = engine.send_report(Uuid::new_v4(), &email(), &[]).await;
        assert!(report.is_success());
        assert!(!report.is_partial_success());
        assert_eq!(report.total_recipients(), 0);
    }

    #[tokio::test]
    async fn audit_rows_created_per_recipient_per_batch() {
        let transport = Arc::new(FlakyTransport::failing(0));
        let audits = Arc::new(MemoryDeliveryAuditStore::new());
        let engine = DeliveryEngine::new(transport, audits.clone(), DeliveryPolicy::immediate(3));
        let execution_id = Uuid::new_v4();

        let recipients = vec!["a@example.com".to_string(), "b@example.com".to_string()];
        engine.send_report(execution_id, &email(), &recipients).await;
        // A resend creates fresh rows instead of reviving old ones.
        engine.send_report(execution_id, &email(), &recipients).await;

        let rows = audits.by_execution(execution_id).await.unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|a| a.status == DeliveryStatus::Sent));
        assert!(rows.iter().all(|a| a.subject.is_some()));
    }
}
