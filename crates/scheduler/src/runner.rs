//! Job queue and worker driving the generate-and-deliver pipeline.
//!
//! A single scheduler loop ticks over the cron table and feeds due jobs
//! into a bounded queue; the on-demand enqueue path shares the same queue.
//! Worker tasks consume requests and drive one execution each: generate,
//! deliver, backfill delivery stats. The whole sequence runs under one
//! wall-clock ceiling; the ceiling firing marks the execution failed with
//! a timeout so it is distinguishable from a broken run. Scheduled jobs
//! retry with increasing backoff; on-demand jobs surface their error to
//! the caller directly.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{error, info, warn};
use uuid::Uuid;

use cdrstats_analytics::ReportPeriod;
use cdrstats_core::{ReportKind, ReportingConfig, TriggerType};
use cdrstats_notify::{
    email_subject, format_file_size, format_minutes, is_valid_email, render_report_email,
    resolve_recipients, DeliveryEngine, DeliveryReport, EmailBreakRow, EmailMetrics, NotifyError,
    RecipientSource, ReportEmail, ReportEmailContext,
};
use cdrstats_report::{
    DeliveryStats, DirectoryStore, ExecutionLogStore, ReportError, ReportOrchestrator,
    ReportOutcome,
};

use crate::error::SchedulerError;

// ── Job requests ────────────────────────────────────────────────────

/// One unit of work for the worker pool.
#[derive(Debug, Clone)]
pub enum JobRequest {
    /// Generate a report and optionally email it.
    Generate {
        kind: ReportKind,
        trigger: TriggerType,
        /// Explicit local date bounds for custom reports.
        custom_range: Option<(NaiveDate, NaiveDate)>,
        /// Overrides the role-derived recipient list when present.
        recipients: Option<Vec<String>>,
        send_email: bool,
    },
    /// Regenerate an existing report and send it to the given recipients,
    /// backfilling delivery stats onto the original execution.
    Resend {
        execution_id: Uuid,
        recipients: Vec<String>,
    },
}

/// Result of one processed job.
#[derive(Debug)]
pub struct JobOutcome {
    pub execution_id: Uuid,
    pub delivery: Option<DeliveryReport>,
}

/// Backoff delays applied between scheduled-job retries. A job runs once
/// plus one retry per delay entry.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub delays: Vec<Duration>,
}

impl RetryPolicy {
    pub fn from_delays_secs(delays: &[u64]) -> Self {
        Self {
            delays: delays.iter().map(|s| Duration::from_secs(*s)).collect(),
        }
    }

    /// No retries.
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }
}

impl Default for RetryPolicy {
    /// Three retries at 5, 10, and 20 minutes.
    fn default() -> Self {
        Self::from_delays_secs(&[300, 600, 1200])
    }
}

// ── Recipient adapter ───────────────────────────────────────────────

/// Exposes the directory store's admin list as a recipient source.
pub struct DirectoryRecipients(pub Arc<dyn DirectoryStore>);

#[async_trait::async_trait]
impl RecipientSource for DirectoryRecipients {
    async fn admin_emails(&self) -> Result<Vec<String>, NotifyError> {
        self.0
            .admin_emails()
            .await
            .map_err(|e| NotifyError::Config(e.to_string()))
    }
}

// ── Job runner ──────────────────────────────────────────────────────

pub struct JobRunner {
    orchestrator: Arc<ReportOrchestrator>,
    delivery: Arc<DeliveryEngine>,
    recipients: Arc<dyn RecipientSource>,
    reporting: ReportingConfig,
    timeout: Duration,
    retry: RetryPolicy,
}

impl JobRunner {
    pub fn new(
        orchestrator: Arc<ReportOrchestrator>,
        delivery: Arc<DeliveryEngine>,
        recipients: Arc<dyn RecipientSource>,
        reporting: ReportingConfig,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            orchestrator,
            delivery,
            recipients,
            reporting,
            timeout,
            retry,
        }
    }

    /// Process one request, applying the retry policy for scheduled
    /// triggers. Each retry is a fresh execution; the log keeps them all.
    pub async fn process(&self, request: JobRequest) -> Result<JobOutcome, ReportError> {
        let retryable = matches!(
            request,
            JobRequest::Generate {
                trigger: TriggerType::Scheduled,
                ..
            }
        );

        let mut attempt = 0;
        loop {
            match self.run_once(&request).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    // Validation errors are caller mistakes; retrying
                    // cannot fix them.
                    let can_retry = retryable
                        && !matches!(err, ReportError::Validation(_))
                        && attempt < self.retry.delays.len();
                    if !can_retry {
                        return Err(err);
                    }
                    let delay = self.retry.delays[attempt];
                    attempt += 1;
                    warn!(
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %err,
                        "scheduled job failed; retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn run_once(&self, request: &JobRequest) -> Result<JobOutcome, ReportError> {
        match request {
            JobRequest::Generate {
                kind,
                trigger,
                custom_range,
                recipients,
                send_email,
            } => {
                if let Some(list) = recipients {
                    validate_recipients(list)?;
                }
                let execution_id = match custom_range {
                    Some((start, end)) => {
                        self.orchestrator
                            .create_custom_execution(*trigger, *start, *end)
                            .await?
                    }
                    None => {
                        let period =
                            ReportPeriod::resolve(*kind, self.orchestrator.calendar(), Utc::now())?;
                        self.orchestrator
                            .create_execution(*kind, *trigger, period)
                            .await?
                    }
                };
                self.bounded_run(execution_id, execution_id, recipients.clone(), *send_email)
                    .await
            }
            JobRequest::Resend {
                execution_id,
                recipients,
            } => {
                validate_recipients(recipients)?;
                let log = self.orchestrator.execution_log();
                let original = log
                    .get(*execution_id)
                    .await?
                    .ok_or(ReportError::ExecutionNotFound(*execution_id))?;

                // A resend regenerates under a fresh execution but books
                // its delivery stats against the original one.
                let period = ReportPeriod {
                    start_utc: original.period_start,
                    end_utc: original.period_end,
                };
                let new_id = self
                    .orchestrator
                    .create_execution(original.report_kind, TriggerType::ManualRerun, period)
                    .await?;
                info!(
                    original = %execution_id,
                    regenerated = %new_id,
                    "resending report"
                );
                self.bounded_run(new_id, *execution_id, Some(recipients.clone()), true)
                    .await
            }
        }
    }

    /// Run generate+deliver under the wall-clock ceiling.
    async fn bounded_run(
        &self,
        generate_id: Uuid,
        stats_id: Uuid,
        recipients_override: Option<Vec<String>>,
        send_email: bool,
    ) -> Result<JobOutcome, ReportError> {
        let minutes = (self.timeout.as_secs() / 60).max(1);
        let work = self.generate_and_deliver(generate_id, stats_id, recipients_override, send_email);

        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                error!(execution_id = %generate_id, minutes, "report job exceeded execution ceiling");
                // In-flight work was dropped at the ceiling; deliveries
                // that already went out stand.
                if let Err(err) = self.orchestrator.mark_timed_out(generate_id, minutes).await {
                    warn!(execution_id = %generate_id, error = %err, "failed to record timeout");
                }
                Err(ReportError::Timeout { minutes })
            }
        }
    }

    async fn generate_and_deliver(
        &self,
        generate_id: Uuid,
        stats_id: Uuid,
        recipients_override: Option<Vec<String>>,
        send_email: bool,
    ) -> Result<JobOutcome, ReportError> {
        let outcome = self.orchestrator.generate(generate_id).await?;

        if !send_email {
            return Ok(JobOutcome {
                execution_id: generate_id,
                delivery: None,
            });
        }

        let recipients = match recipients_override {
            Some(list) => list,
            None => resolve_recipients(self.recipients.as_ref(), &self.reporting).await,
        };

        let email = self.compose_email(&outcome).await?;
        let report = self
            .delivery
            .send_report(stats_id, &email, &recipients)
            .await;

        self.orchestrator
            .execution_log()
            .backfill_delivery(
                stats_id,
                DeliveryStats {
                    recipients_count: report.total_recipients() as i64,
                    successful_deliveries: report.successful_deliveries as i64,
                    failed_deliveries: report.failed_deliveries as i64,
                    delivery_ms: report.duration_ms,
                },
                Utc::now(),
            )
            .await?;

        if report.is_partial_success() {
            warn!(
                execution_id = %stats_id,
                failed = report.failed_deliveries,
                total = report.total_recipients(),
                "report delivered with failures"
            );
        }

        Ok(JobOutcome {
            execution_id: generate_id,
            delivery: Some(report),
        })
    }

    /// Write the rendered payload to the report storage directory and
    /// compose the email around it.
    async fn compose_email(&self, outcome: &ReportOutcome) -> Result<ReportEmail, ReportError> {
        let cal = self.orchestrator.calendar();
        let document = &outcome.document;

        tokio::fs::create_dir_all(&self.reporting.storage_path)
            .await
            .map_err(|e| ReportError::Generation(format!("report storage: {e}")))?;

        // Execution id in the stored name keeps concurrent runs from
        // clobbering each other's attachments.
        let (stem, ext) = match outcome.rendered.file_name.rsplit_once('.') {
            Some((stem, ext)) => (stem.to_string(), format!(".{ext}")),
            None => (outcome.rendered.file_name.clone(), String::new()),
        };
        let stored_name = format!("{stem}_{}{ext}", outcome.execution_id.simple());
        let path = std::path::Path::new(&self.reporting.storage_path).join(stored_name);
        tokio::fs::write(&path, &outcome.rendered.bytes)
            .await
            .map_err(|e| ReportError::Generation(format!("report storage: {e}")))?;

        let summary = &document.summary;
        let period_start = document
            .period
            .start_local_date(cal)
            .format("%d %B %Y")
            .to_string();
        let period_end = document
            .period
            .end_local_date_inclusive(cal)
            .format("%d %B %Y")
            .to_string();

        let break_rows = |summaries: &[cdrstats_core::OperatorBreakSummary]| {
            summaries
                .iter()
                .map(|s| EmailBreakRow {
                    operator_name: s.operator_name.clone(),
                    phone_number: s.phone_number.clone(),
                    count: s.break_count,
                    total_duration: format_minutes(s.total_duration_minutes),
                    times: s
                        .breaks
                        .iter()
                        .map(|b| {
                            let end = b
                                .end_local
                                .map(|e| e.format("%H:%M").to_string())
                                .unwrap_or_else(|| "ongoing".to_string());
                            format!(
                                "{} - {} ({:.0} m)",
                                b.start_local.format("%H:%M"),
                                end,
                                b.duration_minutes
                            )
                        })
                        .collect(),
                })
                .collect::<Vec<_>>()
        };

        let context = ReportEmailContext {
            brand: self.reporting.brand.clone(),
            report_kind: document.report_kind.to_string(),
            period_start: period_start.clone(),
            period_end: period_end.clone(),
            generated_at: cal
                .to_local(document.generated_at)
                .format("%d %B %Y %H:%M:%S")
                .to_string(),
            metrics: EmailMetrics {
                incoming_calls: summary.total_incoming_calls,
                answered_calls: summary.total_answered_calls,
                missed_calls: summary.total_missed_calls,
                on_break_calls: summary.total_on_break_calls,
                redirected_calls: summary.total_redirected_calls,
                outgoing_calls: summary.total_outgoing_calls,
                answer_rate: summary.answer_rate,
            },
            breaks: break_rows(&document.break_summaries),
            shift_ends: break_rows(&document.shift_end_summaries),
            file_name: outcome.rendered.file_name.clone(),
            file_size: format_file_size(outcome.rendered.bytes.len() as i64),
            records_processed: document.records_processed(),
        };

        let html_body = render_report_email(&context)
            .map_err(|e| ReportError::Generation(e.to_string()))?;
        let subject = email_subject(
            &self.reporting.brand,
            &document.report_kind.to_string(),
            &period_start,
            &period_end,
        );

        Ok(ReportEmail {
            subject,
            html_body,
            attachment_path: Some(path.to_string_lossy().to_string()),
        })
    }
}

fn validate_recipients(recipients: &[String]) -> Result<(), ReportError> {
    if recipients.is_empty() {
        return Err(ReportError::Validation(
            "recipient list is empty".to_string(),
        ));
    }
    let invalid: Vec<&str> = recipients
        .iter()
        .filter(|r| !is_valid_email(r))
        .map(String::as_str)
        .collect();
    if !invalid.is_empty() {
        return Err(ReportError::Validation(format!(
            "invalid email addresses: {}",
            invalid.join(", ")
        )));
    }
    Ok(())
}

// ── Scheduler and worker loops ──────────────────────────────────────

/// Bounded job queue shared by the cron loop and the on-demand path.
pub fn job_queue(capacity: usize) -> (mpsc::Sender<JobRequest>, mpsc::Receiver<JobRequest>) {
    mpsc::channel(capacity.max(1))
}

/// Enqueue an on-demand request without blocking.
pub fn enqueue(tx: &mpsc::Sender<JobRequest>, request: JobRequest) -> Result<(), SchedulerError> {
    tx.try_send(request).map_err(|err| match err {
        mpsc::error::TrySendError::Full(_) => SchedulerError::QueueFull,
        mpsc::error::TrySendError::Closed(_) => SchedulerError::QueueClosed,
    })
}

/// Tick over the cron table and push due jobs onto the queue. A full
/// queue defers the job to the next tick rather than dropping it.
pub async fn scheduler_loop(
    schedule: Arc<Mutex<crate::schedule::JobSchedule>>,
    tx: mpsc::Sender<JobRequest>,
    tick: Duration,
    shutdown: Arc<Notify>,
) {
    info!(tick_secs = tick.as_secs(), "scheduler loop started");
    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!("scheduler loop stopping");
                break;
            }
            _ = tokio::time::sleep(tick) => {
                let now = Utc::now();
                let due: Vec<(String, ReportKind)> = schedule
                    .lock()
                    .await
                    .due_jobs(now)
                    .iter()
                    .map(|entry| (entry.job_id.clone(), entry.report_kind))
                    .collect();

                for (job_id, kind) in due {
                    let request = JobRequest::Generate {
                        kind,
                        trigger: TriggerType::Scheduled,
                        custom_range: None,
                        recipients: None,
                        send_email: true,
                    };
                    match tx.try_send(request) {
                        Ok(()) => {
                            info!(job_id = %job_id, "scheduled job enqueued");
                            schedule.lock().await.record_trigger_at(&job_id, now);
                        }
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            warn!(job_id = %job_id, "job queue full; deferring to next tick");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            warn!("job queue closed; scheduler loop stopping");
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Drain the queue, one job at a time per worker.
pub async fn worker_loop(runner: Arc<JobRunner>, rx: Arc<Mutex<mpsc::Receiver<JobRequest>>>) {
    loop {
        let request = { rx.lock().await.recv().await };
        match request {
            Some(request) => {
                if let Err(err) = runner.process(request).await {
                    error!(error = %err, "report job failed");
                }
            }
            None => {
                info!("job queue closed; worker stopping");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{JobDefinition, JobSchedule};
    use async_trait::async_trait;
    use cdrstats_core::{
        CallDirection, CallRecord, Department, ExecutionStatus, FailureKind, LocalCalendar,
        Operator, WorkHoursConfig,
    };
    use cdrstats_notify::{
        DeliveryAuditStore, DeliveryPolicy, EmailMessage, MailTransport, MemoryDeliveryAuditStore,
        StaticRecipients,
    };
    use cdrstats_report::{
        CsvRenderer, MemoryBreakStore, MemoryCallRecordStore,
        MemoryDirectoryStore, MemoryExecutionLog, MemoryHolidayStore, Stores,
    };
    use chrono::{DateTime, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OkTransport;

    #[async_trait]
    impl MailTransport for OkTransport {
        async fn send(&self, _message: &EmailMessage) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    /// Call store that fails the first `failures` range queries.
    struct FlakyCallStore {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl cdrstats_report::CallRecordStore for FlakyCallStore {
        async fn by_range(
            &self,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<CallRecord>, ReportError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                Err(ReportError::Store("cdr backend flapping".to_string()))
            } else {
                Ok(vec![])
            }
        }
        async fn by_party(
            &self,
            _number: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<CallRecord>, ReportError> {
            Ok(vec![])
        }
    }

    /// Call store that never answers within a test's patience.
    struct StuckCallStore;

    #[async_trait]
    impl cdrstats_report::CallRecordStore for StuckCallStore {
        async fn by_range(
            &self,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<CallRecord>, ReportError> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(vec![])
        }
        async fn by_party(
            &self,
            _number: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<CallRecord>, ReportError> {
            Ok(vec![])
        }
    }

    fn cal() -> LocalCalendar {
        LocalCalendar::from_hours(3)
    }

    fn sample_record() -> CallRecord {
        // Inside the daily period seen from the reference used in tests.
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        CallRecord {
            direction: CallDirection::Incoming,
            calling_number: "05321112233".to_string(),
            original_called_number: "1001".to_string(),
            final_called_number: "1001".to_string(),
            origination: at,
            connect: Some(at + chrono::Duration::seconds(2)),
            duration_secs: 30,
        }
    }

    fn stores_with_calls(calls: Arc<dyn cdrstats_report::CallRecordStore>) -> Stores {
        Stores {
            calls,
            breaks: Arc::new(MemoryBreakStore::default()),
            holidays: Arc::new(MemoryHolidayStore::default()),
            directory: Arc::new(MemoryDirectoryStore::new(
                vec![Operator {
                    id: "u1".to_string(),
                    name: "Agent One".to_string(),
                    phone_number: "1001".to_string(),
                    department_id: Some("d1".to_string()),
                    email: Some("admin@example.com".to_string()),
                    is_admin: true,
                }],
                vec![Department {
                    id: "d1".to_string(),
                    name: "Switchboard".to_string(),
                }],
            )),
        }
    }

    fn runner_with(
        stores: Stores,
        log: Arc<MemoryExecutionLog>,
        audits: Arc<MemoryDeliveryAuditStore>,
        storage: &std::path::Path,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> JobRunner {
        let orchestrator = Arc::new(ReportOrchestrator::new(
            stores,
            log,
            Arc::new(CsvRenderer),
            cal(),
            WorkHoursConfig::default(),
        ));
        let delivery = Arc::new(DeliveryEngine::new(
            Arc::new(OkTransport),
            audits,
            DeliveryPolicy::immediate(3),
        ));
        let reporting = ReportingConfig {
            brand: "Call Center".to_string(),
            default_recipients: vec![],
            excluded_recipients: vec![],
            storage_path: storage.to_string_lossy().to_string(),
        };
        JobRunner::new(
            orchestrator,
            delivery,
            Arc::new(StaticRecipients(vec!["admin@example.com".to_string()])),
            reporting,
            timeout,
            retry,
        )
    }

    fn generate_request(trigger: TriggerType, recipients: Option<Vec<String>>) -> JobRequest {
        JobRequest::Generate {
            kind: ReportKind::Daily,
            trigger,
            custom_range: None,
            recipients,
            send_email: true,
        }
    }

    #[tokio::test]
    async fn scheduled_job_generates_delivers_and_backfills() {
        let temp = tempfile::tempdir().unwrap();
        let log = Arc::new(MemoryExecutionLog::new());
        let audits = Arc::new(MemoryDeliveryAuditStore::new());
        let runner = runner_with(
            stores_with_calls(Arc::new(MemoryCallRecordStore::new(vec![sample_record()]))),
            log.clone(),
            audits.clone(),
            temp.path(),
            Duration::from_secs(60),
            RetryPolicy::none(),
        );

        let outcome = runner
            .process(generate_request(TriggerType::Scheduled, None))
            .await
            .unwrap();

        let delivery = outcome.delivery.unwrap();
        assert!(delivery.is_success());
        assert_eq!(delivery.total_recipients(), 1);

        let stored = log.get(outcome.execution_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Completed);
        assert_eq!(stored.recipients_count, Some(1));
        assert_eq!(stored.successful_deliveries, Some(1));
        assert_eq!(stored.failed_deliveries, Some(0));

        let rows = audits.by_execution(outcome.execution_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].attachment_name.as_deref().unwrap().ends_with(".csv"));
    }

    #[tokio::test]
    async fn scheduled_job_retries_until_store_recovers() {
        let temp = tempfile::tempdir().unwrap();
        let log = Arc::new(MemoryExecutionLog::new());
        let audits = Arc::new(MemoryDeliveryAuditStore::new());
        let runner = runner_with(
            stores_with_calls(Arc::new(FlakyCallStore {
                failures: 2,
                calls: AtomicUsize::new(0),
            })),
            log.clone(),
            audits,
            temp.path(),
            Duration::from_secs(60),
            RetryPolicy::from_delays_secs(&[0, 0, 0]),
        );

        let outcome = runner
            .process(generate_request(TriggerType::Scheduled, None))
            .await
            .unwrap();

        // Two failed executions plus the one that finally completed.
        let recent = log.recent(10).await.unwrap();
        assert_eq!(recent.len(), 3);
        let completed = recent
            .iter()
            .filter(|e| e.status == ExecutionStatus::Completed)
            .count();
        let failed = recent
            .iter()
            .filter(|e| e.status == ExecutionStatus::Failed)
            .count();
        assert_eq!((completed, failed), (1, 2));
        assert!(log.get(outcome.execution_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn on_demand_job_surfaces_failure_without_retry() {
        let temp = tempfile::tempdir().unwrap();
        let log = Arc::new(MemoryExecutionLog::new());
        let audits = Arc::new(MemoryDeliveryAuditStore::new());
        let runner = runner_with(
            stores_with_calls(Arc::new(FlakyCallStore {
                failures: 99,
                calls: AtomicUsize::new(0),
            })),
            log.clone(),
            audits,
            temp.path(),
            Duration::from_secs(60),
            RetryPolicy::from_delays_secs(&[0, 0, 0]),
        );

        let err = runner
            .process(generate_request(TriggerType::OnDemand, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Generation(_)));
        assert_eq!(log.recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn exceeded_ceiling_marks_execution_timed_out() {
        let temp = tempfile::tempdir().unwrap();
        let log = Arc::new(MemoryExecutionLog::new());
        let audits = Arc::new(MemoryDeliveryAuditStore::new());
        let runner = runner_with(
            stores_with_calls(Arc::new(StuckCallStore)),
            log.clone(),
            audits,
            temp.path(),
            Duration::from_millis(50),
            RetryPolicy::none(),
        );

        let err = runner
            .process(generate_request(TriggerType::OnDemand, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Timeout { .. }));

        let recent = log.recent(1).await.unwrap();
        assert_eq!(recent[0].status, ExecutionStatus::Failed);
        assert_eq!(recent[0].failure, Some(FailureKind::Timeout));
    }

    #[tokio::test]
    async fn resend_backfills_the_original_execution() {
        let temp = tempfile::tempdir().unwrap();
        let log = Arc::new(MemoryExecutionLog::new());
        let audits = Arc::new(MemoryDeliveryAuditStore::new());
        let runner = runner_with(
            stores_with_calls(Arc::new(MemoryCallRecordStore::new(vec![sample_record()]))),
            log.clone(),
            audits.clone(),
            temp.path(),
            Duration::from_secs(60),
            RetryPolicy::none(),
        );

        // Original generation without email.
        let original = runner
            .process(JobRequest::Generate {
                kind: ReportKind::Daily,
                trigger: TriggerType::OnDemand,
                custom_range: None,
                recipients: None,
                send_email: false,
            })
            .await
            .unwrap();
        assert!(original.delivery.is_none());

        let outcome = runner
            .process(JobRequest::Resend {
                execution_id: original.execution_id,
                recipients: vec!["ops@example.com".to_string()],
            })
            .await
            .unwrap();

        // Delivery stats land on the original; the regenerated execution
        // completes on its own row.
        let stored = log.get(original.execution_id).await.unwrap().unwrap();
        assert_eq!(stored.recipients_count, Some(1));
        assert_eq!(stored.successful_deliveries, Some(1));
        assert_ne!(outcome.execution_id, original.execution_id);
        let regenerated = log.get(outcome.execution_id).await.unwrap().unwrap();
        assert_eq!(regenerated.status, ExecutionStatus::Completed);
        assert_eq!(regenerated.trigger, TriggerType::ManualRerun);

        // Audit rows are booked under the original execution.
        assert_eq!(audits.by_execution(original.execution_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_recipients_rejected_before_any_execution() {
        let temp = tempfile::tempdir().unwrap();
        let log = Arc::new(MemoryExecutionLog::new());
        let audits = Arc::new(MemoryDeliveryAuditStore::new());
        let runner = runner_with(
            stores_with_calls(Arc::new(MemoryCallRecordStore::default())),
            log.clone(),
            audits,
            temp.path(),
            Duration::from_secs(60),
            RetryPolicy::default(),
        );

        let err = runner
            .process(generate_request(
                TriggerType::Scheduled,
                Some(vec!["not-an-email".to_string()]),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Validation(_)));
        assert!(log.recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scheduler_loop_enqueues_due_jobs_once() {
        let mut schedule = JobSchedule::new(cal());
        schedule.sync_jobs(&[JobDefinition {
            job_id: "daily-report".to_string(),
            report_kind: ReportKind::Daily,
            cron: "* * * * *".to_string(),
            enabled: true,
        }]);
        let schedule = Arc::new(Mutex::new(schedule));
        let (tx, mut rx) = job_queue(4);
        let shutdown = Arc::new(Notify::new());

        let handle = tokio::spawn(scheduler_loop(
            schedule.clone(),
            tx,
            Duration::from_millis(10),
            shutdown.clone(),
        ));

        let request = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("scheduler should enqueue a due job")
            .unwrap();
        assert!(matches!(
            request,
            JobRequest::Generate {
                kind: ReportKind::Daily,
                trigger: TriggerType::Scheduled,
                ..
            }
        ));

        // The tick consumed the cron window; nothing further is due now.
        assert!(schedule.lock().await.get("daily-report").unwrap().last_triggered.is_some());

        shutdown.notify_one();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn enqueue_reports_full_queue() {
        let (tx, _rx) = job_queue(1);
        enqueue(&tx, generate_request(TriggerType::OnDemand, None)).unwrap();
        let err = enqueue(&tx, generate_request(TriggerType::OnDemand, None)).unwrap_err();
        assert!(matches!(err, SchedulerError::QueueFull));
    }
}
