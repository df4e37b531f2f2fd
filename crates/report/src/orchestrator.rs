//! End-to-end report generation.
//!
//! The orchestrator owns one execution's trip through the state machine:
//! create (Pending) → mark Running → load upstream data once per boundary
//! pair → classify and aggregate → build the document → render → Complete.
//! Any error fails the execution with a Generation failure; the caller that
//! owns the wall-clock ceiling marks timeouts through
//! [`ReportOrchestrator::mark_timed_out`] so the log distinguishes slow
//! from broken.

use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use cdrstats_analytics::{
    build_break_summaries, classify, department_statistics, is_work_hours, work_hours_split,
    BreakIndex, CallDisposition, ReportPeriod,
};
use cdrstats_core::{
    BreakKind, CallDirection, ExecutionStatus, FailureKind, HolidaySet, LocalCalendar,
    ReportExecution, ReportKind, TriggerType, WorkHoursConfig,
};

use crate::document::{
    DroppedCallRecord, MetricsSummary, RedirectionRecord, RenderedReport, ReportDocument,
    ReportRenderer,
};
use crate::error::ReportError;
use crate::execution_log::{CompletionStats, ExecutionLogStore};
use crate::store::{BreakStore, CallRecordStore, DirectoryStore, HolidayStore, Stores};

/// Longest custom range accepted, in days.
const MAX_CUSTOM_RANGE_DAYS: i64 = 366;

/// Result of a successful generation run.
#[derive(Debug)]
pub struct ReportOutcome {
    pub execution_id: Uuid,
    pub document: ReportDocument,
    pub rendered: RenderedReport,
    pub generation_ms: i64,
}

pub struct ReportOrchestrator {
    stores: Stores,
    log: Arc<dyn ExecutionLogStore>,
    renderer: Arc<dyn ReportRenderer>,
    cal: LocalCalendar,
    work_hours: WorkHoursConfig,
}

impl ReportOrchestrator {
    pub fn new(
        stores: Stores,
        log: Arc<dyn ExecutionLogStore>,
        renderer: Arc<dyn ReportRenderer>,
        cal: LocalCalendar,
        work_hours: WorkHoursConfig,
    ) -> Self {
        Self {
            stores,
            log,
            renderer,
            cal,
            work_hours,
        }
    }

    pub fn execution_log(&self) -> Arc<dyn ExecutionLogStore> {
        self.log.clone()
    }

    pub fn calendar(&self) -> LocalCalendar {
        self.cal
    }

    // ── Execution lifecycle ─────────────────────────────────────────

    /// Create a Pending execution for a resolved period.
    pub async fn create_execution(
        &self,
        kind: ReportKind,
        trigger: TriggerType,
        period: ReportPeriod,
    ) -> Result<Uuid, ReportError> {
        let execution = ReportExecution::new(
            kind,
            trigger,
            period.start_utc,
            period.end_utc,
            Utc::now(),
        );
        let id = execution.id;
        self.log.create(execution).await?;
        Ok(id)
    }

    /// Create a Pending execution for a validated custom local date range.
    pub async fn create_custom_execution(
        &self,
        trigger: TriggerType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Uuid, ReportError> {
        let period = ReportPeriod::custom(self.cal, start, end)?;
        if period.num_days() > MAX_CUSTOM_RANGE_DAYS {
            return Err(ReportError::Validation(format!(
                "date range cannot exceed {} days",
                MAX_CUSTOM_RANGE_DAYS
            )));
        }
        self.create_execution(ReportKind::Custom, trigger, period)
            .await
    }

    /// Mark an execution Failed with a timeout-flavored error. Called by
    /// the job runner when the wall-clock ceiling fires; a still-Pending
    /// execution is walked through Running first so the transition holds.
    pub async fn mark_timed_out(&self, id: Uuid, minutes: u64) -> Result<(), ReportError> {
        let now = Utc::now();
        if let Some(execution) = self.log.get(id).await? {
            if execution.status == ExecutionStatus::Pending {
                self.log.mark_running(id, now).await?;
            }
            if !execution.status.is_terminal() {
                let message = format!("exceeded maximum execution time of {minutes} minutes");
                self.log
                    .fail(id, FailureKind::Timeout, &message, now)
                    .await?;
            }
        }
        Ok(())
    }

    // ── Generation ──────────────────────────────────────────────────

    /// Run generation for an already-created execution, driving its state
    /// machine to Completed or Failed.
    pub async fn generate(&self, execution_id: Uuid) -> Result<ReportOutcome, ReportError> {
        let execution = self
            .log
            .get(execution_id)
            .await?
            .ok_or(ReportError::ExecutionNotFound(execution_id))?;
        let period = ReportPeriod {
            start_utc: execution.period_start,
            end_utc: execution.period_end,
        };

        self.log.mark_running(execution_id, Utc::now()).await?;
        info!(
            execution_id = %execution_id,
            report_kind = %execution.report_kind,
            period_start = %period.start_utc,
            period_end = %period.end_utc,
            "starting report generation"
        );

        let started = Instant::now();
        match self.build(execution.report_kind, period).await {
            Ok((document, rendered)) => {
                let generation_ms = started.elapsed().as_millis() as i64;
                self.log
                    .complete(
                        execution_id,
                        CompletionStats {
                            generation_ms,
                            records_processed: document.records_processed() as i64,
                            file_name: rendered.file_name.clone(),
                            file_size_bytes: rendered.bytes.len() as i64,
                        },
                        Utc::now(),
                    )
                    .await?;

                info!(
                    execution_id = %execution_id,
                    records = document.records_processed(),
                    size_bytes = rendered.bytes.len(),
                    duration_ms = generation_ms,
                    "report generation completed"
                );

                Ok(ReportOutcome {
                    execution_id,
                    document,
                    rendered,
                    generation_ms,
                })
            }
            Err(err) => {
                let message = err.to_string();
                self.log
                    .fail(execution_id, FailureKind::Generation, &message, Utc::now())
                    .await?;
                tracing::error!(
                    execution_id = %execution_id,
                    error = %message,
                    "report generation failed"
                );
                Err(ReportError::Generation(message))
            }
        }
    }

    /// Create and generate in one step for a standard period.
    pub async fn run(
        &self,
        kind: ReportKind,
        trigger: TriggerType,
        reference: chrono::DateTime<Utc>,
    ) -> Result<ReportOutcome, ReportError> {
        let period = ReportPeriod::resolve(kind, self.cal, reference)?;
        let id = self.create_execution(kind, trigger, period).await?;
        self.generate(id).await
    }

    /// Assemble the document and rendered payload for a period.
    async fn build(
        &self,
        kind: ReportKind,
        period: ReportPeriod,
    ) -> Result<(ReportDocument, RenderedReport), ReportError> {
        // One boundary pair for every sub-aggregation; the loads are
        // independent and issued concurrently.
        let (records, breaks, holiday_rules, operators, departments) = tokio::join!(
            self.stores.calls.by_range(period.start_utc, period.end_utc),
            self.stores.breaks.overlapping(period.start_utc, period.end_utc),
            self.stores.holidays.active_rules(),
            self.stores.directory.operators(),
            self.stores.directory.departments(),
        );

        let records = records?;
        let operators = operators?;
        let departments = departments?;

        // Holiday lookup degrades to "no holidays" rather than failing the
        // report; after-hours classification may be off for the run.
        let holidays = match holiday_rules {
            Ok(rules) => HolidaySet::expand(
                &rules,
                period.start_local_date(self.cal),
                period.end_local_date_inclusive(self.cal),
            ),
            Err(err) => {
                warn!(error = %err, "holiday lookup failed; continuing without holidays");
                HolidaySet::empty()
            }
        };

        // Break lookup degrades the same way: no on-break reclassification
        // and no break summaries, but the report still goes out.
        let break_rows = match breaks {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "break lookup failed; continuing without break data");
                Vec::new()
            }
        };
        let break_index = BreakIndex::build(&break_rows, period.start_utc, period.end_utc);

        let department_stats =
            department_statistics(&records, &operators, &departments, &break_index);
        let (work_hours_calls, after_hours_calls) =
            work_hours_split(&records, self.cal, &self.work_hours, &holidays);

        let mut summary = MetricsSummary::from_departments(&department_stats);
        summary.work_hours_calls = work_hours_calls;
        summary.after_hours_calls = after_hours_calls;

        let break_summaries =
            build_break_summaries(&break_rows, BreakKind::Break, &operators, self.cal);
        let shift_end_summaries =
            build_break_summaries(&break_rows, BreakKind::EndOfShift, &operators, self.cal);
        summary.apply_break_summaries(&break_summaries, &shift_end_summaries);

        let redirections = records
            .iter()
            .filter(|r| r.direction == CallDirection::Incoming && r.was_redirected())
            .map(|r| RedirectionRecord {
                origination_local: self.cal.to_local(r.origination),
                calling_number: r.calling_number.clone(),
                original_called_number: r.original_called_number.clone(),
                final_called_number: r.final_called_number.clone(),
            })
            .collect();

        let dropped_calls = records
            .iter()
            .filter(|r| r.direction == CallDirection::Incoming)
            .filter(|r| {
                classify(r, &r.final_called_number, &break_index) == CallDisposition::Missed
            })
            .map(|r| DroppedCallRecord {
                origination_local: self.cal.to_local(r.origination),
                calling_number: r.calling_number.clone(),
                dialed_number: r.original_called_number.clone(),
                during_work_hours: is_work_hours(self.cal, &self.work_hours, r.origination, &holidays),
            })
            .collect();

        let document = ReportDocument {
            report_kind: kind,
            period,
            generated_at: Utc::now(),
            summary,
            departments: department_stats,
            break_summaries,
            shift_end_summaries,
            redirections,
            dropped_calls,
        };

        let rendered = self.renderer.render(&document, self.cal)?;
        Ok((document, rendered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::CsvRenderer;
    use crate::execution_log::MemoryExecutionLog;
    use crate::store::{
        MemoryBreakStore, MemoryCallRecordStore, MemoryDirectoryStore, MemoryHolidayStore,
    };
    use async_trait::async_trait;
    use cdrstats_core::{BreakInterval, CallRecord, Department, HolidayRule, Operator};
    use chrono::{DateTime, TimeZone};

    fn cal() -> LocalCalendar {
        LocalCalendar::from_hours(3)
    }

    /// 2026-03-01 local times (the previous day seen from Mar 2).
    fn local(h: u32, m: u32) -> DateTime<Utc> {
        cal().to_utc(
            NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(h, m, 0)
                .unwrap(),
        )
    }

    fn incoming(original: &str, fin: &str, at: DateTime<Utc>, answered: bool) -> CallRecord {
        CallRecord {
            direction: CallDirection::Incoming,
            calling_number: "05321112233".to_string(),
            original_called_number: original.to_string(),
            final_called_number: fin.to_string(),
            origination: at,
            connect: answered.then_some(at + chrono::Duration::seconds(3)),
            duration_secs: if answered { 45 } else { 0 },
        }
    }

    fn operator(id: &str, number: &str) -> Operator {
        Operator {
            id: id.to_string(),
            name: format!("Agent {id}"),
            phone_number: number.to_string(),
            department_id: Some("d1".to_string()),
            email: None,
            is_admin: false,
        }
    }

    fn orchestrator_with(
        records: Vec<CallRecord>,
        breaks: Vec<BreakInterval>,
        holidays: Vec<HolidayRule>,
    ) -> ReportOrchestrator {
        let stores = Stores {
            calls: Arc::new(MemoryCallRecordStore::new(records)),
            breaks: Arc::new(MemoryBreakStore::new(breaks)),
            holidays: Arc::new(MemoryHolidayStore::new(holidays)),
            directory: Arc::new(MemoryDirectoryStore::new(
                vec![operator("u1", "1001"), operator("u2", "1002")],
                vec![Department {
                    id: "d1".to_string(),
                    name: "Switchboard".to_string(),
                }],
            )),
        };
        ReportOrchestrator::new(
            stores,
            Arc::new(MemoryExecutionLog::new()),
            Arc::new(CsvRenderer),
            cal(),
            WorkHoursConfig::default(),
        )
    }

    fn reference() -> DateTime<Utc> {
        // 06:00 local on Monday 2026-03-02 → daily period covers Sunday
        // 2026-03-01.
        Utc.with_ymd_and_hms(2026, 3, 2, 3, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn daily_run_completes_and_logs() {
        let orch = orchestrator_with(
            vec![
                incoming("1001", "1001", local(10, 0), true),
                incoming("1001", "1001", local(11, 0), false),
            ],
            vec![],
            vec![],
        );
        let outcome = orch
            .run(ReportKind::Daily, TriggerType::Scheduled, reference())
            .await
            .unwrap();

        assert_eq!(outcome.document.summary.total_incoming_calls, 2);
        assert_eq!(outcome.document.summary.total_answered_calls, 1);
        assert_eq!(outcome.rendered.file_name, "Daily_20260301-20260301.csv");

        let log = orch.execution_log();
        let stored = log.get(outcome.execution_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Completed);
        assert_eq!(stored.records_processed, Some(2));
        assert_eq!(stored.file_name.as_deref(), Some("Daily_20260301-20260301.csv"));
    }

    #[tokio::test]
    async fn missed_call_during_break_becomes_on_break() {
        let breaks = vec![BreakInterval {
            agent_id: "1001".to_string(),
            start: local(10, 50),
            end: None,
            planned_end: Some(local(11, 20)),
            reason: Some("lunch".to_string()),
            kind: BreakKind::Break,
        }];
        let orch = orchestrator_with(
            vec![incoming("1001", "1001", local(11, 0), false)],
            breaks,
            vec![],
        );
        let outcome = orch
            .run(ReportKind::Daily, TriggerType::Scheduled, reference())
            .await
            .unwrap();

        let summary = &outcome.document.summary;
        assert_eq!(summary.total_on_break_calls, 1);
        assert_eq!(summary.total_missed_calls, 0);
        assert!(outcome.document.dropped_calls.is_empty());
        assert_eq!(outcome.document.break_summaries.len(), 1);
    }

    #[tokio::test]
    async fn redirected_calls_are_listed_and_excluded_from_rate_denominator() {
        let orch = orchestrator_with(
            vec![
                incoming("1001", "1002", local(10, 0), true), // redirected from 1001
                incoming("1001", "1001", local(11, 0), true),
            ],
            vec![],
            vec![],
        );
        let outcome = orch
            .run(ReportKind::Daily, TriggerType::Scheduled, reference())
            .await
            .unwrap();

        assert_eq!(outcome.document.redirections.len(), 1);
        let summary = &outcome.document.summary;
        assert_eq!(summary.total_redirected_calls, 1);
    }

    #[tokio::test]
    async fn dropped_calls_carry_work_hours_flag() {
        let orch = orchestrator_with(
            vec![
                incoming("1001", "1001", local(10, 0), false), // Sunday — after hours
            ],
            vec![],
            vec![],
        );
        let outcome = orch
            .run(ReportKind::Daily, TriggerType::Scheduled, reference())
            .await
            .unwrap();

        assert_eq!(outcome.document.dropped_calls.len(), 1);
        // 2026-03-01 is a Sunday: never work hours.
        assert!(!outcome.document.dropped_calls[0].during_work_hours);
        assert_eq!(outcome.document.summary.work_hours_calls, 0);
    }

    #[tokio::test]
    async fn recurring_holiday_call_is_missed_but_after_hours() {
        // 2026-01-01 is a Thursday; a recurring Jan-1 rule makes the whole
        // day after-hours, while the unanswered call still counts missed.
        let at = cal().to_utc(
            NaiveDate::from_ymd_opt(2026, 1, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        );
        let orch = orchestrator_with(
            vec![incoming("1001", "1001", at, false)],
            vec![],
            vec![cdrstats_core::HolidayRule::recurring("New Year", 1, 1)],
        );
        // Reference on Jan 2 so the daily period covers Jan 1.
        let reference = cal().to_utc(
            NaiveDate::from_ymd_opt(2026, 1, 2)
                .unwrap()
                .and_hms_opt(6, 0, 0)
                .unwrap(),
        );
        let outcome = orch
            .run(ReportKind::Daily, TriggerType::Scheduled, reference)
            .await
            .unwrap();

        let summary = &outcome.document.summary;
        assert_eq!(summary.total_missed_calls, 1);
        assert_eq!(summary.work_hours_calls, 0);
        assert_eq!(summary.after_hours_calls, 1);
        assert_eq!(outcome.document.dropped_calls.len(), 1);
        assert!(!outcome.document.dropped_calls[0].during_work_hours);
    }

    #[tokio::test]
    async fn failing_holiday_store_degrades_instead_of_failing() {
        struct FailingHolidays;
        #[async_trait]
        impl crate::store::HolidayStore for FailingHolidays {
            async fn active_rules(&self) -> Result<Vec<HolidayRule>, ReportError> {
                Err(ReportError::Store("holiday backend down".to_string()))
            }
        }

        let stores = Stores {
            calls: Arc::new(MemoryCallRecordStore::new(vec![incoming(
                "1001",
                "1001",
                local(10, 0),
                true,
            )])),
            breaks: Arc::new(MemoryBreakStore::default()),
            holidays: Arc::new(FailingHolidays),
            directory: Arc::new(MemoryDirectoryStore::new(
                vec![operator("u1", "1001")],
                vec![Department {
                    id: "d1".to_string(),
                    name: "Switchboard".to_string(),
                }],
            )),
        };
        let orch = ReportOrchestrator::new(
            stores,
            Arc::new(MemoryExecutionLog::new()),
            Arc::new(CsvRenderer),
            cal(),
            WorkHoursConfig::default(),
        );

        let outcome = orch
            .run(ReportKind::Daily, TriggerType::Scheduled, reference())
            .await
            .unwrap();
        assert_eq!(outcome.document.summary.total_incoming_calls, 1);
    }

    #[tokio::test]
    async fn failing_call_store_fails_the_execution() {
        struct FailingCalls;
        #[async_trait]
        impl crate::store::CallRecordStore for FailingCalls {
            async fn by_range(
                &self,
                _start: DateTime<Utc>,
                _end: DateTime<Utc>,
            ) -> Result<Vec<CallRecord>, ReportError> {
                Err(ReportError::Store("cdr backend down".to_string()))
            }
            async fn by_party(
                &self,
                _number: &str,
                _start: DateTime<Utc>,
                _end: DateTime<Utc>,
            ) -> Result<Vec<CallRecord>, ReportError> {
                Err(ReportError::Store("cdr backend down".to_string()))
            }
        }

        let stores = Stores {
            calls: Arc::new(FailingCalls),
            breaks: Arc::new(MemoryBreakStore::default()),
            holidays: Arc::new(MemoryHolidayStore::default()),
            directory: Arc::new(MemoryDirectoryStore::default()),
        };
        let orch = ReportOrchestrator::new(
            stores,
            Arc::new(MemoryExecutionLog::new()),
            Arc::new(CsvRenderer),
            cal(),
            WorkHoursConfig::default(),
        );

        let err = orch
            .run(ReportKind::Daily, TriggerType::Scheduled, reference())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Generation(_)));

        let recent = orch.execution_log().recent(1).await.unwrap();
        assert_eq!(recent[0].status, ExecutionStatus::Failed);
        assert_eq!(recent[0].failure, Some(FailureKind::Generation));
        assert!(recent[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("cdr backend down"));
    }

    #[tokio::test]
    async fn custom_range_longer_than_a_year_is_rejected_without_execution() {
        let orch = orchestrator_with(vec![], vec![], vec![]);
        let err = orch
            .create_custom_execution(
                TriggerType::OnDemand,
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Validation(_)));
        assert!(orch.execution_log().recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_timed_out_fails_running_execution_with_timeout_kind() {
        let orch = orchestrator_with(vec![], vec![], vec![]);
        let period = ReportPeriod::daily(cal(), reference());
        let id = orch
            .create_execution(ReportKind::Daily, TriggerType::Scheduled, period)
            .await
            .unwrap();

        orch.mark_timed_out(id, 30).await.unwrap();

        let stored = orch.execution_log().get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Failed);
        assert_eq!(stored.failure, Some(FailureKind::Timeout));
        assert!(stored.error_message.as_deref().unwrap().contains("30 minutes"));
    }

    #[tokio::test]
    async fn mark_timed_out_leaves_terminal_executions_alone() {
        let orch = orchestrator_with(
            vec![incoming("1001", "1001", local(10, 0), true)],
            vec![],
            vec![],
        );
        let outcome = orch
            .run(ReportKind::Daily, TriggerType::Scheduled, reference())
            .await
            .unwrap();

        orch.mark_timed_out(outcome.execution_id, 30).await.unwrap();
        let stored = orch
            .execution_log()
            .get(outcome.execution_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ExecutionStatus::Completed);
    }
}
