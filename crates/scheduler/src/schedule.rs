//! Per-job cron scheduling.
//!
//! Each report job has its own cron expression evaluated against the local
//! fixed-offset calendar. The schedule tracks when each job last fired and
//! answers which jobs are due on a tick. Firing is at-least-once: the
//! persisted execution log, not this table, is the de-duplication and
//! audit boundary.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use tracing::{debug, warn};

use cdrstats_core::{LocalCalendar, ReportKind, SchedulerConfig};

// ── Job definitions ─────────────────────────────────────────────────

/// A recurring report job.
#[derive(Debug, Clone)]
pub struct JobDefinition {
    /// Stable identifier (e.g. "daily-report").
    pub job_id: String,
    pub report_kind: ReportKind,
    /// Standard 5-field cron in local time.
    pub cron: String,
    pub enabled: bool,
}

impl JobDefinition {
    /// The three stock jobs: daily at 06:00, weekly Monday 02:00, monthly
    /// on the 1st at 02:00, all local time.
    pub fn from_config(config: &SchedulerConfig) -> Vec<Self> {
        vec![
            Self {
                job_id: "daily-report".to_string(),
                report_kind: ReportKind::Daily,
                cron: config.daily_cron.clone(),
                enabled: true,
            },
            Self {
                job_id: "weekly-report".to_string(),
                report_kind: ReportKind::Weekly,
                cron: config.weekly_cron.clone(),
                enabled: true,
            },
            Self {
                job_id: "monthly-report".to_string(),
                report_kind: ReportKind::Monthly,
                cron: config.monthly_cron.clone(),
                enabled: true,
            },
        ]
    }
}

/// Scheduling state for a single job.
#[derive(Debug, Clone)]
pub struct JobScheduleEntry {
    pub job_id: String,
    pub report_kind: ReportKind,
    /// Normalized 6-field cron expression (seconds prepended).
    pub cron_expression: String,
    pub enabled: bool,
    /// Timestamp of the last trigger.
    pub last_triggered: Option<DateTime<Utc>>,
}

// ── Job schedule ────────────────────────────────────────────────────

/// Manages scheduling state for all report jobs.
pub struct JobSchedule {
    entries: HashMap<String, JobScheduleEntry>,
    cal: LocalCalendar,
}

impl JobSchedule {
    pub fn new(cal: LocalCalendar) -> Self {
        Self {
            entries: HashMap::new(),
            cal,
        }
    }

    /// Synchronize entries with the current job definitions.
    ///
    /// - Adds entries for new jobs.
    /// - Updates cron/enabled for changed jobs (preserves `last_triggered`).
    /// - Removes entries for jobs no longer present.
    pub fn sync_jobs(&mut self, jobs: &[JobDefinition]) {
        let current_ids: std::collections::HashSet<&str> =
            jobs.iter().map(|j| j.job_id.as_str()).collect();

        self.entries.retain(|id, _| current_ids.contains(id.as_str()));

        for job in jobs {
            let cron_expression = normalize_cron(&job.cron);
            match self.entries.get_mut(&job.job_id) {
                Some(entry) => {
                    entry.cron_expression = cron_expression;
                    entry.report_kind = job.report_kind;
                    entry.enabled = job.enabled;
                }
                None => {
                    self.entries.insert(
                        job.job_id.clone(),
                        JobScheduleEntry {
                            job_id: job.job_id.clone(),
                            report_kind: job.report_kind,
                            cron_expression,
                            enabled: job.enabled,
                            last_triggered: None,
                        },
                    );
                }
            }
        }
    }

    /// Whether a job should fire at `now`.
    ///
    /// Returns `false` for unknown or disabled jobs, invalid cron
    /// expressions, or when no tick has passed since the last trigger.
    pub fn should_run(&self, job_id: &str, now: DateTime<Utc>) -> bool {
        let entry = match self.entries.get(job_id) {
            Some(e) => e,
            None => return false,
        };

        if !entry.enabled {
            return false;
        }

        match Schedule::from_str(&entry.cron_expression) {
            Ok(schedule) => self.is_due(&schedule, now, entry.last_triggered),
            Err(e) => {
                warn!(
                    job_id = %job_id,
                    cron = %entry.cron_expression,
                    error = %e,
                    "invalid cron expression"
                );
                false
            }
        }
    }

    /// Check if a cron schedule has a tick in `(last_run, now]`, evaluated
    /// in local time so "06:00" means 06:00 on the local calendar.
    fn is_due(
        &self,
        schedule: &Schedule,
        now: DateTime<Utc>,
        last_run: Option<DateTime<Utc>>,
    ) -> bool {
        let check_from = last_run.unwrap_or(now - Duration::days(1));
        let check_from_local = self.cal.to_local(check_from);
        let now_local = self.cal.to_local(now);

        match schedule.after(&check_from_local).next() {
            Some(next) => next <= now_local,
            None => false,
        }
    }

    /// IDs of all jobs due at `now`.
    pub fn due_jobs(&self, now: DateTime<Utc>) -> Vec<&JobScheduleEntry> {
        self.entries
            .values()
            .filter(|entry| self.should_run(&entry.job_id, now))
            .collect()
    }

    /// Record that a job fired at a specific timestamp.
    pub fn record_trigger_at(&mut self, job_id: &str, at: DateTime<Utc>) {
        if let Some(entry) = self.entries.get_mut(job_id) {
            entry.last_triggered = Some(at);
        } else {
            debug!(job_id, "trigger recorded for unknown job");
        }
    }

    pub fn get(&self, job_id: &str) -> Option<&JobScheduleEntry> {
        self.entries.get(job_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Cron helpers ────────────────────────────────────────────────────

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for
/// seconds. The `cron` crate requires the seconds field; config uses
/// standard 5-field cron.
fn normalize_cron(cron_5field: &str) -> String {
    let trimmed = cron_5field.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}
