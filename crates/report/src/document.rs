//! Report data document and rendering seam.
//!
//! The orchestrator assembles a [`ReportDocument`] — summary metrics,
//! per-department rows, break summaries, redirections, and dropped calls —
//! and hands it to a [`ReportRenderer`] for a byte payload. The production
//! spreadsheet renderer lives outside this workspace; [`CsvRenderer`]
//! covers tests and the bundled worker.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use cdrstats_analytics::{answer_rate, DepartmentStatisticsByDirection, ReportPeriod};
use cdrstats_core::{LocalCalendar, OperatorBreakSummary, ReportKind};

use crate::error::ReportError;

/// Headline metrics for the report email and summary sheet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_incoming_calls: u64,
    pub total_answered_calls: u64,
    pub total_missed_calls: u64,
    pub total_on_break_calls: u64,
    pub total_redirected_calls: u64,
    pub total_outgoing_calls: u64,
    pub answer_rate: f64,
    pub work_hours_calls: u64,
    pub after_hours_calls: u64,
    pub total_break_count: usize,
    pub total_break_duration_minutes: f64,
    pub total_shift_end_count: usize,
}

impl MetricsSummary {
    /// Roll department statistics up into workspace totals. The rate comes
    /// from the shared formula, same as every other call site.
    pub fn from_departments(stats: &DepartmentStatisticsByDirection) -> Self {
        let mut summary = Self::default();
        for dept in &stats.incoming {
            summary.total_incoming_calls += dept.total_calls;
            summary.total_answered_calls += dept.answered_calls;
            summary.total_missed_calls += dept.missed_calls;
            summary.total_on_break_calls += dept.on_break_calls;
            summary.total_redirected_calls += dept.redirected_calls;
        }
        for dept in &stats.outgoing {
            summary.total_outgoing_calls += dept.total_calls;
        }
        summary.answer_rate = answer_rate(
            summary.total_answered_calls,
            summary.total_incoming_calls,
            summary.total_redirected_calls,
            summary.total_on_break_calls,
        );
        summary
    }

    pub fn apply_break_summaries(
        &mut self,
        breaks: &[OperatorBreakSummary],
        shift_ends: &[OperatorBreakSummary],
    ) {
        self.total_break_count = breaks.iter().map(|s| s.break_count).sum();
        let minutes: f64 = breaks.iter().map(|s| s.total_duration_minutes).sum();
        self.total_break_duration_minutes = (minutes * 10.0).round() / 10.0;
        self.total_shift_end_count = shift_ends.iter().map(|s| s.break_count).sum();
    }
}

/// A call whose final answering party differed from the dialed one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectionRecord {
    pub origination_local: DateTime<FixedOffset>,
    pub calling_number: String,
    pub original_called_number: String,
    pub final_called_number: String,
}

/// A missed incoming call, listed for follow-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroppedCallRecord {
    pub origination_local: DateTime<FixedOffset>,
    pub calling_number: String,
    pub dialed_number: String,
    pub during_work_hours: bool,
}

/// Everything the renderer needs for one report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDocument {
    pub report_kind: ReportKind,
    pub period: ReportPeriod,
    pub generated_at: DateTime<Utc>,
    pub summary: MetricsSummary,
    pub departments: DepartmentStatisticsByDirection,
    pub break_summaries: Vec<OperatorBreakSummary>,
    pub shift_end_summaries: Vec<OperatorBreakSummary>,
    pub redirections: Vec<RedirectionRecord>,
    pub dropped_calls: Vec<DroppedCallRecord>,
}

impl ReportDocument {
    pub fn file_name(&self, cal: LocalCalendar) -> String {
        self.period.file_name(self.report_kind, cal)
    }

    /// Incoming + outgoing totals, the record count surfaced in responses.
    pub fn records_processed(&self) -> u64 {
        self.summary.total_incoming_calls + self.summary.total_outgoing_calls
    }
}

/// Rendered payload ready for delivery.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

/// Maps a report document to a byte payload + file name.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, document: &ReportDocument, cal: LocalCalendar)
        -> Result<RenderedReport, ReportError>;
}

// ── CSV renderer ────────────────────────────────────────────────────

/// Plain CSV rendering of the summary and department sheets.
#[derive(Debug, Default)]
pub struct CsvRenderer;

fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

impl ReportRenderer for CsvRenderer {
    fn render(
        &self,
        document: &ReportDocument,
        cal: LocalCalendar,
    ) -> Result<RenderedReport, ReportError> {
        let mut out = String::new();
        let s = &document.summary;

        out.push_str("metric,value\n");
        out.push_str(&format!("incoming_calls,{}\n", s.total_incoming_calls));
        out.push_str(&format!("answered_calls,{}\n", s.total_answered_calls));
        out.push_str(&format!("missed_calls,{}\n", s.total_missed_calls));
        out.push_str(&format!("on_break_calls,{}\n", s.total_on_break_calls));
        out.push_str(&format!("redirected_calls,{}\n", s.total_redirected_calls));
        out.push_str(&format!("outgoing_calls,{}\n", s.total_outgoing_calls));
        out.push_str(&format!("answer_rate,{:.2}\n", s.answer_rate));
        out.push_str(&format!("work_hours_calls,{}\n", s.work_hours_calls));
        out.push_str(&format!("after_hours_calls,{}\n", s.after_hours_calls));
        out.push('\n');

        out.push_str("department,direction,total,answered,missed,on_break,redirected,answer_rate\n");
        for (direction, rows) in [
            ("incoming", &document.departments.incoming),
            ("outgoing", &document.departments.outgoing),
            ("internal", &document.departments.internal),
        ] {
            for row in rows {
                out.push_str(&format!(
                    "{},{},{},{},{},{},{},{:.2}\n",
                    csv_escape(&row.department_name),
                    direction,
                    row.total_calls,
                    row.answered_calls,
                    row.missed_calls,
                    row.on_break_calls,
                    row.redirected_calls,
                    row.answer_rate,
                ));
            }
        }

        if !document.break_summaries.is_empty() {
            out.push('\n');
            out.push_str("operator,phone,break_count,total_minutes\n");
            for summary in &document.break_summaries {
                out.push_str(&format!(
                    "{},{},{},{:.1}\n",
                    csv_escape(&summary.operator_name),
                    summary.phone_number,
                    summary.break_count,
                    summary.total_duration_minutes,
                ));
            }
        }

        // The payload keeps the spreadsheet naming convention; only the
        // extension differs for the bundled renderer.
        let file_name = document
            .file_name(cal)
            .replace(".xlsx", ".csv");

        Ok(RenderedReport {
            bytes: out.into_bytes(),
            file_name,
            content_type: "text/csv".to_string(),
        })
    }
}
