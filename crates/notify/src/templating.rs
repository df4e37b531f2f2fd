//! Minijinja rendering for the report email body.
//!
//! The body is a self-contained HTML document: headline metrics table,
//! optional break and end-of-shift tables, and attachment info. The
//! template is a fixed string, so a fresh [`minijinja::Environment`] per
//! render keeps things simple.

use serde::Serialize;

use crate::traits::NotifyError;

/// Headline metrics rendered in the summary table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmailMetrics {
    pub incoming_calls: u64,
    pub answered_calls: u64,
    pub missed_calls: u64,
    pub on_break_calls: u64,
    pub redirected_calls: u64,
    pub outgoing_calls: u64,
    /// Already-rounded percentage.
    pub answer_rate: f64,
}

/// One operator row in a break table.
#[derive(Debug, Clone, Serialize)]
pub struct EmailBreakRow {
    pub operator_name: String,
    pub phone_number: String,
    pub count: usize,
    pub total_duration: String,
    /// Pre-formatted "HH:MM - HH:MM (N m)" lines.
    pub times: Vec<String>,
}

/// Everything the email template needs.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEmailContext {
    pub brand: String,
    pub report_kind: String,
    pub period_start: String,
    pub period_end: String,
    pub generated_at: String,
    pub metrics: EmailMetrics,
    pub breaks: Vec<EmailBreakRow>,
    pub shift_ends: Vec<EmailBreakRow>,
    pub file_name: String,
    pub file_size: String,
    pub records_processed: u64,
}

const BODY_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"></head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
<div style="max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #1a5f7a; border-bottom: 2px solid #1a5f7a; padding-bottom: 10px;">{{ brand }} {{ report_kind }} Call Report</h2>
<p><strong>Report period:</strong> {{ period_start }} - {{ period_end }}<br>
<strong>Generated:</strong> {{ generated_at }}</p>
<h3 style="color: #1a5f7a;">Summary</h3>
<table style="width: 100%; border-collapse: collapse; margin-bottom: 20px;">
<tr><td style="padding: 8px; border-bottom: 1px solid #ddd;">Incoming calls</td><td style="padding: 8px; border-bottom: 1px solid #ddd; text-align: right; font-weight: bold;">{{ metrics.incoming_calls }}</td></tr>
<tr><td style="padding: 8px; border-bottom: 1px solid #ddd;">Answered calls</td><td style="padding: 8px; border-bottom: 1px solid #ddd; text-align: right; font-weight: bold;">{{ metrics.answered_calls }}</td></tr>
<tr><td style="padding: 8px; border-bottom: 1px solid #ddd;">Missed calls</td><td style="padding: 8px; border-bottom: 1px solid #ddd; text-align: right; font-weight: bold;">{{ metrics.missed_calls }}</td></tr>
<tr><td style="padding: 8px; border-bottom: 1px solid #ddd;">Calls during breaks</td><td style="padding: 8px; border-bottom: 1px solid #ddd; text-align: right; font-weight: bold;">{{ metrics.on_break_calls }}</td></tr>
<tr><td style="padding: 8px; border-bottom: 1px solid #ddd;">Redirected calls</td><td style="padding: 8px; border-bottom: 1px solid #ddd; text-align: right; font-weight: bold;">{{ metrics.redirected_calls }}</td></tr>
<tr><td style="padding: 8px; border-bottom: 1px solid #ddd;">Answer rate</td><td style="padding: 8px; border-bottom: 1px solid #ddd; text-align: right; font-weight: bold;">{{ metrics.answer_rate }}%</td></tr>
<tr><td style="padding: 8px; border-bottom: 1px solid #ddd;">Outgoing calls</td><td style="padding: 8px; border-bottom: 1px solid #ddd; text-align: right; font-weight: bold;">{{ metrics.outgoing_calls }}</td></tr>
</table>
{% if breaks %}
<h3 style="color: #1a5f7a;">Breaks</h3>
<table style="width: 100%; border-collapse: collapse; margin-bottom: 20px;">
<tr style="background-color: #1a5f7a; color: white;"><th style="padding: 8px; text-align: left;">Operator</th><th style="padding: 8px; text-align: center;">Breaks</th><th style="padding: 8px; text-align: center;">Total</th><th style="padding: 8px; text-align: left;">Times</th></tr>
{% for row in breaks %}
<tr><td style="padding: 8px; border-bottom: 1px solid #ddd;">{{ row.operator_name }}<br><small style="color: #666;">{{ row.phone_number }}</small></td><td style="padding: 8px; border-bottom: 1px solid #ddd; text-align: center; font-weight: bold;">{{ row.count }}</td><td style="padding: 8px; border-bottom: 1px solid #ddd; text-align: center;">{{ row.total_duration }}</td><td style="padding: 8px; border-bottom: 1px solid #ddd; font-size: 12px;">{{ row.times|join("<br>") }}</td></tr>
{% endfor %}
</table>
{% endif %}
{% if shift_ends %}
<h3 style="color: #d97706;">End of shift</h3>
<table style="width: 100%; border-collapse: collapse; margin-bottom: 20px;">
<tr style="background-color: #d97706; color: white;"><th style="padding: 8px; text-align: left;">Operator</th><th style="padding: 8px; text-align: center;">Entries</th><th style="padding: 8px; text-align: center;">Total</th><th style="padding: 8px; text-align: left;">Times</th></tr>
{% for row in shift_ends %}
<tr><td style="padding: 8px; border-bottom: 1px solid #ddd;">{{ row.operator_name }}<br><small style="color: #666;">{{ row.phone_number }}</small></td><td style="padding: 8px; border-bottom: 1px solid #ddd; text-align: center; font-weight: bold;">{{ row.count }}</td><td style="padding: 8px; border-bottom: 1px solid #ddd; text-align: center;">{{ row.total_duration }}</td><td style="padding: 8px; border-bottom: 1px solid #ddd; font-size: 12px;">{{ row.times|join("<br>") }}</td></tr>
{% endfor %}
</table>
{% endif %}
<h3 style="color: #1a5f7a;">Attachment</h3>
<p><strong>File:</strong> {{ file_name }}<br>
<strong>Size:</strong> {{ file_size }}<br>
<strong>Records:</strong> {{ records_processed }}</p>
<hr style="border: none; border-top: 1px solid #ddd; margin: 20px 0;">
<p style="font-size: 12px; color: #666;">This email was generated automatically by the {{ brand }} call reporting system.<br>
Contact your system administrator with any questions.</p>
</div>
</body>
</html>
"#;

/// Render the report email body.
pub fn render_report_email(ctx: &ReportEmailContext) -> Result<String, NotifyError> {
    let env = minijinja::Environment::new();
    env.render_str(BODY_TEMPLATE, ctx)
        .map_err(|e| NotifyError::Template(e.to_string()))
}

/// Subject line for a report email.
pub fn email_subject(brand: &str, report_kind: &str, period_start: &str, period_end: &str) -> String {
    format!("[{brand}] {report_kind} Call Report - {period_start} - {period_end}")
}

/// "H h M m" display for a minute total.
pub fn format_minutes(total_minutes: f64) -> String {
    let hours = (total_minutes / 60.0) as i64;
    let minutes = (total_minutes % 60.0) as i64;
    if hours > 0 {
        format!("{hours} h {minutes} m")
    } else {
        format!("{minutes} m")
    }
}

/// Human-readable byte size.
pub fn format_file_size(bytes: i64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
