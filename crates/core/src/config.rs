use std::env;

use serde::{Deserialize, Serialize};

use crate::calendar::LocalCalendar;
use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u16(key: &str, default: u16) -> u16 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i32(key: &str, default: i32) -> i32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Parse a comma-separated env var into a trimmed list.
fn env_list(key: &str) -> Vec<String> {
    env_opt(key)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub calendar: CalendarConfig,
    pub work_hours: WorkHoursConfig,
    pub smtp: SmtpConfig,
    pub reporting: ReportingConfig,
    pub delivery: DeliveryConfig,
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            calendar: CalendarConfig::from_env(),
            work_hours: WorkHoursConfig::from_env(),
            smtp: SmtpConfig::from_env(),
            reporting: ReportingConfig::from_env(),
            delivery: DeliveryConfig::from_env(),
            scheduler: SchedulerConfig::from_env(),
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  calendar:   utc_offset_hours={}", self.calendar.utc_offset_hours);
        tracing::info!(
            "  work_hours: {:02}:{:02}-{:02}:{:02}",
            self.work_hours.start_hour,
            self.work_hours.start_minute,
            self.work_hours.end_hour,
            self.work_hours.end_minute
        );
        tracing::info!(
            "  smtp:       host={}, port={}, from={}",
            self.smtp.host,
            self.smtp.port,
            self.smtp.from
        );
        tracing::info!(
            "  reporting:  default_recipients={}, excluded={}",
            self.reporting.default_recipients.len(),
            self.reporting.excluded_recipients.len()
        );
        tracing::info!(
            "  delivery:   max_attempts={}, retry_delay_secs={}, timeout_minutes={}",
            self.delivery.max_attempts,
            self.delivery.retry_delay_secs,
            self.delivery.timeout_minutes
        );
        tracing::info!(
            "  scheduler:  tick_secs={}, queue_capacity={}",
            self.scheduler.tick_secs,
            self.scheduler.queue_capacity
        );
    }
}

// ── Local calendar ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Fixed offset east of UTC, whole hours. Default +3.
    pub utc_offset_hours: i32,
}

impl CalendarConfig {
    fn from_env() -> Self {
        Self {
            utc_offset_hours: env_i32("CDR_UTC_OFFSET_HOURS", 3),
        }
    }

    pub fn local_calendar(&self) -> LocalCalendar {
        LocalCalendar::from_hours(self.utc_offset_hours)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(CoreError::Config(format!(
                "utc_offset_hours {} out of range",
                self.utc_offset_hours
            )));
        }
        Ok(())
    }
}

// ── Work hours ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkHoursConfig {
    pub start_hour: u32,
    pub start_minute: u32,
    pub end_hour: u32,
    pub end_minute: u32,
}

impl WorkHoursConfig {
    fn from_env() -> Self {
        Self {
            start_hour: env_u32("WORK_HOURS_START_HOUR", 7),
            start_minute: env_u32("WORK_HOURS_START_MINUTE", 45),
            end_hour: env_u32("WORK_HOURS_END_HOUR", 16),
            end_minute: env_u32("WORK_HOURS_END_MINUTE", 45),
        }
    }
}

impl Default for WorkHoursConfig {
    /// Staffed window 07:45–16:45 local, inclusive on both ends.
    fn default() -> Self {
        Self {
            start_hour: 7,
            start_minute: 45,
            end_hour: 16,
            end_minute: 45,
        }
    }
}

// ── SMTP ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub from: String,
}

impl SmtpConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("SMTP_HOST", "localhost"),
            port: env_u16("SMTP_PORT", 587),
            tls: env_or("SMTP_TLS", "true") == "true",
            from: env_or("SMTP_FROM", "reports@example.com"),
        }
    }
}

// ── Reporting ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Brand line used in email subjects and headers.
    pub brand: String,
    /// Static recipient list used when the directory lookup fails.
    pub default_recipients: Vec<String>,
    /// Addresses never to send to (e.g. switchboard staff).
    pub excluded_recipients: Vec<String>,
    /// Directory where rendered report files are written before attach.
    pub storage_path: String,
}

impl ReportingConfig {
    fn from_env() -> Self {
        Self {
            brand: env_or("REPORT_BRAND", "Call Center"),
            default_recipients: env_list("REPORT_DEFAULT_RECIPIENTS"),
            excluded_recipients: env_list("REPORT_EXCLUDED_RECIPIENTS"),
            storage_path: env_or("REPORT_STORAGE_PATH", "reports"),
        }
    }
}

// ── Delivery ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Delivery attempts per recipient.
    pub max_attempts: u32,
    /// Wait between failed attempts, seconds.
    pub retry_delay_secs: u64,
    /// Pause between recipients, milliseconds.
    pub recipient_delay_ms: u64,
    /// Wall-clock ceiling for one generate+deliver run, minutes.
    pub timeout_minutes: u64,
}

impl DeliveryConfig {
    fn from_env() -> Self {
        Self {
            max_attempts: env_u32("DELIVERY_MAX_ATTEMPTS", 3),
            retry_delay_secs: env_u64("DELIVERY_RETRY_DELAY_SECS", 300),
            recipient_delay_ms: env_u64("DELIVERY_RECIPIENT_DELAY_MS", 2000),
            timeout_minutes: env_u64("REPORT_TIMEOUT_MINUTES", 30),
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Scheduler loop tick interval, seconds.
    pub tick_secs: u64,
    /// Bounded job queue capacity.
    pub queue_capacity: usize,
    /// Cron for the daily report (5-field, local time).
    pub daily_cron: String,
    /// Cron for the weekly report.
    pub weekly_cron: String,
    /// Cron for the monthly report.
    pub monthly_cron: String,
    /// Backoff delays between scheduled-job retries, seconds.
    pub retry_delays_secs: Vec<u64>,
}

impl SchedulerConfig {
    fn from_env() -> Self {
        let retry_delays_secs = env_list("SCHEDULER_RETRY_DELAYS_SECS")
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect::<Vec<u64>>();
        Self {
            tick_secs: env_u64("SCHEDULER_TICK_SECS", 30),
            queue_capacity: env_u64("SCHEDULER_QUEUE_CAPACITY", 64) as usize,
            daily_cron: env_or("SCHEDULER_DAILY_CRON", "0 6 * * *"),
            weekly_cron: env_or("SCHEDULER_WEEKLY_CRON", "0 2 * * MON"),
            monthly_cron: env_or("SCHEDULER_MONTHLY_CRON", "0 2 1 * *"),
            retry_delays_secs: if retry_delays_secs.is_empty() {
                vec![300, 600, 1200]
            } else {
                retry_delays_secs
            },
        }
    }
}
