//! Trend-chart bucket rollups.
//!
//! These feed the dashboard charts and intentionally use a looser legacy
//! metric than the report aggregations: `connected records / total records
//! × 100` per bucket, with no redirect or on-break refinement. The two
//! formulas coexist on purpose — do not fold this into
//! [`crate::aggregate::answer_rate`] without product sign-off.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use cdrstats_core::{CallRecord, LocalCalendar};

/// The legacy chart percentage: connected share of all records in the
/// bucket. Zero for an empty bucket.
pub fn connected_share(connected: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    connected as f64 / total as f64 * 100.0
}

fn tally<'a>(records: impl Iterator<Item = &'a CallRecord>) -> (u64, u64) {
    let mut total = 0;
    let mut connected = 0;
    for record in records {
        total += 1;
        if record.connected() {
            connected += 1;
        }
    }
    (total, connected)
}

// ── Trailing seven local days ───────────────────────────────────────

/// One day in the trailing-week chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyTrendBucket {
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub day_of_week: Weekday,
    pub total_records: u64,
    pub connected_records: u64,
    pub percentage: f64,
}

/// Buckets for the trailing seven local days, today first.
pub fn daily_trend(
    records: &[CallRecord],
    cal: LocalCalendar,
    reference: DateTime<Utc>,
) -> Vec<DailyTrendBucket> {
    let today = cal.local_date(reference);

    (0..7)
        .map(|i| {
            let date = today - Duration::days(i);
            let (total, connected) =
                tally(records.iter().filter(|r| cal.local_date(r.origination) == date));
            DailyTrendBucket {
                date,
                year: date.year(),
                month: date.month(),
                day_of_week: date.weekday(),
                total_records: total,
                connected_records: connected,
                percentage: connected_share(connected, total),
            }
        })
        .collect()
}

// ── Monthly ─────────────────────────────────────────────────────────

/// One month in the monthly chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyTrendBucket {
    pub year: i32,
    pub month: u32,
    pub total_records: u64,
    pub connected_records: u64,
    pub percentage: f64,
}

/// Group records into local (year, month) buckets, sorted ascending.
pub fn monthly_trend(records: &[CallRecord], cal: LocalCalendar) -> Vec<MonthlyTrendBucket> {
    let mut keys: Vec<(i32, u32)> = records
        .iter()
        .map(|r| {
            let d = cal.local_date(r.origination);
            (d.year(), d.month())
        })
        .collect();
    keys.sort_unstable();
    keys.dedup();

    keys.into_iter()
        .map(|(year, month)| {
            let (total, connected) = tally(records.iter().filter(|r| {
                let d = cal.local_date(r.origination);
                d.year() == year && d.month() == month
            }));
            MonthlyTrendBucket {
                year,
                month,
                total_records: total,
                connected_records: connected,
                percentage: connected_share(connected, total),
            }
        })
        .collect()
}

// ── Quarterly ───────────────────────────────────────────────────────

/// Fixed calendar quarter (Q1 = Jan–Mar, and so on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub fn of_month(month: u32) -> Self {
        match month {
            1..=3 => Quarter::Q1,
            4..=6 => Quarter::Q2,
            7..=9 => Quarter::Q3,
            _ => Quarter::Q4,
        }
    }
}

impl std::fmt::Display for Quarter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Quarter::Q1 => write!(f, "Q1"),
            Quarter::Q2 => write!(f, "Q2"),
            Quarter::Q3 => write!(f, "Q3"),
            Quarter::Q4 => write!(f, "Q4"),
        }
    }
}

/// One quarter in the yearly chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarterlyTrendBucket {
    pub year: i32,
    pub quarter: Quarter,
    pub total_records: u64,
    pub connected_records: u64,
    pub percentage: f64,
}

/// Group records into local (year, quarter) buckets, sorted ascending.
pub fn quarterly_trend(records: &[CallRecord], cal: LocalCalendar) -> Vec<QuarterlyTrendBucket> {
    let mut keys: Vec<(i32, Quarter)> = records
        .iter()
        .map(|r| {
            let d = cal.local_date(r.origination);
            (d.year(), Quarter::of_month(d.month()))
        })
        .collect();
    keys.sort_unstable();
    keys.dedup();

    keys.into_iter()
        .map(|(year, quarter)| {
            let (total, connected) = tally(records.iter().filter(|r| {
                let d = cal.local_date(r.origination);
                d.year() == year && Quarter::of_month(d.month()) == quarter
            }));
            QuarterlyTrendBucket {
                year,
                quarter,
                total_records: total,
                connected_records: connected,
                percentage: connected_share(connected, total),
            }
        })
        .collect()
}
