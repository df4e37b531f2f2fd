//! Call-center analytics over resolved CDR records.
//!
//! This crate provides:
//! - Period resolution for daily/weekly/monthly/custom reporting windows
//! - Work-hours classification with holiday awareness
//! - Per-agent break overlap index
//! - Call disposition classification (answered/missed/on-break/redirected)
//! - Per-number, per-department, and summary aggregations sharing one
//!   answer-rate formula
//! - Legacy trend-chart bucket rollups (deliberately a separate metric)

pub mod aggregate;
pub mod break_index;
pub mod classify;
pub mod period;
pub mod trend;
pub mod workhours;

pub use aggregate::*;
pub use break_index::BreakIndex;
pub use classify::{classify, CallDisposition};
pub use period::ReportPeriod;
pub use trend::{connected_share, daily_trend, monthly_trend, quarterly_trend, Quarter};
pub use workhours::{is_work_hours, work_days_in_period};
