//! Reporting period resolution against the fixed-offset local calendar.
//!
//! Every period is a half-open UTC range `[start, end)` whose boundaries
//! fall on local midnights. Daily is the previous complete local day,
//! weekly the previous complete Monday–Sunday week, monthly the previous
//! calendar month first-to-first. Custom periods take caller-supplied
//! local dates with an exclusive next-midnight end.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use cdrstats_core::{CoreError, LocalCalendar, ReportKind};

/// A resolved reporting window, UTC, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
}

impl ReportPeriod {
    /// The previous complete local day relative to `reference`.
    pub fn daily(cal: LocalCalendar, reference: DateTime<Utc>) -> Self {
        let today = cal.local_date(reference);
        let yesterday = today - Duration::days(1);
        Self {
            start_utc: cal.start_of_day_utc(yesterday),
            end_utc: cal.start_of_day_utc(today),
        }
    }

    /// The previous complete Monday–Sunday week relative to `reference`:
    /// back to this week's Monday, then one more week. End is the following
    /// Monday midnight, exclusive.
    pub fn weekly(cal: LocalCalendar, reference: DateTime<Utc>) -> Self {
        let today = cal.local_date(reference);
        let days_from_monday = today.weekday().num_days_from_monday() as i64;
        let previous_monday = today - Duration::days(days_from_monday + 7);
        Self {
            start_utc: cal.start_of_day_utc(previous_monday),
            end_utc: cal.start_of_day_utc(previous_monday + Duration::days(7)),
        }
    }

    /// The previous calendar month, first-to-first.
    pub fn monthly(cal: LocalCalendar, reference: DateTime<Utc>) -> Self {
        let today = cal.local_date(reference);
        let first_of_this_month = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap();
        let first_of_previous = if today.month() == 1 {
            NaiveDate::from_ymd_opt(today.year() - 1, 12, 1).unwrap()
        } else {
            NaiveDate::from_ymd_opt(today.year(), today.month() - 1, 1).unwrap()
        };
        Self {
            start_utc: cal.start_of_day_utc(first_of_previous),
            end_utc: cal.start_of_day_utc(first_of_this_month),
        }
    }

    /// A caller-supplied inclusive local date range; the end is treated as
    /// exclusive next-local-midnight.
    pub fn custom(
        cal: LocalCalendar,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self, CoreError> {
        if start > end {
            return Err(CoreError::InvalidPeriod(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        let (start_utc, end_utc) = cal.range_to_utc(start, end);
        Ok(Self { start_utc, end_utc })
    }

    /// Resolve the period for a report kind at a reference instant.
    /// `Custom` has no implicit bounds and must go through [`Self::custom`].
    pub fn resolve(
        kind: ReportKind,
        cal: LocalCalendar,
        reference: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        match kind {
            ReportKind::Daily => Ok(Self::daily(cal, reference)),
            ReportKind::Weekly => Ok(Self::weekly(cal, reference)),
            ReportKind::Monthly => Ok(Self::monthly(cal, reference)),
            ReportKind::Custom => Err(CoreError::InvalidPeriod(
                "custom periods require explicit bounds".to_string(),
            )),
        }
    }

    /// First local date included in the period.
    pub fn start_local_date(&self, cal: LocalCalendar) -> NaiveDate {
        cal.local_date(self.start_utc)
    }

    /// Last local date included in the period (the end boundary itself is
    /// exclusive).
    pub fn end_local_date_inclusive(&self, cal: LocalCalendar) -> NaiveDate {
        cal.local_date(self.end_utc - Duration::seconds(1))
    }

    /// Whole days covered by the period.
    pub fn num_days(&self) -> i64 {
        (self.end_utc - self.start_utc).num_days()
    }

    /// Report file name: `{Kind}_{yyyyMMdd}-{yyyyMMdd}.xlsx` over local dates.
    pub fn file_name(&self, kind: ReportKind, cal: LocalCalendar) -> String {
        format!(
            "{}_{}-{}.xlsx",
            kind,
            self.start_local_date(cal).format("%Y%m%d"),
            self.end_local_date_inclusive(cal).format("%Y%m%d")
        )
    }
}
