//! Fixed-offset local calendar used for all period and work-hours math.
//!
//! The call center operates on a single fixed-offset local calendar
//! (UTC+3 by default). Keeping the offset fixed makes every local↔UTC
//! conversion an exact round trip — there is no DST ambiguity to handle.
//! The calendar is passed explicitly wherever local dates matter; nothing
//! reads process-global timezone state.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A fixed-offset local calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCalendar {
    offset_secs: i32,
}

impl LocalCalendar {
    /// Calendar at a fixed offset east of UTC, in whole hours.
    pub fn from_hours(hours: i32) -> Self {
        Self {
            offset_secs: hours * 3600,
        }
    }

    /// Calendar at a fixed offset east of UTC, in seconds.
    pub fn from_secs(secs: i32) -> Self {
        Self { offset_secs: secs }
    }

    pub fn offset(&self) -> FixedOffset {
        // Offsets are validated at config parse time; whole-hour values
        // are always in range.
        FixedOffset::east_opt(self.offset_secs).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }

    /// Convert a UTC instant to local wall-clock time.
    pub fn to_local(&self, utc: DateTime<Utc>) -> DateTime<FixedOffset> {
        utc.with_timezone(&self.offset())
    }

    /// Convert local wall-clock time (naive) to the UTC instant it names.
    /// Fixed offset: every naive local time maps to exactly one instant.
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        Utc.from_utc_datetime(&(local - chrono::Duration::seconds(self.offset_secs as i64)))
    }

    /// The local calendar date a UTC instant falls on.
    pub fn local_date(&self, utc: DateTime<Utc>) -> NaiveDate {
        self.to_local(utc).date_naive()
    }

    /// Local midnight at the start of `date`, as a UTC instant.
    pub fn start_of_day_utc(&self, date: NaiveDate) -> DateTime<Utc> {
        self.to_utc(date.and_hms_opt(0, 0, 0).unwrap())
    }

    /// Next local midnight after `date`, as a UTC instant. Use with `<`
    /// for an exclusive end boundary.
    pub fn end_of_day_utc(&self, date: NaiveDate) -> DateTime<Utc> {
        self.start_of_day_utc(date.succ_opt().unwrap_or(date))
    }

    /// Convert an inclusive local date range to a half-open UTC range:
    /// `[start midnight, day-after-end midnight)`.
    pub fn range_to_utc(&self, start: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start_of_day_utc(start), self.end_of_day_utc(end))
    }

    /// Days since Monday for the local date of a UTC instant (Mon=0..Sun=6).
    pub fn days_from_monday(&self, utc: DateTime<Utc>) -> i64 {
        self.local_date(utc).weekday().num_days_from_monday() as i64
    }
}

impl Default for LocalCalendar {
    /// Turkey Standard Time, UTC+3.
    fn default() -> Self {
        Self::from_hours(3)
    }
}
