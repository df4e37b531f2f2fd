//! Work-hours classification.
//!
//! An instant counts as work hours when its local date is a weekday that is
//! not a holiday and its local time-of-day falls within the staffed window,
//! inclusive on both boundaries. Weekend and holiday checks come before the
//! time-of-day check, so a Saturday 10:00 call is after-hours no matter
//! what the holiday data says.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc, Weekday};

use cdrstats_core::{HolidaySet, LocalCalendar, WorkHoursConfig};

fn window(config: &WorkHoursConfig) -> (NaiveTime, NaiveTime) {
    let start = NaiveTime::from_hms_opt(config.start_hour, config.start_minute, 0)
        .unwrap_or_else(|| NaiveTime::from_hms_opt(7, 45, 0).unwrap());
    let end = NaiveTime::from_hms_opt(config.end_hour, config.end_minute, 0)
        .unwrap_or_else(|| NaiveTime::from_hms_opt(16, 45, 0).unwrap());
    (start, end)
}

/// Whether a UTC instant falls inside local business hours.
pub fn is_work_hours(
    cal: LocalCalendar,
    config: &WorkHoursConfig,
    instant: DateTime<Utc>,
    holidays: &HolidaySet,
) -> bool {
    let local = cal.to_local(instant);

    let weekday = local.weekday();
    if weekday == Weekday::Sat || weekday == Weekday::Sun {
        return false;
    }

    if holidays.contains(local.date_naive()) {
        return false;
    }

    let (start, end) = window(config);
    let time_of_day =
        NaiveTime::from_hms_opt(local.hour(), local.minute(), local.second()).unwrap();
    time_of_day >= start && time_of_day <= end
}

/// Number of staffed local days in `[start_utc, end_utc)`: weekdays that
/// are not holidays.
pub fn work_days_in_period(
    cal: LocalCalendar,
    start_utc: DateTime<Utc>,
    end_utc: DateTime<Utc>,
    holidays: &HolidaySet,
) -> u32 {
    let start = cal.local_date(start_utc);
    let end = cal.local_date(end_utc - Duration::seconds(1));

    let mut days = 0;
    let mut date = start;
    while date <= end {
        let weekday = date.weekday();
        if weekday != Weekday::Sat && weekday != Weekday::Sun && !holidays.contains(date) {
            days += 1;
        }
        date += Duration::days(1);
    }
    days
}
