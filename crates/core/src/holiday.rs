//! Holiday rules and their expansion over a date range.
//!
//! Rules come in two shapes: an explicit year-dated day, or a recurring
//! month/day pattern that applies to every year. Expansion resolves both
//! into a concrete set of local dates once, so downstream classification
//! works against a plain set membership test.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// When a holiday applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HolidayDate {
    /// A specific year-dated day.
    Explicit(NaiveDate),
    /// Every year on the given month/day. Feb-29 rules simply produce no
    /// date in non-leap years.
    Recurring { month: u32, day: u32 },
}

/// A single holiday calendar row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayRule {
    pub name: String,
    pub date: HolidayDate,
    pub active: bool,
}

impl HolidayRule {
    pub fn explicit(name: &str, date: NaiveDate) -> Self {
        Self {
            name: name.to_string(),
            date: HolidayDate::Explicit(date),
            active: true,
        }
    }

    pub fn recurring(name: &str, month: u32, day: u32) -> Self {
        Self {
            name: name.to_string(),
            date: HolidayDate::Recurring { month, day },
            active: true,
        }
    }
}

/// Concrete holiday dates for one reporting period.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HolidaySet {
    dates: BTreeSet<NaiveDate>,
}

impl HolidaySet {
    /// Empty set — used when holiday lookup fails and classification
    /// degrades to "no holidays".
    pub fn empty() -> Self {
        Self::default()
    }

    /// Expand rules into concrete dates within `[start, end]` (inclusive
    /// local dates). Inactive rules are skipped. Recurring rules are
    /// instantiated for every year the range touches.
    pub fn expand(rules: &[HolidayRule], start: NaiveDate, end: NaiveDate) -> Self {
        let mut dates = BTreeSet::new();

        for rule in rules.iter().filter(|r| r.active) {
            match rule.date {
                HolidayDate::Explicit(date) => {
                    if date >= start && date <= end {
                        dates.insert(date);
                    }
                }
                HolidayDate::Recurring { month, day } => {
                    for year in start.year()..=end.year() {
                        // Feb-29 in a non-leap year yields None and is skipped.
                        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                            if date >= start && date <= end {
                                dates.insert(date);
                            }
                        }
                    }
                }
            }
        }

        Self { dates }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NaiveDate> {
        self.dates.iter()
    }
}
