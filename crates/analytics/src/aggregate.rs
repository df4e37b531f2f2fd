//! Statistics rollups over classified calls.
//!
//! Every answer-rate figure in the system comes from [`answer_rate`]. The
//! per-number view, the per-department rollup, and the report summary all
//! call it with their own counts — the formula lives in exactly one place.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use cdrstats_core::{
    BreakDetail, BreakInterval, BreakKind, CallDirection, CallRecord, Department, HolidaySet,
    LocalCalendar, Operator, OperatorBreakSummary, WorkHoursConfig,
};

use crate::break_index::BreakIndex;
use crate::classify::{classify, CallDisposition};
use crate::workhours::is_work_hours;

/// Round to two decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The one shared answer-rate formula, as a percentage rounded to two
/// decimals: `answered / (incoming − redirected − on_break) × 100`.
/// Returns 0 when the denominator is not positive.
pub fn answer_rate(answered: u64, incoming: u64, redirected: u64, on_break: u64) -> f64 {
    let denominator = incoming as i64 - redirected as i64 - on_break as i64;
    if denominator <= 0 {
        return 0.0;
    }
    round2(answered as f64 / denominator as f64 * 100.0)
}

// ── Disposition counts ──────────────────────────────────────────────

/// Plain disposition tallies for a set of (call, agent) pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispositionCounts {
    pub total: u64,
    pub answered: u64,
    pub missed: u64,
    pub on_break: u64,
    pub redirected: u64,
}

impl DispositionCounts {
    pub fn record(&mut self, disposition: CallDisposition) {
        self.total += 1;
        match disposition {
            CallDisposition::Answered => self.answered += 1,
            CallDisposition::Missed => self.missed += 1,
            CallDisposition::OnBreak => self.on_break += 1,
            CallDisposition::Redirected => self.redirected += 1,
        }
    }

    pub fn answer_rate(&self) -> f64 {
        answer_rate(self.answered, self.total, self.redirected, self.on_break)
    }
}

// ── Per-number statistics ───────────────────────────────────────────

/// Incoming-call statistics for one extension number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumberStatistics {
    pub number: String,
    /// Answered + missed + on-break + redirected.
    pub incoming_calls: u64,
    pub answered_calls: u64,
    pub missed_calls: u64,
    pub redirected_calls: u64,
    pub on_break_calls: u64,
    pub answer_rate: f64,
    /// Talk-time stats over connected calls the number took part in, seconds.
    pub min_duration: i64,
    pub max_duration: i64,
    pub avg_duration: f64,
}

/// Statistics for one number over a record set already scoped to the
/// reporting window.
pub fn number_statistics(
    records: &[CallRecord],
    number: &str,
    breaks: &BreakIndex,
) -> NumberStatistics {
    let mut counts = DispositionCounts::default();

    for call in records
        .iter()
        .filter(|c| c.direction == CallDirection::Incoming)
    {
        // The number's perspective exists when it was dialed or finally
        // answered; calls it merely placed are not incoming work.
        if call.original_called_number != number && call.final_called_number != number {
            continue;
        }
        counts.record(classify(call, number, breaks));
    }

    let durations: Vec<i64> = records
        .iter()
        .filter(|c| {
            c.connected()
                && (c.calling_number == number
                    || c.original_called_number == number
                    || c.final_called_number == number)
        })
        .map(|c| c.duration_secs)
        .collect();

    let (min_duration, max_duration, avg_duration) = if durations.is_empty() {
        (0, 0, 0.0)
    } else {
        let sum: i64 = durations.iter().sum();
        (
            *durations.iter().min().unwrap(),
            *durations.iter().max().unwrap(),
            round2(sum as f64 / durations.len() as f64),
        )
    };

    NumberStatistics {
        number: number.to_string(),
        incoming_calls: counts.total,
        answered_calls: counts.answered,
        missed_calls: counts.missed,
        redirected_calls: counts.redirected,
        on_break_calls: counts.on_break,
        answer_rate: counts.answer_rate(),
        min_duration,
        max_duration,
        avg_duration,
    }
}

// ── Per-department statistics ───────────────────────────────────────

/// One department's rollup for a single call direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentStatistics {
    pub department_name: String,
    pub total_calls: u64,
    pub answered_calls: u64,
    pub missed_calls: u64,
    pub on_break_calls: u64,
    pub redirected_calls: u64,
    pub answer_rate: f64,
}

/// Department rollups split by call direction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepartmentStatisticsByDirection {
    pub incoming: Vec<DepartmentStatistics>,
    pub outgoing: Vec<DepartmentStatistics>,
    pub internal: Vec<DepartmentStatistics>,
}

fn department_rollup(
    pairs: &[(&CallRecord, &Operator)],
    department_names: &HashMap<&str, &str>,
    breaks: &BreakIndex,
    refine_incoming: bool,
) -> Vec<DepartmentStatistics> {
    // IndexMap keeps department ordering stable across runs.
    let mut grouped: IndexMap<String, DispositionCounts> = IndexMap::new();

    for (call, operator) in pairs {
        let Some(dept_id) = operator.department_id.as_deref() else {
            continue;
        };
        let Some(name) = department_names.get(dept_id) else {
            continue;
        };
        let counts = grouped.entry(name.to_string()).or_default();
        if refine_incoming {
            counts.record(classify(call, &operator.phone_number, breaks));
        } else {
            // Outgoing/internal have no redirect or break refinement.
            counts.total += 1;
            if call.connected() {
                counts.answered += 1;
            } else {
                counts.missed += 1;
            }
        }
    }

    grouped
        .into_iter()
        .map(|(department_name, c)| DepartmentStatistics {
            department_name,
            total_calls: c.total,
            answered_calls: c.answered,
            missed_calls: c.missed,
            on_break_calls: c.on_break,
            redirected_calls: c.redirected,
            answer_rate: c.answer_rate(),
        })
        .collect()
}

/// Roll records up per department, attaching each call to the operators it
/// involved (calling party and originally dialed party).
pub fn department_statistics(
    records: &[CallRecord],
    operators: &[Operator],
    departments: &[Department],
    breaks: &BreakIndex,
) -> DepartmentStatisticsByDirection {
    let by_number: HashMap<&str, &Operator> = operators
        .iter()
        .map(|o| (o.phone_number.as_str(), o))
        .collect();
    let department_names: HashMap<&str, &str> = departments
        .iter()
        .map(|d| (d.id.as_str(), d.name.as_str()))
        .collect();

    let pairs_for = |direction: CallDirection| -> Vec<(&CallRecord, &Operator)> {
        records
            .iter()
            .filter(|c| c.direction == direction)
            .flat_map(|c| {
                [
                    by_number.get(c.calling_number.as_str()),
                    by_number.get(c.original_called_number.as_str()),
                ]
                .into_iter()
                .flatten()
                .map(move |op| (c, *op))
            })
            .collect()
    };

    DepartmentStatisticsByDirection {
        incoming: department_rollup(
            &pairs_for(CallDirection::Incoming),
            &department_names,
            breaks,
            true,
        ),
        outgoing: department_rollup(
            &pairs_for(CallDirection::Outgoing),
            &department_names,
            breaks,
            false,
        ),
        internal: department_rollup(
            &pairs_for(CallDirection::Internal),
            &department_names,
            breaks,
            false,
        ),
    }
}

// ── Work-hours split ────────────────────────────────────────────────

/// Count incoming originations inside and outside local business hours.
pub fn work_hours_split(
    records: &[CallRecord],
    cal: LocalCalendar,
    config: &WorkHoursConfig,
    holidays: &HolidaySet,
) -> (u64, u64) {
    let mut work = 0;
    let mut after = 0;
    for call in records
        .iter()
        .filter(|c| c.direction == CallDirection::Incoming)
    {
        if is_work_hours(cal, config, call.origination, holidays) {
            work += 1;
        } else {
            after += 1;
        }
    }
    (work, after)
}

// ── Break summaries ─────────────────────────────────────────────────

/// Round minutes to one decimal, matching the report display precision.
fn round_minutes(minutes: f64) -> f64 {
    (minutes * 10.0).round() / 10.0
}

/// Build per-operator break rollups for intervals of one kind, sorted by
/// break count descending. Break intervals carry the agent's extension
/// number, so the operator lookup goes through the phone number.
pub fn build_break_summaries(
    breaks: &[BreakInterval],
    kind: BreakKind,
    operators: &[Operator],
    cal: LocalCalendar,
) -> Vec<OperatorBreakSummary> {
    let by_number: HashMap<&str, &Operator> = operators
        .iter()
        .map(|o| (o.phone_number.as_str(), o))
        .collect();

    let mut grouped: IndexMap<&str, Vec<&BreakInterval>> = IndexMap::new();
    for b in breaks.iter().filter(|b| b.kind == kind) {
        grouped.entry(b.agent_id.as_str()).or_default().push(b);
    }

    let mut summaries: Vec<OperatorBreakSummary> = grouped
        .into_iter()
        .map(|(agent_id, mut intervals)| {
            intervals.sort_by_key(|b| b.start);
            let operator = by_number.get(agent_id);

            let mut total_minutes = 0.0;
            let details: Vec<BreakDetail> = intervals
                .iter()
                .map(|b| {
                    let minutes = b.duration_minutes();
                    total_minutes += minutes;
                    BreakDetail {
                        start_local: cal.to_local(b.start),
                        end_local: b.end.map(|e| cal.to_local(e)),
                        duration_minutes: round_minutes(minutes),
                        reason: b.reason.clone(),
                    }
                })
                .collect();

            OperatorBreakSummary {
                operator_name: operator
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                phone_number: agent_id.to_string(),
                break_count: details.len(),
                total_duration_minutes: round_minutes(total_minutes),
                breaks: details,
            }
        })
        .collect();

    summaries.sort_by(|a, b| b.break_count.cmp(&a.break_count));
    summaries
}
