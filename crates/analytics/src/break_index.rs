//! Per-agent break overlap index for one reporting window.
//!
//! Built once per report run from the break intervals that overlap the
//! window, then queried per call origination. Intervals without any
//! effective end (legacy rows missing both `end` and `planned_end`) are
//! excluded up front — an unbounded interval must not match everything.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use cdrstats_core::{BreakInterval, BreakKind};

/// Sorted per-agent break intervals overlapping a window.
#[derive(Debug, Default)]
pub struct BreakIndex {
    by_agent: HashMap<String, Vec<BreakInterval>>,
}

impl BreakIndex {
    /// Select intervals overlapping `[start_utc, end_utc)` and group them
    /// by agent, sorted by start. Overlap test: `start < end_utc` and
    /// `effective_end > start_utc`.
    pub fn build(
        breaks: &[BreakInterval],
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> Self {
        let mut by_agent: HashMap<String, Vec<BreakInterval>> = HashMap::new();

        for b in breaks {
            let Some(effective_end) = b.effective_end() else {
                // Fail closed: no effective end means no overlap, not
                // "always overlapping".
                continue;
            };
            if b.start < end_utc && effective_end > start_utc {
                by_agent.entry(b.agent_id.clone()).or_default().push(b.clone());
            }
        }

        for intervals in by_agent.values_mut() {
            intervals.sort_by_key(|b| b.start);
        }

        Self { by_agent }
    }

    /// Whether `instant` falls inside any of the agent's indexed intervals,
    /// closed on both ends: `start <= instant <= effective_end`.
    pub fn is_during_break(&self, agent_id: &str, instant: DateTime<Utc>) -> bool {
        let Some(intervals) = self.by_agent.get(agent_id) else {
            return false;
        };
        intervals.iter().any(|b| {
            b.start <= instant
                && b.effective_end()
                    .map(|end| instant <= end)
                    .unwrap_or(false)
        })
    }

    /// Intervals for one agent, sorted by start.
    pub fn agent_breaks(&self, agent_id: &str) -> &[BreakInterval] {
        self.by_agent
            .get(agent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All indexed intervals of a given kind, still grouped by agent.
    pub fn by_kind(&self, kind: BreakKind) -> HashMap<&str, Vec<&BreakInterval>> {
        let mut out: HashMap<&str, Vec<&BreakInterval>> = HashMap::new();
        for (agent, intervals) in &self.by_agent {
            let of_kind: Vec<&BreakInterval> =
                intervals.iter().filter(|b| b.kind == kind).collect();
            if !of_kind.is_empty() {
                out.insert(agent.as_str(), of_kind);
            }
        }
        out
    }

    pub fn agent_count(&self) -> usize {
        self.by_agent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_agent.is_empty()
    }
}
