use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a break row is an ordinary break or an end-of-shift marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BreakKind {
    Break,
    EndOfShift,
}

impl std::fmt::Display for BreakKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakKind::Break => write!(f, "Break"),
            BreakKind::EndOfShift => write!(f, "EndOfShift"),
        }
    }
}

/// One agent break interval.
///
/// `end` is `None` while the break is still open; `planned_end` is what the
/// agent committed to when starting it. Legacy rows may carry neither — such
/// intervals have no effective end and are excluded from overlap checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakInterval {
    pub agent_id: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub planned_end: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub kind: BreakKind,
}

impl BreakInterval {
    /// The end used for overlap and duration math: actual end when the
    /// break was closed, planned end while it is still open.
    pub fn effective_end(&self) -> Option<DateTime<Utc>> {
        self.end.or(self.planned_end)
    }

    /// Whether the interval is still open (agent has not ended it).
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Break length in minutes, clamped at zero for inconsistent rows.
    pub fn duration_minutes(&self) -> f64 {
        match self.effective_end() {
            Some(end) => {
                let mins = (end - self.start).num_seconds() as f64 / 60.0;
                mins.max(0.0)
            }
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    #[test]
    fn effective_end_prefers_actual_end() {
        let b = BreakInterval {
            agent_id: "a1".to_string(),
            start: t(9, 0),
            end: Some(t(9, 20)),
            planned_end: Some(t(9, 30)),
            reason: None,
            kind: BreakKind::Break,
        };
        assert_eq!(b.effective_end(), Some(t(9, 20)));
        assert!(!b.is_open());
    }

    #[test]
    fn open_break_falls_back_to_planned_end() {
        let b = BreakInterval {
            agent_id: "a1".to_string(),
            start: t(9, 0),
            end: None,
            planned_end: Some(t(9, 30)),
            reason: None,
            kind: BreakKind::Break,
        };
        assert_eq!(b.effective_end(), Some(t(9, 30)));
        assert!(b.is_open());
        assert_eq!(b.duration_minutes(), 30.0);
    }

    #[test]
    fn legacy_row_without_ends_has_no_effective_end() {
        let b = BreakInterval {
            agent_id: "a1".to_string(),
            start: t(9, 0),
            end: None,
            planned_end: None,
            reason: None,
            kind: BreakKind::Break,
        };
        assert_eq!(b.effective_end(), None);
        assert_eq!(b.duration_minutes(), 0.0);
    }

    #[test]
    fn inconsistent_row_clamps_duration_to_zero() {
        let b = BreakInterval {
            agent_id: "a1".to_string(),
            start: t(9, 30),
            end: Some(t(9, 0)),
            planned_end: None,
            reason: None,
            kind: BreakKind::Break,
        };
        assert_eq!(b.duration_minutes(), 0.0);
    }
}
