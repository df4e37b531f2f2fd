use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a call leg as recorded by the telephony platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallDirection {
    Incoming,
    Outgoing,
    Internal,
}

impl std::fmt::Display for CallDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallDirection::Incoming => write!(f, "Incoming"),
            CallDirection::Outgoing => write!(f, "Outgoing"),
            CallDirection::Internal => write!(f, "Internal"),
        }
    }
}

/// One telephony call attempt, resolved to a typed record at the query
/// boundary. Upstream stores these as schema-less documents with nested
/// optional parties; we translate once and work with plain fields from
/// there on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub direction: CallDirection,
    /// Number that placed the call.
    pub calling_number: String,
    /// Number originally dialed.
    pub original_called_number: String,
    /// Number that finally answered (differs from original on redirect).
    pub final_called_number: String,
    /// When the call attempt started.
    pub origination: DateTime<Utc>,
    /// When the call was connected; `None` for unanswered attempts.
    pub connect: Option<DateTime<Utc>>,
    /// Talk time in seconds; 0 for unanswered attempts.
    pub duration_secs: i64,
}

impl CallRecord {
    /// Whether this call attempt was connected with actual talk time.
    pub fn connected(&self) -> bool {
        self.connect.is_some() && self.duration_secs > 0
    }

    /// Whether the final answering party differs from the dialed party.
    pub fn was_redirected(&self) -> bool {
        self.original_called_number != self.final_called_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn call(connect: Option<DateTime<Utc>>, duration: i64) -> CallRecord {
        CallRecord {
            direction: CallDirection::Incoming,
            calling_number: "05321112233".to_string(),
            original_called_number: "1001".to_string(),
            final_called_number: "1001".to_string(),
            origination: Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap(),
            connect,
            duration_secs: duration,
        }
    }

    #[test]
    fn connected_requires_connect_and_positive_duration() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 5).unwrap();
        assert!(call(Some(ts), 42).connected());
        assert!(!call(Some(ts), 0).connected());
        assert!(!call(None, 0).connected());
    }

    #[test]
    fn redirect_detection_compares_parties() {
        let mut c = call(None, 0);
        assert!(!c.was_redirected());
        c.final_called_number = "1002".to_string();
        assert!(c.was_redirected());
    }
}
