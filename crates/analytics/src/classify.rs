//! Call disposition classification.
//!
//! Each (call, agent) pair gets exactly one disposition. Redirect wins
//! first: a call originally dialed to the agent but answered elsewhere is
//! redirected regardless of connect state. Of the rest, connected calls
//! with talk time are answered; unanswered calls landing inside the
//! agent's break are on-break; everything else is missed.

use serde::{Deserialize, Serialize};

use cdrstats_core::CallRecord;

use crate::break_index::BreakIndex;

/// The single disposition of one call viewed from one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallDisposition {
    Answered,
    Missed,
    OnBreak,
    Redirected,
}

impl std::fmt::Display for CallDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallDisposition::Answered => write!(f, "Answered"),
            CallDisposition::Missed => write!(f, "Missed"),
            CallDisposition::OnBreak => write!(f, "OnBreak"),
            CallDisposition::Redirected => write!(f, "Redirected"),
        }
    }
}

/// Classify a call from the perspective of `agent_number`.
pub fn classify(call: &CallRecord, agent_number: &str, breaks: &BreakIndex) -> CallDisposition {
    let redirected = call.original_called_number == agent_number
        && call.final_called_number != agent_number;
    if redirected {
        return CallDisposition::Redirected;
    }

    if call.connected() {
        return CallDisposition::Answered;
    }

    if breaks.is_during_break(agent_number, call.origination) {
        return CallDisposition::OnBreak;
    }

    CallDisposition::Missed
}
