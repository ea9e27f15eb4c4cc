//! Admission check for prediction writes.

use crate::domain::{Match, MatchState, TimeMs};
use serde::Serialize;

pub const REASON_STARTED: &str = "match already started";
pub const REASON_IN_PROGRESS: &str = "match in progress";
pub const REASON_COMPLETED: &str = "match already completed";

/// Result of asking whether a prediction may be written now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl GateDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
        }
    }
}

pub struct PredictionGate;

impl PredictionGate {
    /// Open iff the match is upcoming and `now` is strictly before kick-off. The time
    /// check applies even if the stored state has not been advanced to live yet.
    pub fn can_predict(m: &Match, now: TimeMs) -> GateDecision {
        match m.state {
            MatchState::Completed => GateDecision::deny(REASON_COMPLETED),
            MatchState::Live => GateDecision::deny(REASON_IN_PROGRESS),
            MatchState::Upcoming if now >= m.scheduled_at => GateDecision::deny(REASON_STARTED),
            MatchState::Upcoming => GateDecision::allow(),
        }
    }
}
