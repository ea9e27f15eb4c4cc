//! Match record and its lifecycle state.

use crate::domain::{EntityId, MatchId, Score, TimeMs, TournamentId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle state of a match. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchState {
    Upcoming,
    Live,
    Completed,
}

impl MatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchState::Upcoming => "upcoming",
            MatchState::Live => "live",
            MatchState::Completed => "completed",
        }
    }
}

impl std::fmt::Display for MatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown match state: {0}")]
pub struct UnknownMatchState(pub String);

impl FromStr for MatchState {
    type Err = UnknownMatchState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(MatchState::Upcoming),
            "live" => Ok(MatchState::Live),
            "completed" => Ok(MatchState::Completed),
            other => Err(UnknownMatchState(other.to_string())),
        }
    }
}

/// A scheduled contest between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: Option<TournamentId>,
    pub team1_id: EntityId,
    pub team2_id: EntityId,
    pub scheduled_at: TimeMs,
    pub stage: Option<String>,
    pub state: MatchState,
    /// Final score; only present once the match is completed.
    pub result: Option<Score>,
}

impl Match {
    pub fn is_completed(&self) -> bool {
        self.state == MatchState::Completed
    }
}

/// Fields an administrator supplies when scheduling a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMatch {
    pub tournament_id: Option<TournamentId>,
    pub team1_id: EntityId,
    pub team2_id: EntityId,
    pub scheduled_at: TimeMs,
    pub stage: Option<String>,
}
