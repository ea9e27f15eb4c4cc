//! Per-match predictions and tournament-scoped award predictions.

use crate::domain::{EntityId, MatchId, PredictionId, Score, TimeMs, TournamentId, UserId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A user's guessed scoreline for one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: PredictionId,
    pub user_id: UserId,
    pub match_id: MatchId,
    pub guess: Score,
    /// None until the match has been settled (and again after an overwrite).
    pub points_earned: Option<i64>,
    pub created_at: TimeMs,
    pub updated_at: TimeMs,
}

/// Tournament-level bonus categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardKind {
    TournamentWinner,
    BestPlayer,
    BestGoalScorer,
}

impl AwardKind {
    pub const ALL: [AwardKind; 3] = [
        AwardKind::TournamentWinner,
        AwardKind::BestPlayer,
        AwardKind::BestGoalScorer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AwardKind::TournamentWinner => "tournament_winner",
            AwardKind::BestPlayer => "best_player",
            AwardKind::BestGoalScorer => "best_goal_scorer",
        }
    }
}

impl std::fmt::Display for AwardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AwardKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tournament_winner" | "winner" => Ok(AwardKind::TournamentWinner),
            "best_player" => Ok(AwardKind::BestPlayer),
            "best_goal_scorer" | "top_scorer" => Ok(AwardKind::BestGoalScorer),
            _ => Err(()),
        }
    }
}

/// A user's guess of who takes an award in a tournament.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardPrediction {
    pub id: i64,
    pub user_id: UserId,
    pub tournament_id: TournamentId,
    pub kind: AwardKind,
    pub entity_id: EntityId,
    pub points_earned: Option<i64>,
}

/// The declared holder of an award.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardOutcome {
    pub tournament_id: TournamentId,
    pub kind: AwardKind,
    pub entity_id: EntityId,
    pub declared_at: TimeMs,
}
