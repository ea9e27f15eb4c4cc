//! Scoring rule table with per-tournament overrides.

use crate::domain::{AwardKind, TournamentId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Upper bound on a stored rule value. Keeps every per-prediction sum and every user
/// total far from integer overflow.
pub const MAX_RULE_POINTS: i64 = 1_000_000;

/// Every rule the scoring and award engines consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    ExactScore,
    CorrectWinner,
    CorrectDraw,
    GoalDifferenceBonus,
    PerTeamGoalBonus,
    TournamentWinner,
    BestPlayer,
    BestGoalScorer,
}

impl RuleType {
    pub const ALL: [RuleType; 8] = [
        RuleType::ExactScore,
        RuleType::CorrectWinner,
        RuleType::CorrectDraw,
        RuleType::GoalDifferenceBonus,
        RuleType::PerTeamGoalBonus,
        RuleType::TournamentWinner,
        RuleType::BestPlayer,
        RuleType::BestGoalScorer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::ExactScore => "exact_score",
            RuleType::CorrectWinner => "correct_winner",
            RuleType::CorrectDraw => "correct_draw",
            RuleType::GoalDifferenceBonus => "goal_difference_bonus",
            RuleType::PerTeamGoalBonus => "per_team_goal_bonus",
            RuleType::TournamentWinner => "tournament_winner",
            RuleType::BestPlayer => "best_player",
            RuleType::BestGoalScorer => "best_goal_scorer",
        }
    }

    /// Points used when neither a tournament override nor a global value is stored.
    pub fn default_points(&self) -> i64 {
        match self {
            RuleType::ExactScore => 5,
            RuleType::CorrectWinner => 2,
            RuleType::CorrectDraw => 3,
            RuleType::GoalDifferenceBonus => 1,
            RuleType::PerTeamGoalBonus => 1,
            RuleType::TournamentWinner => 10,
            RuleType::BestPlayer => 7,
            RuleType::BestGoalScorer => 7,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RuleType::ExactScore => "Exact final score",
            RuleType::CorrectWinner => "Correct winner",
            RuleType::CorrectDraw => "Correct draw",
            RuleType::GoalDifferenceBonus => "Correct winner with the exact goal difference",
            RuleType::PerTeamGoalBonus => "Correct goal count for one team",
            RuleType::TournamentWinner => "Tournament winner",
            RuleType::BestPlayer => "Best player of the tournament",
            RuleType::BestGoalScorer => "Top goal scorer of the tournament",
        }
    }
}

impl From<AwardKind> for RuleType {
    fn from(kind: AwardKind) -> Self {
        match kind {
            AwardKind::TournamentWinner => RuleType::TournamentWinner,
            AwardKind::BestPlayer => RuleType::BestPlayer,
            AwardKind::BestGoalScorer => RuleType::BestGoalScorer,
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        RuleType::ALL
            .into_iter()
            .find(|rule| rule.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

/// Resolved point values: tournament override, then global, then default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoringRuleSet {
    global: HashMap<RuleType, i64>,
    overrides: HashMap<(TournamentId, RuleType), i64>,
}

impl ScoringRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_global(&mut self, rule: RuleType, points: i64) {
        self.global.insert(rule, points);
    }

    pub fn set_override(&mut self, tournament_id: TournamentId, rule: RuleType, points: i64) {
        self.overrides.insert((tournament_id, rule), points);
    }

    pub fn with_global(mut self, rule: RuleType, points: i64) -> Self {
        self.set_global(rule, points);
        self
    }

    pub fn with_override(mut self, tournament_id: TournamentId, rule: RuleType, points: i64) -> Self {
        self.set_override(tournament_id, rule, points);
        self
    }

    /// Values outside `0..=MAX_RULE_POINTS` (rows written around the admin API) are
    /// clamped into range.
    pub fn points_for(&self, rule: RuleType, tournament_id: Option<TournamentId>) -> i64 {
        tournament_id
            .and_then(|t| self.overrides.get(&(t, rule)))
            .or_else(|| self.global.get(&rule))
            .copied()
            .unwrap_or_else(|| rule.default_points())
            .clamp(0, MAX_RULE_POINTS)
    }

    /// Lookup by stored rule name. Unknown names resolve to 0 so a settlement never fails
    /// over a rule it does not recognise.
    pub fn points_for_name(&self, rule_name: &str, tournament_id: Option<TournamentId>) -> i64 {
        match RuleType::from_str(rule_name) {
            Ok(rule) => self.points_for(rule, tournament_id),
            Err(()) => {
                tracing::warn!(rule = %rule_name, "Unknown scoring rule, resolving to 0 points");
                0
            }
        }
    }

    /// The full effective table for a tournament (or the global table when None).
    pub fn effective(&self, tournament_id: Option<TournamentId>) -> Vec<(RuleType, i64)> {
        RuleType::ALL
            .into_iter()
            .map(|rule| (rule, self.points_for(rule, tournament_id)))
            .collect()
    }
}
