//! Converts a final score and the predictions against a match into points.

use super::rules::{RuleType, ScoringRuleSet};
use crate::domain::{Match, MatchId, Outcome, Prediction, PredictionId, Score, TournamentId, UserId};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettleError {
    #[error("match {0} has no final result")]
    NotCompleted(MatchId),
}

/// Points awarded per rule for one prediction. Fields are zero when a rule did not fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub exact_score: i64,
    pub correct_winner: i64,
    pub correct_draw: i64,
    pub goal_difference_bonus: i64,
    pub team1_goals_bonus: i64,
    pub team2_goals_bonus: i64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> i64 {
        [
            self.exact_score,
            self.correct_winner,
            self.correct_draw,
            self.goal_difference_bonus,
            self.team1_goals_bonus,
            self.team2_goals_bonus,
        ]
        .into_iter()
        .fold(0i64, i64::saturating_add)
    }
}

/// New points for one prediction, next to what it held before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub prediction_id: PredictionId,
    pub user_id: UserId,
    pub previous_points: Option<i64>,
    pub points_earned: i64,
    pub breakdown: ScoreBreakdown,
}

pub struct ScoringEngine<'a> {
    rules: &'a ScoringRuleSet,
}

impl<'a> ScoringEngine<'a> {
    pub fn new(rules: &'a ScoringRuleSet) -> Self {
        Self { rules }
    }

    /// Score a single guess against the actual result.
    ///
    /// An exact guess earns `exact_score` and nothing else. Otherwise a matching outcome
    /// class earns `correct_draw` or `correct_winner` (+ `goal_difference_bonus` when the
    /// margin also matches), and each team's goal count guessed right earns
    /// `per_team_goal_bonus` regardless of the outcome class.
    pub fn score(&self, guess: Score, actual: Score, tournament_id: Option<TournamentId>) -> ScoreBreakdown {
        let points = |rule| self.rules.points_for(rule, tournament_id);

        if guess == actual {
            return ScoreBreakdown {
                exact_score: points(RuleType::ExactScore),
                ..ScoreBreakdown::default()
            };
        }

        let mut breakdown = ScoreBreakdown::default();
        let predicted = guess.outcome();

        if predicted == actual.outcome() {
            if predicted == Outcome::Draw {
                breakdown.correct_draw = points(RuleType::CorrectDraw);
            } else {
                breakdown.correct_winner = points(RuleType::CorrectWinner);
                if guess.margin() == actual.margin() {
                    breakdown.goal_difference_bonus = points(RuleType::GoalDifferenceBonus);
                }
            }
        }

        if guess.team1 == actual.team1 {
            breakdown.team1_goals_bonus = points(RuleType::PerTeamGoalBonus);
        }
        if guess.team2 == actual.team2 {
            breakdown.team2_goals_bonus = points(RuleType::PerTeamGoalBonus);
        }

        breakdown
    }

    /// Score every prediction recorded against a completed match.
    ///
    /// # Errors
    /// Returns `SettleError::NotCompleted` if the match has no final result.
    pub fn settle(&self, m: &Match, predictions: &[Prediction]) -> Result<Vec<Settlement>, SettleError> {
        let actual = match (m.is_completed(), m.result) {
            (true, Some(result)) => result,
            _ => return Err(SettleError::NotCompleted(m.id)),
        };

        Ok(predictions
            .iter()
            .filter(|p| p.match_id == m.id)
            .map(|p| {
                let breakdown = self.score(p.guess, actual, m.tournament_id);
                Settlement {
                    prediction_id: p.id,
                    user_id: p.user_id,
                    previous_points: p.points_earned,
                    points_earned: breakdown.total(),
                    breakdown,
                }
            })
            .collect())
    }
}
