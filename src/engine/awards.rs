//! Tournament-level bonus distribution (winner, best player, top scorer).

use super::gate::GateDecision;
use super::lifecycle::MatchLifecycle;
use super::rules::{RuleType, ScoringRuleSet};
use crate::domain::{AwardKind, AwardPrediction, EntityId, Match, MatchState, TimeMs, TournamentId, UserId};
use serde::Serialize;

pub const REASON_TOURNAMENT_STARTED: &str = "tournament already started";
pub const REASON_TOURNAMENT_NOT_STARTED: &str = "tournament has not started";

/// Points for one award prediction after a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardCredit {
    pub award_prediction_id: i64,
    pub user_id: UserId,
    pub previous_points: Option<i64>,
    pub points_earned: i64,
}

pub struct AwardSettlement;

impl AwardSettlement {
    /// Credit every prediction of `kind` in the tournament: full points when it names the
    /// declared entity, zero otherwise. Recomputed from scratch on every declaration, so a
    /// repeated or corrected declaration replaces earlier credits.
    pub fn settle(
        rules: &ScoringRuleSet,
        tournament_id: TournamentId,
        kind: AwardKind,
        winner: EntityId,
        predictions: &[AwardPrediction],
    ) -> Vec<AwardCredit> {
        let points = rules.points_for(RuleType::from(kind), Some(tournament_id));

        predictions
            .iter()
            .filter(|p| p.tournament_id == tournament_id && p.kind == kind)
            .map(|p| AwardCredit {
                award_prediction_id: p.id,
                user_id: p.user_id,
                previous_points: p.points_earned,
                points_earned: if p.entity_id == winner { points } else { 0 },
            })
            .collect()
    }

    /// Award predictions close as soon as any match of the tournament has kicked off.
    pub fn can_predict(lifecycle: &MatchLifecycle, matches: &[Match], now: TimeMs) -> GateDecision {
        if matches.iter().any(|m| lifecycle.has_started(m, now)) {
            GateDecision::deny(REASON_TOURNAMENT_STARTED)
        } else {
            GateDecision::allow()
        }
    }

    /// A declaration needs at least one match of the tournament marked live or completed.
    pub fn can_declare(matches: &[Match]) -> GateDecision {
        if matches.iter().any(|m| m.state != MatchState::Upcoming) {
            GateDecision::allow()
        } else {
            GateDecision::deny(REASON_TOURNAMENT_NOT_STARTED)
        }
    }
}
