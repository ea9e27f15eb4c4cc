use crate::clock::Clock;
use crate::db::repo::{PredictionWithMatch, TotalsChange};
use crate::db::Repository;
use crate::domain::{
    Match, MatchId, MatchState, NewMatch, Prediction, Score, TimeMs, Tournament, TournamentId,
    User, UserId,
};
use crate::engine::{
    GateDecision, MatchLifecycle, PredictionGate, RuleType, ScoringEngine, Settlement, Viewer,
    MAX_RULE_POINTS,
};
use crate::engine::gate::REASON_STARTED;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Cap on the match ids accepted by one prediction lookup.
pub const MAX_LOOKUP_MATCHES: usize = 100;

#[derive(Clone)]
pub struct Orchestrator {
    pub(super) repo: Arc<Repository>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) lifecycle: MatchLifecycle,
}

/// Outcome of writing a match result: the new points of every prediction and the
/// reconciled totals of their owners.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReport {
    pub match_id: MatchId,
    pub result: Score,
    pub settlements: Vec<Settlement>,
    pub totals: Vec<TotalsChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleValue {
    pub rule_type: RuleType,
    pub points: i64,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: UserId,
    pub name: String,
    pub total_points: i64,
    pub correct_predictions: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_predictions: i64,
    pub correct_predictions: i64,
    pub exact_scores: i64,
    pub total_points: i64,
    pub pending_predictions: i64,
}

impl Orchestrator {
    pub fn new(repo: Arc<Repository>, clock: Arc<dyn Clock>, lifecycle: MatchLifecycle) -> Self {
        Self {
            repo,
            clock,
            lifecycle,
        }
    }

    pub fn now(&self) -> TimeMs {
        self.clock.now()
    }

    /// Persist the clock-driven upcoming -> live step for every due match.
    pub async fn refresh_lifecycle(&self) -> Result<TimeMs, OrchestrationError> {
        let now = self.now();
        self.repo.advance_due_matches(now).await?;
        Ok(now)
    }

    // =========================================================================
    // Users and tournaments
    // =========================================================================

    pub async fn create_user(&self, name: &str) -> Result<User, OrchestrationError> {
        let name = non_empty(name, "name")?;
        let user = self.repo.create_user(name).await?;
        info!(user = %user.id, "Created user");
        Ok(user)
    }

    pub async fn create_tournament(&self, name: &str) -> Result<Tournament, OrchestrationError> {
        let name = non_empty(name, "name")?;
        let tournament = self.repo.create_tournament(name).await?;
        info!(tournament = %tournament.id, "Created tournament");
        Ok(tournament)
    }

    pub(super) async fn require_user(&self, id: UserId) -> Result<User, OrchestrationError> {
        self.repo
            .get_user(id)
            .await?
            .ok_or_else(|| OrchestrationError::NotFound(format!("user {}", id)))
    }

    pub(super) async fn require_tournament(
        &self,
        id: TournamentId,
    ) -> Result<Tournament, OrchestrationError> {
        self.repo
            .get_tournament(id)
            .await?
            .ok_or_else(|| OrchestrationError::NotFound(format!("tournament {}", id)))
    }

    // =========================================================================
    // Matches
    // =========================================================================

    pub async fn create_match(&self, new: NewMatch) -> Result<Match, OrchestrationError> {
        self.check_fixture(&new).await?;

        let m = self.repo.insert_match(&new).await?;
        info!(match_id = %m.id, scheduled_at = %m.scheduled_at, "Scheduled match");
        Ok(m)
    }

    /// Edit or reschedule a match that has not kicked off. The gate and the visibility
    /// filter follow the new kick-off from then on; existing predictions are kept.
    ///
    /// # Errors
    /// `Validation` for identical teams, `NotFound` for an unknown match or tournament,
    /// `NotAllowed` once the match has started.
    pub async fn update_match(
        &self,
        id: MatchId,
        changes: NewMatch,
    ) -> Result<Match, OrchestrationError> {
        self.check_fixture(&changes).await?;
        let current = self.load_match(id).await?;

        let now = self.now();
        match self.repo.update_match_if_upcoming(id, &changes, now).await? {
            Some(m) => {
                info!(
                    match_id = %id,
                    from = %current.scheduled_at,
                    to = %m.scheduled_at,
                    "Updated match"
                );
                Ok(m)
            }
            None => {
                let m = self.load_match(id).await?;
                let reason = PredictionGate::can_predict(&m, now)
                    .reason
                    .unwrap_or_else(|| REASON_STARTED.to_string());
                Err(OrchestrationError::NotAllowed(reason))
            }
        }
    }

    async fn check_fixture(&self, fixture: &NewMatch) -> Result<(), OrchestrationError> {
        if fixture.team1_id == fixture.team2_id {
            return Err(OrchestrationError::Validation(
                "team1Id and team2Id must differ".to_string(),
            ));
        }
        if let Some(tournament_id) = fixture.tournament_id {
            self.require_tournament(tournament_id).await?;
        }
        Ok(())
    }

    pub async fn get_match(&self, id: MatchId) -> Result<Match, OrchestrationError> {
        let now = self.refresh_lifecycle().await?;
        let mut m = self.load_match(id).await?;
        self.lifecycle.advance(&mut m, now);
        Ok(m)
    }

    async fn load_match(&self, id: MatchId) -> Result<Match, OrchestrationError> {
        self.repo
            .get_match(id)
            .await?
            .ok_or_else(|| OrchestrationError::NotFound(format!("match {}", id)))
    }

    /// Matches the viewer may see, in kick-off order, optionally narrowed to one
    /// tournament and one lifecycle state.
    pub async fn list_matches(
        &self,
        viewer: Viewer,
        tournament_id: Option<TournamentId>,
        state: Option<MatchState>,
    ) -> Result<Vec<Match>, OrchestrationError> {
        let now = self.refresh_lifecycle().await?;
        let matches = self.repo.list_matches(tournament_id).await?;

        Ok(matches
            .into_iter()
            .filter(|m| self.lifecycle.is_visible(m, now, viewer))
            .map(|mut m| {
                self.lifecycle.advance(&mut m, now);
                m
            })
            .filter(|m| state.map_or(true, |s| m.state == s))
            .collect())
    }

    /// Remove a match with its predictions; the affected users' totals are reconciled.
    pub async fn delete_match(&self, id: MatchId) -> Result<Vec<TotalsChange>, OrchestrationError> {
        let totals = self
            .repo
            .delete_match(id)
            .await?
            .ok_or_else(|| OrchestrationError::NotFound(format!("match {}", id)))?;

        info!(match_id = %id, users = totals.len(), "Deleted match");
        Ok(totals)
    }

    // =========================================================================
    // Predictions
    // =========================================================================

    pub async fn can_predict(&self, match_id: MatchId) -> Result<GateDecision, OrchestrationError> {
        let m = self.get_match(match_id).await?;
        Ok(PredictionGate::can_predict(&m, self.now()))
    }

    /// Create or replace the user's guess while the match is open for predictions.
    ///
    /// # Errors
    /// `Validation` for negative scores, `NotFound` for an unknown user or match,
    /// `NotAllowed` with the gate's reason once the match has started.
    pub async fn upsert_prediction(
        &self,
        user_id: UserId,
        match_id: MatchId,
        score1: i64,
        score2: i64,
    ) -> Result<Prediction, OrchestrationError> {
        let guess = Score::new(score1, score2)
            .map_err(|e| OrchestrationError::Validation(e.to_string()))?;
        self.require_user(user_id).await?;
        self.load_match(match_id).await?;

        let now = self.now();
        match self
            .repo
            .upsert_prediction_if_open(user_id, match_id, guess, now)
            .await?
        {
            Some(prediction) => {
                debug!(user = %user_id, match_id = %match_id, guess = %guess, "Stored prediction");
                Ok(prediction)
            }
            None => {
                let m = self.load_match(match_id).await?;
                let reason = PredictionGate::can_predict(&m, now)
                    .reason
                    .unwrap_or_else(|| REASON_STARTED.to_string());
                Err(OrchestrationError::NotAllowed(reason))
            }
        }
    }

    /// Every prediction of the user, including ones on matches that have not started.
    pub async fn user_predictions(
        &self,
        user_id: UserId,
    ) -> Result<Vec<PredictionWithMatch>, OrchestrationError> {
        self.require_user(user_id).await?;
        self.refresh_lifecycle().await?;
        Ok(self.repo.predictions_for_user(user_id).await?)
    }

    /// The user's own guess on one match, if any.
    pub async fn user_prediction_for_match(
        &self,
        user_id: UserId,
        match_id: MatchId,
    ) -> Result<Option<Prediction>, OrchestrationError> {
        self.require_user(user_id).await?;
        self.load_match(match_id).await?;
        Ok(self.repo.get_prediction(user_id, match_id).await?)
    }

    /// The user's own guesses on several matches, keyed by match. Matches without a
    /// guess (or that do not exist) are left out.
    pub async fn user_predictions_for_matches(
        &self,
        user_id: UserId,
        match_ids: &[MatchId],
    ) -> Result<BTreeMap<MatchId, Prediction>, OrchestrationError> {
        if match_ids.len() > MAX_LOOKUP_MATCHES {
            return Err(OrchestrationError::Validation(format!(
                "at most {} match ids per lookup",
                MAX_LOOKUP_MATCHES
            )));
        }
        self.require_user(user_id).await?;

        let found = futures::future::try_join_all(
            match_ids
                .iter()
                .map(|match_id| self.repo.get_prediction(user_id, *match_id)),
        )
        .await?;

        Ok(found
            .into_iter()
            .flatten()
            .map(|p| (p.match_id, p))
            .collect())
    }

    /// A user's predictions as others may see them: only matches that have kicked off.
    pub async fn public_predictions(
        &self,
        user_id: UserId,
    ) -> Result<Vec<PredictionWithMatch>, OrchestrationError> {
        let now = self.now();
        let rows = self.user_predictions(user_id).await?;
        Ok(rows
            .into_iter()
            .filter(|row| self.lifecycle.has_started(&row.fixture, now))
            .collect())
    }

    pub async fn user_stats(&self, user_id: UserId) -> Result<UserStats, OrchestrationError> {
        let now = self.refresh_lifecycle().await?;
        let (user, rows) = futures::future::try_join(
            self.repo.get_user(user_id),
            self.repo.predictions_for_user(user_id),
        )
        .await?;
        let user = user.ok_or_else(|| OrchestrationError::NotFound(format!("user {}", user_id)))?;

        let mut stats = UserStats {
            total_predictions: rows.len() as i64,
            total_points: user.total_points,
            ..UserStats::default()
        };
        for row in &rows {
            let points = row.prediction.points_earned.unwrap_or(0);
            if points > 0 {
                stats.correct_predictions += 1;
            }
            if row.prediction.points_earned.is_some()
                && row.fixture.result == Some(row.prediction.guess)
            {
                stats.exact_scores += 1;
            }
            if self.lifecycle.state_at(&row.fixture, now) == MatchState::Upcoming {
                stats.pending_predictions += 1;
            }
        }
        Ok(stats)
    }

    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, OrchestrationError> {
        let users = self.repo.leaderboard().await?;
        Ok(users
            .into_iter()
            .enumerate()
            .map(|(idx, u)| LeaderboardEntry {
                rank: (idx + 1) as i64,
                user_id: u.id,
                name: u.name,
                total_points: u.total_points,
                correct_predictions: u.correct_predictions,
            })
            .collect())
    }

    // =========================================================================
    // Results and settlement
    // =========================================================================

    /// Record the final score of a started match and settle every prediction on it.
    /// Calling it again on a completed match corrects the score and re-settles.
    ///
    /// # Errors
    /// `Validation` for negative scores, `NotFound` for an unknown match, `NotAllowed`
    /// while the match is still in the future.
    pub async fn set_match_result(
        &self,
        match_id: MatchId,
        score1: i64,
        score2: i64,
    ) -> Result<(Match, SettlementReport), OrchestrationError> {
        let result = Score::new(score1, score2)
            .map_err(|e| OrchestrationError::Validation(e.to_string()))?;
        let now = self.refresh_lifecycle().await?;
        let m = self.load_match(match_id).await?;

        let completed = self
            .lifecycle
            .complete(&m, result, now)
            .map_err(|e| OrchestrationError::NotAllowed(e.to_string()))?;
        if m.is_completed() {
            info!(match_id = %match_id, previous = ?m.result.map(|r| r.to_string()), result = %result, "Correcting match result");
        }

        let report = self.settle_completed(&completed).await?;
        Ok((completed, report))
    }

    /// Re-run settlement from the stored result of a completed match.
    pub async fn settle_match(&self, match_id: MatchId) -> Result<SettlementReport, OrchestrationError> {
        let m = self.load_match(match_id).await?;
        self.settle_completed(&m).await
    }

    async fn settle_completed(&self, m: &Match) -> Result<SettlementReport, OrchestrationError> {
        let rules = self.repo.load_rule_set().await?;
        let predictions = self.repo.predictions_for_match(m.id).await?;

        let settlements = ScoringEngine::new(&rules)
            .settle(m, &predictions)
            .map_err(|e| OrchestrationError::NotAllowed(e.to_string()))?;
        let Some(result) = m.result else {
            return Err(OrchestrationError::NotAllowed(format!(
                "match {} has no final result",
                m.id
            )));
        };
        let totals = self.repo.apply_match_settlement(m, &settlements).await?;

        info!(
            match_id = %m.id,
            result = %result,
            predictions = settlements.len(),
            "Settled match"
        );

        Ok(SettlementReport {
            match_id: m.id,
            result,
            settlements,
            totals,
        })
    }

    // =========================================================================
    // Scoring rules
    // =========================================================================

    /// Effective value of a rule by name. Unknown names resolve to 0.
    pub async fn get_rule_value(
        &self,
        rule_name: &str,
        tournament_id: Option<TournamentId>,
    ) -> Result<i64, OrchestrationError> {
        let rules = self.repo.load_rule_set().await?;
        Ok(rules.points_for_name(rule_name, tournament_id))
    }

    pub async fn set_rule_value(
        &self,
        rule_name: &str,
        tournament_id: Option<TournamentId>,
        points: i64,
    ) -> Result<RuleValue, OrchestrationError> {
        let rule = RuleType::from_str(rule_name).map_err(|_| {
            OrchestrationError::Validation(format!("unknown rule type: {}", rule_name))
        })?;
        if points < 0 {
            return Err(OrchestrationError::Validation(
                "points cannot be negative".to_string(),
            ));
        }
        if points > MAX_RULE_POINTS {
            return Err(OrchestrationError::Validation(format!(
                "points cannot exceed {}",
                MAX_RULE_POINTS
            )));
        }
        if let Some(tournament_id) = tournament_id {
            self.require_tournament(tournament_id).await?;
        }

        self.repo.upsert_rule(rule, tournament_id, points).await?;
        info!(rule = %rule, tournament = ?tournament_id.map(|t| t.as_i64()), points, "Updated scoring rule");

        Ok(RuleValue {
            rule_type: rule,
            points,
            description: rule.description(),
        })
    }

    pub async fn list_rules(
        &self,
        tournament_id: Option<TournamentId>,
    ) -> Result<Vec<RuleValue>, OrchestrationError> {
        let rules = self.repo.load_rule_set().await?;
        Ok(rules
            .effective(tournament_id)
            .into_iter()
            .map(|(rule, points)| RuleValue {
                rule_type: rule,
                points,
                description: rule.description(),
            })
            .collect())
    }
}

fn non_empty<'a>(value: &'a str, field: &str) -> Result<&'a str, OrchestrationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(OrchestrationError::Validation(format!(
            "{} cannot be empty",
            field
        )));
    }
    Ok(trimmed)
}

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotAllowed(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}
