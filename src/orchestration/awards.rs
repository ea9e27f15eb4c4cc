//! Tournament-level award predictions and declarations.

use crate::db::repo::TotalsChange;
use crate::domain::{AwardKind, AwardOutcome, AwardPrediction, EntityId, TournamentId, UserId};
use crate::engine::awards::REASON_TOURNAMENT_STARTED;
use crate::engine::{AwardCredit, AwardSettlement};
use serde::Serialize;
use tracing::info;

use super::{OrchestrationError, Orchestrator};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardReport {
    pub tournament_id: TournamentId,
    pub kind: AwardKind,
    pub entity_id: EntityId,
    /// The entity declared before this call, if any.
    pub previous_entity_id: Option<EntityId>,
    pub credits: Vec<AwardCredit>,
    pub totals: Vec<TotalsChange>,
}

impl Orchestrator {
    /// Create or replace a user's award guess while no match of the tournament has
    /// kicked off.
    pub async fn submit_award_prediction(
        &self,
        user_id: UserId,
        tournament_id: TournamentId,
        kind: AwardKind,
        entity_id: EntityId,
    ) -> Result<AwardPrediction, OrchestrationError> {
        self.require_user(user_id).await?;
        self.require_tournament(tournament_id).await?;

        let now = self.now();
        let matches = self.repo.list_matches(Some(tournament_id)).await?;
        let decision = AwardSettlement::can_predict(&self.lifecycle, &matches, now);
        if !decision.allowed {
            return Err(OrchestrationError::NotAllowed(
                decision.reason.unwrap_or_default(),
            ));
        }

        // The window is re-checked by the write itself.
        self.repo
            .upsert_award_prediction_if_open(user_id, tournament_id, kind, entity_id, now)
            .await?
            .ok_or_else(|| OrchestrationError::NotAllowed(REASON_TOURNAMENT_STARTED.to_string()))
    }

    pub async fn declare_tournament_winner(
        &self,
        tournament_id: TournamentId,
        entity_id: EntityId,
    ) -> Result<AwardReport, OrchestrationError> {
        self.declare_award(tournament_id, AwardKind::TournamentWinner, entity_id)
            .await
    }

    /// Record who took an award and credit every prediction of that kind. Declaring
    /// again recomputes all credits, so a correction moves the bonus and a repeat is
    /// a no-op for totals.
    ///
    /// # Errors
    /// `NotFound` for an unknown tournament, `NotAllowed` while none of its matches is
    /// live or completed.
    pub async fn declare_award(
        &self,
        tournament_id: TournamentId,
        kind: AwardKind,
        entity_id: EntityId,
    ) -> Result<AwardReport, OrchestrationError> {
        self.require_tournament(tournament_id).await?;
        let now = self.refresh_lifecycle().await?;

        let matches = self.repo.list_matches(Some(tournament_id)).await?;
        let decision = AwardSettlement::can_declare(&matches);
        if !decision.allowed {
            return Err(OrchestrationError::NotAllowed(
                decision.reason.unwrap_or_default(),
            ));
        }

        let previous = self.repo.get_award_outcome(tournament_id, kind).await?;
        let rules = self.repo.load_rule_set().await?;
        let predictions = self.repo.award_predictions_for(tournament_id, kind).await?;
        let credits = AwardSettlement::settle(&rules, tournament_id, kind, entity_id, &predictions);

        let outcome = AwardOutcome {
            tournament_id,
            kind,
            entity_id,
            declared_at: now,
        };
        let totals = self.repo.apply_award_settlement(&outcome, &credits).await?;

        info!(
            tournament = %tournament_id,
            kind = %kind,
            entity = %entity_id,
            credited = credits.iter().filter(|c| c.points_earned > 0).count(),
            "Declared award"
        );

        Ok(AwardReport {
            tournament_id,
            kind,
            entity_id,
            previous_entity_id: previous.map(|o| o.entity_id),
            credits,
            totals,
        })
    }
}
