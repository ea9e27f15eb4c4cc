use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use std::str::FromStr;

use super::AppState;
use crate::domain::{AwardKind, AwardPrediction, EntityId, TournamentId, UserId};
use crate::error::AppError;
use crate::orchestration::AwardReport;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardPredictionRequest {
    pub user_id: i64,
    pub kind: String,
    pub entity_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclareRequest {
    pub entity_id: i64,
}

fn parse_kind(kind: &str) -> Result<AwardKind, AppError> {
    AwardKind::from_str(kind).map_err(|_| {
        AppError::BadRequest(
            "kind must be one of: tournament_winner, best_player, best_goal_scorer".to_string(),
        )
    })
}

pub async fn submit_award_prediction(
    Path(tournament_id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<AwardPredictionRequest>,
) -> Result<Json<AwardPrediction>, AppError> {
    let kind = parse_kind(&body.kind)?;
    let prediction = state
        .orchestrator
        .submit_award_prediction(
            UserId::new(body.user_id),
            TournamentId::new(tournament_id),
            kind,
            EntityId::new(body.entity_id),
        )
        .await?;
    Ok(Json(prediction))
}

pub async fn declare_winner(
    Path(tournament_id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<DeclareRequest>,
) -> Result<Json<AwardReport>, AppError> {
    let report = state
        .orchestrator
        .declare_tournament_winner(TournamentId::new(tournament_id), EntityId::new(body.entity_id))
        .await?;
    Ok(Json(report))
}

pub async fn declare_award(
    Path((tournament_id, kind)): Path<(i64, String)>,
    State(state): State<AppState>,
    Json(body): Json<DeclareRequest>,
) -> Result<Json<AwardReport>, AppError> {
    let kind = parse_kind(&kind)?;
    let report = state
        .orchestrator
        .declare_award(TournamentId::new(tournament_id), kind, EntityId::new(body.entity_id))
        .await?;
    Ok(Json(report))
}
