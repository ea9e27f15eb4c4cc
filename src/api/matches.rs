use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::db::repo::TotalsChange;
use crate::domain::{EntityId, Match, MatchId, MatchState, NewMatch, TimeMs, TournamentId};
use crate::engine::{GateDecision, Viewer};
use crate::error::AppError;
use crate::orchestration::SettlementReport;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchesQuery {
    pub admin: Option<bool>,
    pub tournament_id: Option<i64>,
    pub state: Option<MatchState>,
}

/// Body of both create and edit; an edit replaces every field.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    pub tournament_id: Option<i64>,
    pub team1_id: i64,
    pub team2_id: i64,
    pub scheduled_at: i64,
    pub stage: Option<String>,
}

impl From<MatchRequest> for NewMatch {
    fn from(body: MatchRequest) -> Self {
        NewMatch {
            tournament_id: body.tournament_id.map(TournamentId::new),
            team1_id: EntityId::new(body.team1_id),
            team2_id: EntityId::new(body.team2_id),
            scheduled_at: TimeMs::new(body.scheduled_at),
            stage: body.stage.filter(|s| !s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRequest {
    pub score1: i64,
    pub score2: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDto {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tournament_id: Option<i64>,
    pub team1_id: i64,
    pub team2_id: i64,
    pub scheduled_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at_iso: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    pub state: MatchState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score1: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score2: Option<i64>,
}

impl From<Match> for MatchDto {
    fn from(m: Match) -> Self {
        MatchDto {
            id: m.id.as_i64(),
            tournament_id: m.tournament_id.map(|t| t.as_i64()),
            team1_id: m.team1_id.as_i64(),
            team2_id: m.team2_id.as_i64(),
            scheduled_at: m.scheduled_at.as_ms(),
            scheduled_at_iso: m.scheduled_at.to_rfc3339(),
            stage: m.stage,
            state: m.state,
            score1: m.result.map(|r| r.team1),
            score2: m.result.map(|r| r.team2),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultResponse {
    #[serde(rename = "match")]
    pub fixture: MatchDto,
    pub settlement: SettlementReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub deleted: bool,
    pub totals: Vec<TotalsChange>,
}

pub async fn list_matches(
    Query(params): Query<MatchesQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<MatchDto>>, AppError> {
    let viewer = if params.admin.unwrap_or(false) {
        Viewer::Admin
    } else {
        Viewer::Public
    };

    let matches = state
        .orchestrator
        .list_matches(
            viewer,
            params.tournament_id.map(TournamentId::new),
            params.state,
        )
        .await?;

    Ok(Json(matches.into_iter().map(MatchDto::from).collect()))
}

pub async fn create_match(
    State(state): State<AppState>,
    Json(body): Json<MatchRequest>,
) -> Result<(StatusCode, Json<MatchDto>), AppError> {
    let created = state.orchestrator.create_match(body.into()).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

pub async fn update_match(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<MatchRequest>,
) -> Result<Json<MatchDto>, AppError> {
    let updated = state
        .orchestrator
        .update_match(MatchId::new(id), body.into())
        .await?;
    Ok(Json(updated.into()))
}

pub async fn get_match(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<MatchDto>, AppError> {
    let m = state.orchestrator.get_match(MatchId::new(id)).await?;
    Ok(Json(m.into()))
}

pub async fn delete_match(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<DeleteResponse>, AppError> {
    let totals = state.orchestrator.delete_match(MatchId::new(id)).await?;
    Ok(Json(DeleteResponse {
        deleted: true,
        totals,
    }))
}

pub async fn can_predict(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<GateDecision>, AppError> {
    let decision = state.orchestrator.can_predict(MatchId::new(id)).await?;
    Ok(Json(decision))
}

pub async fn set_result(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<ResultRequest>,
) -> Result<Json<ResultResponse>, AppError> {
    let (fixture, settlement) = state
        .orchestrator
        .set_match_result(MatchId::new(id), body.score1, body.score2)
        .await?;

    Ok(Json(ResultResponse {
        fixture: fixture.into(),
        settlement,
    }))
}

pub async fn settle(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<SettlementReport>, AppError> {
    let report = state.orchestrator.settle_match(MatchId::new(id)).await?;
    Ok(Json(report))
}
