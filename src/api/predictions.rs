use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::matches::MatchDto;
use super::AppState;
use crate::db::repo::PredictionWithMatch;
use crate::domain::{MatchId, Prediction, UserId};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    pub user_id: i64,
    pub match_id: i64,
    pub score1: i64,
    pub score2: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    pub user_id: i64,
    pub match_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionDto {
    pub id: i64,
    pub user_id: i64,
    pub match_id: i64,
    pub score1: i64,
    pub score2: i64,
    pub points_earned: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Prediction> for PredictionDto {
    fn from(p: Prediction) -> Self {
        PredictionDto {
            id: p.id.as_i64(),
            user_id: p.user_id.as_i64(),
            match_id: p.match_id.as_i64(),
            score1: p.guess.team1,
            score2: p.guess.team2,
            points_earned: p.points_earned,
            created_at: p.created_at.as_ms(),
            updated_at: p.updated_at.as_ms(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionWithMatchDto {
    #[serde(flatten)]
    pub prediction: PredictionDto,
    #[serde(rename = "match")]
    pub fixture: MatchDto,
}

impl From<PredictionWithMatch> for PredictionWithMatchDto {
    fn from(row: PredictionWithMatch) -> Self {
        PredictionWithMatchDto {
            prediction: row.prediction.into(),
            fixture: row.fixture.into(),
        }
    }
}

pub async fn upsert_prediction(
    State(state): State<AppState>,
    Json(body): Json<PredictionRequest>,
) -> Result<Json<PredictionDto>, AppError> {
    let prediction = state
        .orchestrator
        .upsert_prediction(
            UserId::new(body.user_id),
            MatchId::new(body.match_id),
            body.score1,
            body.score2,
        )
        .await?;

    Ok(Json(prediction.into()))
}

/// Predictions other users may see: only on matches that have kicked off.
pub async fn get_user_predictions(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Vec<PredictionWithMatchDto>>, AppError> {
    let rows = state
        .orchestrator
        .public_predictions(UserId::new(id))
        .await?;

    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// The owner's view: every prediction, including matches still to be played.
pub async fn get_own_predictions(
    Query(params): Query<OwnerQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<PredictionWithMatchDto>>, AppError> {
    let rows = state
        .orchestrator
        .user_predictions(UserId::new(params.user_id))
        .await?;

    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// The owner's guess on one match, or `null` when there is none.
pub async fn get_own_prediction_for_match(
    Path(match_id): Path<i64>,
    Query(params): Query<OwnerQuery>,
    State(state): State<AppState>,
) -> Result<Json<Option<PredictionDto>>, AppError> {
    let prediction = state
        .orchestrator
        .user_prediction_for_match(UserId::new(params.user_id), MatchId::new(match_id))
        .await?;

    Ok(Json(prediction.map(Into::into)))
}

/// The owner's guesses on several matches, keyed by match id.
pub async fn lookup_own_predictions(
    State(state): State<AppState>,
    Json(body): Json<LookupRequest>,
) -> Result<Json<BTreeMap<i64, PredictionDto>>, AppError> {
    let match_ids: Vec<MatchId> = body.match_ids.into_iter().map(MatchId::new).collect();
    let found = state
        .orchestrator
        .user_predictions_for_matches(UserId::new(body.user_id), &match_ids)
        .await?;

    Ok(Json(
        found
            .into_iter()
            .map(|(match_id, p)| (match_id.as_i64(), p.into()))
            .collect(),
    ))
}
