use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::AppState;
use crate::domain::{Tournament, User, UserId};
use crate::error::AppError;
use crate::orchestration::{LeaderboardEntry, UserStats};

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<NameRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = state.orchestrator.create_user(&body.name).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn create_tournament(
    State(state): State<AppState>,
    Json(body): Json<NameRequest>,
) -> Result<(StatusCode, Json<Tournament>), AppError> {
    let tournament = state.orchestrator.create_tournament(&body.name).await?;
    Ok((StatusCode::CREATED, Json(tournament)))
}

pub async fn get_user_stats(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<UserStats>, AppError> {
    let stats = state.orchestrator.user_stats(UserId::new(id)).await?;
    Ok(Json(stats))
}

pub async fn get_leaderboard(
    State(state): State<AppState>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let entries = state.orchestrator.leaderboard().await?;
    Ok(Json(entries))
}
