use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::TournamentId;
use crate::error::AppError;
use crate::orchestration::RuleValue;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesQuery {
    pub tournament_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRuleRequest {
    pub points: i64,
    pub tournament_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleValueResponse {
    pub rule_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tournament_id: Option<i64>,
    pub points: i64,
}

pub async fn list_rules(
    Query(params): Query<RulesQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<RuleValue>>, AppError> {
    let rules = state
        .orchestrator
        .list_rules(params.tournament_id.map(TournamentId::new))
        .await?;
    Ok(Json(rules))
}

/// Unknown rule names answer 0 points rather than 404.
pub async fn get_rule(
    Path(rule_type): Path<String>,
    Query(params): Query<RulesQuery>,
    State(state): State<AppState>,
) -> Result<Json<RuleValueResponse>, AppError> {
    let points = state
        .orchestrator
        .get_rule_value(&rule_type, params.tournament_id.map(TournamentId::new))
        .await?;

    Ok(Json(RuleValueResponse {
        rule_type,
        tournament_id: params.tournament_id,
        points,
    }))
}

pub async fn set_rule(
    Path(rule_type): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<SetRuleRequest>,
) -> Result<Json<RuleValue>, AppError> {
    let rule = state
        .orchestrator
        .set_rule_value(
            &rule_type,
            body.tournament_id.map(TournamentId::new),
            body.points,
        )
        .await?;
    Ok(Json(rule))
}
