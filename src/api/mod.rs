pub mod awards;
pub mod health;
pub mod matches;
pub mod predictions;
pub mod rules;
pub mod users;

use crate::db::Repository;
use crate::orchestration::Orchestrator;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, orchestrator: Arc<Orchestrator>) -> Self {
        Self { repo, orchestrator }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/users", post(users::create_user))
        .route("/v1/users/:id/predictions", get(predictions::get_user_predictions))
        .route("/v1/users/:id/stats", get(users::get_user_stats))
        .route("/v1/leaderboard", get(users::get_leaderboard))
        .route("/v1/tournaments", post(users::create_tournament))
        .route(
            "/v1/tournaments/:id/award-predictions",
            post(awards::submit_award_prediction),
        )
        .route("/v1/tournaments/:id/winner", post(awards::declare_winner))
        .route("/v1/tournaments/:id/awards/:kind", post(awards::declare_award))
        .route(
            "/v1/matches",
            get(matches::list_matches).post(matches::create_match),
        )
        .route(
            "/v1/matches/:id",
            get(matches::get_match)
                .put(matches::update_match)
                .delete(matches::delete_match),
        )
        .route("/v1/matches/:id/can-predict", get(matches::can_predict))
        .route("/v1/matches/:id/result", put(matches::set_result))
        .route("/v1/matches/:id/settle", post(matches::settle))
        .route(
            "/v1/predictions",
            get(predictions::get_own_predictions).post(predictions::upsert_prediction),
        )
        .route(
            "/v1/predictions/match/:match_id",
            get(predictions::get_own_prediction_for_match),
        )
        .route("/v1/predictions/lookup", post(predictions::lookup_own_predictions))
        .route("/v1/rules", get(rules::list_rules))
        .route("/v1/rules/:rule_type", get(rules::get_rule).put(rules::set_rule))
        .layer(cors)
        .with_state(state)
}
