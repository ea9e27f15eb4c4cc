use axum::body::Body;
use axum::http::{Request, StatusCode};
use scoreline::api::{self, AppState};
use scoreline::db::init_db;
use scoreline::engine::MatchLifecycle;
use scoreline::{ManualClock, Orchestrator, Repository, TimeMs};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

const HOUR: i64 = 60 * 60 * 1000;
const KICKOFF: i64 = 1_700_000_000_000;

struct TestApp {
    app: axum::Router,
    clock: Arc<ManualClock>,
    _temp: TempDir,
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");

    let repo = Arc::new(Repository::new(pool));
    let clock = Arc::new(ManualClock::new(TimeMs::new(KICKOFF - 2 * HOUR)));
    let orchestrator = Arc::new(Orchestrator::new(
        repo.clone(),
        clock.clone(),
        MatchLifecycle::default(),
    ));
    let app = api::create_router(AppState::new(repo, orchestrator));

    TestApp {
        app,
        clock,
        _temp: temp_dir,
    }
}

impl TestApp {
    async fn call(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn create_user(&self, name: &str) -> i64 {
        let (status, body) = self.call("POST", "/v1/users", Some(json!({"name": name}))).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    async fn create_match(&self, scheduled_at: i64, tournament_id: Option<i64>) -> i64 {
        let (status, body) = self
            .call(
                "POST",
                "/v1/matches",
                Some(json!({
                    "tournamentId": tournament_id,
                    "team1Id": 10,
                    "team2Id": 20,
                    "scheduledAt": scheduled_at,
                    "stage": "group",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = setup_test_app().await;

    let (status, body) = app.call("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.call("GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_predict_settle_and_stats_flow() {
    let app = setup_test_app().await;
    let user = app.create_user("amy").await;
    let m = app.create_match(KICKOFF, None).await;

    let (status, body) = app
        .call("GET", &format!("/v1/matches/{}/can-predict", m), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"allowed": true}));

    let (status, body) = app
        .call(
            "POST",
            "/v1/predictions",
            Some(json!({"userId": user, "matchId": m, "score1": 2, "score2": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score1"], 2);
    assert!(body["pointsEarned"].is_null());

    // Not visible to others before kick-off.
    let (_, body) = app
        .call("GET", &format!("/v1/users/{}/predictions", user), None)
        .await;
    assert_eq!(body.as_array().unwrap().len(), 0);

    app.clock.set(TimeMs::new(KICKOFF + 2 * HOUR));
    let (status, body) = app
        .call(
            "PUT",
            &format!("/v1/matches/{}/result", m),
            Some(json!({"score1": 2, "score2": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match"]["state"], "completed");
    assert_eq!(body["settlement"]["settlements"][0]["pointsEarned"], 5);

    let (_, body) = app
        .call("GET", &format!("/v1/users/{}/predictions", user), None)
        .await;
    assert_eq!(body[0]["pointsEarned"], 5);
    assert_eq!(body[0]["match"]["id"], m);

    let (status, body) = app
        .call("GET", &format!("/v1/users/{}/stats", user), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalPredictions"], 1);
    assert_eq!(body["exactScores"], 1);
    assert_eq!(body["totalPoints"], 5);

    let (_, body) = app.call("GET", "/v1/leaderboard", None).await;
    assert_eq!(body[0]["rank"], 1);
    assert_eq!(body[0]["userId"], user);
    assert_eq!(body[0]["totalPoints"], 5);
}

#[tokio::test]
async fn test_prediction_errors_map_to_status_codes() {
    let app = setup_test_app().await;
    let user = app.create_user("ben").await;
    let m = app.create_match(KICKOFF, None).await;

    let (status, body) = app
        .call(
            "POST",
            "/v1/predictions",
            Some(json!({"userId": user, "matchId": m, "score1": -1, "score2": 0})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = app
        .call(
            "POST",
            "/v1/predictions",
            Some(json!({"userId": user, "matchId": 9999, "score1": 1, "score2": 0})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.clock.set(TimeMs::new(KICKOFF));
    let (status, body) = app
        .call(
            "POST",
            "/v1/predictions",
            Some(json!({"userId": user, "matchId": m, "score1": 1, "score2": 0})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "match already started");
}

#[tokio::test]
async fn test_result_before_kickoff_is_conflict() {
    let app = setup_test_app().await;
    let m = app.create_match(KICKOFF, None).await;

    let (status, body) = app
        .call(
            "PUT",
            &format!("/v1/matches/{}/result", m),
            Some(json!({"score1": 1, "score2": 0})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "match has not started yet");
}

#[tokio::test]
async fn test_match_visibility_for_readers_and_admins() {
    let app = setup_test_app().await;
    let soon = app.create_match(KICKOFF, None).await;
    let far = app.create_match(KICKOFF + 30 * 24 * HOUR, None).await;

    let (_, body) = app.call("GET", "/v1/matches", None).await;
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![soon]);

    let (_, body) = app.call("GET", "/v1/matches?admin=true", None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    // Fetching by id is not filtered.
    let (status, body) = app.call("GET", &format!("/v1/matches/{}", far), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "upcoming");
}

#[tokio::test]
async fn test_delete_match_endpoint() {
    let app = setup_test_app().await;
    let m = app.create_match(KICKOFF, None).await;

    let (status, body) = app.call("DELETE", &format!("/v1/matches/{}", m), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, _) = app.call("DELETE", &format!("/v1/matches/{}", m), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rule_endpoints() {
    let app = setup_test_app().await;

    let (status, body) = app.call("GET", "/v1/rules", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 8);

    let (_, body) = app.call("GET", "/v1/rules/exact_score", None).await;
    assert_eq!(body["points"], 5);

    let (status, body) = app
        .call("PUT", "/v1/rules/exact_score", Some(json!({"points": 7})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ruleType"], "exact_score");
    assert_eq!(body["points"], 7);

    let (_, body) = app.call("GET", "/v1/rules/exact_score", None).await;
    assert_eq!(body["points"], 7);

    let (status, body) = app.call("GET", "/v1/rules/first_goal", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points"], 0);

    let (status, _) = app
        .call("PUT", "/v1/rules/exact_score", Some(json!({"points": -3})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            "PUT",
            "/v1/rules/correct_winner",
            Some(json!({"points": 9_223_372_036_854_775_807i64})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, body) = app.call("GET", "/v1/rules/correct_winner", None).await;
    assert_eq!(body["points"], 2);
}

#[tokio::test]
async fn test_award_endpoints() {
    let app = setup_test_app().await;
    let user = app.create_user("cleo").await;

    let (status, body) = app
        .call("POST", "/v1/tournaments", Some(json!({"name": "Cup"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let cup = body["id"].as_i64().unwrap();
    app.create_match(KICKOFF, Some(cup)).await;

    let (status, body) = app
        .call(
            "POST",
            &format!("/v1/tournaments/{}/award-predictions", cup),
            Some(json!({"userId": user, "kind": "top_scorer", "entityId": 9})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "best_goal_scorer");

    let (status, _) = app
        .call(
            "POST",
            &format!("/v1/tournaments/{}/awards/golden_glove", cup),
            Some(json!({"entityId": 9})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            "POST",
            &format!("/v1/tournaments/{}/winner", cup),
            Some(json!({"entityId": 10})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "tournament has not started");

    app.clock.set(TimeMs::new(KICKOFF + HOUR));
    let (status, body) = app
        .call(
            "POST",
            &format!("/v1/tournaments/{}/awards/best_goal_scorer", cup),
            Some(json!({"entityId": 9})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["credits"][0]["pointsEarned"], 7);

    let (_, body) = app
        .call("GET", &format!("/v1/users/{}/stats", user), None)
        .await;
    assert_eq!(body["totalPoints"], 7);
}

#[tokio::test]
async fn test_reschedule_endpoint() {
    let app = setup_test_app().await;
    let user = app.create_user("dora").await;
    let m = app.create_match(KICKOFF, None).await;

    let (status, body) = app
        .call(
            "PUT",
            &format!("/v1/matches/{}", m),
            Some(json!({
                "team1Id": 10,
                "team2Id": 20,
                "scheduledAt": KICKOFF + 3 * HOUR,
                "stage": "semi-final",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scheduledAt"], KICKOFF + 3 * HOUR);
    assert_eq!(body["stage"], "semi-final");

    // The old kick-off no longer closes predictions.
    app.clock.set(TimeMs::new(KICKOFF + HOUR));
    let (status, _) = app
        .call(
            "POST",
            "/v1/predictions",
            Some(json!({"userId": user, "matchId": m, "score1": 0, "score2": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    app.clock.set(TimeMs::new(KICKOFF + 3 * HOUR));
    let (status, body) = app
        .call(
            "PUT",
            &format!("/v1/matches/{}", m),
            Some(json!({"team1Id": 10, "team2Id": 20, "scheduledAt": KICKOFF + 9 * HOUR})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    let (status, _) = app
        .call(
            "PUT",
            "/v1/matches/9999",
            Some(json!({"team1Id": 10, "team2Id": 20, "scheduledAt": KICKOFF})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_matches_filtered_by_state() {
    let app = setup_test_app().await;
    let played = app.create_match(KICKOFF, None).await;
    let next = app.create_match(KICKOFF + 4 * HOUR, None).await;

    app.clock.set(TimeMs::new(KICKOFF + HOUR));
    app.call(
        "PUT",
        &format!("/v1/matches/{}/result", played),
        Some(json!({"score1": 3, "score2": 0})),
    )
    .await;

    let (status, body) = app.call("GET", "/v1/matches?state=completed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], played);

    let (_, body) = app.call("GET", "/v1/matches?state=upcoming", None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], next);

    let (status, _) = app.call("GET", "/v1/matches?state=postponed", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_own_prediction_endpoints() {
    let app = setup_test_app().await;
    let user = app.create_user("eli").await;
    let a = app.create_match(KICKOFF, None).await;
    let b = app.create_match(KICKOFF + HOUR, None).await;

    app.call(
        "POST",
        "/v1/predictions",
        Some(json!({"userId": user, "matchId": a, "score1": 1, "score2": 2})),
    )
    .await;

    // Before kick-off the owner sees the guess; the public view does not.
    let (status, body) = app
        .call("GET", &format!("/v1/predictions?userId={}", user), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["match"]["id"], a);
    let (_, body) = app
        .call("GET", &format!("/v1/users/{}/predictions", user), None)
        .await;
    assert_eq!(body.as_array().unwrap().len(), 0);

    let (status, body) = app
        .call("GET", &format!("/v1/predictions/match/{}?userId={}", a, user), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score1"], 1);
    assert_eq!(body["score2"], 2);

    let (status, body) = app
        .call("GET", &format!("/v1/predictions/match/{}?userId={}", b, user), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_null());

    let (status, body) = app
        .call(
            "POST",
            "/v1/predictions/lookup",
            Some(json!({"userId": user, "matchIds": [a, b]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let found = body.as_object().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[&a.to_string()]["score2"], 2);

    let (status, _) = app
        .call("GET", "/v1/predictions?userId=9999", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
