use scoreline::db::init_db;
use scoreline::domain::{EntityId, MatchState, NewMatch};
use scoreline::engine::{MatchLifecycle, RuleType};
use scoreline::{
    AwardKind, ManualClock, MatchId, OrchestrationError, Orchestrator, Repository, TimeMs,
    TournamentId, UserId,
};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

const HOUR: i64 = 60 * 60 * 1000;
const KICKOFF: i64 = 1_700_000_000_000;

struct TestEnv {
    orchestrator: Orchestrator,
    repo: Arc<Repository>,
    clock: Arc<ManualClock>,
    _temp: TempDir,
}

async fn setup() -> TestEnv {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");

    let repo = Arc::new(Repository::new(pool));
    let clock = Arc::new(ManualClock::new(TimeMs::new(KICKOFF - 2 * HOUR)));
    let orchestrator = Orchestrator::new(repo.clone(), clock.clone(), MatchLifecycle::default());

    TestEnv {
        orchestrator,
        repo,
        clock,
        _temp: temp_dir,
    }
}

impl TestEnv {
    async fn schedule(&self, scheduled_at: i64) -> MatchId {
        self.orchestrator
            .create_match(NewMatch {
                tournament_id: None,
                team1_id: EntityId::new(100),
                team2_id: EntityId::new(200),
                scheduled_at: TimeMs::new(scheduled_at),
                stage: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn total(&self, user: UserId) -> i64 {
        self.repo.get_user(user).await.unwrap().unwrap().total_points
    }

    /// Settled match points plus settled award points of one tournament, read row by row.
    async fn sum_of_parts(&self, user: UserId, tournament: TournamentId) -> i64 {
        let match_points: i64 = self
            .repo
            .predictions_for_user(user)
            .await
            .unwrap()
            .iter()
            .filter_map(|row| row.prediction.points_earned)
            .sum();

        let mut award_points = 0;
        for kind in [
            AwardKind::TournamentWinner,
            AwardKind::BestPlayer,
            AwardKind::BestGoalScorer,
        ] {
            award_points += self
                .repo
                .award_predictions_for(tournament, kind)
                .await
                .unwrap()
                .iter()
                .filter(|p| p.user_id == user)
                .filter_map(|p| p.points_earned)
                .sum::<i64>();
        }

        match_points + award_points
    }
}

#[tokio::test]
async fn test_exact_prediction_credited_exactly_once() {
    let env = setup().await;
    let o = &env.orchestrator;
    let user = o.create_user("alice").await.unwrap();
    let m = env.schedule(KICKOFF).await;

    let decision = o.can_predict(m).await.unwrap();
    assert!(decision.allowed);

    let stored = o.upsert_prediction(user.id, m, 2, 1).await.unwrap();
    assert_eq!(stored.points_earned, None);

    env.clock.set(TimeMs::new(KICKOFF + 2 * HOUR));
    let (_, report) = o.set_match_result(m, 2, 1).await.unwrap();
    let exact = o.get_rule_value("exact_score", None).await.unwrap();
    assert_eq!(report.settlements[0].points_earned, exact);
    assert_eq!(env.total(user.id).await, exact);

    // Settling again from the stored result does not credit twice.
    assert_ok!(o.settle_match(m).await);
    assert_eq!(env.total(user.id).await, exact);
}

#[tokio::test]
async fn test_correction_reflects_only_latest_settlement() {
    let env = setup().await;
    let o = &env.orchestrator;
    let user = o.create_user("bob").await.unwrap();
    let m = env.schedule(KICKOFF).await;

    o.upsert_prediction(user.id, m, 2, 1).await.unwrap();
    env.clock.set(TimeMs::new(KICKOFF + HOUR));

    o.set_match_result(m, 2, 1).await.unwrap();
    assert_eq!(env.total(user.id).await, 5);

    o.set_match_result(m, 1, 1).await.unwrap();
    // (2,1) vs (1,1): wrong outcome, team2 goal count right.
    assert_eq!(env.total(user.id).await, 1);

    let user = env.repo.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(user.correct_predictions, 1);
}

#[tokio::test]
async fn test_second_submission_replaces_first() {
    let env = setup().await;
    let o = &env.orchestrator;
    let user = o.create_user("carol").await.unwrap();
    let m = env.schedule(KICKOFF).await;

    let first = o.upsert_prediction(user.id, m, 0, 0).await.unwrap();
    env.clock.advance_ms(HOUR);
    let second = o.upsert_prediction(user.id, m, 3, 2).await.unwrap();

    assert_eq!(first.id, second.id);
    let rows = env.repo.predictions_for_match(m).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].guess.team1, 3);
    assert_eq!(rows[0].guess.team2, 2);
}

#[tokio::test]
async fn test_gate_closes_at_scheduled_time_without_advance() {
    let env = setup().await;
    let o = &env.orchestrator;
    let user = o.create_user("dave").await.unwrap();
    let m = env.schedule(KICKOFF).await;

    env.clock.set(TimeMs::new(KICKOFF - 1));
    let open_once = o.can_predict(m).await.unwrap();
    let open_twice = o.can_predict(m).await.unwrap();
    assert_eq!(open_once, open_twice);
    assert!(open_once.allowed);

    env.clock.set(TimeMs::new(KICKOFF));
    // The stored state is still upcoming until something reads through the lifecycle.
    let stored = env.repo.get_match(m).await.unwrap().unwrap();
    assert_eq!(stored.state, MatchState::Upcoming);

    let err = assert_err!(o.upsert_prediction(user.id, m, 1, 0).await);
    assert!(matches!(err, OrchestrationError::NotAllowed(ref r) if r == "match already started"));

    let closed = o.can_predict(m).await.unwrap();
    assert!(!closed.allowed);
    assert_eq!(closed.reason.as_deref(), Some("match in progress"));
}

#[tokio::test]
async fn test_completed_match_rejects_predictions() {
    let env = setup().await;
    let o = &env.orchestrator;
    let user = o.create_user("erin").await.unwrap();
    let m = env.schedule(KICKOFF).await;

    env.clock.set(TimeMs::new(KICKOFF + HOUR));
    o.set_match_result(m, 0, 0).await.unwrap();

    let decision = o.can_predict(m).await.unwrap();
    assert_eq!(decision.reason.as_deref(), Some("match already completed"));
    assert_err!(o.upsert_prediction(user.id, m, 0, 0).await);
}

#[tokio::test]
async fn test_delete_settled_match_reconciles_totals() {
    let env = setup().await;
    let o = &env.orchestrator;
    let user = o.create_user("frank").await.unwrap();
    let kept = env.schedule(KICKOFF).await;
    let dropped = env.schedule(KICKOFF + HOUR).await;

    o.upsert_prediction(user.id, kept, 1, 0).await.unwrap();
    o.upsert_prediction(user.id, dropped, 2, 2).await.unwrap();

    env.clock.set(TimeMs::new(KICKOFF + 3 * HOUR));
    o.set_match_result(kept, 1, 0).await.unwrap();
    o.set_match_result(dropped, 2, 2).await.unwrap();
    assert_eq!(env.total(user.id).await, 10);

    let totals = o.delete_match(dropped).await.unwrap();
    assert_eq!(totals.len(), 1);
    assert_eq!(totals[0].previous_total, 10);
    assert_eq!(totals[0].total_points, 5);

    assert!(env.repo.predictions_for_match(dropped).await.unwrap().is_empty());
    assert!(matches!(
        o.get_match(dropped).await,
        Err(OrchestrationError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_tournament_override_applies_only_to_its_matches() {
    let env = setup().await;
    let o = &env.orchestrator;
    let user = o.create_user("gina").await.unwrap();
    let cup = o.create_tournament("Cup").await.unwrap();

    o.set_rule_value(RuleType::ExactScore.as_str(), Some(cup.id), 12)
        .await
        .unwrap();

    let in_cup = o
        .create_match(NewMatch {
            tournament_id: Some(cup.id),
            team1_id: EntityId::new(1),
            team2_id: EntityId::new(2),
            scheduled_at: TimeMs::new(KICKOFF),
            stage: Some("final".to_string()),
        })
        .await
        .unwrap();
    let friendly = env.schedule(KICKOFF).await;

    o.upsert_prediction(user.id, in_cup.id, 1, 0).await.unwrap();
    o.upsert_prediction(user.id, friendly, 1, 0).await.unwrap();

    env.clock.set(TimeMs::new(KICKOFF + HOUR));
    let (_, cup_report) = o.set_match_result(in_cup.id, 1, 0).await.unwrap();
    let (_, friendly_report) = o.set_match_result(friendly, 1, 0).await.unwrap();

    assert_eq!(cup_report.settlements[0].points_earned, 12);
    assert_eq!(friendly_report.settlements[0].points_earned, 5);
    assert_eq!(env.total(user.id).await, 17);
}

#[tokio::test]
async fn test_leaderboard_orders_by_points_then_correct() {
    let env = setup().await;
    let o = &env.orchestrator;
    let leader = o.create_user("leader").await.unwrap();
    let one_hit = o.create_user("one-hit").await.unwrap();
    let two_hits = o.create_user("two-hits").await.unwrap();

    let a = env.schedule(KICKOFF).await;
    let b = env.schedule(KICKOFF + HOUR).await;

    // Actual results: a = 2-0, b = 1-1.
    o.upsert_prediction(leader.id, a, 2, 0).await.unwrap(); // exact: 5
    o.upsert_prediction(leader.id, b, 1, 1).await.unwrap(); // exact: 5
    o.upsert_prediction(one_hit.id, a, 2, 0).await.unwrap(); // exact: 5
    o.upsert_prediction(one_hit.id, b, 0, 3).await.unwrap(); // nothing
    o.upsert_prediction(two_hits.id, a, 5, 1).await.unwrap(); // winner: 2
    o.upsert_prediction(two_hits.id, b, 0, 0).await.unwrap(); // draw: 3

    env.clock.set(TimeMs::new(KICKOFF + 3 * HOUR));
    o.set_match_result(a, 2, 0).await.unwrap();
    o.set_match_result(b, 1, 1).await.unwrap();

    let board = o.leaderboard().await.unwrap();
    let order: Vec<UserId> = board.iter().map(|e| e.user_id).collect();
    assert_eq!(order, vec![leader.id, two_hits.id, one_hit.id]);
    assert_eq!(
        board.iter().map(|e| e.total_points).collect::<Vec<_>>(),
        vec![10, 5, 5]
    );
    assert_eq!(
        board.iter().map(|e| e.correct_predictions).collect::<Vec<_>>(),
        vec![2, 2, 1]
    );
    assert_eq!(board.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_total_combines_match_points_and_award_bonus() {
    let env = setup().await;
    let o = &env.orchestrator;
    let user = o.create_user("hana").await.unwrap();
    let cup = o.create_tournament("Cup").await.unwrap();

    let opener = o
        .create_match(NewMatch {
            tournament_id: Some(cup.id),
            team1_id: EntityId::new(1),
            team2_id: EntityId::new(2),
            scheduled_at: TimeMs::new(KICKOFF),
            stage: Some("group".to_string()),
        })
        .await
        .unwrap();

    o.upsert_prediction(user.id, opener.id, 2, 1).await.unwrap();
    assert_ok!(
        o.submit_award_prediction(user.id, cup.id, AwardKind::TournamentWinner, EntityId::new(1))
            .await
    );

    // Match points only.
    env.clock.set(TimeMs::new(KICKOFF + HOUR));
    o.set_match_result(opener.id, 2, 1).await.unwrap();
    assert_eq!(env.total(user.id).await, 5);
    assert_eq!(env.sum_of_parts(user.id, cup.id).await, 5);

    // Award bonus on top.
    o.declare_tournament_winner(cup.id, EntityId::new(1)).await.unwrap();
    assert_eq!(env.total(user.id).await, 15);
    assert_eq!(env.sum_of_parts(user.id, cup.id).await, 15);

    // A corrected result replaces the match credit and keeps the award.
    o.set_match_result(opener.id, 1, 1).await.unwrap();
    assert_eq!(env.total(user.id).await, 1 + 10);
    assert_eq!(env.sum_of_parts(user.id, cup.id).await, 11);

    let stored = env.repo.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(stored.correct_predictions, 1);
}
