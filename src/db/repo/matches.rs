//! Match operations for the repository.

use crate::domain::{
    EntityId, Match, MatchId, MatchState, NewMatch, Score, TimeMs, TournamentId, UserId,
};
use crate::engine::Settlement;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, warn};

use super::{reconcile_users, Repository, TotalsChange};

const MATCH_COLUMNS: &str = "id, tournament_id, team1_id, team2_id, scheduled_at, stage, state, team1_score, team2_score";

impl Repository {
    /// Schedule a new match in the upcoming state.
    ///
    /// # Errors
    /// Returns an error if the insert fails (including identical team ids).
    pub async fn insert_match(&self, new: &NewMatch) -> Result<Match, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO matches (
                tournament_id, team1_id, team2_id, scheduled_at, stage, state, created_at
            ) VALUES (?, ?, ?, ?, ?, 'upcoming', ?)
            "#,
        )
        .bind(new.tournament_id.map(|t| t.as_i64()))
        .bind(new.team1_id.as_i64())
        .bind(new.team2_id.as_i64())
        .bind(new.scheduled_at.as_ms())
        .bind(new.stage.as_deref())
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(Match {
            id: MatchId::new(result.last_insert_rowid()),
            tournament_id: new.tournament_id,
            team1_id: new.team1_id,
            team2_id: new.team2_id,
            scheduled_at: new.scheduled_at,
            stage: new.stage.clone(),
            state: MatchState::Upcoming,
            result: None,
        })
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_match(&self, id: MatchId) -> Result<Option<Match>, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = ?"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().and_then(match_from_row))
    }

    /// Matches in kick-off order, optionally restricted to one tournament.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_matches(
        &self,
        tournament_id: Option<TournamentId>,
    ) -> Result<Vec<Match>, sqlx::Error> {
        let rows = match tournament_id {
            Some(t) => {
                sqlx::query(&format!(
                    "SELECT {MATCH_COLUMNS} FROM matches WHERE tournament_id = ? ORDER BY scheduled_at, id"
                ))
                .bind(t.as_i64())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {MATCH_COLUMNS} FROM matches ORDER BY scheduled_at, id"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().filter_map(match_from_row).collect())
    }

    /// Replace the teams, tournament, kick-off and stage of a match, but only while it
    /// is still upcoming and `now` is before its current kick-off.
    ///
    /// Returns None when the match is missing or has already started.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn update_match_if_upcoming(
        &self,
        id: MatchId,
        changes: &NewMatch,
        now: TimeMs,
    ) -> Result<Option<Match>, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE matches SET
                tournament_id = ?, team1_id = ?, team2_id = ?, scheduled_at = ?, stage = ?
            WHERE id = ? AND state = 'upcoming' AND scheduled_at > ?
            "#,
        )
        .bind(changes.tournament_id.map(|t| t.as_i64()))
        .bind(changes.team1_id.as_i64())
        .bind(changes.team2_id.as_i64())
        .bind(changes.scheduled_at.as_ms())
        .bind(changes.stage.as_deref())
        .bind(id.as_i64())
        .bind(now.as_ms())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_match(id).await
    }

    /// Move every upcoming match whose kick-off has passed to live.
    ///
    /// Safe to run concurrently and repeatedly; returns the number of matches moved.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn advance_due_matches(&self, now: TimeMs) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE matches SET state = 'live' WHERE state = 'upcoming' AND scheduled_at <= ?",
        )
        .bind(now.as_ms())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            debug!(count = result.rows_affected(), "Advanced matches to live");
        }
        Ok(result.rows_affected())
    }

    /// Remove a match and its predictions, then re-derive the totals of every user who
    /// had predicted it.
    ///
    /// Returns None if the match did not exist.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn delete_match(&self, id: MatchId) -> Result<Option<Vec<TotalsChange>>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let users: Vec<UserId> = sqlx::query("SELECT user_id FROM predictions WHERE match_id = ?")
            .bind(id.as_i64())
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(|r| UserId::new(r.get("user_id")))
            .collect();

        let result = sqlx::query("DELETE FROM matches WHERE id = ?")
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        // Cascade has removed the predictions; make it explicit for connections opened
        // without foreign key enforcement.
        sqlx::query("DELETE FROM predictions WHERE match_id = ?")
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;

        let changes = reconcile_users(&mut *tx, &users).await?;
        tx.commit().await?;
        Ok(Some(changes))
    }

    /// Persist a completed match with its final score and the new points of each of its
    /// predictions, then re-derive the totals of the affected users. All in one
    /// transaction.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn apply_match_settlement(
        &self,
        completed: &Match,
        settlements: &[Settlement],
    ) -> Result<Vec<TotalsChange>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE matches SET state = ?, team1_score = ?, team2_score = ?
            WHERE id = ?
            "#,
        )
        .bind(completed.state.as_str())
        .bind(completed.result.map(|r| r.team1))
        .bind(completed.result.map(|r| r.team2))
        .bind(completed.id.as_i64())
        .execute(&mut *tx)
        .await?;

        for settlement in settlements {
            sqlx::query("UPDATE predictions SET points_earned = ? WHERE id = ? AND match_id = ?")
                .bind(settlement.points_earned)
                .bind(settlement.prediction_id.as_i64())
                .bind(completed.id.as_i64())
                .execute(&mut *tx)
                .await?;
        }

        let users: Vec<UserId> = settlements.iter().map(|s| s.user_id).collect();
        let changes = reconcile_users(&mut *tx, &users).await?;

        tx.commit().await?;
        Ok(changes)
    }
}

pub(super) fn match_from_row(row: &SqliteRow) -> Option<Match> {
    let id: i64 = row.get("id");
    let state_str: String = row.get("state");
    let state = match MatchState::from_str(&state_str) {
        Ok(state) => state,
        Err(e) => {
            warn!(match_id = id, "Skipping match row: {}", e);
            return None;
        }
    };

    let team1_score: Option<i64> = row.get("team1_score");
    let team2_score: Option<i64> = row.get("team2_score");
    let result = match (team1_score, team2_score) {
        (Some(a), Some(b)) => Score::new(a, b).ok(),
        _ => None,
    };

    Some(Match {
        id: MatchId::new(id),
        tournament_id: row
            .get::<Option<i64>, _>("tournament_id")
            .map(TournamentId::new),
        team1_id: EntityId::new(row.get("team1_id")),
        team2_id: EntityId::new(row.get("team2_id")),
        scheduled_at: TimeMs::new(row.get("scheduled_at")),
        stage: row.get("stage"),
        state,
        result,
    })
}
