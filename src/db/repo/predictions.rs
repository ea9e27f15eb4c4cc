//! Prediction operations for the repository.

use crate::domain::{Match, MatchId, Prediction, PredictionId, Score, TimeMs, UserId};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::warn;

use super::matches::match_from_row;
use super::Repository;

const PREDICTION_COLUMNS: &str =
    "id, user_id, match_id, team1_score, team2_score, points_earned, created_at, updated_at";

/// A prediction next to the match it was made on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionWithMatch {
    pub prediction: Prediction,
    pub fixture: Match,
}

impl Repository {
    /// Create or replace a user's prediction for a match, but only while the match is
    /// still upcoming and `now` is before kick-off.
    ///
    /// The admission check and the write are one statement, so a prediction cannot land
    /// after a concurrent request has moved the match on. A replaced prediction loses its
    /// earned points.
    ///
    /// Returns None when the match was closed (or missing) at write time.
    ///
    /// # Errors
    /// Returns an error if the statement fails (for instance an unknown user).
    pub async fn upsert_prediction_if_open(
        &self,
        user_id: UserId,
        match_id: MatchId,
        guess: Score,
        now: TimeMs,
    ) -> Result<Option<Prediction>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO predictions (
                user_id, match_id, team1_score, team2_score, points_earned, created_at, updated_at
            )
            SELECT ?, ?, ?, ?, NULL, ?, ?
            WHERE EXISTS (
                SELECT 1 FROM matches
                WHERE id = ? AND state = 'upcoming' AND scheduled_at > ?
            )
            ON CONFLICT(user_id, match_id) DO UPDATE SET
                team1_score = excluded.team1_score,
                team2_score = excluded.team2_score,
                points_earned = NULL,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id.as_i64())
        .bind(match_id.as_i64())
        .bind(guess.team1)
        .bind(guess.team2)
        .bind(now.as_ms())
        .bind(now.as_ms())
        .bind(match_id.as_i64())
        .bind(now.as_ms())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let row = sqlx::query(&format!(
            "SELECT {PREDICTION_COLUMNS} FROM predictions WHERE user_id = ? AND match_id = ?"
        ))
        .bind(user_id.as_i64())
        .bind(match_id.as_i64())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(prediction_from_row(&row))
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_prediction(
        &self,
        user_id: UserId,
        match_id: MatchId,
    ) -> Result<Option<Prediction>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {PREDICTION_COLUMNS} FROM predictions WHERE user_id = ? AND match_id = ?"
        ))
        .bind(user_id.as_i64())
        .bind(match_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().and_then(prediction_from_row))
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn predictions_for_match(&self, match_id: MatchId) -> Result<Vec<Prediction>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {PREDICTION_COLUMNS} FROM predictions WHERE match_id = ? ORDER BY id"
        ))
        .bind(match_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(prediction_from_row).collect())
    }

    /// All of a user's predictions with their matches, latest kick-off first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn predictions_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<PredictionWithMatch>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT
                p.id AS p_id, p.user_id, p.match_id, p.team1_score AS p_team1_score,
                p.team2_score AS p_team2_score, p.points_earned, p.created_at, p.updated_at,
                m.id, m.tournament_id, m.team1_id, m.team2_id, m.scheduled_at, m.stage,
                m.state, m.team1_score, m.team2_score
            FROM predictions p
            JOIN matches m ON m.id = p.match_id
            WHERE p.user_id = ?
            ORDER BY m.scheduled_at DESC, p.id DESC
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let fixture = match_from_row(row)?;
                let guess = score_or_warn(
                    row.get("p_id"),
                    row.get("p_team1_score"),
                    row.get("p_team2_score"),
                )?;
                Some(PredictionWithMatch {
                    prediction: Prediction {
                        id: PredictionId::new(row.get("p_id")),
                        user_id: UserId::new(row.get("user_id")),
                        match_id: MatchId::new(row.get("match_id")),
                        guess,
                        points_earned: row.get("points_earned"),
                        created_at: TimeMs::new(row.get("created_at")),
                        updated_at: TimeMs::new(row.get("updated_at")),
                    },
                    fixture,
                })
            })
            .collect())
    }
}

fn score_or_warn(prediction_id: i64, team1: i64, team2: i64) -> Option<Score> {
    match Score::new(team1, team2) {
        Ok(score) => Some(score),
        Err(e) => {
            warn!(prediction_id, "Skipping prediction row: {}", e);
            None
        }
    }
}

fn prediction_from_row(row: &SqliteRow) -> Option<Prediction> {
    let id: i64 = row.get("id");
    let guess = score_or_warn(id, row.get("team1_score"), row.get("team2_score"))?;

    Some(Prediction {
        id: PredictionId::new(id),
        user_id: UserId::new(row.get("user_id")),
        match_id: MatchId::new(row.get("match_id")),
        guess,
        points_earned: row.get("points_earned"),
        created_at: TimeMs::new(row.get("created_at")),
        updated_at: TimeMs::new(row.get("updated_at")),
    })
}
