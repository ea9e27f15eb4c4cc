//! Award prediction and outcome operations for the repository.

use crate::domain::{AwardKind, AwardOutcome, AwardPrediction, EntityId, TimeMs, TournamentId, UserId};
use crate::engine::AwardCredit;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

use super::{reconcile_users, Repository, TotalsChange};

impl Repository {
    /// Create or replace a user's award guess, but only while no match of the
    /// tournament has kicked off. The window check and the write are one statement.
    ///
    /// Returns None when the tournament had already started at write time.
    ///
    /// # Errors
    /// Returns an error if the statement fails.
    pub async fn upsert_award_prediction_if_open(
        &self,
        user_id: UserId,
        tournament_id: TournamentId,
        kind: AwardKind,
        entity_id: EntityId,
        now: TimeMs,
    ) -> Result<Option<AwardPrediction>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO award_predictions (
                user_id, tournament_id, kind, entity_id, points_earned, created_at, updated_at
            )
            SELECT ?, ?, ?, ?, NULL, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM matches
                WHERE tournament_id = ? AND (state <> 'upcoming' OR scheduled_at <= ?)
            )
            ON CONFLICT(user_id, tournament_id, kind) DO UPDATE SET
                entity_id = excluded.entity_id,
                points_earned = NULL,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id.as_i64())
        .bind(tournament_id.as_i64())
        .bind(kind.as_str())
        .bind(entity_id.as_i64())
        .bind(now.as_ms())
        .bind(now.as_ms())
        .bind(tournament_id.as_i64())
        .bind(now.as_ms())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let row = sqlx::query(
            r#"
            SELECT id, user_id, tournament_id, kind, entity_id, points_earned
            FROM award_predictions
            WHERE user_id = ? AND tournament_id = ? AND kind = ?
            "#,
        )
        .bind(user_id.as_i64())
        .bind(tournament_id.as_i64())
        .bind(kind.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(award_prediction_from_row(&row))
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn award_predictions_for(
        &self,
        tournament_id: TournamentId,
        kind: AwardKind,
    ) -> Result<Vec<AwardPrediction>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, tournament_id, kind, entity_id, points_earned
            FROM award_predictions
            WHERE tournament_id = ? AND kind = ?
            ORDER BY id
            "#,
        )
        .bind(tournament_id.as_i64())
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(award_prediction_from_row).collect())
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_award_outcome(
        &self,
        tournament_id: TournamentId,
        kind: AwardKind,
    ) -> Result<Option<AwardOutcome>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT entity_id, declared_at FROM award_outcomes WHERE tournament_id = ? AND kind = ?",
        )
        .bind(tournament_id.as_i64())
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| AwardOutcome {
            tournament_id,
            kind,
            entity_id: EntityId::new(r.get("entity_id")),
            declared_at: TimeMs::new(r.get("declared_at")),
        }))
    }

    /// Record (or replace) the declared holder of an award, write the credit of every
    /// award prediction of that kind and re-derive the affected users' totals, in one
    /// transaction.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn apply_award_settlement(
        &self,
        outcome: &AwardOutcome,
        credits: &[AwardCredit],
    ) -> Result<Vec<TotalsChange>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO award_outcomes (tournament_id, kind, entity_id, declared_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(tournament_id, kind) DO UPDATE SET
                entity_id = excluded.entity_id,
                declared_at = excluded.declared_at
            "#,
        )
        .bind(outcome.tournament_id.as_i64())
        .bind(outcome.kind.as_str())
        .bind(outcome.entity_id.as_i64())
        .bind(outcome.declared_at.as_ms())
        .execute(&mut *tx)
        .await?;

        for credit in credits {
            sqlx::query(
                "UPDATE award_predictions SET points_earned = ? WHERE id = ? AND tournament_id = ? AND kind = ?",
            )
            .bind(credit.points_earned)
            .bind(credit.award_prediction_id)
            .bind(outcome.tournament_id.as_i64())
            .bind(outcome.kind.as_str())
            .execute(&mut *tx)
            .await?;
        }

        let users: Vec<UserId> = credits.iter().map(|c| c.user_id).collect();
        let changes = reconcile_users(&mut *tx, &users).await?;

        tx.commit().await?;
        Ok(changes)
    }
}

fn award_prediction_from_row(row: &SqliteRow) -> Option<AwardPrediction> {
    let id: i64 = row.get("id");
    let kind_str: String = row.get("kind");
    let Ok(kind) = AwardKind::from_str(&kind_str) else {
        warn!(award_prediction_id = id, kind = %kind_str, "Skipping award prediction with unknown kind");
        return None;
    };

    Some(AwardPrediction {
        id,
        user_id: UserId::new(row.get("user_id")),
        tournament_id: TournamentId::new(row.get("tournament_id")),
        kind,
        entity_id: EntityId::new(row.get("entity_id")),
        points_earned: row.get("points_earned"),
    })
}
