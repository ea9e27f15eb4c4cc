//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `matches.rs` - Match scheduling, lifecycle and settlement writes
//! - `predictions.rs` - Prediction upserts and reads
//! - `awards.rs` - Award predictions, outcomes and award settlement writes

mod awards;
mod matches;
mod predictions;

use crate::domain::{Tournament, TournamentId, User, UserId};
use crate::engine::{RuleType, ScoringRuleSet};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{info, warn};

pub use predictions::PredictionWithMatch;

/// A user's derived counters before and after a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsChange {
    pub user_id: UserId,
    pub previous_total: i64,
    pub total_points: i64,
    pub correct_predictions: i64,
}

/// One stored rule value, global when `tournament_id` is None.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRule {
    pub rule_type: String,
    pub tournament_id: Option<TournamentId>,
    pub points: i64,
}

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Round-trip to the database; used by the readiness probe.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // User operations
    // =========================================================================

    pub async fn create_user(&self, name: &str) -> Result<User, sqlx::Error> {
        let result = sqlx::query("INSERT INTO users (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(chrono::Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?;

        Ok(User {
            id: UserId::new(result.last_insert_rowid()),
            name: name.to_string(),
            total_points: 0,
            correct_predictions: 0,
        })
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, name, total_points, correct_predictions FROM users WHERE id = ?",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// All users ordered for the standings table.
    ///
    /// Ties on points are broken by correct predictions, then by id.
    pub async fn leaderboard(&self) -> Result<Vec<User>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, total_points, correct_predictions
            FROM users
            ORDER BY total_points DESC, correct_predictions DESC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    // =========================================================================
    // Tournament operations
    // =========================================================================

    pub async fn create_tournament(&self, name: &str) -> Result<Tournament, sqlx::Error> {
        let result =
            sqlx::query("INSERT INTO tournaments (name, created_at) VALUES (?, ?)")
                .bind(name)
                .bind(chrono::Utc::now().timestamp_millis())
                .execute(&self.pool)
                .await?;

        Ok(Tournament {
            id: TournamentId::new(result.last_insert_rowid()),
            name: name.to_string(),
        })
    }

    pub async fn get_tournament(&self, id: TournamentId) -> Result<Option<Tournament>, sqlx::Error> {
        let row = sqlx::query("SELECT id, name FROM tournaments WHERE id = ?")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Tournament {
            id: TournamentId::new(r.get("id")),
            name: r.get("name"),
        }))
    }

    // =========================================================================
    // Scoring rule operations
    // =========================================================================

    /// Load every stored rule value into a rule set. Rows naming a rule type this
    /// build does not know are skipped.
    pub async fn load_rule_set(&self) -> Result<ScoringRuleSet, sqlx::Error> {
        let mut rules = ScoringRuleSet::new();

        for stored in self.stored_rules().await? {
            let Ok(rule) = RuleType::from_str(&stored.rule_type) else {
                warn!(rule = %stored.rule_type, "Ignoring unknown scoring rule row");
                continue;
            };
            match stored.tournament_id {
                Some(tournament_id) => rules.set_override(tournament_id, rule, stored.points),
                None => rules.set_global(rule, stored.points),
            }
        }

        Ok(rules)
    }

    pub async fn stored_rules(&self) -> Result<Vec<StoredRule>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT rule_type, tournament_id, points FROM scoring_rules ORDER BY tournament_id, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let tournament_id: i64 = r.get("tournament_id");
                StoredRule {
                    rule_type: r.get("rule_type"),
                    tournament_id: (tournament_id != 0).then(|| TournamentId::new(tournament_id)),
                    points: r.get("points"),
                }
            })
            .collect())
    }

    /// Store a global value (`tournament_id` None) or a tournament override.
    pub async fn upsert_rule(
        &self,
        rule: RuleType,
        tournament_id: Option<TournamentId>,
        points: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO scoring_rules (rule_type, tournament_id, points, description)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(rule_type, tournament_id) DO UPDATE SET points = excluded.points
            "#,
        )
        .bind(rule.as_str())
        .bind(tournament_id.map(|t| t.as_i64()).unwrap_or(0))
        .bind(points)
        .bind(rule.description())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Reconciliation (spans predictions and awards)
    // =========================================================================

    /// Recompute the derived counters of every user from their settled rows.
    pub async fn reconcile_all_users(&self) -> Result<Vec<TotalsChange>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<UserId> = sqlx::query("SELECT id FROM users ORDER BY id")
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(|r| UserId::new(r.get("id")))
            .collect();

        let changes = reconcile_users(&mut *tx, &ids).await?;
        tx.commit().await?;
        Ok(changes)
    }
}

fn user_from_row(row: &SqliteRow) -> User {
    User {
        id: UserId::new(row.get("id")),
        name: row.get("name"),
        total_points: row.get("total_points"),
        correct_predictions: row.get("correct_predictions"),
    }
}

/// Re-derive `total_points` and `correct_predictions` for the given users inside the
/// caller's transaction.
///
/// `total_points` is the sum of settled prediction points plus settled award points, so
/// a re-settlement replaces the earlier credit instead of stacking on it.
pub(crate) async fn reconcile_users(
    conn: &mut SqliteConnection,
    user_ids: &[UserId],
) -> Result<Vec<TotalsChange>, sqlx::Error> {
    let mut ids = user_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let mut changes = Vec::with_capacity(ids.len());

    for user_id in ids {
        let previous: Option<i64> = sqlx::query("SELECT total_points FROM users WHERE id = ?")
            .bind(user_id.as_i64())
            .fetch_optional(&mut *conn)
            .await?
            .map(|r| r.get("total_points"));
        let Some(previous_total) = previous else {
            continue;
        };

        sqlx::query(
            r#"
            UPDATE users SET
                total_points =
                    COALESCE((SELECT SUM(points_earned) FROM predictions
                              WHERE user_id = users.id AND points_earned IS NOT NULL), 0)
                  + COALESCE((SELECT SUM(points_earned) FROM award_predictions
                              WHERE user_id = users.id AND points_earned IS NOT NULL), 0),
                correct_predictions =
                    (SELECT COUNT(*) FROM predictions
                     WHERE user_id = users.id AND points_earned > 0)
            WHERE id = ?
            "#,
        )
        .bind(user_id.as_i64())
        .execute(&mut *conn)
        .await?;

        let row = sqlx::query("SELECT total_points, correct_predictions FROM users WHERE id = ?")
            .bind(user_id.as_i64())
            .fetch_one(&mut *conn)
            .await?;
        let change = TotalsChange {
            user_id,
            previous_total,
            total_points: row.get("total_points"),
            correct_predictions: row.get("correct_predictions"),
        };

        if change.total_points != change.previous_total {
            info!(
                user = %user_id,
                previous = change.previous_total,
                total = change.total_points,
                "Reconciled user total"
            );
        }
        changes.push(change);
    }

    Ok(changes)
}
