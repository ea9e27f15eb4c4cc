//! Users and tournaments, kept to the fields the scoring core reads.

use crate::domain::{TournamentId, UserId};
use serde::{Deserialize, Serialize};

/// A prediction submitter with derived point counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Sum of settled prediction points plus settled award points.
    pub total_points: i64,
    /// Settled predictions that earned at least one point.
    pub correct_predictions: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
}
