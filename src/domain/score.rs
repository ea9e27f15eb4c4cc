//! Two-sided scorelines and their outcome class.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreError {
    #[error("scores cannot be negative (got {0}-{1})")]
    Negative(i64, i64),
}

/// Goals for team1 and team2. Both sides are non-negative once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Score {
    pub team1: i64,
    pub team2: i64,
}

/// Who a scoreline says won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Team1,
    Team2,
    Draw,
}

impl Score {
    /// Validate and build a scoreline.
    ///
    /// # Errors
    /// Returns `ScoreError::Negative` if either side is below zero.
    pub fn new(team1: i64, team2: i64) -> Result<Self, ScoreError> {
        if team1 < 0 || team2 < 0 {
            return Err(ScoreError::Negative(team1, team2));
        }
        Ok(Score { team1, team2 })
    }

    pub fn outcome(&self) -> Outcome {
        match self.team1.cmp(&self.team2) {
            Ordering::Greater => Outcome::Team1,
            Ordering::Less => Outcome::Team2,
            Ordering::Equal => Outcome::Draw,
        }
    }

    /// Absolute goal difference.
    pub fn margin(&self) -> i64 {
        (self.team1 - self.team2).abs()
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.team1, self.team2)
    }
}
