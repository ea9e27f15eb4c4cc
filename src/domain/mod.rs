//! Domain types for the prediction game.
//!
//! This module provides:
//! - Time and id primitives
//! - Validated scorelines and outcome classes
//! - Match, prediction and award records

pub mod fixture;
pub mod prediction;
pub mod primitives;
pub mod score;
pub mod user;

pub use fixture::{Match, MatchState, NewMatch, UnknownMatchState};
pub use prediction::{AwardKind, AwardOutcome, AwardPrediction, Prediction};
pub use primitives::{EntityId, MatchId, PredictionId, TimeMs, TournamentId, UserId};
pub use score::{Outcome, Score, ScoreError};
pub use user::{Tournament, User};
