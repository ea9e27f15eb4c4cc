pub mod api;
pub mod clock;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    AwardKind, EntityId, Match, MatchId, MatchState, Prediction, Score, TimeMs, TournamentId,
    UserId,
};
pub use error::AppError;
pub use orchestration::{OrchestrationError, Orchestrator};
