//! Operations that combine the engine with storage and the clock.

mod awards;
pub mod orchestrator;

pub use awards::AwardReport;
pub use orchestrator::{
    LeaderboardEntry, OrchestrationError, Orchestrator, RuleValue, SettlementReport, UserStats,
};
