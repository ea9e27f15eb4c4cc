//! Pure computation engine(s) for lifecycle, admission and scoring logic.
//!
//! Nothing in here touches storage or the clock; callers pass `now` and the loaded
//! records in, and persist whatever comes back.

pub mod awards;
pub mod gate;
pub mod lifecycle;
pub mod rules;
pub mod scoring;

pub use awards::{AwardCredit, AwardSettlement};
pub use gate::{GateDecision, PredictionGate};
pub use lifecycle::{LifecycleError, MatchLifecycle, Viewer, DEFAULT_LOOKAHEAD_MS};
pub use rules::{RuleType, ScoringRuleSet, MAX_RULE_POINTS};
pub use scoring::{ScoreBreakdown, ScoringEngine, SettleError, Settlement};
