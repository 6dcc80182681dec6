//! Risk Manager
//!
//! Trade window statistics, threshold-based risk classification and the
//! per-bot risk controller that persists NORMAL/DEFENSIVE state.

pub mod controller;
pub mod heuristics;
pub mod risk_state_repo;
pub mod statistics;

pub use controller::{Evaluation, RiskController};
pub use heuristics::{assess_window, evaluate, next_state, Classification};
pub use risk_state_repo::{
    MemoryRiskStateStore, PostgresRiskStateStore, RiskStateStore, RiskTransition,
};
pub use statistics::{compute, compute_window, StatisticsSnapshot};
