//! Adaptive risk controller for the Equilibrium strategy
//!
//! This is the root crate that provides benchmark and cross-crate test access
//! to the internal modules. For actual functionality, use the individual
//! crates directly:
//!
//! - `adaptive-core`: Shared types, threshold configuration, trade history sources
//! - `risk-manager`: Statistics engine, heuristic evaluator, risk controller
//! - `backtester`: Offline review, replay and post-mortem
//! - `adaptive-review`: Command-line review tool

// Re-export for benchmarks
pub use adaptive_core as core;
pub use backtester as review;
pub use risk_manager as risk;
