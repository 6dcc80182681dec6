//! Backtester
//!
//! Offline review tools over historical trades, sharing the exact
//! computation path of the live risk controller.
//!
//! # Features
//!
//! - **Reporter**: statistics and classification of a bot's last trades
//! - **Replay**: sliding-window re-evaluation with recovery hysteresis
//! - **Post-mortem**: why a bot lost and why its risk was reduced
//!
//! # Example
//!
//! ```ignore
//! use backtester::BacktestReporter;
//!
//! let reporter = BacktestReporter::new(history, ThresholdConfig::default())?;
//! let review = reporter.review("eq-1", 10).await?;
//! println!("{review}");
//! ```

pub mod post_mortem;
pub mod replay;
pub mod reporter;

// Re-exports
pub use post_mortem::PostMortem;
pub use replay::{replay_outcomes, Replay, ReplayStep};
pub use reporter::{BacktestReporter, Review};
