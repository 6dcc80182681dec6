//! Adaptive Core Library
//!
//! Shared types, configuration, and trade history sources for the adaptive
//! risk controller.

pub mod config;
pub mod db;
pub mod error;
pub mod history;
pub mod types;

pub use self::config::{Config, ThresholdConfig};
pub use error::{Error, FetchError, Result};
pub use history::{CsvTradeHistory, MemoryTradeHistory, TradeHistorySource};
