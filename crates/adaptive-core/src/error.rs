//! Error types for the adaptive risk controller.

use thiserror::Error;

/// Failure reported by a trade history source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("unknown bot: {0}")]
    UnknownBot(String),

    #[error("trade history unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Trade history fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Invalid threshold config: {field} {message}")]
    InvalidConfig { field: &'static str, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Risk state store error: {message}")]
    Store { message: String },
}

impl Error {
    /// True when the error came from the trade history source.
    pub fn is_fetch(&self) -> bool {
        matches!(self, Error::Fetch(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
