//! Configuration management for the adaptive risk controller.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Prefix for environment overrides of [`ThresholdConfig`] fields,
/// e.g. `ADAPTIVE_VOL_THRESHOLD=1.2`.
pub const THRESHOLD_ENV_PREFIX: &str = "ADAPTIVE";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: Option<DatabaseConfig>,
    pub history: HistoryConfig,
    /// Optional threshold file (TOML/JSON/YAML).
    pub thresholds_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryConfig {
    /// CSV trade log used instead of PostgreSQL when set.
    pub trades_csv: Option<PathBuf>,
    /// Trade side considered a closed trade in the CSV log.
    pub side: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database = match env::var("DATABASE_URL") {
            Ok(url) => Some(DatabaseConfig {
                url,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            }),
            Err(_) => None,
        };

        let history = HistoryConfig {
            trades_csv: env::var("TRADES_CSV").ok().map(PathBuf::from),
            side: env::var("TRADES_SIDE").unwrap_or_else(|_| "SELL".to_string()),
        };

        Ok(Self {
            database,
            history,
            thresholds_path: env::var("ADAPTIVE_THRESHOLDS_FILE").ok().map(PathBuf::from),
        })
    }

    /// Database settings, or a configuration error when `DATABASE_URL` is missing.
    pub fn require_database(&self) -> Result<&DatabaseConfig> {
        self.database.as_ref().ok_or_else(|| Error::Config {
            message: "DATABASE_URL environment variable not set".to_string(),
        })
    }
}

/// Tunable thresholds for the heuristic evaluator.
///
/// All percentages are expressed in percentage points of capital spent on a
/// trade (`0.8` means 0.8 %).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Longest losing run that, together with drawdown, turns DEFENSIVE.
    pub streak_threshold: u32,
    /// Peak-to-trough decline of the cumulative pnl curve.
    pub drawdown_threshold: f64,
    /// Sample standard deviation of pnl, only while net negative.
    pub vol_threshold: f64,
    /// Mean absolute pnl at or below which the market is considered range bound.
    pub range_threshold: f64,
    /// Share of adjacent trades flipping sign.
    pub flip_threshold: f64,
    /// Mean absolute pnl ceiling for the lateral chop rule.
    pub chop_threshold: f64,
    /// Number of most recent trades per evaluation.
    pub window_limit: usize,
    /// Windows smaller than this classify as insufficient data. Never below 2.
    pub min_trades: usize,
    /// Consecutive clean evaluations required to leave DEFENSIVE.
    pub recovery_evaluations: u32,
    /// Wins among the last three trades required to leave DEFENSIVE.
    pub recovery_wins_last_3: u32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            streak_threshold: 3,
            drawdown_threshold: 5.0,
            vol_threshold: 0.8,
            range_threshold: 0.25,
            flip_threshold: 0.6,
            chop_threshold: 0.3,
            window_limit: 10,
            min_trades: 2,
            recovery_evaluations: 2,
            recovery_wins_last_3: 2,
        }
    }
}

impl ThresholdConfig {
    /// Load thresholds: defaults, then the optional file, then `ADAPTIVE_*`
    /// environment overrides. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, THRESHOLD_ENV_PREFIX)
    }

    /// Same as [`ThresholdConfig::load`] with a custom environment prefix.
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(Error::Config {
                    message: format!("threshold file not found: {}", path.display()),
                });
            }
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(env_prefix)
                .try_parsing(true)
                .ignore_empty(true),
        );

        let thresholds: ThresholdConfig = builder.build()?.try_deserialize()?;
        thresholds.validate()?;

        Ok(thresholds)
    }

    /// Reject values outside a sane domain before any evaluation runs.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("drawdown_threshold", self.drawdown_threshold),
            ("vol_threshold", self.vol_threshold),
            ("range_threshold", self.range_threshold),
            ("flip_threshold", self.flip_threshold),
            ("chop_threshold", self.chop_threshold),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig {
                    field,
                    message: format!("must be a finite non-negative number, got {value}"),
                });
            }
        }

        if self.flip_threshold > 1.0 {
            return Err(invalid("flip_threshold", "must not exceed 1.0"));
        }
        if self.streak_threshold == 0 {
            return Err(invalid("streak_threshold", "must be at least 1"));
        }
        if self.window_limit == 0 {
            return Err(invalid("window_limit", "must be at least 1"));
        }
        if self.min_trades < 2 {
            return Err(invalid("min_trades", "must be at least 2"));
        }
        if self.min_trades > self.window_limit {
            return Err(invalid("min_trades", "must not exceed window_limit"));
        }
        if self.recovery_evaluations == 0 {
            return Err(invalid("recovery_evaluations", "must be at least 1"));
        }
        if self.recovery_wins_last_3 > 3 {
            return Err(invalid("recovery_wins_last_3", "must be between 0 and 3"));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, message: &str) -> Error {
    Error::InvalidConfig {
        field,
        message: message.to_string(),
    }
}
