//! Risk state persisted per bot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating posture of a bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskMode {
    #[default]
    Normal,
    Defensive,
}

impl RiskMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskMode::Normal => "NORMAL",
            RiskMode::Defensive => "DEFENSIVE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NORMAL" => Some(RiskMode::Normal),
            "DEFENSIVE" => Some(RiskMode::Defensive),
            _ => None,
        }
    }
}

impl fmt::Display for RiskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a bot is in its current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskReason {
    #[default]
    None,
    /// Long losing run together with a deep drawdown.
    LossStreakDrawdown,
    /// High pnl dispersion while net negative.
    Volatility,
    /// Outcomes stuck in a tight range.
    Range,
    /// Frequent small sign reversals.
    LateralChop,
    /// Too few trades to evaluate.
    InsufficientData,
}

impl RiskReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskReason::None => "none",
            RiskReason::LossStreakDrawdown => "loss_streak_drawdown",
            RiskReason::Volatility => "volatility",
            RiskReason::Range => "range",
            RiskReason::LateralChop => "lateral_chop",
            RiskReason::InsufficientData => "insufficient_data",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(RiskReason::None),
            "loss_streak_drawdown" => Some(RiskReason::LossStreakDrawdown),
            "volatility" => Some(RiskReason::Volatility),
            "range" => Some(RiskReason::Range),
            "lateral_chop" => Some(RiskReason::LateralChop),
            "insufficient_data" => Some(RiskReason::InsufficientData),
            _ => None,
        }
    }
}

impl fmt::Display for RiskReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk state of one bot, as read by the strategy before each decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    pub mode: RiskMode,
    pub reason: RiskReason,
    /// Formatted trigger value, e.g. `flip_rate=1.00`.
    pub detail: Option<String>,
    /// Consecutive clean evaluations observed while DEFENSIVE.
    pub clean_streak: u32,
    /// Mode before the last evaluation.
    pub previous_mode: Option<RiskMode>,
    pub updated_at: DateTime<Utc>,
}

impl RiskState {
    pub fn is_defensive(&self) -> bool {
        self.mode == RiskMode::Defensive
    }
}

impl Default for RiskState {
    fn default() -> Self {
        Self {
            mode: RiskMode::Normal,
            reason: RiskReason::None,
            detail: None,
            clean_streak: 0,
            previous_mode: None,
            updated_at: Utc::now(),
        }
    }
}
