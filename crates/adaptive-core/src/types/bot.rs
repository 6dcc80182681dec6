//! Bot identity and the trade events that drive re-evaluation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading profile a bot runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyProfile {
    /// Conservative.
    Sentinel,
    /// Balanced; the only profile gated by the adaptive controller.
    Equilibrium,
    /// Aggressive.
    Vortex,
}

impl StrategyProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyProfile::Sentinel => "sentinel",
            StrategyProfile::Equilibrium => "equilibrium",
            StrategyProfile::Vortex => "vortex",
        }
    }
}

impl fmt::Display for StrategyProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a bot's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeEventKind {
    BuyFilled,
    SellCompleted,
}

/// Trade lifecycle notification emitted by the strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub bot_id: String,
    pub profile: StrategyProfile,
    pub kind: TradeEventKind,
}

impl TradeEvent {
    pub fn sell_completed(bot_id: impl Into<String>, profile: StrategyProfile) -> Self {
        Self {
            bot_id: bot_id.into(),
            profile,
            kind: TradeEventKind::SellCompleted,
        }
    }

    pub fn buy_filled(bot_id: impl Into<String>, profile: StrategyProfile) -> Self {
        Self {
            bot_id: bot_id.into(),
            profile,
            kind: TradeEventKind::BuyFilled,
        }
    }

    /// Only completed sells of Equilibrium bots trigger a risk evaluation.
    pub fn triggers_evaluation(&self) -> bool {
        self.profile == StrategyProfile::Equilibrium && self.kind == TradeEventKind::SellCompleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_equilibrium_sells_trigger() {
        assert!(TradeEvent::sell_completed("b", StrategyProfile::Equilibrium).triggers_evaluation());
        assert!(!TradeEvent::buy_filled("b", StrategyProfile::Equilibrium).triggers_evaluation());
        assert!(!TradeEvent::sell_completed("b", StrategyProfile::Vortex).triggers_evaluation());
        assert!(!TradeEvent::sell_completed("b", StrategyProfile::Sentinel).triggers_evaluation());
    }
}
