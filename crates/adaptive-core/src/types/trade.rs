//! Trade outcome types consumed by the statistics engine.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Result of one closed trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    /// P&L as a percentage of the capital spent on the trade.
    pub pnl_pct: f64,
    /// Chronological position in the bot's trade history.
    pub sequence_position: u64,
}

impl TradeOutcome {
    pub fn new(pnl_pct: f64, sequence_position: u64) -> Self {
        Self {
            pnl_pct,
            sequence_position,
        }
    }

    /// Build outcomes from raw pnl percentages, numbering them from zero.
    pub fn from_pnls(pnls: &[f64]) -> Vec<Self> {
        pnls.iter()
            .enumerate()
            .map(|(i, pnl)| Self::new(*pnl, i as u64))
            .collect()
    }
}

/// Side of a logged trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }

    /// Case-insensitive parse of `BUY` / `SELL`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Some(TradeSide::Buy),
            "SELL" => Some(TradeSide::Sell),
            _ => None,
        }
    }
}

/// A closed trade as recorded in the trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub bot_id: String,
    pub symbol: String,
    pub side: TradeSide,
    pub timestamp: DateTime<Utc>,
    /// Realized P&L in quote currency.
    pub pnl: Decimal,
    /// Quote currency spent to open the position.
    pub spent: Decimal,
}

impl TradeRecord {
    /// P&L relative to capital spent, in percent. Zero when nothing was
    /// spent or when the ratio does not fit a `Decimal`.
    pub fn pnl_pct(&self) -> f64 {
        if self.spent <= Decimal::ZERO {
            return 0.0;
        }
        let ratio = self
            .pnl
            .checked_div(self.spent)
            .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED));

        match ratio {
            Some(ratio) => ratio.to_f64().unwrap_or(0.0),
            None => {
                warn!(
                    bot_id = %self.bot_id,
                    pnl = %self.pnl,
                    spent = %self.spent,
                    "Trade pnl ratio overflows, counting it as flat"
                );
                0.0
            }
        }
    }

    pub fn to_outcome(&self, sequence_position: u64) -> TradeOutcome {
        TradeOutcome::new(self.pnl_pct(), sequence_position)
    }
}

/// The most recent `limit` outcomes of one bot, oldest first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeWindow {
    outcomes: Vec<TradeOutcome>,
}

impl TradeWindow {
    /// Keep only the last `limit` outcomes of a chronological history.
    pub fn from_history(history: Vec<TradeOutcome>, limit: usize) -> Self {
        let mut outcomes = history;
        if outcomes.len() > limit {
            outcomes.drain(..outcomes.len() - limit);
        }
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[TradeOutcome] {
        &self.outcomes
    }

    /// Pnl percentages in chronological order.
    pub fn pnls(&self) -> Vec<f64> {
        self.outcomes.iter().map(|o| o.pnl_pct).collect()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pnl: Decimal, spent: Decimal) -> TradeRecord {
        TradeRecord {
            bot_id: "bot-1".to_string(),
            symbol: "BTCUSDT".to_string(),
            side: TradeSide::Sell,
            timestamp: Utc::now(),
            pnl,
            spent,
        }
    }

    #[test]
    fn test_pnl_pct_relative_to_spent() {
        let trade = record(Decimal::new(-15, 1), Decimal::new(100, 0));
        assert!((trade.pnl_pct() - -1.5).abs() < 1e-12);
    }

    #[test]
    fn test_pnl_pct_zero_when_nothing_spent() {
        let trade = record(Decimal::new(5, 0), Decimal::ZERO);
        assert_eq!(trade.pnl_pct(), 0.0);
    }

    #[test]
    fn test_pnl_pct_overflow_is_flat() {
        let trade = record(Decimal::MAX, Decimal::new(1, 4));
        assert_eq!(trade.pnl_pct(), 0.0);

        let trade = record(Decimal::MAX, Decimal::new(5, 1));
        assert_eq!(trade.pnl_pct(), 0.0);
    }

    #[test]
    fn test_window_keeps_most_recent() {
        let history = TradeOutcome::from_pnls(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let window = TradeWindow::from_history(history, 3);
        assert_eq!(window.pnls(), vec![3.0, 4.0, 5.0]);
        assert_eq!(window.outcomes()[0].sequence_position, 2);
    }

    #[test]
    fn test_window_smaller_than_limit() {
        let window = TradeWindow::from_history(TradeOutcome::from_pnls(&[1.0]), 10);
        assert_eq!(window.len(), 1);
        assert!(TradeWindow::from_history(vec![], 10).is_empty());
    }

    #[test]
    fn test_trade_side_parse() {
        assert_eq!(TradeSide::parse("sell"), Some(TradeSide::Sell));
        assert_eq!(TradeSide::parse(" BUY "), Some(TradeSide::Buy));
        assert_eq!(TradeSide::parse("hold"), None);
    }
}
