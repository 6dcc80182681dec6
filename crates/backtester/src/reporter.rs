//! Offline review of a bot's recent trades.
//!
//! The reporter runs the same statistics and classification as the live
//! controller but never writes risk state; it has no store to write to.

use adaptive_core::types::{TradeOutcome, TradeWindow};
use adaptive_core::{Error, Result, ThresholdConfig, TradeHistorySource};
use risk_manager::{assess_window, Classification, RiskTransition, StatisticsSnapshot};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::post_mortem::PostMortem;
use crate::replay::{self, Replay};

/// Result of reviewing one window.
#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub bot_id: String,
    pub trades: Vec<TradeOutcome>,
    pub snapshot: StatisticsSnapshot,
    pub classification: Classification,
}

impl fmt::Display for Review {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Adaptive review for {}", self.bot_id)?;
        writeln!(f)?;
        writeln!(f, "Last trades:")?;
        for (idx, trade) in self.trades.iter().enumerate() {
            writeln!(
                f,
                "{:>3}. #{} pnl={:+.4}%",
                idx + 1,
                trade.sequence_position,
                trade.pnl_pct
            )?;
        }
        writeln!(f)?;

        let s = &self.snapshot;
        writeln!(f, "Statistics:")?;
        writeln!(f, "- total_trades: {}", s.total_trades)?;
        writeln!(f, "- win_rate: {:.2}", s.win_rate)?;
        writeln!(f, "- cumulative_pnl_pct: {:+.4}", s.cumulative_pnl_pct)?;
        writeln!(f, "- drawdown_pct: {:.4}", s.drawdown_pct)?;
        writeln!(f, "- negative_streak: {}", s.negative_streak)?;
        writeln!(f, "- avg_abs_pnl_pct: {:.4}", s.avg_abs_pnl_pct)?;
        writeln!(f, "- pnl_volatility_pct: {:.4}", s.pnl_volatility_pct)?;
        writeln!(f, "- flip_rate: {:.2}", s.flip_rate)?;
        writeln!(f, "- wins_last_3: {}", s.wins_last_3)?;
        writeln!(f)?;

        writeln!(f, "state: {}", self.classification.mode)?;
        match &self.classification.detail {
            Some(detail) => write!(f, "reason: {} ({})", self.classification.reason, detail),
            None => write!(f, "reason: {}", self.classification.reason),
        }
    }
}

/// Read-only counterpart of the risk controller for manual review and
/// threshold tuning.
pub struct BacktestReporter {
    history: Arc<dyn TradeHistorySource>,
    config: ThresholdConfig,
}

impl BacktestReporter {
    pub fn new(history: Arc<dyn TradeHistorySource>, config: ThresholdConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { history, config })
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    /// Classify the last `limit` trades of a bot.
    pub async fn review(&self, bot_id: &str, limit: usize) -> Result<Review> {
        if limit == 0 {
            return Err(Error::InvalidConfig {
                field: "limit",
                message: "must be at least 1".to_string(),
            });
        }

        let outcomes = self.history.fetch(bot_id, limit).await?;
        let window = TradeWindow::from_history(outcomes, limit);
        let (snapshot, classification) = assess_window(&window, &self.config);

        info!(
            bot_id = %bot_id,
            trades = snapshot.total_trades,
            mode = %classification.mode,
            reason = %classification.reason,
            "Reviewed trade window"
        );

        Ok(Review {
            bot_id: bot_id.to_string(),
            trades: window.outcomes().to_vec(),
            snapshot,
            classification,
        })
    }

    /// Slide the evaluation window over the last `history_len` trades.
    pub async fn replay(&self, bot_id: &str, history_len: usize) -> Result<Replay> {
        let outcomes = self.history.fetch(bot_id, history_len).await?;
        let steps = replay::replay_outcomes(&outcomes, &self.config);

        info!(
            bot_id = %bot_id,
            trades = outcomes.len(),
            window = self.config.window_limit,
            "Replayed trade history"
        );

        Ok(Replay {
            bot_id: bot_id.to_string(),
            steps,
        })
    }

    /// Summarize the latest losses and the latest risk reduction.
    ///
    /// `transitions` are newest first, as returned by a risk state store.
    pub async fn post_mortem(
        &self,
        bot_id: &str,
        limit: usize,
        transitions: &[RiskTransition],
    ) -> Result<PostMortem> {
        let outcomes = self.history.fetch(bot_id, limit).await?;
        Ok(PostMortem::build(bot_id, &outcomes, transitions))
    }
}
