//! Post-mortem summary: why a bot lost and why its risk was reduced.

use adaptive_core::types::{RiskMode, TradeOutcome};
use risk_manager::{compute, RiskTransition, StatisticsSnapshot};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct PostMortem {
    pub bot_id: String,
    pub trades: usize,
    pub snapshot: StatisticsSnapshot,
    /// Largest single loss in the window, in percent.
    pub worst_loss_pct: Option<f64>,
    /// Most recent transition into DEFENSIVE.
    pub last_reduction: Option<RiskTransition>,
}

impl PostMortem {
    /// `transitions` are expected newest first.
    pub fn build(bot_id: &str, outcomes: &[TradeOutcome], transitions: &[RiskTransition]) -> Self {
        let pnls: Vec<f64> = outcomes.iter().map(|o| o.pnl_pct).collect();
        let worst_loss_pct = pnls
            .iter()
            .copied()
            .filter(|p| *p < 0.0)
            .min_by(|a, b| a.total_cmp(b));

        let last_reduction = transitions
            .iter()
            .find(|t| t.bot_id == bot_id && t.mode == RiskMode::Defensive)
            .cloned();

        Self {
            bot_id: bot_id.to_string(),
            trades: outcomes.len(),
            snapshot: compute(&pnls),
            worst_loss_pct,
            last_reduction,
        }
    }
}

impl fmt::Display for PostMortem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "POST-MORTEM {}", self.bot_id)?;
        writeln!(f)?;

        writeln!(f, "WHY IT LOST")?;
        let s = &self.snapshot;
        if self.trades == 0 {
            writeln!(f, "- no trades found")?;
        } else if s.cumulative_pnl_pct >= 0.0 {
            writeln!(f, "- no net loss in the recent window")?;
        } else {
            writeln!(f, "- cumulative_pnl_pct={:+.4}", s.cumulative_pnl_pct)?;
            writeln!(f, "- win_rate={:.2}", s.win_rate)?;
            writeln!(f, "- loss_streak={}", s.negative_streak)?;
            writeln!(f, "- drawdown={:.2}%", s.drawdown_pct)?;
            writeln!(f, "- flip_rate={:.2}", s.flip_rate)?;
            writeln!(f, "- avg_abs_pnl_pct={:.2}%", s.avg_abs_pnl_pct)?;
            if let Some(worst) = self.worst_loss_pct {
                writeln!(f, "- worst_loss={worst:+.4}%")?;
            }
        }
        writeln!(f)?;

        writeln!(f, "WHY RISK WAS REDUCED")?;
        match &self.last_reduction {
            None => write!(f, "- no risk reductions recorded"),
            Some(t) => {
                writeln!(f, "- state={} reason={}", t.mode, t.reason)?;
                writeln!(f, "- previous_state={}", t.previous_mode)?;
                if let Some(detail) = &t.detail {
                    writeln!(f, "- detail={detail}")?;
                }
                writeln!(f, "- drawdown={:.2}%", t.snapshot.drawdown_pct)?;
                writeln!(f, "- loss_streak={}", t.snapshot.negative_streak)?;
                write!(f, "- at={}", t.occurred_at.to_rfc3339())
            }
        }
    }
}
