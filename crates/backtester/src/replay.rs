//! Replay of the risk controller over a bot's trade history.
//!
//! Each closed trade re-evaluates the window ending at that trade, carrying
//! the hysteresis state in memory exactly as the live controller would carry
//! it through its store.

use adaptive_core::types::{RiskMode, RiskState, TradeOutcome, TradeWindow};
use adaptive_core::ThresholdConfig;
use risk_manager::{assess_window, next_state, Classification, RiskTransition, StatisticsSnapshot};
use serde::Serialize;
use std::fmt;

/// State of the replay after one trade.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayStep {
    pub position: u64,
    pub pnl_pct: f64,
    pub snapshot: StatisticsSnapshot,
    pub classification: Classification,
    pub state: RiskState,
    /// Mode changed on this trade.
    pub transitioned: bool,
}

/// Replay of one bot.
#[derive(Debug, Clone, Serialize)]
pub struct Replay {
    pub bot_id: String,
    pub steps: Vec<ReplayStep>,
}

impl Replay {
    /// Trades evaluated while DEFENSIVE.
    pub fn defensive_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.state.is_defensive()).count()
    }

    /// Mode changes as a store would have recorded them, newest first.
    pub fn transitions(&self) -> Vec<RiskTransition> {
        let mut previous = RiskMode::Normal;
        let mut transitions = Vec::new();
        for step in &self.steps {
            if step.transitioned {
                transitions.push(RiskTransition::new(
                    self.bot_id.as_str(),
                    previous,
                    &step.state,
                    step.snapshot,
                ));
            }
            previous = step.state.mode;
        }
        transitions.reverse();
        transitions
    }

    pub fn final_state(&self) -> Option<&RiskState> {
        self.steps.last().map(|s| &s.state)
    }
}

impl fmt::Display for Replay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Replay for {} ({} trades)", self.bot_id, self.steps.len())?;
        writeln!(
            f,
            "{:>6} {:>9} {:>6} {:>6} {:>8} {:>10}  {:<9} {}",
            "trade", "pnl%", "win", "flip", "avg_abs", "drawdown", "mode", "reason"
        )?;
        for step in &self.steps {
            let marker = if step.transitioned { " *" } else { "" };
            writeln!(
                f,
                "{:>6} {:>+9.4} {:>6.2} {:>6.2} {:>8.4} {:>10.4}  {:<9} {}{}",
                step.position,
                step.pnl_pct,
                step.snapshot.win_rate,
                step.snapshot.flip_rate,
                step.snapshot.avg_abs_pnl_pct,
                step.snapshot.drawdown_pct,
                step.state.mode.as_str(),
                step.state.reason,
                marker
            )?;
        }
        write!(
            f,
            "transitions: {}, defensive trades: {}/{}",
            self.steps.iter().filter(|s| s.transitioned).count(),
            self.defensive_steps(),
            self.steps.len()
        )
    }
}

/// Evaluate every prefix of a chronological history with a sliding window
/// of `config.window_limit` trades.
pub fn replay_outcomes(outcomes: &[TradeOutcome], config: &ThresholdConfig) -> Vec<ReplayStep> {
    let mut state = RiskState::default();
    let mut steps = Vec::with_capacity(outcomes.len());

    for (idx, outcome) in outcomes.iter().enumerate() {
        let start = (idx + 1).saturating_sub(config.window_limit);
        let window = TradeWindow::from_history(outcomes[start..=idx].to_vec(), config.window_limit);
        let (snapshot, classification) = assess_window(&window, config);
        let next = next_state(&state, &classification, &snapshot, config);
        let transitioned = next.mode != state.mode;

        steps.push(ReplayStep {
            position: outcome.sequence_position,
            pnl_pct: outcome.pnl_pct,
            snapshot,
            classification,
            state: next.clone(),
            transitioned,
        });
        state = next;
    }

    steps
}
