//! Risk statistics over a window of trade outcomes.
//!
//! Every function here is pure: the same pnl sequence always produces the
//! same [`StatisticsSnapshot`], and nothing is remembered between calls.

use adaptive_core::types::TradeWindow;
use serde::{Deserialize, Serialize};

/// Statistics derived from one trade window. Percent values are in
/// percentage points of capital spent per trade.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    /// Trades in the window.
    pub total_trades: usize,
    /// Share of trades with positive pnl (0-1).
    pub win_rate: f64,
    /// Sum of pnl over the window.
    pub cumulative_pnl_pct: f64,
    /// Largest peak-to-trough decline of the cumulative pnl curve (>= 0).
    pub drawdown_pct: f64,
    /// Longest run of losing trades anywhere in the window.
    pub negative_streak: u32,
    /// Run of losing trades ending at the most recent trade.
    pub trailing_negative_streak: u32,
    /// Mean absolute pnl.
    pub avg_abs_pnl_pct: f64,
    /// Sample standard deviation of pnl.
    pub pnl_volatility_pct: f64,
    /// Share of adjacent pairs whose signs differ, zeros excluded (0-1).
    pub flip_rate: f64,
    /// Winning trades among the last three.
    pub wins_last_3: u32,
}

/// Compute statistics for a window.
pub fn compute_window(window: &TradeWindow) -> StatisticsSnapshot {
    compute(&window.pnls())
}

/// Compute statistics for a chronological pnl sequence (most recent last).
pub fn compute(pnls: &[f64]) -> StatisticsSnapshot {
    let total = pnls.len();
    if total == 0 {
        return StatisticsSnapshot::default();
    }

    let wins = pnls.iter().filter(|p| **p > 0.0).count();

    StatisticsSnapshot {
        total_trades: total,
        win_rate: wins as f64 / total as f64,
        cumulative_pnl_pct: pnls.iter().sum(),
        drawdown_pct: max_drawdown(pnls),
        negative_streak: longest_negative_streak(pnls),
        trailing_negative_streak: trailing_negative_streak(pnls),
        avg_abs_pnl_pct: pnls.iter().map(|p| p.abs()).sum::<f64>() / total as f64,
        pnl_volatility_pct: sample_stddev(pnls),
        flip_rate: flip_rate(pnls),
        wins_last_3: pnls.iter().rev().take(3).filter(|p| **p > 0.0).count() as u32,
    }
}

/// Peak-to-trough decline of the running pnl sum. The curve starts at zero
/// before the first trade, so an opening loss already counts as drawdown.
pub fn max_drawdown(pnls: &[f64]) -> f64 {
    let mut running = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_drawdown = 0.0_f64;

    for pnl in pnls {
        running += pnl;
        if running > peak {
            peak = running;
        }
        let drawdown = peak - running;
        if drawdown > max_drawdown {
            max_drawdown = drawdown;
        }
    }

    max_drawdown
}

/// Longest run of strictly negative pnl.
pub fn longest_negative_streak(pnls: &[f64]) -> u32 {
    let mut longest = 0u32;
    let mut current = 0u32;

    for pnl in pnls {
        if *pnl < 0.0 {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }

    longest
}

/// Run of strictly negative pnl ending at the most recent trade.
pub fn trailing_negative_streak(pnls: &[f64]) -> u32 {
    pnls.iter().rev().take_while(|p| **p < 0.0).count() as u32
}

/// Sample standard deviation (N - 1); zero for fewer than two values.
pub fn sample_stddev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

/// Share of adjacent pairs that change sign. A move to or from zero is not a
/// flip, but the pair still counts in the denominator.
pub fn flip_rate(pnls: &[f64]) -> f64 {
    if pnls.len() < 2 {
        return 0.0;
    }

    let flips = pnls
        .windows(2)
        .filter(|pair| {
            let (prev, curr) = (pair[0], pair[1]);
            prev != 0.0 && curr != 0.0 && (prev > 0.0) != (curr > 0.0)
        })
        .count();

    flips as f64 / (pnls.len() - 1) as f64
}
