//! Threshold rules that turn a statistics snapshot into a risk state.
//!
//! [`evaluate`] is a pure classification of one window. [`next_state`] layers
//! the recovery hysteresis on top of it, given the previously persisted state.

use adaptive_core::types::{RiskMode, RiskReason, RiskState, TradeWindow};
use adaptive_core::ThresholdConfig;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::statistics::{self, StatisticsSnapshot};

/// Result of evaluating one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub mode: RiskMode,
    pub reason: RiskReason,
    /// Trigger values, e.g. `flip_rate=1.00, avg_abs=0.18%`.
    pub detail: Option<String>,
}

impl Classification {
    fn normal(reason: RiskReason, detail: Option<String>) -> Self {
        Self {
            mode: RiskMode::Normal,
            reason,
            detail,
        }
    }

    fn defensive(reason: RiskReason, detail: String) -> Self {
        Self {
            mode: RiskMode::Defensive,
            reason,
            detail: Some(detail),
        }
    }

    pub fn is_defensive(&self) -> bool {
        self.mode == RiskMode::Defensive
    }
}

/// Classify a snapshot. The first matching rule wins.
pub fn evaluate(stats: &StatisticsSnapshot, config: &ThresholdConfig) -> Classification {
    let min_trades = config.min_trades.max(2);
    if stats.total_trades < min_trades {
        return Classification::normal(
            RiskReason::InsufficientData,
            Some(format!("trades={}", stats.total_trades)),
        );
    }

    if stats.negative_streak >= config.streak_threshold
        && stats.drawdown_pct >= config.drawdown_threshold
    {
        return Classification::defensive(
            RiskReason::LossStreakDrawdown,
            format!(
                "neg_streak={}, drawdown={:.2}%",
                stats.negative_streak, stats.drawdown_pct
            ),
        );
    }

    if stats.pnl_volatility_pct >= config.vol_threshold && stats.cumulative_pnl_pct < 0.0 {
        return Classification::defensive(
            RiskReason::Volatility,
            format!(
                "vol={:.2}%, cumulative={:+.2}%",
                stats.pnl_volatility_pct, stats.cumulative_pnl_pct
            ),
        );
    }

    // Chop is checked before range: a choppy window is usually tight too.
    if stats.flip_rate >= config.flip_threshold && stats.avg_abs_pnl_pct <= config.chop_threshold
    {
        return Classification::defensive(
            RiskReason::LateralChop,
            format!(
                "flip_rate={:.2}, avg_abs={:.2}%",
                stats.flip_rate, stats.avg_abs_pnl_pct
            ),
        );
    }

    if stats.avg_abs_pnl_pct <= config.range_threshold {
        return Classification::defensive(
            RiskReason::Range,
            format!("avg_abs={:.2}%", stats.avg_abs_pnl_pct),
        );
    }

    Classification::normal(RiskReason::None, None)
}

/// Statistics and classification for a window, the path shared by the
/// controller and the offline reporter.
pub fn assess_window(
    window: &TradeWindow,
    config: &ThresholdConfig,
) -> (StatisticsSnapshot, Classification) {
    let stats = statistics::compute_window(window);
    let classification = evaluate(&stats, config);
    (stats, classification)
}

/// Apply recovery hysteresis to a fresh classification.
///
/// Entering DEFENSIVE is immediate. Leaving it requires
/// `recovery_evaluations` consecutive clean classifications and at least
/// `recovery_wins_last_3` wins among the last three trades. An
/// insufficient-data classification neither counts toward recovery nor
/// clears DEFENSIVE.
pub fn next_state(
    previous: &RiskState,
    classification: &Classification,
    stats: &StatisticsSnapshot,
    config: &ThresholdConfig,
) -> RiskState {
    let now = Utc::now();

    if classification.is_defensive() {
        return RiskState {
            mode: RiskMode::Defensive,
            reason: classification.reason,
            detail: classification.detail.clone(),
            clean_streak: 0,
            previous_mode: Some(previous.mode),
            updated_at: now,
        };
    }

    if !previous.is_defensive() {
        return RiskState {
            mode: RiskMode::Normal,
            reason: classification.reason,
            detail: classification.detail.clone(),
            clean_streak: 0,
            previous_mode: Some(previous.mode),
            updated_at: now,
        };
    }

    if classification.reason == RiskReason::InsufficientData {
        return RiskState {
            previous_mode: Some(RiskMode::Defensive),
            updated_at: now,
            ..previous.clone()
        };
    }

    let clean_streak = previous.clean_streak.saturating_add(1);
    if clean_streak >= config.recovery_evaluations
        && stats.wins_last_3 >= config.recovery_wins_last_3
    {
        return RiskState {
            mode: RiskMode::Normal,
            reason: RiskReason::None,
            detail: Some(format!("recovered ({}/3 wins)", stats.wins_last_3)),
            clean_streak: 0,
            previous_mode: Some(RiskMode::Defensive),
            updated_at: now,
        };
    }

    RiskState {
        mode: RiskMode::Defensive,
        reason: previous.reason,
        detail: previous.detail.clone(),
        clean_streak,
        previous_mode: Some(RiskMode::Defensive),
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::compute;

    fn classify(pnls: &[f64], config: &ThresholdConfig) -> Classification {
        evaluate(&compute(pnls), config)
    }

    fn defensive(reason: RiskReason) -> RiskState {
        RiskState {
            mode: RiskMode::Defensive,
            reason,
            detail: Some("flip_rate=1.00, avg_abs=0.18%".to_string()),
            ..RiskState::default()
        }
    }

    #[test]
    fn test_chop_is_lateral_chop() {
        let result = classify(&[-0.3, 0.2, -0.2, 0.1, -0.2, 0.1], &ThresholdConfig::default());
        assert_eq!(result.mode, RiskMode::Defensive);
        assert_eq!(result.reason, RiskReason::LateralChop);
        assert_eq!(result.detail.as_deref(), Some("flip_rate=1.00, avg_abs=0.18%"));
    }

    #[test]
    fn test_dump_triggers_loss_streak_drawdown() {
        // Drawdown of this window is 4.2 points.
        let config = ThresholdConfig {
            drawdown_threshold: 4.0,
            ..Default::default()
        };
        let result = classify(&[-1.5, -1.2, -0.8, 0.3, -1.0], &config);
        assert_eq!(result.mode, RiskMode::Defensive);
        assert_eq!(result.reason, RiskReason::LossStreakDrawdown);
        assert_eq!(result.detail.as_deref(), Some("neg_streak=3, drawdown=4.20%"));
    }

    #[test]
    fn test_dump_below_default_drawdown_is_normal() {
        // Streak matches but 4.2 < 5.0; volatility (~0.69) stays under 0.8
        // and avg_abs (0.96) is far from the range rules.
        let result = classify(&[-1.5, -1.2, -0.8, 0.3, -1.0], &ThresholdConfig::default());
        assert_eq!(result.mode, RiskMode::Normal);
        assert_eq!(result.reason, RiskReason::None);
    }

    #[test]
    fn test_fake_breakout_boundary_is_inclusive() {
        let pnls = [0.6, -0.5, 0.4, -0.4, 0.3, -0.3];
        let avg_abs = compute(&pnls).avg_abs_pnl_pct;

        let at_boundary = ThresholdConfig {
            chop_threshold: avg_abs,
            ..Default::default()
        };
        let result = classify(&pnls, &at_boundary);
        assert_eq!(result.mode, RiskMode::Defensive);
        assert_eq!(result.reason, RiskReason::LateralChop);

        let below = ThresholdConfig {
            chop_threshold: avg_abs - 1e-6,
            ..Default::default()
        };
        let result = classify(&pnls, &below);
        assert_eq!(result.mode, RiskMode::Normal);
        assert_eq!(result.reason, RiskReason::None);
    }

    #[test]
    fn test_fake_breakout_default_is_normal() {
        let result = classify(&[0.6, -0.5, 0.4, -0.4, 0.3, -0.3], &ThresholdConfig::default());
        assert_eq!(result.mode, RiskMode::Normal);
        assert_eq!(result.reason, RiskReason::None);
        assert_eq!(result.detail, None);
    }

    #[test]
    fn test_single_trade_is_insufficient_data() {
        let aggressive = ThresholdConfig {
            streak_threshold: 1,
            drawdown_threshold: 0.0,
            vol_threshold: 0.0,
            range_threshold: 100.0,
            ..Default::default()
        };

        for config in [ThresholdConfig::default(), aggressive] {
            let result = classify(&[-9.0], &config);
            assert_eq!(result.mode, RiskMode::Normal);
            assert_eq!(result.reason, RiskReason::InsufficientData);
        }
    }

    #[test]
    fn test_empty_window_is_insufficient_data() {
        let result = classify(&[], &ThresholdConfig::default());
        assert_eq!(result.reason, RiskReason::InsufficientData);
        assert_eq!(result.detail.as_deref(), Some("trades=0"));
    }

    #[test]
    fn test_min_trades_raises_insufficient_bar() {
        let config = ThresholdConfig {
            min_trades: 5,
            ..Default::default()
        };
        let result = classify(&[-0.3, 0.2, -0.2, 0.1], &config);
        assert_eq!(result.reason, RiskReason::InsufficientData);
    }

    #[test]
    fn test_volatility_requires_net_loss() {
        let losing = [2.0, -2.5, 1.5, -2.0];
        let result = classify(&losing, &ThresholdConfig::default());
        assert_eq!(result.reason, RiskReason::Volatility);

        let winning = [2.5, -2.0, 2.0, -1.5];
        let result = classify(&winning, &ThresholdConfig::default());
        assert_eq!(result.reason, RiskReason::None);
    }

    #[test]
    fn test_range_without_flips() {
        // No sign changes, so chop cannot match; tight outcomes hit range.
        let result = classify(&[0.1, 0.2, 0.1, 0.2], &ThresholdConfig::default());
        assert_eq!(result.reason, RiskReason::Range);
        assert_eq!(result.detail.as_deref(), Some("avg_abs=0.15%"));
    }

    #[test]
    fn test_rules_follow_priority() {
        // Matches both the loss streak and volatility rules.
        let pnls = [-3.0, -2.0, -1.0, 0.5];
        let config = ThresholdConfig::default();
        let stats = compute(&pnls);
        assert!(stats.pnl_volatility_pct >= config.vol_threshold);
        assert_eq!(evaluate(&stats, &config).reason, RiskReason::LossStreakDrawdown);
    }

    #[test]
    fn test_thresholds_are_not_hardcoded() {
        let pnls = [-0.3, 0.2, -0.2, 0.1, -0.2, 0.1];
        let relaxed = ThresholdConfig {
            flip_threshold: 1.0,
            chop_threshold: 0.1,
            range_threshold: 0.1,
            ..Default::default()
        };
        assert_eq!(classify(&pnls, &relaxed).reason, RiskReason::None);
    }

    #[test]
    fn test_defensive_classification_resets_streak() {
        let previous = RiskState {
            clean_streak: 1,
            ..defensive(RiskReason::Range)
        };
        let classification = classify(&[-0.3, 0.2, -0.2, 0.1, -0.2, 0.1], &ThresholdConfig::default());
        let stats = compute(&[-0.3, 0.2, -0.2, 0.1, -0.2, 0.1]);

        let next = next_state(&previous, &classification, &stats, &ThresholdConfig::default());
        assert_eq!(next.mode, RiskMode::Defensive);
        assert_eq!(next.reason, RiskReason::LateralChop);
        assert_eq!(next.clean_streak, 0);
        assert_eq!(next.previous_mode, Some(RiskMode::Defensive));
    }

    #[test]
    fn test_normal_entry_is_immediate() {
        let pnls = [-0.3, 0.2, -0.2, 0.1, -0.2, 0.1];
        let config = ThresholdConfig::default();
        let stats = compute(&pnls);
        let next = next_state(&RiskState::default(), &evaluate(&stats, &config), &stats, &config);
        assert!(next.is_defensive());
        assert_eq!(next.previous_mode, Some(RiskMode::Normal));
    }

    #[test]
    fn test_recovery_needs_consecutive_clean_evaluations() {
        let config = ThresholdConfig::default();
        let pnls = [0.6, -0.5, 0.4, 0.5, -0.4, 0.7, 0.9];
        let stats = compute(&pnls);
        let clean = evaluate(&stats, &config);
        assert_eq!(clean.reason, RiskReason::None);
        assert!(stats.wins_last_3 >= 2);

        let first = next_state(&defensive(RiskReason::LateralChop), &clean, &stats, &config);
        assert_eq!(first.mode, RiskMode::Defensive);
        assert_eq!(first.reason, RiskReason::LateralChop);
        assert_eq!(first.clean_streak, 1);

        let second = next_state(&first, &clean, &stats, &config);
        assert_eq!(second.mode, RiskMode::Normal);
        assert_eq!(second.reason, RiskReason::None);
        assert_eq!(second.clean_streak, 0);
        assert_eq!(second.previous_mode, Some(RiskMode::Defensive));
        assert_eq!(second.detail.as_deref(), Some("recovered (2/3 wins)"));
    }

    #[test]
    fn test_recovery_needs_recent_wins() {
        let config = ThresholdConfig {
            recovery_evaluations: 1,
            ..Default::default()
        };
        let pnls = [0.9, 0.8, 0.7, -0.5, 0.6, -0.45];
        let stats = compute(&pnls);
        let clean = evaluate(&stats, &config);
        assert_eq!(clean.reason, RiskReason::None);
        assert_eq!(stats.wins_last_3, 1);

        let next = next_state(&defensive(RiskReason::Volatility), &clean, &stats, &config);
        assert_eq!(next.mode, RiskMode::Defensive);
        assert_eq!(next.reason, RiskReason::Volatility);
        assert_eq!(next.clean_streak, 1);
    }

    #[test]
    fn test_insufficient_data_holds_defensive() {
        let config = ThresholdConfig::default();
        let stats = compute(&[0.5]);
        let classification = evaluate(&stats, &config);
        assert_eq!(classification.reason, RiskReason::InsufficientData);

        let previous = RiskState {
            clean_streak: 1,
            ..defensive(RiskReason::LateralChop)
        };
        let next = next_state(&previous, &classification, &stats, &config);
        assert_eq!(next.mode, RiskMode::Defensive);
        assert_eq!(next.reason, RiskReason::LateralChop);
        assert_eq!(next.clean_streak, 1);
    }

    #[test]
    fn test_normal_stays_normal_with_classification_reason() {
        let config = ThresholdConfig::default();
        let stats = compute(&[0.5]);
        let classification = evaluate(&stats, &config);
        let next = next_state(&RiskState::default(), &classification, &stats, &config);
        assert_eq!(next.mode, RiskMode::Normal);
        assert_eq!(next.reason, RiskReason::InsufficientData);
    }

    #[test]
    fn test_assess_window_uses_last_trades() {
        use adaptive_core::types::{TradeOutcome, TradeWindow};

        let mut pnls = vec![5.0, 5.0, 5.0];
        pnls.extend_from_slice(&[-0.3, 0.2, -0.2, 0.1, -0.2, 0.1]);
        let window = TradeWindow::from_history(TradeOutcome::from_pnls(&pnls), 6);

        let (stats, classification) = assess_window(&window, &ThresholdConfig::default());
        assert_eq!(stats.total_trades, 6);
        assert_eq!(classification.reason, RiskReason::LateralChop);
    }
}
