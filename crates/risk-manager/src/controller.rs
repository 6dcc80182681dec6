//! Risk controller: re-evaluates a bot's risk state after each closed trade.

use adaptive_core::types::{RiskMode, RiskState, TradeEvent, TradeOutcome, TradeWindow};
use adaptive_core::{Result, ThresholdConfig, TradeHistorySource};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::heuristics::{self, Classification};
use crate::risk_state_repo::{RiskStateStore, RiskTransition};
use crate::statistics::StatisticsSnapshot;

/// Outcome of one evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub bot_id: String,
    pub window: Vec<TradeOutcome>,
    pub snapshot: StatisticsSnapshot,
    pub classification: Classification,
    /// Persisted state before this evaluation (NORMAL default when absent).
    pub previous: RiskState,
    /// State written by this evaluation.
    pub current: RiskState,
}

impl Evaluation {
    /// True when the evaluation changed the bot's mode.
    pub fn transitioned(&self) -> bool {
        self.previous.mode != self.current.mode
    }
}

/// Drives the statistics and heuristics for each bot and persists the result.
pub struct RiskController {
    history: Arc<dyn TradeHistorySource>,
    store: Arc<dyn RiskStateStore>,
    default_config: ThresholdConfig,
    /// Per-bot threshold overrides.
    bot_configs: DashMap<String, ThresholdConfig>,
    /// One evaluation per bot at a time.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RiskController {
    /// Create a controller. The default thresholds are validated up front.
    pub fn new(
        history: Arc<dyn TradeHistorySource>,
        store: Arc<dyn RiskStateStore>,
        default_config: ThresholdConfig,
    ) -> Result<Self> {
        default_config.validate()?;

        Ok(Self {
            history,
            store,
            default_config,
            bot_configs: DashMap::new(),
            locks: DashMap::new(),
        })
    }

    /// Override thresholds for a single bot.
    pub fn set_bot_config(&self, bot_id: &str, config: ThresholdConfig) -> Result<()> {
        config.validate()?;
        info!(bot_id = %bot_id, window_limit = config.window_limit, "Updated bot thresholds");
        self.bot_configs.insert(bot_id.to_string(), config);
        Ok(())
    }

    /// Thresholds in effect for a bot.
    pub fn config_for(&self, bot_id: &str) -> ThresholdConfig {
        self.bot_configs
            .get(bot_id)
            .map(|c| c.value().clone())
            .unwrap_or_else(|| self.default_config.clone())
    }

    /// Current persisted state, NORMAL when the bot was never evaluated.
    pub async fn state(&self, bot_id: &str) -> Result<RiskState> {
        Ok(self.store.read(bot_id).await?.unwrap_or_default())
    }

    /// Handle a trade lifecycle event. Only completed sells of Equilibrium
    /// bots are evaluated; everything else returns `Ok(None)`.
    pub async fn on_trade_event(&self, event: &TradeEvent) -> Result<Option<Evaluation>> {
        if !event.triggers_evaluation() {
            debug!(
                bot_id = %event.bot_id,
                profile = %event.profile,
                kind = ?event.kind,
                "Skipping risk evaluation"
            );
            return Ok(None);
        }

        self.evaluate(&event.bot_id).await.map(Some)
    }

    /// Evaluate a bot with its configured thresholds.
    pub async fn evaluate(&self, bot_id: &str) -> Result<Evaluation> {
        let config = self.config_for(bot_id);
        self.evaluate_with(bot_id, &config).await
    }

    /// Evaluate a bot with thresholds supplied for this call only.
    ///
    /// A fetch failure is returned as is and leaves the stored state
    /// untouched.
    pub async fn evaluate_with(&self, bot_id: &str, config: &ThresholdConfig) -> Result<Evaluation> {
        config.validate()?;

        let lock = self.lock_for(bot_id);
        let _guard = lock.lock().await;

        let outcomes = match self.history.fetch(bot_id, config.window_limit).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                warn!(bot_id = %bot_id, error = %e, "Trade history fetch failed, keeping risk state");
                return Err(e.into());
            }
        };

        let window = TradeWindow::from_history(outcomes, config.window_limit);
        let (snapshot, classification) = heuristics::assess_window(&window, config);

        let previous = self.store.read(bot_id).await?.unwrap_or_default();
        let current = heuristics::next_state(&previous, &classification, &snapshot, config);

        self.store.write(bot_id, &current).await?;

        info!(
            bot_id = %bot_id,
            trades = snapshot.total_trades,
            win_rate = snapshot.win_rate,
            drawdown_pct = snapshot.drawdown_pct,
            negative_streak = snapshot.negative_streak,
            avg_abs_pnl_pct = snapshot.avg_abs_pnl_pct,
            volatility_pct = snapshot.pnl_volatility_pct,
            flip_rate = snapshot.flip_rate,
            mode = %current.mode,
            reason = %current.reason,
            "Risk evaluation"
        );

        if previous.mode != current.mode {
            warn!(
                bot_id = %bot_id,
                from = %previous.mode,
                to = %current.mode,
                reason = %current.reason,
                detail = current.detail.as_deref().unwrap_or(""),
                "Risk mode changed"
            );
            let transition = RiskTransition::new(bot_id, previous.mode, &current, snapshot);
            self.store.append_transition(&transition).await?;
        }

        Ok(Evaluation {
            bot_id: bot_id.to_string(),
            window: window.outcomes().to_vec(),
            snapshot,
            classification,
            previous,
            current,
        })
    }

    /// Bots evaluated by this controller that are currently DEFENSIVE.
    pub async fn defensive_bots(&self) -> Result<Vec<String>> {
        let bot_ids: Vec<String> = self.locks.iter().map(|e| e.key().clone()).collect();
        let mut defensive = Vec::new();
        for bot_id in bot_ids {
            if let Some(state) = self.store.read(&bot_id).await? {
                if state.mode == RiskMode::Defensive {
                    defensive.push(bot_id);
                }
            }
        }
        defensive.sort();
        Ok(defensive)
    }

    fn lock_for(&self, bot_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(bot_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }
}
