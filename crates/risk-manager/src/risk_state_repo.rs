//! Persistence of per-bot risk state and the transition log.

use adaptive_core::types::{RiskMode, RiskReason, RiskState};
use adaptive_core::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::statistics::StatisticsSnapshot;

/// Recorded change of a bot's risk mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTransition {
    pub id: Uuid,
    pub bot_id: String,
    pub previous_mode: RiskMode,
    pub mode: RiskMode,
    pub reason: RiskReason,
    pub detail: Option<String>,
    /// Statistics of the window that caused the change.
    pub snapshot: StatisticsSnapshot,
    pub occurred_at: DateTime<Utc>,
}

impl RiskTransition {
    pub fn new(
        bot_id: impl Into<String>,
        previous_mode: RiskMode,
        state: &RiskState,
        snapshot: StatisticsSnapshot,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bot_id: bot_id.into(),
            previous_mode,
            mode: state.mode,
            reason: state.reason,
            detail: state.detail.clone(),
            snapshot,
            occurred_at: state.updated_at,
        }
    }
}

/// Storage for risk state, keyed by bot id.
#[async_trait::async_trait]
pub trait RiskStateStore: Send + Sync {
    /// Last written state, `None` when the bot was never evaluated.
    async fn read(&self, bot_id: &str) -> Result<Option<RiskState>>;

    /// Overwrite the state of a bot.
    async fn write(&self, bot_id: &str, state: &RiskState) -> Result<()>;

    /// Append to the transition log.
    async fn append_transition(&self, transition: &RiskTransition) -> Result<()>;

    /// Most recent transitions of a bot, newest first.
    async fn recent_transitions(&self, bot_id: &str, limit: usize) -> Result<Vec<RiskTransition>>;
}

/// In-memory store (for testing and single-process use).
pub struct MemoryRiskStateStore {
    states: Arc<RwLock<HashMap<String, RiskState>>>,
    transitions: Arc<RwLock<Vec<RiskTransition>>>,
    fail_writes: AtomicBool,
}

impl MemoryRiskStateStore {
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            transitions: Arc::new(RwLock::new(Vec::new())),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of bots with a stored state.
    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Store {
                message: "store is read-only".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for MemoryRiskStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RiskStateStore for MemoryRiskStateStore {
    async fn read(&self, bot_id: &str) -> Result<Option<RiskState>> {
        Ok(self.states.read().await.get(bot_id).cloned())
    }

    async fn write(&self, bot_id: &str, state: &RiskState) -> Result<()> {
        self.check_writable()?;
        self.states
            .write()
            .await
            .insert(bot_id.to_string(), state.clone());
        Ok(())
    }

    async fn append_transition(&self, transition: &RiskTransition) -> Result<()> {
        self.check_writable()?;
        self.transitions.write().await.push(transition.clone());
        Ok(())
    }

    async fn recent_transitions(&self, bot_id: &str, limit: usize) -> Result<Vec<RiskTransition>> {
        let transitions = self.transitions.read().await;
        Ok(transitions
            .iter()
            .rev()
            .filter(|t| t.bot_id == bot_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// PostgreSQL store backed by the `risk_states` and `risk_transitions` tables.
pub struct PostgresRiskStateStore {
    pool: PgPool,
}

impl PostgresRiskStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_mode(s: &str) -> Result<RiskMode> {
        RiskMode::parse(s).ok_or_else(|| Error::Store {
            message: format!("unknown risk mode '{s}'"),
        })
    }

    fn parse_reason(s: &str) -> Result<RiskReason> {
        RiskReason::parse(s).ok_or_else(|| Error::Store {
            message: format!("unknown risk reason '{s}'"),
        })
    }
}

#[async_trait::async_trait]
impl RiskStateStore for PostgresRiskStateStore {
    async fn read(&self, bot_id: &str) -> Result<Option<RiskState>> {
        let row = sqlx::query(
            r#"
            SELECT mode, reason, detail, clean_streak, previous_mode, updated_at
            FROM risk_states
            WHERE bot_id = $1
            "#,
        )
        .bind(bot_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(r) = row else {
            return Ok(None);
        };

        let previous_mode: Option<String> = r.get("previous_mode");
        let state = RiskState {
            mode: Self::parse_mode(r.get("mode"))?,
            reason: Self::parse_reason(r.get("reason"))?,
            detail: r.get("detail"),
            clean_streak: r.get::<i32, _>("clean_streak").max(0) as u32,
            previous_mode: previous_mode.as_deref().map(Self::parse_mode).transpose()?,
            updated_at: r.get("updated_at"),
        };

        debug!(bot_id = %bot_id, mode = %state.mode, "Loaded risk state");
        Ok(Some(state))
    }

    async fn write(&self, bot_id: &str, state: &RiskState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO risk_states (bot_id, mode, reason, detail, clean_streak, previous_mode, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (bot_id) DO UPDATE SET
                mode = EXCLUDED.mode,
                reason = EXCLUDED.reason,
                detail = EXCLUDED.detail,
                clean_streak = EXCLUDED.clean_streak,
                previous_mode = EXCLUDED.previous_mode,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(bot_id)
        .bind(state.mode.as_str())
        .bind(state.reason.as_str())
        .bind(&state.detail)
        .bind(state.clean_streak as i32)
        .bind(state.previous_mode.map(|m| m.as_str()))
        .bind(state.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(bot_id = %bot_id, mode = %state.mode, reason = %state.reason, "Saved risk state");
        Ok(())
    }

    async fn append_transition(&self, transition: &RiskTransition) -> Result<()> {
        let snapshot = serde_json::to_string(&transition.snapshot)?;

        sqlx::query(
            r#"
            INSERT INTO risk_transitions (id, bot_id, previous_mode, mode, reason, detail, snapshot, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7::jsonb, $8)
            "#,
        )
        .bind(transition.id)
        .bind(&transition.bot_id)
        .bind(transition.previous_mode.as_str())
        .bind(transition.mode.as_str())
        .bind(transition.reason.as_str())
        .bind(&transition.detail)
        .bind(snapshot)
        .bind(transition.occurred_at)
        .execute(&self.pool)
        .await?;

        info!(
            bot_id = %transition.bot_id,
            from = %transition.previous_mode,
            to = %transition.mode,
            reason = %transition.reason,
            "Recorded risk transition"
        );
        Ok(())
    }

    async fn recent_transitions(&self, bot_id: &str, limit: usize) -> Result<Vec<RiskTransition>> {
        let rows = sqlx::query(
            r#"
            SELECT id, bot_id, previous_mode, mode, reason, detail, snapshot::text AS snapshot, occurred_at
            FROM risk_transitions
            WHERE bot_id = $1
            ORDER BY occurred_at DESC
            LIMIT $2
            "#,
        )
        .bind(bot_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                let snapshot: String = r.get("snapshot");
                Ok(RiskTransition {
                    id: r.get("id"),
                    bot_id: r.get("bot_id"),
                    previous_mode: Self::parse_mode(r.get("previous_mode"))?,
                    mode: Self::parse_mode(r.get("mode"))?,
                    reason: Self::parse_reason(r.get("reason"))?,
                    detail: r.get("detail"),
                    snapshot: serde_json::from_str(&snapshot)?,
                    occurred_at: r.get("occurred_at"),
                })
            })
            .collect()
    }
}
