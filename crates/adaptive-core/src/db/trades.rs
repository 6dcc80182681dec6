//! PostgreSQL-backed trade history.

use crate::error::FetchError;
use crate::history::TradeHistorySource;
use crate::types::{TradeOutcome, TradeRecord, TradeSide};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use tracing::debug;

/// Reads closed trades from the `trades` table.
pub struct PgTradeHistory {
    pool: PgPool,
    side: TradeSide,
}

impl PgTradeHistory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            side: TradeSide::Sell,
        }
    }

    pub fn with_side(mut self, side: TradeSide) -> Self {
        self.side = side;
        self
    }

    /// Last `limit` closed trades of a bot, oldest first, with their ids.
    pub async fn records(
        &self,
        bot_id: &str,
        limit: usize,
    ) -> Result<Vec<(i64, TradeRecord)>, FetchError> {
        let known: Option<(String,)> = sqlx::query_as("SELECT bot_id FROM bots WHERE bot_id = $1")
            .bind(bot_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        if known.is_none() {
            return Err(FetchError::UnknownBot(bot_id.to_string()));
        }

        let rows = sqlx::query(
            r#"
            SELECT id, bot_id, symbol, side, pnl, spent, executed_at
            FROM trades
            WHERE bot_id = $1 AND side = $2
            ORDER BY executed_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(bot_id)
        .bind(self.side.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        let mut records: Vec<(i64, TradeRecord)> = rows
            .iter()
            .map(|r| {
                let side: String = r.get("side");
                let record = TradeRecord {
                    bot_id: r.get("bot_id"),
                    symbol: r.get("symbol"),
                    side: TradeSide::parse(&side).unwrap_or(self.side),
                    timestamp: r.get::<DateTime<Utc>, _>("executed_at"),
                    pnl: r.get::<Decimal, _>("pnl"),
                    spent: r.get::<Decimal, _>("spent"),
                };
                (r.get::<i64, _>("id"), record)
            })
            .collect();
        records.reverse();

        debug!(bot_id = %bot_id, count = records.len(), "Loaded trades from database");
        Ok(records)
    }
}

fn unavailable(e: sqlx::Error) -> FetchError {
    FetchError::Unavailable(e.to_string())
}

#[async_trait::async_trait]
impl TradeHistorySource for PgTradeHistory {
    async fn fetch(&self, bot_id: &str, limit: usize) -> Result<Vec<TradeOutcome>, FetchError> {
        let records = self.records(bot_id, limit).await?;
        Ok(records
            .into_iter()
            .map(|(id, record)| record.to_outcome(id.max(0) as u64))
            .collect())
    }
}
