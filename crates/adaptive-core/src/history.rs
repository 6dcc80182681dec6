//! Trade history sources.
//!
//! A [`TradeHistorySource`] answers one read-only query: the most recent
//! closed trades of a bot, oldest first. Implementations live here for the
//! in-memory case (tests, replays) and the CSV trade log; the PostgreSQL
//! source is in [`crate::db::trades`].

use crate::error::FetchError;
use crate::types::{TradeOutcome, TradeRecord, TradeSide};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Read-only access to a bot's closed trades.
#[async_trait::async_trait]
pub trait TradeHistorySource: Send + Sync {
    /// Return up to `limit` of the most recent trades, most recent last.
    async fn fetch(&self, bot_id: &str, limit: usize) -> Result<Vec<TradeOutcome>, FetchError>;
}

#[async_trait::async_trait]
impl<T: TradeHistorySource + ?Sized> TradeHistorySource for Arc<T> {
    async fn fetch(&self, bot_id: &str, limit: usize) -> Result<Vec<TradeOutcome>, FetchError> {
        (**self).fetch(bot_id, limit).await
    }
}

fn take_last<T>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    if items.len() > limit {
        items.drain(..items.len() - limit);
    }
    items
}

/// In-memory trade history for testing and offline replays.
pub struct MemoryTradeHistory {
    trades: Arc<RwLock<HashMap<String, Vec<TradeOutcome>>>>,
    unavailable: AtomicBool,
}

impl MemoryTradeHistory {
    pub fn new() -> Self {
        Self {
            trades: Arc::new(RwLock::new(HashMap::new())),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Replace a bot's history with the given pnl percentages.
    pub async fn insert_history(&self, bot_id: &str, pnls: &[f64]) {
        let mut trades = self.trades.write().await;
        trades.insert(bot_id.to_string(), TradeOutcome::from_pnls(pnls));
    }

    /// Append one closed trade.
    pub async fn record(&self, bot_id: &str, pnl_pct: f64) {
        let mut trades = self.trades.write().await;
        let history = trades.entry(bot_id.to_string()).or_default();
        let position = history.len() as u64;
        history.push(TradeOutcome::new(pnl_pct, position));
    }

    /// Simulate the backing store going away.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl Default for MemoryTradeHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TradeHistorySource for MemoryTradeHistory {
    async fn fetch(&self, bot_id: &str, limit: usize) -> Result<Vec<TradeOutcome>, FetchError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FetchError::Unavailable("memory store offline".to_string()));
        }

        let trades = self.trades.read().await;
        let history = trades
            .get(bot_id)
            .ok_or_else(|| FetchError::UnknownBot(bot_id.to_string()))?;

        Ok(take_last(history.clone(), limit))
    }
}

/// Row of the CSV trade log. Numeric columns are kept as text so that a
/// malformed value degrades to zero instead of rejecting the whole log.
#[derive(Debug, Deserialize)]
struct TradeLogRow {
    #[serde(default)]
    timestamp: String,
    bot_id: String,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    side: String,
    #[serde(default)]
    usdt_spent: String,
    #[serde(default)]
    trade_pnl: String,
}

impl TradeLogRow {
    fn into_record(self) -> Option<TradeRecord> {
        let side = TradeSide::parse(&self.side)?;
        let timestamp = DateTime::parse_from_rfc3339(self.timestamp.trim())
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Some(TradeRecord {
            bot_id: self.bot_id,
            symbol: self.symbol,
            side,
            timestamp,
            pnl: parse_decimal(&self.trade_pnl),
            spent: parse_decimal(&self.usdt_spent),
        })
    }
}

fn parse_decimal(raw: &str) -> Decimal {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .unwrap_or(Decimal::ZERO)
}

/// Trade history backed by the append-only CSV trade log.
///
/// Columns used: `timestamp`, `bot_id`, `symbol`, `side`, `usdt_spent`,
/// `trade_pnl`; any other column is ignored.
#[derive(Debug, Clone)]
pub struct CsvTradeHistory {
    path: PathBuf,
    side: Option<TradeSide>,
}

impl CsvTradeHistory {
    /// Source reading closed (SELL) trades from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            side: Some(TradeSide::Sell),
        }
    }

    /// Filter on another side, or on none at all.
    pub fn with_side(mut self, side: Option<TradeSide>) -> Self {
        self.side = side;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the last `limit` matching records of a bot.
    pub fn records(&self, bot_id: &str, limit: usize) -> Result<Vec<TradeRecord>, FetchError> {
        Ok(self
            .read_log(bot_id, limit)?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    /// Returns `(position, record)` pairs where `position` counts the bot's
    /// matching rows from the start of the log.
    fn read_log(&self, bot_id: &str, limit: usize) -> Result<Vec<(u64, TradeRecord)>, FetchError> {
        if !self.path.exists() {
            return Err(FetchError::Unavailable(format!(
                "trade log not found: {}",
                self.path.display()
            )));
        }

        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| {
            FetchError::Unavailable(format!("failed to open {}: {}", self.path.display(), e))
        })?;

        let mut known_bot = false;
        let mut position = 0u64;
        let mut rows: VecDeque<(u64, TradeRecord)> = VecDeque::with_capacity(limit.min(1024));

        for result in reader.deserialize() {
            let row: TradeLogRow = match result {
                Ok(row) => row,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Skipping malformed trade log row");
                    continue;
                }
            };
            if row.bot_id != bot_id {
                continue;
            }
            known_bot = true;

            let Some(record) = row.into_record() else {
                continue;
            };
            if let Some(side) = self.side {
                if record.side != side {
                    continue;
                }
            }

            if limit > 0 {
                if rows.len() == limit {
                    rows.pop_front();
                }
                rows.push_back((position, record));
            }
            position += 1;
        }

        if !known_bot {
            return Err(FetchError::UnknownBot(bot_id.to_string()));
        }

        debug!(bot_id = %bot_id, matched = position, returned = rows.len(), "Read trade log");
        Ok(rows.into())
    }
}

#[async_trait::async_trait]
impl TradeHistorySource for CsvTradeHistory {
    async fn fetch(&self, bot_id: &str, limit: usize) -> Result<Vec<TradeOutcome>, FetchError> {
        let source = self.clone();
        let bot_id = bot_id.to_string();

        let rows = tokio::task::spawn_blocking(move || source.read_log(&bot_id, limit))
            .await
            .map_err(|e| FetchError::Unavailable(format!("trade log reader failed: {e}")))??;

        Ok(rows
            .into_iter()
            .map(|(position, record)| record.to_outcome(position))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str =
        "timestamp,date,bot_id,profile,symbol,side,price,qty,usdt_spent,usdt_received,trade_pnl,cumulative_pnl";

    fn write_log(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    fn sell(bot: &str, spent: &str, pnl: &str) -> String {
        format!(
            "2026-01-02T10:00:00+00:00,2026-01-02,{bot},equilibrium,BTCUSDT,SELL,1.0,1.0,{spent},0,{pnl},0"
        )
    }

    #[tokio::test]
    async fn test_memory_history_returns_last_trades() {
        let history = MemoryTradeHistory::new();
        history.insert_history("bot-1", &[1.0, 2.0, 3.0]).await;
        history.record("bot-1", 4.0).await;

        let trades = history.fetch("bot-1", 2).await.unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].pnl_pct, 3.0);
        assert_eq!(trades[1].pnl_pct, 4.0);
        assert_eq!(trades[1].sequence_position, 3);
    }

    #[tokio::test]
    async fn test_memory_history_unknown_bot() {
        let history = MemoryTradeHistory::new();
        let err = history.fetch("ghost", 10).await.unwrap_err();
        assert_eq!(err, FetchError::UnknownBot("ghost".to_string()));
    }

    #[tokio::test]
    async fn test_memory_history_unavailable() {
        let history = MemoryTradeHistory::new();
        history.insert_history("bot-1", &[1.0]).await;
        history.set_unavailable(true);
        assert!(matches!(
            history.fetch("bot-1", 10).await,
            Err(FetchError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_csv_filters_bot_and_side() {
        let buy = "2026-01-02T09:00:00+00:00,2026-01-02,bot-1,equilibrium,BTCUSDT,BUY,1.0,1.0,100,0,0,0";
        let a = sell("bot-1", "100", "-1.5");
        let b = sell("bot-2", "100", "9.0");
        let c = sell("bot-1", "200", "1.0");
        let file = write_log(&[buy, a.as_str(), b.as_str(), c.as_str()]);

        let source = CsvTradeHistory::new(file.path());
        let trades = source.fetch("bot-1", 10).await.unwrap();

        assert_eq!(trades.len(), 2);
        assert!((trades[0].pnl_pct - -1.5).abs() < 1e-9);
        assert!((trades[1].pnl_pct - 0.5).abs() < 1e-9);
        assert_eq!(trades[1].sequence_position, 1);
    }

    #[tokio::test]
    async fn test_csv_keeps_most_recent_limit() {
        let lines: Vec<String> = (1..=5)
            .map(|i| sell("bot-1", "100", &format!("{i}")))
            .collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let file = write_log(&refs);

        let trades = CsvTradeHistory::new(file.path()).fetch("bot-1", 3).await.unwrap();
        let pnls: Vec<f64> = trades.iter().map(|t| t.pnl_pct).collect();
        assert_eq!(pnls, vec![3.0, 4.0, 5.0]);
    }

    #[tokio::test]
    async fn test_csv_malformed_numbers_degrade_to_zero() {
        let line = sell("bot-1", "100", "not-a-number");
        let file = write_log(&[line.as_str()]);

        let trades = CsvTradeHistory::new(file.path()).fetch("bot-1", 10).await.unwrap();
        assert_eq!(trades[0].pnl_pct, 0.0);
    }

    #[tokio::test]
    async fn test_csv_extreme_values_do_not_panic() {
        let huge = sell("bot-1", "0.0001", "79000000000000000000000000000");
        let normal = sell("bot-1", "100", "-1.0");
        let file = write_log(&[huge.as_str(), normal.as_str()]);

        let trades = CsvTradeHistory::new(file.path()).fetch("bot-1", 10).await.unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].pnl_pct, 0.0);
        assert!((trades[1].pnl_pct - -1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_csv_unknown_bot_and_missing_file() {
        let line = sell("bot-1", "100", "1");
        let file = write_log(&[line.as_str()]);

        let err = CsvTradeHistory::new(file.path()).fetch("bot-9", 10).await.unwrap_err();
        assert_eq!(err, FetchError::UnknownBot("bot-9".to_string()));

        let err = CsvTradeHistory::new("/nonexistent/trades.csv")
            .fetch("bot-1", 10)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Unavailable(_)));
    }

    #[test]
    fn test_csv_records_keep_details() {
        let line = sell("bot-1", "50", "2.5");
        let file = write_log(&[line.as_str()]);

        let records = CsvTradeHistory::new(file.path()).records("bot-1", 10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol, "BTCUSDT");
        assert_eq!(records[0].side, TradeSide::Sell);
        assert!((records[0].pnl_pct() - 5.0).abs() < 1e-9);
    }
}
