//! Adaptive review CLI.
//!
//! Prints a bot's recent trades, their risk statistics and the resulting
//! state/reason, without touching the persisted risk state.

use adaptive_core::db::{self, PgTradeHistory};
use adaptive_core::types::TradeSide;
use adaptive_core::{Config, CsvTradeHistory, ThresholdConfig, TradeHistorySource};
use anyhow::{anyhow, Context, Result};
use backtester::BacktestReporter;
use clap::Parser;
use risk_manager::{PostgresRiskStateStore, RiskStateStore};
use sqlx::PgPool;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Transitions considered by the post-mortem.
const POST_MORTEM_TRANSITIONS: usize = 25;

#[derive(Parser, Debug)]
#[command(name = "adaptive_review")]
#[command(about = "Adaptive heuristic review for recent trades", long_about = None)]
struct Args {
    /// Bot to review
    #[arg(long)]
    bot_id: String,

    /// Number of trades to load
    #[arg(long, default_value_t = 10)]
    limit: usize,

    /// Read trades from this CSV trade log instead of PostgreSQL
    #[arg(long)]
    trades_csv: Option<PathBuf>,

    /// Trade side counted as a closed trade (BUY | SELL)
    #[arg(long)]
    side: Option<String>,

    /// Threshold file (TOML, JSON or YAML)
    #[arg(long = "config")]
    config_path: Option<PathBuf>,

    /// Also print the sliding-window replay over the loaded trades
    #[arg(long, default_value_t = false)]
    replay: bool,

    /// Also print the post-mortem summary
    #[arg(long, default_value_t = false)]
    post_mortem: bool,

    /// Apply database migrations before reading
    #[arg(long, default_value_t = false)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("failed to read environment")?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adaptive_review=info,risk_manager=info,backtester=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    run(args, config, &mut std::io::stdout()).await
}

async fn run(args: Args, config: Config, out: &mut (dyn Write + Send)) -> Result<()> {
    let thresholds_path = args.config_path.clone().or(config.thresholds_path.clone());
    let thresholds = ThresholdConfig::load(thresholds_path.as_deref())
        .context("invalid threshold configuration")?;

    let side_name = args.side.as_deref().unwrap_or(&config.history.side);
    let side = parse_side(side_name)?;

    let (history, pool): (Arc<dyn TradeHistorySource>, Option<PgPool>) =
        match args.trades_csv.clone().or(config.history.trades_csv.clone()) {
            Some(path) => {
                if args.migrate {
                    warn!("--migrate has no effect with a CSV trade log");
                }
                let csv = CsvTradeHistory::new(path).with_side(Some(side));
                info!(path = %csv.path().display(), side = side.as_str(), "Reading trades from CSV log");
                let history: Arc<dyn TradeHistorySource> = Arc::new(csv);
                (history, None)
            }
            None => {
                let database = config.require_database()?;
                let pool = db::create_pool(database)
                    .await
                    .context("failed to connect to database")?;
                if args.migrate {
                    db::run_migrations(&pool)
                        .await
                        .context("failed to apply migrations")?;
                }
                info!(side = side.as_str(), "Reading trades from database");
                let history: Arc<dyn TradeHistorySource> =
                    Arc::new(PgTradeHistory::new(pool.clone()).with_side(side));
                (history, Some(pool))
            }
        };

    let reporter = BacktestReporter::new(history, thresholds)?;
    debug!(thresholds = ?reporter.config(), "Loaded thresholds");

    let review = reporter
        .review(&args.bot_id, args.limit)
        .await
        .with_context(|| format!("review of bot '{}' failed", args.bot_id))?;
    writeln!(out, "{review}")?;

    if args.replay || args.post_mortem {
        let replay = reporter.replay(&args.bot_id, args.limit).await?;

        if args.replay {
            writeln!(out)?;
            writeln!(out, "{replay}")?;
        }

        if args.post_mortem {
            let transitions = match pool {
                Some(pool) => PostgresRiskStateStore::new(pool)
                    .recent_transitions(&args.bot_id, POST_MORTEM_TRANSITIONS)
                    .await
                    .context("failed to load risk transitions")?,
                None => replay.transitions(),
            };
            let summary = reporter
                .post_mortem(&args.bot_id, args.limit, &transitions)
                .await?;
            writeln!(out)?;
            writeln!(out, "{summary}")?;
        }
    }

    Ok(())
}

fn parse_side(side: &str) -> Result<TradeSide> {
    TradeSide::parse(side).ok_or_else(|| anyhow!("invalid trade side '{side}', expected BUY or SELL"))
}
