//! fut_analyzer CLI.
//!
//! Commands:
//! - `analyze`: evaluate every item in a history database, print a JSON snapshot
//! - `record`: sanitize a raw listing price and append it to an item's history
//! - `recommend`: one-shot evaluation from a price and an optional JSON history

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fut_analyzer::batch::{build_snapshot, BatchOptions, ItemInput, Snapshot};
use fut_analyzer::cache::{Cached, DEFAULT_TTL_SECS};
use fut_analyzer::flips::compute_recommendation;
use fut_analyzer::history::{self, RetentionPolicy};
use fut_analyzer::loader::HistoryStore;
use fut_analyzer::model::{PriceSample, Window};
use fut_analyzer::modes::{compute_mode_targets, TradingMode};
use fut_analyzer::sanitize::parse_price;
use fut_analyzer::stats::{aggregate, group_histories};
use fut_analyzer::EngineConfig;

#[derive(Parser)]
#[command(name = "fut_analyzer", about = "Buy/sell targets from marketplace price history")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// TOML file with engine settings. Missing keys keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the marketplace tax rate (0.05 = 5%).
    #[arg(long)]
    tax_rate: Option<f64>,

    /// Override the buffer below the recent low.
    #[arg(long)]
    buy_buffer: Option<f64>,

    /// Override the desired net profit fraction.
    #[arg(long)]
    profit_target: Option<f64>,
}

impl ConfigArgs {
    fn load(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if let Some(v) = self.tax_rate {
            config.marketplace_tax_rate = v;
        }
        if let Some(v) = self.buy_buffer {
            config.buy_buffer = v;
        }
        if let Some(v) = self.profit_target {
            config.profit_target = v;
        }
        config.validate().context("invalid engine settings")?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every item in the history database.
    Analyze {
        #[arg(long)]
        db: String,

        #[command(flatten)]
        config: ConfigArgs,

        /// Evaluation time (unix seconds). Defaults to now.
        #[arg(long)]
        now: Option<i64>,

        /// Also compute the normal/crash/rise/investment mode targets.
        #[arg(long, default_value_t = false)]
        modes: bool,

        /// Snapshot cache file. A fresh snapshot is served as-is, a stale one
        /// only when the refresh fails.
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Seconds a cached snapshot stays fresh.
        #[arg(long, default_value_t = DEFAULT_TTL_SECS)]
        ttl: i64,
    },
    /// Append one observed price to an item's history.
    Record {
        #[arg(long)]
        db: String,

        #[arg(long)]
        item: String,

        #[arg(long)]
        name: Option<String>,

        /// Raw listing text, e.g. "700 (700 Avg)" or "15.5K".
        #[arg(long)]
        price: String,

        /// Observation time (unix seconds). Defaults to now.
        #[arg(long)]
        at: Option<i64>,
    },
    /// Evaluate a single price against an optional JSON history of [ts, price] pairs.
    Recommend {
        #[arg(long)]
        price: String,

        #[arg(long)]
        history: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,

        #[arg(long)]
        now: Option<i64>,

        /// Report targets for this mode instead of the default engine.
        #[arg(long)]
        mode: Option<TradingMode>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fut_analyzer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze { db, config, now, modes, cache, ttl } => {
            cmd_analyze(&db, &config, now, modes, cache, ttl)
        }
        Commands::Record { db, item, name, price, at } => cmd_record(&db, &item, name, &price, at),
        Commands::Recommend { price, history, config, now, mode } => {
            cmd_recommend(&price, history, &config, now, mode)
        }
    }
}

fn cmd_analyze(
    db: &str,
    config: &ConfigArgs,
    now: Option<i64>,
    modes: bool,
    cache: Option<PathBuf>,
    ttl: i64,
) -> Result<()> {
    let generated_at = chrono::Utc::now();
    let wall_clock = generated_at.timestamp();

    let cached: Option<Cached<Snapshot>> = match &cache {
        Some(path) => Cached::read_json(path).unwrap_or_else(|e| {
            warn!("ignoring cache {}: {}", path.display(), e);
            None
        }),
        None => None,
    };
    if let Some(snapshot) = cached.as_ref().and_then(|c| c.get(wall_clock, ttl)) {
        info!("Serving cached snapshot ({} items)", snapshot.players.len());
        println!("{}", serde_json::to_string_pretty(snapshot)?);
        return Ok(());
    }

    let snapshot = match build_analysis(db, config, now.unwrap_or(wall_clock), modes, generated_at) {
        Ok(snapshot) => snapshot,
        Err(e) => match &cached {
            Some(stale) => {
                warn!("refresh failed ({:#}), serving snapshot from {}", e, stale.stored_at());
                println!("{}", serde_json::to_string_pretty(stale.stale())?);
                return Ok(());
            }
            None => return Err(e),
        },
    };

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    if let Some(path) = &cache {
        Cached::new(snapshot, wall_clock)
            .write_json(path)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

fn build_analysis(
    db: &str,
    config: &ConfigArgs,
    now: i64,
    modes: bool,
    generated_at: chrono::DateTime<chrono::Utc>,
) -> Result<Snapshot> {
    let config = config.load()?;
    let policy = RetentionPolicy::default();

    let store = HistoryStore::open(db).with_context(|| format!("opening {}", db))?;
    let rows = store.load_snapshots(now - policy.max_age_secs)?;
    let items: Vec<ItemInput> = group_histories(&rows)
        .into_iter()
        .filter_map(ItemInput::from_latest)
        .collect();
    info!("Loaded {} items ({} samples)", items.len(), rows.len());

    let options = BatchOptions { windows: Window::dashboard(), now, include_modes: modes };
    let snapshot = build_snapshot(&items, &options, &config, generated_at);
    if snapshot.summary.failed > 0 {
        warn!("{} items could not be evaluated", snapshot.summary.failed);
    }
    Ok(snapshot)
}

fn cmd_record(db: &str, item: &str, name: Option<String>, raw: &str, at: Option<i64>) -> Result<()> {
    let price = parse_price(raw).with_context(|| format!("price for item {}", item))?;
    let at = at.unwrap_or_else(|| chrono::Utc::now().timestamp());

    let mut store = HistoryStore::open(db).with_context(|| format!("opening {}", db))?;
    let name = name.unwrap_or_else(|| item.to_string());
    let removed = store.record(item, &name, PriceSample::new(at, price), &RetentionPolicy::default())?;
    info!("Recorded {} for {} ({} old samples pruned)", price, item, removed);
    Ok(())
}

fn cmd_recommend(
    raw: &str,
    history_path: Option<PathBuf>,
    config: &ConfigArgs,
    now: Option<i64>,
    mode: Option<TradingMode>,
) -> Result<()> {
    let config = config.load()?;
    let current = parse_price(raw).context("current price")?;
    let now = now.unwrap_or_else(|| chrono::Utc::now().timestamp());

    let mut samples: Vec<PriceSample> = match history_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let pairs: Vec<(i64, i64)> = serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            pairs.into_iter().map(PriceSample::from).collect()
        }
        None => Vec::new(),
    };
    if samples.iter().any(|s| s.price < 0) {
        bail!("history contains negative prices");
    }
    history::record(&mut samples, PriceSample::new(now, current), &RetentionPolicy::default());

    let stats = aggregate(&samples, &Window::dashboard(), now);
    let output = match mode {
        Some(mode) => serde_json::to_string_pretty(&compute_mode_targets(mode, current, &stats, &config)?)?,
        None => serde_json::to_string_pretty(&compute_recommendation(current, &stats, &config)?)?,
    };
    println!("{}", output);
    Ok(())
}
