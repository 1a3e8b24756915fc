use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::flips::compute_recommendation;
use crate::model::{Classification, ItemHistory, TradingRecommendation, Window, WindowStats};
use crate::modes::{compute_all_modes, ModeTargets};
use crate::stats::aggregate;

/// What the caller knows about one item for this run.
#[derive(Debug, Clone)]
pub struct ItemInput {
    pub history: ItemHistory,
    pub current_bin: i64,
}

impl ItemInput {
    /// Uses the newest stored sample as the current price.
    pub fn from_latest(history: ItemHistory) -> Option<Self> {
        let latest = history.latest()?;
        Some(ItemInput { history, current_bin: latest.price })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReport {
    pub id: String,
    pub name: String,
    #[serde(rename = "currentBIN")]
    pub current_bin: i64,
    pub historical: WindowStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trading: Option<TradingRecommendation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modes: Vec<ModeTargets>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub items: usize,
    pub failed: usize,
    pub certified_buys: usize,
    pub median_margin: f64,
    pub margin_std_dev: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub players: Vec<ItemReport>,
    pub summary: SnapshotSummary,
    pub last_updated: DateTime<Utc>,
}

/// Options for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub windows: Vec<Window>,
    pub now: i64,
    pub include_modes: bool,
}

/// Evaluates every item in parallel. Output order follows input order and a
/// failing item is reported, not fatal.
pub fn evaluate_items(items: &[ItemInput], options: &BatchOptions, config: &EngineConfig) -> Vec<ItemReport> {
    items
        .par_iter()
        .map(|item| evaluate_item(item, options, config))
        .collect()
}

fn evaluate_item(item: &ItemInput, options: &BatchOptions, config: &EngineConfig) -> ItemReport {
    let stats = aggregate(&item.history.samples, &options.windows, options.now);
    let mut report = ItemReport {
        id: item.history.item_id.clone(),
        name: item.history.name.clone(),
        current_bin: item.current_bin,
        historical: stats.clone(),
        trading: None,
        modes: Vec::new(),
        error: None,
    };

    match compute_recommendation(item.current_bin, &stats, config) {
        Ok(rec) => {
            debug!(
                item = %report.id,
                buy = rec.target_buy,
                sell = rec.target_sell,
                class = %rec.classification,
                "evaluated item"
            );
            report.trading = Some(rec);
        }
        Err(e) => {
            warn!(item = %report.id, error = %e, "skipping item");
            report.error = Some(e.to_string());
            return report;
        }
    }

    if options.include_modes {
        match compute_all_modes(item.current_bin, &stats, config) {
            Ok(modes) => report.modes = modes,
            Err(e) => report.error = Some(e.to_string()),
        }
    }

    report
}

pub fn summarize(reports: &[ItemReport]) -> SnapshotSummary {
    let recs: Vec<&TradingRecommendation> = reports.iter().filter_map(|r| r.trading.as_ref()).collect();
    let margins: Vec<f64> = recs.iter().map(|r| r.profit_margin_percent).collect();

    let (median_margin, margin_std_dev) = match margins.len() {
        0 => (0.0, 0.0),
        1 => (margins[0], 0.0),
        _ => (Data::new(margins.clone()).median(), margins.iter().std_dev()),
    };

    SnapshotSummary {
        items: reports.len(),
        failed: reports.len() - recs.len(),
        certified_buys: recs
            .iter()
            .filter(|r| r.classification == Classification::CertifiedBuy)
            .count(),
        median_margin,
        margin_std_dev,
    }
}

pub fn build_snapshot(
    items: &[ItemInput],
    options: &BatchOptions,
    config: &EngineConfig,
    generated_at: DateTime<Utc>,
) -> Snapshot {
    let players = evaluate_items(items, options, config);
    let summary = summarize(&players);
    Snapshot { players, summary, last_updated: generated_at }
}
