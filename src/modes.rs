//! Alternate dashboard modes.
//!
//! Each mode is one buy/sell formula over the same window statistics. All of
//! them go through [`apply_guard`], which lifts the sell target to cover the
//! minimum absolute margin after tax and snaps it to a market price step.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::model::{WindowStats, RECENT_WINDOWS, WINDOW_24H, WINDOW_3D, WINDOW_7D};
use crate::stats::{ceil_units, discounted, round_to};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Normal,
    Crash,
    Rise,
    Investment,
}

impl TradingMode {
    pub const ALL: [TradingMode; 4] = [
        TradingMode::Normal,
        TradingMode::Crash,
        TradingMode::Rise,
        TradingMode::Investment,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TradingMode::Normal => "normal",
            TradingMode::Crash => "crash",
            TradingMode::Rise => "rise",
            TradingMode::Investment => "investment",
        }
    }

    fn formula(&self) -> Formula {
        match self {
            TradingMode::Normal => normal,
            TradingMode::Crash => crash,
            TradingMode::Rise => rise,
            TradingMode::Investment => investment,
        }
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TradingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(TradingMode::Normal),
            "crash" => Ok(TradingMode::Crash),
            "rise" => Ok(TradingMode::Rise),
            "investment" | "invest" | "accumulation" => Ok(TradingMode::Investment),
            other => Err(format!("unknown trading mode '{}'", other)),
        }
    }
}

/// Window values a formula may read, with empty windows already resolved
/// along 24h -> 7d -> current price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeInputs {
    pub current: i64,
    pub recent_low: i64,
    pub recent_high: i64,
    pub low_24h: i64,
    pub high_24h: i64,
    pub low_7d: i64,
    pub high_7d: i64,
    pub avg_3d: i64,
}

impl ModeInputs {
    pub fn resolve(current: i64, stats: &WindowStats) -> Self {
        let day = stats.get(WINDOW_24H);
        let three = stats.get(WINDOW_3D);
        let week = stats.get(WINDOW_7D);

        let low_24h = first_positive(&[day.low, week.low, current]);
        let high_24h = first_positive(&[day.high, week.high, current]);
        let low_7d = first_positive(&[week.low, low_24h]);
        let high_7d = first_positive(&[week.high, high_24h]);
        let avg_3d = first_positive(&[three.average, week.average, current]);

        let recent_low = RECENT_WINDOWS
            .iter()
            .map(|name| stats.get(name).low)
            .filter(|&v| v > 0)
            .min()
            .unwrap_or(low_24h);
        let recent_high = RECENT_WINDOWS
            .iter()
            .map(|name| stats.get(name).high)
            .filter(|&v| v > 0)
            .max()
            .unwrap_or(high_24h);

        ModeInputs { current, recent_low, recent_high, low_24h, high_24h, low_7d, high_7d, avg_3d }
    }
}

fn first_positive(values: &[i64]) -> i64 {
    values.iter().copied().find(|&v| v > 0).unwrap_or(0)
}

/// (buy, sell) before the shared guard.
type Formula = fn(&ModeInputs, &EngineConfig) -> (i64, i64);

fn normal(inputs: &ModeInputs, config: &EngineConfig) -> (i64, i64) {
    (
        discounted(inputs.recent_low, config.buy_buffer),
        discounted(inputs.recent_high, config.sell_discount),
    )
}

// Both inputs are non-negative prices
fn midpoint(a: i64, b: i64) -> i64 {
    a / 2 + b / 2 + (a % 2 + b % 2) / 2
}

// Splits the difference between today's dip and the weekly floor
fn crash(inputs: &ModeInputs, config: &EngineConfig) -> (i64, i64) {
    let blended_low = midpoint(inputs.low_24h, inputs.low_7d);
    (discounted(blended_low, config.buy_buffer), inputs.avg_3d)
}

// Near a peak the buy target never drops under the buffered 3d average
fn rise(inputs: &ModeInputs, config: &EngineConfig) -> (i64, i64) {
    let buy = discounted(inputs.low_24h, config.buy_buffer)
        .max(discounted(inputs.avg_3d, config.buy_buffer));
    (buy, inputs.high_24h)
}

fn investment(inputs: &ModeInputs, config: &EngineConfig) -> (i64, i64) {
    (discounted(inputs.low_7d, config.buy_buffer), inputs.high_7d)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeTargets {
    pub mode: TradingMode,
    pub target_buy: i64,
    pub target_sell: i64,
    pub estimated_profit: i64,
    pub profit_margin_percent: f64,
}

pub fn compute_mode_targets(
    mode: TradingMode,
    current_bin: i64,
    stats: &WindowStats,
    config: &EngineConfig,
) -> Result<ModeTargets> {
    config.validate()?;
    if current_bin < 0 {
        return Err(EngineError::InvalidPrice(format!("current price {} is negative", current_bin)));
    }

    let inputs = ModeInputs::resolve(current_bin, stats);
    let (raw_buy, raw_sell) = (mode.formula())(&inputs, config);
    let target_buy = raw_buy.max(1);
    let target_sell = apply_guard(target_buy, raw_sell, config);

    let estimated_profit = (target_sell as f64 * config.net_factor() - target_buy as f64).round() as i64;
    let profit_margin_percent = round_to(estimated_profit as f64 / target_buy as f64 * 100.0, 2);

    Ok(ModeTargets { mode, target_buy, target_sell, estimated_profit, profit_margin_percent })
}

/// Every mode, in [`TradingMode::ALL`] order.
pub fn compute_all_modes(
    current_bin: i64,
    stats: &WindowStats,
    config: &EngineConfig,
) -> Result<Vec<ModeTargets>> {
    TradingMode::ALL
        .iter()
        .map(|&mode| compute_mode_targets(mode, current_bin, stats, config))
        .collect()
}

/// Raises `sell` to cover `buy + minimum_absolute_margin` after tax, then
/// snaps to the nearest market step without dropping under that floor.
///
/// Saturates at `i64::MAX` instead of overflowing.
pub fn apply_guard(buy: i64, sell: i64, config: &EngineConfig) -> i64 {
    let floor = ceil_units(buy.saturating_add(config.minimum_absolute_margin) as f64 / config.net_factor());
    let snapped = round_to_increment(sell.max(floor));
    if snapped >= floor {
        return snapped;
    }
    snapped
        .checked_add(market_increment(snapped))
        .filter(|&up| up >= floor)
        .unwrap_or(floor)
}

/// Price step the marketplace lists in at this magnitude.
pub fn market_increment(price: i64) -> i64 {
    match price {
        p if p < 1_000 => 50,
        p if p < 10_000 => 100,
        p if p < 50_000 => 500,
        _ => 1_000,
    }
}

pub fn round_to_increment(price: i64) -> i64 {
    let step = market_increment(price);
    (price.saturating_add(step / 2) / step) * step
}
