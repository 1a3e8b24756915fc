use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::model::{
    Classification, TradingRecommendation, WindowStats, RECENT_WINDOWS, WINDOW_24H, WINDOW_7D,
};
use crate::stats::{ceil_units, discounted, floor_units, round_to};

/// Derives buy/sell targets, profit and a classification for one item.
///
/// `stats` normally comes from [`crate::stats::aggregate`]; windows missing
/// from it are treated as empty. Only an invalid config or a negative price
/// is an error, sparse data falls back instead.
pub fn compute_recommendation(
    current_bin: i64,
    stats: &WindowStats,
    config: &EngineConfig,
) -> Result<TradingRecommendation> {
    config.validate()?;
    if current_bin < 0 {
        return Err(EngineError::InvalidPrice(format!("current price {} is negative", current_bin)));
    }

    let day = stats.get(WINDOW_24H);
    let week = stats.get(WINDOW_7D);

    let target_buy = target_buy(current_bin, stats, config);

    // Sell side mirrors the buy side using highs
    let recent_highs: Vec<i64> = RECENT_WINDOWS
        .iter()
        .map(|name| stats.get(name).high)
        .filter(|&high| high > 0)
        .collect();
    let recent_high = recent_highs.iter().copied().max();
    let seven_day_high = if week.high > 0 { week.high } else { recent_high.unwrap_or(0) };

    let raw_sell = if let Some(high) = recent_high {
        discounted(high, config.sell_discount)
    } else if seven_day_high > 0 {
        discounted(seven_day_high, config.sell_discount)
    } else {
        debug!(current_bin, "no highs in any window, selling off current price");
        floor_units(current_bin as f64 * (1.0 + config.profit_target))
    };

    // Only guarded by the weekly ceiling when one exists
    let target_sell = if seven_day_high > 0 { raw_sell.min(seven_day_high) } else { raw_sell };

    let gross_needed = target_buy as f64 * (1.0 + config.profit_target);
    let sell_from_buy = ceil_units(gross_needed / config.net_factor());
    let final_sell = target_sell.max(sell_from_buy);

    let net_from_sell = final_sell as f64 * config.net_factor();
    let estimated_profit = (net_from_sell - target_buy as f64).round() as i64;
    let profit_margin_percent = if target_buy > 0 {
        round_to(estimated_profit as f64 / target_buy as f64 * 100.0, 2)
    } else {
        0.0
    };

    let volatility = if day.average > 0 {
        (day.high - day.low) as f64 / day.average as f64
    } else {
        0.0
    };

    let (classification, reasoning) =
        classify(current_bin, target_buy, final_sell, volatility, config);

    Ok(TradingRecommendation {
        target_buy,
        target_sell: final_sell,
        estimated_profit,
        profit_margin_percent,
        classification,
        reasoning,
        volatility,
        stats: stats.clone(),
    })
}

/// Buffered recent low, clamped into `[low24h * (1 - clamp), low24h]` and
/// never below 1.
fn target_buy(current_bin: i64, stats: &WindowStats, config: &EngineConfig) -> i64 {
    let recent_low = RECENT_WINDOWS
        .iter()
        .map(|name| stats.get(name).low)
        .filter(|&low| low > 0)
        .min();
    let week_low = stats.get(WINDOW_7D).low;
    let seven_day_low = if week_low > 0 { week_low } else { recent_low.unwrap_or(0) };

    let raw = match recent_low {
        Some(low) => discounted(low, config.buy_buffer),
        None if seven_day_low > 0 => {
            debug!(seven_day_low, "no recent lows, buying off the 7d low");
            discounted(seven_day_low, config.buy_buffer)
        }
        None => {
            debug!(current_bin, "no lows in any window, buying off current price");
            discounted(current_bin, config.buy_buffer)
        }
    };

    let day_low = stats.get(WINDOW_24H).low;
    let low_24h = [day_low, seven_day_low, current_bin]
        .into_iter()
        .find(|&v| v > 0)
        .unwrap_or(0);

    let clamp_floor = discounted(low_24h, config.clamp_floor_percent);
    let mut target = raw.max(clamp_floor);

    if target > low_24h {
        target = low_24h;
    }
    if target <= 0 {
        target = low_24h.max(1);
    }
    target
}

fn classify(
    current_bin: i64,
    target_buy: i64,
    target_sell: i64,
    volatility: f64,
    config: &EngineConfig,
) -> (Classification, String) {
    // Order matters: a buy signal wins over volatility
    if current_bin <= target_buy {
        return (
            Classification::CertifiedBuy,
            format!(
                "Current BIN ({}) is at or below target buy ({}).",
                format_coins(current_bin),
                format_coins(target_buy)
            ),
        );
    }

    let hold_ceiling = floor_units(target_buy as f64 * (1.0 + config.hold_tolerance));
    if current_bin <= hold_ceiling {
        return (
            Classification::HoldForWindow,
            format!(
                "Price ({}) slightly above target buy ({}), wait for a low-liquidity window.",
                format_coins(current_bin),
                format_coins(target_buy)
            ),
        );
    }

    if current_bin >= target_sell {
        return (
            Classification::HighRisk,
            format!(
                "Price ({}) at or above target sell ({}).",
                format_coins(current_bin),
                format_coins(target_sell)
            ),
        );
    }
    if volatility > config.volatility_high_risk_threshold {
        return (
            Classification::HighRisk,
            format!(
                "Market volatile: 24h range is {:.0}% of the average (limit {:.0}%).",
                volatility * 100.0,
                config.volatility_high_risk_threshold * 100.0
            ),
        );
    }

    (Classification::Monitor, "No immediate actionable buy.".to_string())
}

/// `1250000` -> `"1,250,000"`.
pub fn format_coins(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
