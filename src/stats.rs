use crate::model::{ItemHistory, ItemSnapshot, PriceSample, Window, WindowStatistic, WindowStats};
use std::collections::HashMap;

// Absorbs representation error such as 1000 * 0.9299999999999999. The
// relative part tracks float spacing for large prices and stays far below
// one unit up to ~1e12.
const ROUNDING_EPSILON: f64 = 1e-9;
const RELATIVE_EPSILON: f64 = 1e-14;

/// Reduces one item's history to a statistic per window.
///
/// A sample belongs to a window iff `timestamp >= now - window.seconds`.
/// The history may be in any order.
pub fn aggregate(history: &[PriceSample], windows: &[Window], now: i64) -> WindowStats {
    windows
        .iter()
        .map(|window| {
            let cutoff = now - window.seconds;
            let prices: Vec<i64> = history
                .iter()
                .filter(|s| s.timestamp >= cutoff)
                .map(|s| s.price)
                .collect();
            (window.name.clone(), window_statistic(&prices))
        })
        .collect()
}

pub fn window_statistic(prices: &[i64]) -> WindowStatistic {
    let (Some(&low), Some(&high)) = (prices.iter().min(), prices.iter().max()) else {
        return WindowStatistic::empty();
    };

    let sum: i128 = prices.iter().map(|&p| p as i128).sum();
    let average = sum.div_euclid(prices.len() as i128) as i64;

    WindowStatistic { low, high, average }
}

/// Groups flat store rows into per-item histories, keeping first-seen order.
pub fn group_histories(rows: &[ItemSnapshot]) -> Vec<ItemHistory> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut items: Vec<ItemHistory> = Vec::new();

    for row in rows {
        let slot = *index.entry(row.item_id.as_str()).or_insert_with(|| {
            items.push(ItemHistory {
                item_id: row.item_id.clone(),
                name: row.name.clone(),
                samples: Vec::new(),
            });
            items.len() - 1
        });
        items[slot].samples.push(PriceSample::new(row.timestamp, row.price));
    }

    items
}

/// Truncates a non-negative fractional amount to whole currency units.
pub fn floor_units(value: f64) -> i64 {
    (value + tolerance(value)).floor() as i64
}

pub fn ceil_units(value: f64) -> i64 {
    (value - tolerance(value)).ceil() as i64
}

fn tolerance(value: f64) -> f64 {
    ROUNDING_EPSILON.max(value.abs() * RELATIVE_EPSILON)
}

/// `price * (1 - fraction)`, truncated.
pub fn discounted(price: i64, fraction: f64) -> i64 {
    floor_units(price as f64 * (1.0 - fraction))
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;
    const HOUR: i64 = 3600;

    fn history() -> Vec<PriceSample> {
        vec![
            PriceSample::new(NOW - 5 * HOUR, 900),
            PriceSample::new(NOW - 3 * HOUR, 850),
            PriceSample::new(NOW - HOUR, 950),
            PriceSample::new(NOW - 30 * HOUR, 700),
        ]
    }

    #[test]
    fn windows_filter_independently() {
        let stats = aggregate(&history(), &Window::standard(), NOW);

        assert_eq!(stats.get("6h"), WindowStatistic { low: 850, high: 950, average: 900 });
        assert_eq!(stats.get("24h"), WindowStatistic { low: 850, high: 950, average: 900 });
        assert_eq!(stats.get("7d"), WindowStatistic { low: 700, high: 950, average: 850 });
    }

    #[test]
    fn cutoff_is_inclusive() {
        let samples = vec![PriceSample::new(NOW - 6 * HOUR, 500)];
        let stats = aggregate(&samples, &Window::standard(), NOW);
        assert_eq!(stats.get("6h").low, 500);
    }

    #[test]
    fn empty_window_is_all_zero() {
        let samples = vec![PriceSample::new(NOW - 10 * 24 * HOUR, 500)];
        let stats = aggregate(&samples, &Window::standard(), NOW);
        for name in ["6h", "12h", "24h", "7d"] {
            assert!(stats.get(name).is_empty(), "{} should be empty", name);
        }
    }

    #[test]
    fn duplicate_timestamps_both_count() {
        let samples = vec![PriceSample::new(NOW - HOUR, 100), PriceSample::new(NOW - HOUR, 201)];
        let stat = aggregate(&samples, &Window::standard(), NOW).get("6h");
        assert_eq!(stat, WindowStatistic { low: 100, high: 201, average: 150 });
    }

    #[test]
    fn descending_history_matches_ascending() {
        let mut reversed = history();
        reversed.reverse();
        assert_eq!(
            aggregate(&history(), &Window::dashboard(), NOW),
            aggregate(&reversed, &Window::dashboard(), NOW)
        );
    }

    #[test]
    fn grouping_keeps_items_apart() {
        let rows = vec![
            ItemSnapshot { item_id: "1".into(), name: "A".into(), timestamp: 1, price: 10 },
            ItemSnapshot { item_id: "2".into(), name: "B".into(), timestamp: 1, price: 20 },
            ItemSnapshot { item_id: "1".into(), name: "A".into(), timestamp: 2, price: 11 },
        ];
        let items = group_histories(&rows);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_id, "1");
        assert_eq!(items[0].samples.len(), 2);
        assert_eq!(items[1].samples[0].price, 20);
    }

    #[test]
    fn rounding_tolerates_float_noise() {
        assert_eq!(discounted(1000, 0.07), 930);
        assert_eq!(discounted(850, 0.07), 790);
        assert_eq!(ceil_units(948.0 / 0.95), 998);
        assert_eq!(round_to(20.012_658, 2), 20.01);
    }

    #[test]
    fn sell_floor_ceiling_is_exact_for_large_buys() {
        // ceil(tb * 1.2 / 0.95) == ceil(tb * 24 / 19), computed the way the
        // engine derives its factors from the config
        let gross = 1.0 + 0.2;
        let net = 1.0 - 0.05;
        let buys = (18_262_000_i64..18_264_000).chain((1..2_000).map(|k| k * 499_979));
        for tb in buys {
            let exact = (tb * 24 + 18) / 19;
            assert_eq!(ceil_units(tb as f64 * gross / net), exact, "buy {}", tb);
        }
    }

    #[test]
    fn floor_is_exact_for_large_discounts() {
        for price in (1..2_000).map(|k| k * 50_000_017_i64) {
            // price * 0.93 == price * 93 / 100
            assert_eq!(discounted(price, 0.07), price * 93 / 100, "price {}", price);
        }
    }
}
