use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use std::fmt;

/// One observed price for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
    pub timestamp: i64,
    pub price: i64,
}

impl PriceSample {
    pub fn new(timestamp: i64, price: i64) -> Self {
        PriceSample { timestamp, price }
    }
}

impl From<(i64, i64)> for PriceSample {
    fn from((timestamp, price): (i64, i64)) -> Self {
        PriceSample { timestamp, price }
    }
}

/// One row of the history store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub item_id: String,
    pub name: String,
    pub timestamp: i64,
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemHistory {
    pub item_id: String,
    pub name: String,
    pub samples: Vec<PriceSample>,
}

impl ItemHistory {
    /// Most recent sample by timestamp, whatever the order of `samples`.
    pub fn latest(&self) -> Option<PriceSample> {
        self.samples.iter().copied().max_by_key(|s| s.timestamp)
    }
}

/// Low/high/average over one trailing window.
///
/// All-zero means the window held no samples; it is never a real price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowStatistic {
    pub low: i64,
    pub high: i64,
    #[serde(rename = "avg")]
    pub average: i64,
}

impl WindowStatistic {
    pub fn empty() -> Self {
        WindowStatistic::default()
    }

    pub fn is_empty(&self) -> bool {
        self.low == 0 && self.high == 0 && self.average == 0
    }
}

/// A named trailing duration, measured back from "now".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub name: String,
    pub seconds: i64,
}

pub const WINDOW_6H: &str = "6h";
pub const WINDOW_12H: &str = "12h";
pub const WINDOW_24H: &str = "24h";
pub const WINDOW_3D: &str = "3d";
pub const WINDOW_7D: &str = "7d";

/// Short windows whose lows/highs count as "recent".
pub const RECENT_WINDOWS: [&str; 3] = [WINDOW_6H, WINDOW_12H, WINDOW_24H];

const HOUR: i64 = 3600;
const DAY: i64 = 24 * HOUR;

impl Window {
    pub fn new(name: impl Into<String>, seconds: i64) -> Self {
        Window { name: name.into(), seconds }
    }

    /// 6h, 12h, 24h and 7d.
    pub fn standard() -> Vec<Window> {
        vec![
            Window::new(WINDOW_6H, 6 * HOUR),
            Window::new(WINDOW_12H, 12 * HOUR),
            Window::new(WINDOW_24H, DAY),
            Window::new(WINDOW_7D, 7 * DAY),
        ]
    }

    /// Standard set plus the 3-day window the alternate modes read.
    pub fn dashboard() -> Vec<Window> {
        let mut windows = Window::standard();
        windows.insert(3, Window::new(WINDOW_3D, 3 * DAY));
        windows
    }
}

/// Window name -> statistic. Missing names read as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowStats(pub BTreeMap<String, WindowStatistic>);

impl WindowStats {
    pub fn new() -> Self {
        WindowStats(BTreeMap::new())
    }

    pub fn get(&self, name: &str) -> WindowStatistic {
        self.0.get(name).copied().unwrap_or_default()
    }

    pub fn insert(&mut self, name: impl Into<String>, stat: WindowStatistic) {
        self.0.insert(name.into(), stat);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, WindowStatistic)> for WindowStats {
    fn from_iter<I: IntoIterator<Item = (String, WindowStatistic)>>(iter: I) -> Self {
        WindowStats(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    CertifiedBuy,
    HoldForWindow,
    HighRisk,
    Monitor,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Classification::CertifiedBuy => "Certified Buy",
            Classification::HoldForWindow => "Hold For Window",
            Classification::HighRisk => "High Risk",
            Classification::Monitor => "Monitor",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingRecommendation {
    pub target_buy: i64,
    pub target_sell: i64,
    pub estimated_profit: i64,
    pub profit_margin_percent: f64,
    pub classification: Classification,
    pub reasoning: String,
    pub volatility: f64,
    pub stats: WindowStats,
}
