//! Trading signals for marketplace items: windowed price statistics feed a
//! buy/sell target engine that classifies each item.

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod flips;
pub mod history;
pub mod loader;
pub mod model;
pub mod modes;
pub mod sanitize;
pub mod stats;

pub use config::EngineConfig;
pub use error::EngineError;
pub use flips::compute_recommendation;
pub use model::{Classification, PriceSample, TradingRecommendation, Window, WindowStatistic, WindowStats};
pub use stats::aggregate;
