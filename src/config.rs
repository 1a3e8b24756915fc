use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::error::EngineError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Invalid(#[from] EngineError),
}

/// Tunables for target derivation and classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fraction below the recent low used as the buy target.
    pub buy_buffer: f64,
    /// Desired net profit as a fraction of the buy price.
    pub profit_target: f64,
    /// Fraction of sale proceeds kept by the marketplace.
    pub marketplace_tax_rate: f64,
    /// Furthest the buy target may sit below the 24h low.
    pub clamp_floor_percent: f64,
    /// Fraction below the recent high used as the list price.
    pub sell_discount: f64,
    pub volatility_high_risk_threshold: f64,
    /// Band above the buy target that still counts as "hold".
    pub hold_tolerance: f64,
    /// Absolute profit the alternate modes insist on, in currency units.
    pub minimum_absolute_margin: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            buy_buffer: 0.07,
            profit_target: 0.20,
            marketplace_tax_rate: 0.05,
            clamp_floor_percent: 0.10,
            sell_discount: 0.03,
            volatility_high_risk_threshold: 0.6,
            hold_tolerance: 0.03,
            minimum_absolute_margin: 200,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw, &path.display().to_string())
    }

    /// Rejects structurally invalid settings. Nothing is clamped.
    pub fn validate(&self) -> Result<(), EngineError> {
        unit_fraction("buy_buffer", self.buy_buffer)?;
        unit_fraction("clamp_floor_percent", self.clamp_floor_percent)?;
        unit_fraction("sell_discount", self.sell_discount)?;
        unit_fraction("hold_tolerance", self.hold_tolerance)?;
        non_negative("profit_target", self.profit_target)?;
        non_negative("volatility_high_risk_threshold", self.volatility_high_risk_threshold)?;

        non_negative("marketplace_tax_rate", self.marketplace_tax_rate)?;
        if self.marketplace_tax_rate >= 1.0 {
            return Err(EngineError::InvalidConfig {
                field: "marketplace_tax_rate",
                value: self.marketplace_tax_rate,
                reason: "must be below 1, nothing would be left of a sale",
            });
        }

        if self.minimum_absolute_margin < 0 {
            return Err(EngineError::InvalidConfig {
                field: "minimum_absolute_margin",
                value: self.minimum_absolute_margin as f64,
                reason: "must not be negative",
            });
        }

        Ok(())
    }

    /// Share of a sale price that reaches the seller.
    pub fn net_factor(&self) -> f64 {
        1.0 - self.marketplace_tax_rate
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), EngineError> {
    if !value.is_finite() {
        return Err(EngineError::InvalidConfig { field, value, reason: "must be finite" });
    }
    if value < 0.0 {
        return Err(EngineError::InvalidConfig { field, value, reason: "must not be negative" });
    }
    Ok(())
}

fn unit_fraction(field: &'static str, value: f64) -> Result<(), EngineError> {
    non_negative(field, value)?;
    if value > 1.0 {
        return Err(EngineError::InvalidConfig { field, value, reason: "must be at most 1" });
    }
    Ok(())
}
