use thiserror::Error;

/// Failures raised by the recommendation engine.
///
/// Sparse or empty history is never one of these; the engine falls back
/// instead.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("invalid config: {field} = {value} ({reason})")]
    InvalidConfig {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("invalid price: {0}")]
    InvalidPrice(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
