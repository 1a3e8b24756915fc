//! Turns raw listing text into validated prices before anything reaches the
//! engine.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("empty price text")]
    Empty,

    #[error("unparseable price text '{0}'")]
    Malformed(String),

    #[error("price {0} is negative")]
    Negative(String),

    #[error("price is not finite")]
    NonFinite,

    #[error("price {0} is out of range")]
    TooLarge(String),
}

/// Parses listing text such as `"700 (700 Avg)"`, `"1,250"`, `"15.5K"` or
/// `"1.2M"`. Only the leading figure counts.
pub fn parse_price(raw: &str) -> Result<i64, ParseError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let lead = text
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .replace(',', "");
    if lead.is_empty() {
        return Err(ParseError::Malformed(text.to_string()));
    }

    let (digits, multiplier) = match lead.chars().last() {
        Some('k') | Some('K') => (&lead[..lead.len() - 1], 1_000.0),
        Some('m') | Some('M') => (&lead[..lead.len() - 1], 1_000_000.0),
        _ => (lead.as_str(), 1.0),
    };

    let value: f64 = digits
        .parse()
        .map_err(|_| ParseError::Malformed(text.to_string()))?;
    validate_price(value * multiplier)
}

/// Accepts a finite, non-negative amount and rounds it to whole units.
pub fn validate_price(value: f64) -> Result<i64, ParseError> {
    if !value.is_finite() {
        return Err(ParseError::NonFinite);
    }
    if value < 0.0 {
        return Err(ParseError::Negative(value.to_string()));
    }
    let rounded = value.round();
    // i64::MAX as f64 is 2^63, one past the largest i64
    if rounded >= i64::MAX as f64 {
        return Err(ParseError::TooLarge(value.to_string()));
    }
    Ok(rounded as i64)
}
