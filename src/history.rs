use serde::{Deserialize, Serialize};

use crate::model::PriceSample;

/// How much history is worth keeping per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Samples older than this are dropped. One day past the 7d window.
    pub max_age_secs: i64,
    pub max_points: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy { max_age_secs: 8 * 24 * 3600, max_points: 500 }
    }
}

impl RetentionPolicy {
    /// Drops expired samples, then keeps the newest `max_points`.
    ///
    /// Leaves the history sorted ascending by timestamp.
    pub fn apply(&self, history: &mut Vec<PriceSample>, now: i64) {
        let cutoff = now - self.max_age_secs;
        history.retain(|s| s.timestamp >= cutoff);
        history.sort_by_key(|s| s.timestamp);
        if history.len() > self.max_points {
            let excess = history.len() - self.max_points;
            history.drain(..excess);
        }
    }
}

/// Appends an observation and prunes in one step. Returns how many samples
/// were dropped.
pub fn record(history: &mut Vec<PriceSample>, sample: PriceSample, policy: &RetentionPolicy) -> usize {
    history.push(sample);
    let before = history.len();
    policy.apply(history, sample.timestamp);
    before - history.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn old_samples_are_dropped() {
        let now = 10_000_000;
        let mut history = vec![
            PriceSample::new(now - 9 * 24 * 3600, 100),
            PriceSample::new(now - 3600, 200),
        ];
        let dropped = record(&mut history, PriceSample::new(now, 300), &RetentionPolicy::default());
        assert_eq!(dropped, 1);
        assert_eq!(history.iter().map(|s| s.price).collect::<Vec<_>>(), vec![200, 300]);
    }

    #[test]
    fn point_cap_keeps_newest() {
        let policy = RetentionPolicy { max_age_secs: i64::MAX / 2, max_points: 3 };
        let mut history: Vec<PriceSample> = (0..5).rev().map(|t| PriceSample::new(t, t * 10)).collect();
        policy.apply(&mut history, 5);
        assert_eq!(history.iter().map(|s| s.timestamp).collect::<Vec<_>>(), vec![2, 3, 4]);
    }
}
