use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Seconds a dashboard snapshot stays valid.
pub const DEFAULT_TTL_SECS: i64 = 60;

/// A computed value plus the time it was produced.
///
/// The owner decides freshness by passing its own clock reading; nothing
/// here reads the system time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cached<T> {
    value: T,
    stored_at: i64,
}

impl<T> Cached<T> {
    pub fn new(value: T, stored_at: i64) -> Self {
        Cached { value, stored_at }
    }

    pub fn stored_at(&self) -> i64 {
        self.stored_at
    }

    /// True while `now` is less than `ttl_secs` past the store time.
    pub fn is_fresh(&self, now: i64, ttl_secs: i64) -> bool {
        now - self.stored_at < ttl_secs
    }

    /// The value if still fresh.
    pub fn get(&self, now: i64, ttl_secs: i64) -> Option<&T> {
        self.is_fresh(now, ttl_secs).then_some(&self.value)
    }

    /// The value regardless of age, for serving stale data after a failed
    /// refresh.
    pub fn stale(&self) -> &T {
        &self.value
    }
}

impl<T: DeserializeOwned> Cached<T> {
    /// Reads a cache file. A missing file is `Ok(None)`.
    pub fn read_json(path: impl AsRef<Path>) -> Result<Option<Self>, CacheError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }
}

impl<T: Serialize> Cached<T> {
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CacheError> {
        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_at_ttl() {
        let cached = Cached::new("snapshot", 1_000);
        assert_eq!(cached.get(1_059, DEFAULT_TTL_SECS), Some(&"snapshot"));
        assert_eq!(cached.get(1_060, DEFAULT_TTL_SECS), None);
        assert_eq!(cached.stale(), &"snapshot");
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        assert!(Cached::<Vec<i64>>::read_json(&path).unwrap().is_none());

        Cached::new(vec![790_i64, 998], 5_000).write_json(&path).unwrap();
        let loaded = Cached::<Vec<i64>>::read_json(&path).unwrap().unwrap();
        assert_eq!(loaded.stored_at(), 5_000);
        assert_eq!(loaded.get(5_030, DEFAULT_TTL_SECS), Some(&vec![790, 998]));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Cached::<Vec<i64>>::read_json(&path), Err(CacheError::Json(_))));
    }
}
