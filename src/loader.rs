use rusqlite::{params, Connection};
use thiserror::Error;
use tracing::debug;

use crate::history::RetentionPolicy;
use crate::model::{ItemSnapshot, PriceSample};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("negative price {price} for item {item_id}")]
    NegativePrice { item_id: String, price: i64 },
}

pub type Result<T> = std::result::Result<T, HistoryError>;

/// SQLite-backed append-only store of price samples.
pub struct HistoryStore {
    conn: Connection,
}

impl HistoryStore {
    pub fn open(db_path: &str) -> Result<Self> {
        Self::with_connection(Connection::open(db_path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS items (
                 id   TEXT PRIMARY KEY,
                 name TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS history (
                 item_id TEXT NOT NULL REFERENCES items(id),
                 ts      INTEGER NOT NULL,
                 price   INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_history_item_ts ON history(item_id, ts);",
        )?;
        Ok(HistoryStore { conn })
    }

    /// Every sample at or after `since`, ordered by item then time.
    pub fn load_snapshots(&self, since: i64) -> Result<Vec<ItemSnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.id, i.name, h.ts, h.price
             FROM history h
             JOIN items i ON h.item_id = i.id
             WHERE h.ts >= ?1
             ORDER BY i.id, h.ts",
        )?;

        let rows = stmt.query_map([since], |row| {
            Ok(ItemSnapshot {
                item_id: row.get(0)?,
                name: row.get(1)?,
                timestamp: row.get(2)?,
                price: row.get(3)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn load_item_history(&self, item_id: &str) -> Result<Vec<PriceSample>> {
        let mut stmt = self.conn.prepare(
            "SELECT ts, price
             FROM history
             WHERE item_id = ?1
             ORDER BY ts",
        )?;

        let rows = stmt.query_map([item_id], |row| Ok(PriceSample::new(row.get(0)?, row.get(1)?)))?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Appends one observation and prunes the item's history per `policy`.
    /// Returns how many old samples were removed.
    pub fn record(
        &mut self,
        item_id: &str,
        name: &str,
        sample: PriceSample,
        policy: &RetentionPolicy,
    ) -> Result<usize> {
        if sample.price < 0 {
            return Err(HistoryError::NegativePrice { item_id: item_id.to_string(), price: sample.price });
        }

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO items (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            params![item_id, name],
        )?;
        tx.execute(
            "INSERT INTO history (item_id, ts, price) VALUES (?1, ?2, ?3)",
            params![item_id, sample.timestamp, sample.price],
        )?;

        let cutoff = sample.timestamp - policy.max_age_secs;
        let mut removed = tx.execute(
            "DELETE FROM history WHERE item_id = ?1 AND ts < ?2",
            params![item_id, cutoff],
        )?;
        removed += tx.execute(
            "DELETE FROM history
             WHERE item_id = ?1
               AND rowid NOT IN (
                   SELECT rowid FROM history
                   WHERE item_id = ?1
                   ORDER BY ts DESC, rowid DESC
                   LIMIT ?2
               )",
            params![item_id, policy.max_points as i64],
        )?;
        tx.commit()?;

        debug!(item_id, price = sample.price, removed, "recorded sample");
        Ok(removed)
    }
}
