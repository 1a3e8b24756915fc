//! History store round trips and batch evaluation over stored items.

use chrono::{TimeZone, Utc};
use fut_analyzer::batch::{build_snapshot, evaluate_items, BatchOptions, ItemInput, Snapshot};
use fut_analyzer::cache::{Cached, DEFAULT_TTL_SECS};
use fut_analyzer::history::RetentionPolicy;
use fut_analyzer::loader::{HistoryError, HistoryStore};
use fut_analyzer::model::{Classification, ItemHistory, PriceSample, Window};
use fut_analyzer::modes::TradingMode;
use fut_analyzer::stats::group_histories;
use fut_analyzer::EngineConfig;

const NOW: i64 = 1_730_000_000;
const HOUR: i64 = 3600;
const DAY: i64 = 24 * HOUR;

fn seeded_store(path: &str) -> HistoryStore {
    let mut store = HistoryStore::open(path).unwrap();
    let policy = RetentionPolicy::default();
    for (offset, price) in [(5 * HOUR, 900), (3 * HOUR, 850), (HOUR, 950)] {
        store.record("101", "Striker", PriceSample::new(NOW - offset, price), &policy).unwrap();
    }
    for (offset, price) in [(2 * DAY, 20_000), (HOUR, 18_000)] {
        store.record("202", "Keeper", PriceSample::new(NOW - offset, price), &policy).unwrap();
    }
    store
}

#[test]
fn store_round_trip_groups_by_item() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.db");
    let store = seeded_store(path.to_str().unwrap());

    let rows = store.load_snapshots(NOW - 8 * DAY).unwrap();
    assert_eq!(rows.len(), 5);

    let items = group_histories(&rows);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].name, "Striker");
    assert_eq!(items[0].latest(), Some(PriceSample::new(NOW - HOUR, 950)));

    let keeper = store.load_item_history("202").unwrap();
    assert_eq!(keeper, vec![PriceSample::new(NOW - 2 * DAY, 20_000), PriceSample::new(NOW - HOUR, 18_000)]);
}

#[test]
fn store_applies_retention() {
    let mut store = HistoryStore::open_in_memory().unwrap();
    let policy = RetentionPolicy { max_age_secs: DAY, max_points: 3 };

    store.record("1", "A", PriceSample::new(NOW - 2 * DAY, 100), &policy).unwrap();
    for i in 0..4 {
        store.record("1", "A", PriceSample::new(NOW + i, 200 + i), &policy).unwrap();
    }

    let history = store.load_item_history("1").unwrap();
    let prices: Vec<i64> = history.iter().map(|s| s.price).collect();
    assert_eq!(prices, vec![201, 202, 203]);
}

#[test]
fn store_rejects_negative_price() {
    let mut store = HistoryStore::open_in_memory().unwrap();
    let err = store
        .record("1", "A", PriceSample::new(NOW, -1), &RetentionPolicy::default())
        .unwrap_err();
    assert!(matches!(err, HistoryError::NegativePrice { .. }));
}

#[test]
fn batch_reports_each_item_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.db");
    let store = seeded_store(path.to_str().unwrap());

    let items: Vec<ItemInput> = group_histories(&store.load_snapshots(0).unwrap())
        .into_iter()
        .filter_map(ItemInput::from_latest)
        .collect();
    let options = BatchOptions { windows: Window::dashboard(), now: NOW, include_modes: true };
    let generated_at = Utc.timestamp_opt(NOW, 0).unwrap();
    let snapshot = build_snapshot(&items, &options, &EngineConfig::default(), generated_at);

    assert_eq!(snapshot.players.len(), 2);
    assert_eq!(snapshot.players[0].id, "101");
    assert_eq!(snapshot.players[1].id, "202");

    let striker = snapshot.players[0].trading.as_ref().unwrap();
    assert_eq!(striker.target_buy, 790);
    assert_eq!(striker.classification, Classification::Monitor);
    assert_eq!(snapshot.players[0].modes.len(), TradingMode::ALL.len());

    assert_eq!(snapshot.summary.items, 2);
    assert_eq!(snapshot.summary.failed, 0);
    assert_eq!(snapshot.last_updated.timestamp(), NOW);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["players"][0]["currentBIN"], 950);
    assert_eq!(json["players"][0]["historical"]["24h"]["avg"], 900);
    assert_eq!(json["players"][0]["modes"][0]["mode"], "normal");
    assert!(json["players"][0]["modes"][0].get("profitMarginPercent").is_some());
}

#[test]
fn failing_item_does_not_abort_batch() {
    let good = ItemInput {
        history: ItemHistory { item_id: "1".into(), name: "A".into(), samples: vec![PriceSample::new(NOW, 1000)] },
        current_bin: 1000,
    };
    let bad = ItemInput {
        history: ItemHistory { item_id: "2".into(), name: "B".into(), samples: vec![] },
        current_bin: -10,
    };
    let options = BatchOptions { windows: Window::standard(), now: NOW, include_modes: false };

    let reports = evaluate_items(&[good, bad], &options, &EngineConfig::default());
    assert!(reports[0].trading.is_some());
    assert!(reports[1].trading.is_none());
    assert!(reports[1].error.as_deref().unwrap_or_default().contains("negative"));
}

#[test]
fn snapshot_cache_serves_until_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path().join("history.db").to_str().unwrap());
    let items: Vec<ItemInput> = group_histories(&store.load_snapshots(0).unwrap())
        .into_iter()
        .filter_map(ItemInput::from_latest)
        .collect();
    let options = BatchOptions { windows: Window::standard(), now: NOW, include_modes: false };
    let generated_at = Utc.timestamp_opt(NOW, 0).unwrap();
    let snapshot = build_snapshot(&items, &options, &EngineConfig::default(), generated_at);

    let path = dir.path().join("snapshot.json");
    Cached::new(snapshot, NOW).write_json(&path).unwrap();

    let cached = Cached::<Snapshot>::read_json(&path).unwrap().unwrap();
    let fresh = cached.get(NOW + DEFAULT_TTL_SECS - 1, DEFAULT_TTL_SECS).unwrap();
    assert_eq!(fresh.players.len(), 2);
    assert_eq!(fresh.players[0].trading.as_ref().unwrap().target_sell, 998);
    assert!(cached.get(NOW + DEFAULT_TTL_SECS, DEFAULT_TTL_SECS).is_none());
    assert_eq!(cached.stale().summary.items, 2);
}
