//! Tests for file and memory persistence.

use refill_planner::problem::LocationType;
use refill_planner::scoring::{GameScore, LocationScore, ScoredResult};
use refill_planner::store::{FileStore, MemoryStore, PersistenceStore};
use std::collections::BTreeMap;
use std::fs;
use tempfile::tempdir;

fn create_result(map_name: &str, game_id: &str, total: f64) -> ScoredResult {
    let mut locations = BTreeMap::new();
    locations.insert(
        "location1".to_string(),
        LocationScore {
            location_name: "location1".to_string(),
            location_type: LocationType::Kiosk,
            latitude: 59.33,
            longitude: 18.06,
            footfall: 1.5,
            footfall_scale: 10,
            f3100_count: 1,
            f9100_count: 0,
            sales_volume: 40.0,
            sales_capacity: 60.0,
            leasing_cost: 100.0,
            revenue: 200.0,
            earnings: 100.0,
            co2_savings: 5000.0,
        },
    );

    ScoredResult {
        game_id: game_id.to_string(),
        map_name: map_name.to_string(),
        locations,
        game_score: GameScore {
            co2_savings: 5.0,
            total_footfall: 0.0015,
            earnings: 0.1,
            total,
        },
        total_revenue: 200.0,
        total_leasing_cost: 100.0,
        total_f3100_count: 1,
        total_f9100_count: 0,
    }
}

#[test]
fn test_file_store_writes_snapshot_and_log() {
    let dir = tempdir().unwrap();
    let mut store = FileStore::new(dir.path().join("games"), dir.path().join("log")).unwrap();

    store.store(&create_result("town", "id-1", 1234.9)).unwrap();

    let log = fs::read_to_string(store.log_path("town")).unwrap();
    assert_eq!(log, "1234 id-1\n");
    assert!(store.snapshot_path("id-1").exists());
}

#[test]
fn test_file_store_best_picks_highest_total() {
    let dir = tempdir().unwrap();
    let mut store = FileStore::new(dir.path().join("games"), dir.path().join("log")).unwrap();

    store.store(&create_result("town", "id-1", 100.0)).unwrap();
    store.store(&create_result("town", "id-2", 300.5)).unwrap();
    store.store(&create_result("town", "id-3", 200.0)).unwrap();
    store.store(&create_result("village", "id-4", 900.0)).unwrap();

    assert_eq!(store.best("town").unwrap(), Some((300, "id-2".to_string())));
    assert_eq!(store.best("village").unwrap(), Some((900, "id-4".to_string())));
    assert_eq!(store.best("nowhere").unwrap(), None);
}

#[test]
fn test_file_store_load_round_trip() {
    let dir = tempdir().unwrap();
    let mut store = FileStore::new(dir.path().join("games"), dir.path().join("log")).unwrap();
    let result = create_result("town", "id-1", 42.0);

    store.store(&result).unwrap();
    let loaded = store.load("id-1").unwrap();

    assert_eq!(loaded.game_id, result.game_id);
    assert_eq!(loaded.map_name, "town");
    assert_eq!(loaded.total(), 42.0);
    assert_eq!(loaded.locations["location1"].f3100_count, 1);
    assert_eq!(
        loaded.locations["location1"].location_type,
        LocationType::Kiosk
    );
    assert!(store.load("missing").is_err());
}

#[test]
fn test_snapshot_uses_api_field_names() {
    let dir = tempdir().unwrap();
    let mut store = FileStore::new(dir.path().join("games"), dir.path().join("log")).unwrap();

    store.store(&create_result("town", "id-1", 42.0)).unwrap();
    let text = fs::read_to_string(store.snapshot_path("id-1")).unwrap();

    assert!(text.contains("\"gameId\""));
    assert!(text.contains("\"gameScore\""));
    assert!(text.contains("\"f3100Count\""));
    assert!(text.contains("\"Kiosk\""));
}

#[test]
fn test_file_store_skips_malformed_log_lines() {
    let dir = tempdir().unwrap();
    let store = FileStore::new(dir.path().join("games"), dir.path().join("log")).unwrap();
    fs::write(store.log_path("town"), "12 a\ngarbage\n\n-5 b\n40 c\n").unwrap();

    assert_eq!(store.best("town").unwrap(), Some((40, "c".to_string())));
}

#[test]
fn test_memory_store() {
    let mut store = MemoryStore::new();
    store.store(&create_result("town", "id-1", 10.0)).unwrap();
    store.store(&create_result("town", "id-2", 20.0)).unwrap();

    assert_eq!(store.results().len(), 2);
    assert_eq!(store.best("town").unwrap(), Some((20, "id-2".to_string())));
    assert_eq!(store.load("id-1").unwrap().total(), 10.0);
    assert!(store.load("id-3").is_err());
}
