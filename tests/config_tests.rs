//! Tests for loading and building search configurations.

use refill_planner::config::{ProxyPruning, SeedStrategy, SpatialConfig};
use refill_planner::SearchConfig;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_defaults() {
    let config = SearchConfig::new();

    assert_eq!(config.max_stations, 2);
    assert_eq!(config.seed, SeedStrategy::Greedy);
    assert!(config.set_pruning);
    assert!(config.groups);
    assert!(config.auto_remove);
    assert!(!config.validate_candidates);
    assert_eq!(config.max_generations, None);
    assert_eq!(config.spatial.proxy_pruning, Some(ProxyPruning::default()));
}

#[test]
fn test_builders() {
    let config = SearchConfig::new()
        .with_workers(0)
        .with_max_stations(3)
        .with_seed(SeedStrategy::Empty)
        .with_time_limit(Duration::from_secs(5))
        .with_spatial(SpatialConfig::exact())
        .with_jiggle_tolerance(4.0)
        .with_jiggle_step_factor(0.01);

    assert_eq!(config.workers, 1);
    assert_eq!(config.max_stations, 3);
    assert_eq!(config.seed, SeedStrategy::Empty);
    assert_eq!(config.time_limit, Some(Duration::from_secs(5)));
    assert_eq!(config.spatial.proxy_pruning, None);
    assert_eq!(config.jiggle_tolerance, 4.0);
    assert_eq!(config.jiggle_step_factor, 0.01);
}

#[test]
fn test_from_file_fills_missing_fields() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{ "workers": 8, "groups": false, "spatial": { "proxy_pruning": null } }"#,
    )
    .unwrap();

    let config = SearchConfig::from_file(&path).unwrap();

    assert_eq!(config.workers, 8);
    assert!(!config.groups);
    assert_eq!(config.spatial.proxy_pruning, None);
    assert_eq!(config.max_stations, 2);
    assert_eq!(config.group_size, SearchConfig::default().group_size);
}

#[test]
fn test_from_file_rejects_bad_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(SearchConfig::from_file(&path).is_err());
    assert!(SearchConfig::from_file(dir.path().join("missing.json")).is_err());
}
