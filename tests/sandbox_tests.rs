//! Tests for sandbox candidate sites and the sandbox solver.

use refill_planner::candidates::candidate_sites;
use refill_planner::problem::{GeneralData, LocationType, MapEntity, Mode};
use refill_planner::store::MemoryStore;
use refill_planner::{solver_for, SandboxSolver, SearchConfig, SearchController, Solver};
use serde_json::json;
use std::collections::HashSet;

fn create_test_general() -> GeneralData {
    serde_json::from_value(json!({
        "willingnessToTravelInMeters": 150.0,
        "constantExpDistributionFunction": 1.01,
        "refillSalesFactor": 1.0,
        "refillDistributionRate": 0.9,
        "co2PricePerKiloInSek": 2.0,
        "f3100Data": { "refillCapacityPerWeek": 60.0, "leasingCostPerWeek": 100.0, "staticCo2": 1000.0 },
        "f9100Data": { "refillCapacityPerWeek": 150.0, "leasingCostPerWeek": 250.0, "staticCo2": 2000.0 },
        "refillUnitData": { "profitPerUnit": 5.0, "co2PerUnitInGrams": 50.0 },
        "classicUnitData": { "co2PerUnitInGrams": 200.0 },
        "locationTypes": {
            "groceryStoreLarge": { "type": "Grocery-store-large", "salesVolume": 300.0 },
            "groceryStore": { "type": "Grocery-store", "salesVolume": 150.0 },
            "gasStation": { "type": "Gas-station", "salesVolume": 80.0 },
            "convenience": { "type": "Convenience", "salesVolume": 50.0 },
            "kiosk": { "type": "Kiosk", "salesVolume": 20.0 },
        },
        "sandboxQuotas": {
            "Grocery-store-large": 1,
            "Grocery-store": 1,
            "Gas-station": 0,
            "Convenience": 2,
            "Kiosk": 1,
        },
    }))
    .expect("valid general data")
}

/// Two hotspots about 80 m apart, one isolated hotspot and one south of the border.
fn create_sandbox_map() -> MapEntity {
    serde_json::from_value(json!({
        "mapName": "sSandbox",
        "border": { "latitudeMin": 59.0, "latitudeMax": 60.0, "longitudeMin": 17.5, "longitudeMax": 18.5 },
        "hotspots": [
            { "name": "h0", "latitude": 59.3300, "longitude": 18.060, "spread": 300.0, "footfall": 100.0 },
            { "name": "h1", "latitude": 59.3305, "longitude": 18.061, "spread": 200.0, "footfall": 50.0 },
            { "name": "h2", "latitude": 59.4000, "longitude": 18.200, "spread": 160.0, "footfall": 80.0 },
            { "name": "h3", "latitude": 58.9000, "longitude": 18.000, "spread": 40.0, "footfall": 10.0 },
        ],
    }))
    .expect("valid sandbox map")
}

#[test]
fn test_sandbox_mode_detection() {
    let map = create_sandbox_map();
    assert_eq!(map.mode(), Mode::Sandbox);

    let mut renamed = map.clone();
    renamed.map_name = "elsewhere".to_string();
    assert_eq!(renamed.mode(), Mode::Sandbox);
}

#[test]
fn test_candidate_sites_cover_hotspots() {
    let map = create_sandbox_map();
    let general = create_test_general();
    let config = SearchConfig::new();

    let sites = candidate_sites(&map, &general, &config);

    assert_eq!(sites.len(), 5);
    assert!(sites.keys().any(|k| k.starts_with("c_between_")));
    assert!(sites.keys().any(|k| k.starts_with("c_cluster_")));
    assert!(sites.keys().any(|k| k.starts_with("c_hotspot_")));

    for hotspot in &map.hotspots {
        let target = map.border.clamp(hotspot.position());
        assert!(
            sites.values().any(|p| (p.latitude - target.latitude).abs() < 1e-9
                && (p.longitude - target.longitude).abs() < 1e-9),
            "no site for {}",
            hotspot.name
        );
    }
}

#[test]
fn test_candidate_sites_are_inside_border_and_deduplicated() {
    let map = create_sandbox_map();
    let general = create_test_general();
    let config = SearchConfig::new();

    let sites = candidate_sites(&map, &general, &config);

    let mut cells = HashSet::new();
    for position in sites.values() {
        assert!(map.border.contains_latitude(position.latitude));
        assert!(map.border.contains_longitude(position.longitude));
        let cell = (
            (position.latitude * config.candidate_granularity) as i64,
            (position.longitude * config.candidate_granularity) as i64,
        );
        assert!(cells.insert(cell));
    }
}

#[test]
fn test_coarse_grid_merges_close_sites() {
    let map = create_sandbox_map();
    let general = create_test_general();
    let config = SearchConfig::new().with_candidate_granularity(10.0);

    let sites = candidate_sites(&map, &general, &config);

    assert!(sites.len() < 5);
}

#[test]
fn test_sandbox_search_respects_quotas() {
    let general = create_test_general();
    let config = SearchConfig::new().with_workers(2);
    let solver = SandboxSolver::new(create_sandbox_map(), general.clone(), config.clone());
    assert_eq!(solver.sites().len(), 5);

    let mut controller = SearchController::new(Box::new(solver), config)
        .unwrap()
        .with_store(Box::new(MemoryStore::new()));
    let state = controller.run().unwrap();

    assert!(state.best_total > 0.0);
    assert!(!state.allocation.is_empty());
    for (location_type, count) in state.allocation.type_counts() {
        assert!(count <= general.quota_of(location_type), "{}", location_type);
    }
    assert!(!state
        .allocation
        .type_counts()
        .contains_key(&LocationType::GasStation));
}

#[test]
fn test_sandbox_result_verifies() {
    let config = SearchConfig::new().with_workers(2);
    let solver = solver_for(create_sandbox_map(), create_test_general(), config.clone());
    assert_eq!(solver.mode(), Mode::Sandbox);

    let mut controller = SearchController::new(solver, config).unwrap();
    controller.run().unwrap();

    let state = controller.state();
    let verified = controller.solver().verify(&state.allocation).unwrap();

    assert!((verified.total() - state.best_total).abs() < 1e-6 * state.best_total.abs().max(1.0));
    for name in verified.locations.keys() {
        assert!(name.starts_with("location"));
    }
}

#[test]
fn test_validating_every_candidate_gives_same_result() {
    let fast = SearchConfig::new().with_workers(2);
    let checked = fast.clone().with_validate_candidates(true);

    let mut a = SearchController::new(
        solver_for(create_sandbox_map(), create_test_general(), fast.clone()),
        fast,
    )
    .unwrap();
    let mut b = SearchController::new(
        solver_for(create_sandbox_map(), create_test_general(), checked.clone()),
        checked,
    )
    .unwrap();

    let total_a = a.run().unwrap().best_total;
    let total_b = b.run().unwrap().best_total;

    assert_eq!(total_a, total_b);
}

#[test]
fn test_candidate_sites_with_more_than_ten_thousand_hotspots() {
    // A 100x100 grid about 570 m apart, plus one extra hotspot right next to the first.
    let mut hotspots = Vec::new();
    for i in 0..10_000 {
        hotspots.push(json!({
            "name": format!("g{}", i),
            "latitude": 59.0 + (i / 100) as f64 * 0.01,
            "longitude": 17.0 + (i % 100) as f64 * 0.01,
            "spread": 100.0,
            "footfall": 10.0,
        }));
    }
    hotspots.push(json!({
        "name": "extra",
        "latitude": 59.0005,
        "longitude": 17.0005,
        "spread": 100.0,
        "footfall": 10.0,
    }));
    let map: MapEntity = serde_json::from_value(json!({
        "mapName": "sCrowded",
        "border": { "latitudeMin": 58.5, "latitudeMax": 60.5, "longitudeMin": 16.5, "longitudeMax": 18.5 },
        "hotspots": hotspots,
    }))
    .expect("valid sandbox map");

    let sites = candidate_sites(&map, &create_test_general(), &SearchConfig::new());

    let between: Vec<_> = sites
        .iter()
        .filter(|(key, _)| key.starts_with("c_between_"))
        .map(|(_, position)| *position)
        .collect();
    assert_eq!(between.len(), 1);
    assert!((between[0].latitude - 59.00025).abs() < 1e-9);
    assert!((between[0].longitude - 17.00025).abs() < 1e-9);
}
