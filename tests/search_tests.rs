//! Integration tests for the search controller on a small regular map.

use refill_planner::config::SeedStrategy;
use refill_planner::delta::{Delta, Origin};
use refill_planner::pool::ScoringPool;
use refill_planner::problem::{GeneralData, MapEntity, Mode};
use refill_planner::scoring::ScoredResult;
use refill_planner::solution::Allocation;
use refill_planner::spatial::DistanceCache;
use refill_planner::store::{MemoryStore, PersistenceStore};
use refill_planner::{
    Phase, RegularSolver, Result, SearchConfig, SearchController, Solver, ValidationError,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

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
    }))
    .expect("valid general data")
}

/// A 3x3 grid about 60 m apart plus two isolated locations.
fn create_test_map() -> MapEntity {
    let mut locations = serde_json::Map::new();
    for i in 0..9 {
        let name = format!("grid{}", i);
        locations.insert(
            name.clone(),
            json!({
                "locationName": name,
                "locationType": "Grocery-store",
                "latitude": 59.3300 + (i / 3) as f64 * 0.00055,
                "longitude": 18.0600 + (i % 3) as f64 * 0.0011,
                "footfall": 2.0 + i as f64,
                "salesVolume": 40.0 + (i * 17 % 90) as f64,
            }),
        );
    }
    for (name, latitude, volume) in [("north", 59.40, 250.0), ("south", 59.20, 10.0)] {
        locations.insert(
            name.to_string(),
            json!({
                "locationName": name,
                "locationType": "Kiosk",
                "latitude": latitude,
                "longitude": 18.0,
                "footfall": 1.0,
                "salesVolume": volume,
            }),
        );
    }

    serde_json::from_value(json!({
        "mapName": "gridtown",
        "border": { "latitudeMin": 59.0, "latitudeMax": 60.0, "longitudeMin": 17.5, "longitudeMax": 18.5 },
        "locations": locations,
    }))
    .expect("valid map")
}

fn create_controller(config: SearchConfig) -> SearchController {
    let solver = RegularSolver::new(create_test_map(), create_test_general(), config.clone());
    SearchController::new(Box::new(solver), config)
        .expect("thread pool")
        .with_store(Box::new(MemoryStore::new()))
}

/// Offers no moves at all for the first `empty_generations` generations.
struct StarvedSolver {
    inner: RegularSolver,
    empty_generations: AtomicU32,
}

impl StarvedSolver {
    fn new(config: &SearchConfig, empty_generations: u32) -> Self {
        StarvedSolver {
            inner: RegularSolver::new(create_test_map(), create_test_general(), config.clone()),
            empty_generations: AtomicU32::new(empty_generations),
        }
    }
}

impl Solver for StarvedSolver {
    fn map(&self) -> &MapEntity {
        self.inner.map()
    }

    fn mode(&self) -> Mode {
        self.inner.mode()
    }

    fn distances(&self) -> &DistanceCache {
        self.inner.distances()
    }

    fn initialize(&mut self) -> Allocation {
        self.inner.initialize()
    }

    fn list_actions<'a>(
        &'a self,
        allocation: &'a Allocation,
        ignored: &'a HashSet<String>,
        stale: bool,
    ) -> Box<dyn Iterator<Item = Delta> + 'a> {
        let starving = self
            .empty_generations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if starving {
            Box::new(std::iter::empty())
        } else {
            self.inner.list_actions(allocation, ignored, stale)
        }
    }

    fn calculate(&self, allocation: &Allocation, delta: &Delta) -> Result<ScoredResult> {
        self.inner.calculate(allocation, delta)
    }

    fn post_improvement(&mut self, allocation: &Allocation, committed: &Delta) {
        self.inner.post_improvement(allocation, committed)
    }

    fn validate(&self, allocation: &Allocation) -> std::result::Result<(), ValidationError> {
        self.inner.validate(allocation)
    }
}

#[test]
fn test_search_converges_and_improves() {
    let mut controller = create_controller(SearchConfig::new().with_workers(2));
    controller.initialize().unwrap();
    let start = controller.state().best_total;

    let state = controller.run().unwrap();

    assert!(state.terminal);
    assert_eq!(state.phase(), Phase::Terminal);
    assert!(state.best_total > start);
    assert!(controller.generations() > 0);
}

#[test]
fn test_best_total_is_monotonic() {
    let mut controller = create_controller(SearchConfig::new().with_workers(2));
    controller.run().unwrap();

    let mut previous = f64::NEG_INFINITY;
    for report in controller.history() {
        assert!(report.best_total >= previous);
        previous = report.best_total;
    }
}

#[test]
fn test_every_commit_strictly_improves() {
    let mut controller = create_controller(SearchConfig::new().with_workers(2));
    controller.run().unwrap();

    let store = controller.store().expect("store attached");
    let (best_total, _) = store.best("gridtown").unwrap().expect("results stored");
    let best_id = controller.state().best_id.clone().expect("committed");
    let stored = store.load(&best_id).unwrap();
    assert_eq!(stored.total(), controller.state().best_total);
    assert_eq!(best_total, controller.state().best_total as i64);

    let mut previous = f64::NEG_INFINITY;
    for report in controller.history() {
        if report.committed.is_some() {
            assert!(report.best_total > previous);
        }
        previous = report.best_total;
    }
}

#[test]
fn test_capacity_invariant_after_each_commit() {
    let config = SearchConfig::new().with_workers(2);
    let mut controller = create_controller(config.clone());
    controller.initialize().unwrap();

    while controller.state().phase() != Phase::Terminal {
        controller.step().unwrap();
        for (key, placement) in controller.state().allocation.iter() {
            assert!(placement.f3 <= config.max_stations, "{} f3", key);
            assert!(placement.f9 <= config.max_stations, "{} f9", key);
            assert!(!placement.is_empty(), "{} kept without units", key);
        }
        assert!(controller.generations() < 500);
    }
}

#[test]
fn test_group_members_are_disjoint() {
    let config = SearchConfig::new()
        .with_workers(2)
        .with_group_size(64)
        .with_group_distance_limit(0.0);
    let mut controller = create_controller(config);
    controller.run().unwrap();

    let mut saw_group = false;
    for report in controller.history() {
        let mut seen: HashSet<&String> = HashSet::new();
        for member in &report.group_members {
            saw_group = true;
            for key in member {
                assert!(seen.insert(key), "{} merged twice", key);
            }
        }
    }
    assert!(saw_group);
}

#[test]
fn test_group_members_keep_their_distance() {
    let config = SearchConfig::new().with_workers(2).with_group_size(64);
    let limit = config.group_distance_limit;
    let mut controller = create_controller(config);
    controller.run().unwrap();

    let distances = controller.solver().distances();
    let mut groups = 0;
    for report in controller.history() {
        if report.group_members.is_empty() {
            continue;
        }
        groups += 1;
        for (i, first) in report.group_members.iter().enumerate() {
            for second in &report.group_members[i + 1..] {
                for a in first {
                    for b in second {
                        assert_ne!(a, b);
                        if let Some(distance) = distances.distance(a, b) {
                            assert!(distance >= limit, "{} and {} are {} m apart", a, b, distance);
                        }
                    }
                }
            }
        }
    }
    assert!(groups > 0);
}

#[test]
fn test_empty_candidate_sets_disable_pruning_then_stop() {
    let config = SearchConfig::new().with_workers(2);
    let solver = StarvedSolver::new(&config, 2);
    let mut controller = SearchController::new(Box::new(solver), config).unwrap();

    let state = controller.run().unwrap();

    assert!(state.terminal);
    assert!(!state.pruning);
    assert!(!state.stale);
    let phases: Vec<Phase> = controller.history().iter().map(|r| r.phase).collect();
    assert_eq!(phases, vec![Phase::Exploring, Phase::PrunedRelaxed]);
    assert_eq!(controller.state().phase(), Phase::Terminal);
    assert!(controller.history().iter().all(|r| r.candidates == 0));
}

#[test]
fn test_single_empty_candidate_set_keeps_searching() {
    let config = SearchConfig::new().with_workers(2);
    let solver = StarvedSolver::new(&config, 1);
    let mut controller = SearchController::new(Box::new(solver), config).unwrap();
    controller.initialize().unwrap();
    let start = controller.state().best_total;

    controller.run().unwrap();

    let history = controller.history();
    assert_eq!(history[0].phase, Phase::Exploring);
    assert!(history[1..].iter().all(|r| r.phase != Phase::Exploring));
    assert!(controller.state().best_total > start);
}

#[test]
fn test_commit_lifts_suppression_around_changed_keys() {
    let mut controller = create_controller(SearchConfig::new().with_workers(2));
    controller.initialize().unwrap();
    controller.step().unwrap();

    let report = controller.history()[0].clone();
    assert!(report.committed.is_some());
    assert!(!report.changed.is_empty());

    let distances = controller.solver().distances();
    let mut released: HashSet<String> = report.changed.iter().cloned().collect();
    for key in &report.changed {
        released.extend(distances.neighbors(key).map(|(neighbor, _)| neighbor.clone()));
    }
    for key in &released {
        assert!(!controller.state().bad.contains(key), "{} still suppressed", key);
    }

    controller.step().unwrap();
    assert_eq!(controller.history()[1].phase, Phase::Exploring);
    for key in &released {
        assert!(!controller.state().ignored.contains(key), "{} ignored", key);
    }
}

#[test]
fn test_scoring_pool_keeps_input_order() {
    let pool = ScoringPool::new(0).unwrap();
    assert_eq!(pool.workers(), 1);

    let pool = ScoringPool::new(3).unwrap();
    assert_eq!(pool.workers(), 3);
    let squares = pool.map(&[1, 2, 3, 4, 5], |x| x * x);
    assert_eq!(squares, vec![1, 4, 9, 16, 25]);
}

#[test]
fn test_final_allocation_verifies_to_best_total() {
    let mut controller = create_controller(SearchConfig::new().with_workers(2));
    controller.run().unwrap();

    let state = controller.state();
    let result = controller.solver().verify(&state.allocation).unwrap();

    assert!((result.total() - state.best_total).abs() < 1e-9);
}

#[test]
fn test_empty_seed_builds_up_from_nothing() {
    let config = SearchConfig::new()
        .with_workers(2)
        .with_seed(SeedStrategy::Empty);
    let mut controller = create_controller(config);
    controller.initialize().unwrap();
    assert!(controller.state().allocation.is_empty());
    assert_eq!(controller.state().best_total, 0.0);

    controller.step().unwrap();

    let first = &controller.history()[0];
    assert!(matches!(first.committed, Some((Origin::Add, _)) | Some((Origin::Group, _))));
    assert!(!controller.state().allocation.is_empty());
}

#[test]
fn test_max_generations_stops_early() {
    let config = SearchConfig::new()
        .with_workers(1)
        .with_max_generations(2);
    let mut controller = create_controller(config);

    let state = controller.run().unwrap();

    assert!(!state.terminal);
    assert_eq!(controller.generations(), 2);
    assert_eq!(controller.history().len(), 2);
}

#[test]
fn test_relaxation_ladder() {
    let mut controller = create_controller(SearchConfig::new().with_workers(2));
    controller.run().unwrap();

    let phases: Vec<Phase> = controller.history().iter().map(|r| r.phase).collect();
    assert_eq!(phases[0], Phase::Exploring);
    assert!(phases.contains(&Phase::PrunedRelaxed));
    assert_eq!(phases.last(), Some(&Phase::Stale));

    let state = controller.state();
    assert!(!state.pruning);
    assert!(state.stale);
}

#[test]
fn test_without_set_pruning_nothing_is_ignored() {
    let config = SearchConfig::new()
        .with_workers(2)
        .with_set_pruning(false)
        .with_groups(false)
        .with_mega_rounds(0);
    let mut controller = create_controller(config);
    controller.run().unwrap();

    assert_eq!(controller.history()[0].phase, Phase::PrunedRelaxed);
    assert!(controller.history().iter().all(|r| r.ignored == 0));
    assert!(controller
        .history()
        .iter()
        .all(|r| r.group_members.is_empty()));
}

#[test]
fn test_statistics_reflect_run() {
    let mut controller = create_controller(SearchConfig::new().with_workers(2));
    controller.run().unwrap();

    let statistics = controller.statistics();

    assert_eq!(statistics.map_name, "gridtown");
    assert_eq!(statistics.generations, controller.generations());
    assert!(statistics.converged);
    assert_eq!(statistics.best_total, controller.state().best_total);
    assert!(statistics.format().contains("gridtown"));
}
