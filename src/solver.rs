//! Mode-specific solvers sharing one search loop.
//!
//! A solver owns the map data, the distance cache and the list of
//! neighborhoods for its mode. The search controller only talks to it through
//! the [`Solver`] trait.

use crate::candidates::candidate_sites;
use crate::config::{SearchConfig, SeedStrategy};
use crate::delta::Delta;
use crate::error::{Result, ValidationError};
use crate::local_search::{
    Consolidate, MissingAddition, Neighborhood, Relocate, Retype, SandboxAddition,
    SandboxRelocate, SandboxSwap, SearchContext, UnitAdjust,
};
use crate::problem::{Coordinates, GeneralData, LocationType, MapEntity, Mode};
use crate::scoring::{
    hotspot_footfall_cache, sandbox_placements, validate_regular, validate_sandbox, ScoredResult,
    ScoringEngine,
};
use crate::solution::{Allocation, Placement};
use crate::spatial::DistanceCache;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap, HashSet};

/// The capabilities the search controller needs from a mode.
pub trait Solver: Sync {
    fn map(&self) -> &MapEntity;

    fn mode(&self) -> Mode;

    fn distances(&self) -> &DistanceCache;

    /// Build the starting allocation.
    fn initialize(&mut self) -> Allocation;

    /// Candidate deltas for one generation, wide neighborhoods only when `stale`.
    fn list_actions<'a>(
        &'a self,
        allocation: &'a Allocation,
        ignored: &'a HashSet<String>,
        stale: bool,
    ) -> Box<dyn Iterator<Item = Delta> + 'a>;

    /// Score `allocation` with `delta` applied.
    fn calculate(&self, allocation: &Allocation, delta: &Delta) -> Result<ScoredResult>;

    /// Bookkeeping after `committed` has been applied to `allocation`.
    fn post_improvement(&mut self, allocation: &Allocation, committed: &Delta);

    /// Structural checks, only used on the verification path.
    fn validate(&self, allocation: &Allocation) -> std::result::Result<(), ValidationError>;

    /// Validate and score an allocation as it would be submitted.
    fn verify(&self, allocation: &Allocation) -> Result<ScoredResult> {
        self.validate(allocation)?;
        self.calculate(allocation, &Delta::start())
    }
}

fn neighborhood_names(neighborhoods: &[Box<dyn Neighborhood>]) -> String {
    neighborhoods
        .iter()
        .map(|n| n.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Adjusts unit counts at the fixed locations of a regular map.
pub struct RegularSolver {
    map: MapEntity,
    general: GeneralData,
    config: SearchConfig,
    sites: BTreeMap<String, Coordinates>,
    distances: DistanceCache,
    neighborhoods: Vec<Box<dyn Neighborhood>>,
    remaining: BTreeMap<LocationType, u32>,
}

impl RegularSolver {
    pub fn new(map: MapEntity, general: GeneralData, config: SearchConfig) -> Self {
        let sites = map.positions();
        let distances = DistanceCache::build(
            &sites,
            general.willingness_to_travel_in_meters,
            &config.spatial,
        );
        debug!(
            "distance cache for {}: {} locations, {} pairs",
            map.map_name,
            distances.len(),
            distances.pair_count() / 2
        );

        RegularSolver {
            map,
            general,
            config,
            sites,
            distances,
            neighborhoods: vec![
                Box::new(UnitAdjust),
                Box::new(MissingAddition),
                Box::new(Relocate),
                Box::new(Consolidate),
            ],
            remaining: BTreeMap::new(),
        }
    }

    pub fn general(&self) -> &GeneralData {
        &self.general
    }

    fn engine(&self) -> ScoringEngine<'_> {
        ScoringEngine::new(
            &self.map,
            &self.general,
            &self.distances,
            self.config.max_stations,
        )
    }
}

impl Solver for RegularSolver {
    fn map(&self) -> &MapEntity {
        &self.map
    }

    fn mode(&self) -> Mode {
        Mode::Regular
    }

    fn distances(&self) -> &DistanceCache {
        &self.distances
    }

    fn initialize(&mut self) -> Allocation {
        info!(
            "regular solver for {} with neighborhoods: {}",
            self.map.map_name,
            neighborhood_names(&self.neighborhoods)
        );
        let mut allocation = Allocation::new();
        if self.config.seed == SeedStrategy::Greedy {
            for key in self.map.locations.keys() {
                allocation.insert(key.clone(), Placement::new(1, 0));
            }
        }
        allocation
    }

    fn list_actions<'a>(
        &'a self,
        allocation: &'a Allocation,
        ignored: &'a HashSet<String>,
        stale: bool,
    ) -> Box<dyn Iterator<Item = Delta> + 'a> {
        let ctx = SearchContext {
            allocation,
            sites: &self.sites,
            distances: &self.distances,
            ignored,
            max_stations: self.config.max_stations,
            remaining: &self.remaining,
        };
        Box::new(
            self.neighborhoods
                .iter()
                .filter(move |n| stale || !n.is_wide())
                .flat_map(move |n| n.suggestions(ctx)),
        )
    }

    fn calculate(&self, allocation: &Allocation, delta: &Delta) -> Result<ScoredResult> {
        Ok(self.engine().score(allocation, delta)?)
    }

    fn post_improvement(&mut self, _allocation: &Allocation, _committed: &Delta) {}

    fn validate(&self, allocation: &Allocation) -> std::result::Result<(), ValidationError> {
        validate_regular(&self.map, allocation, self.config.max_stations)
    }
}

/// Places new locations around the hotspots of a sandbox map.
pub struct SandboxSolver {
    map: MapEntity,
    general: GeneralData,
    config: SearchConfig,
    sites: BTreeMap<String, Coordinates>,
    distances: DistanceCache,
    footfall: HashMap<String, f64>,
    neighborhoods: Vec<Box<dyn Neighborhood>>,
    remaining: BTreeMap<LocationType, u32>,
}

impl SandboxSolver {
    pub fn new(map: MapEntity, general: GeneralData, config: SearchConfig) -> Self {
        let sites = candidate_sites(&map, &general, &config);
        let distances = DistanceCache::build(
            &sites,
            general.willingness_to_travel_in_meters,
            &config.spatial,
        );
        let footfall = hotspot_footfall_cache(&sites, &map.hotspots);
        let remaining = LocationType::ALL
            .iter()
            .map(|t| (*t, general.quota_of(*t)))
            .collect();
        let swap = SandboxSwap::new(&general);

        SandboxSolver {
            map,
            general,
            config,
            sites,
            distances,
            footfall,
            neighborhoods: vec![
                Box::new(UnitAdjust),
                Box::new(SandboxAddition),
                Box::new(Retype),
                Box::new(swap),
                Box::new(SandboxRelocate),
            ],
            remaining,
        }
    }

    pub fn sites(&self) -> &BTreeMap<String, Coordinates> {
        &self.sites
    }

    /// Placements still allowed per type.
    pub fn remaining(&self) -> &BTreeMap<LocationType, u32> {
        &self.remaining
    }

    /// Group and mega candidates can combine additions beyond a type's quota.
    fn check_quotas(
        &self,
        allocation: &Allocation,
        delta: &Delta,
    ) -> std::result::Result<(), ValidationError> {
        if !delta.changes.values().any(|change| change.location_type.is_some()) {
            return Ok(());
        }
        let mut used: BTreeMap<LocationType, u32> = BTreeMap::new();
        for (_, _, placement) in sandbox_placements(allocation, delta, self.config.max_stations) {
            if let Some(location_type) = placement.location_type {
                *used.entry(location_type).or_insert(0) += 1;
            }
        }
        for (location_type, count) in used {
            let quota = self.general.quota_of(location_type);
            if count > quota {
                return Err(ValidationError::QuotaExceeded {
                    location_type: location_type.to_string(),
                    quota,
                });
            }
        }
        Ok(())
    }

    fn update_remaining(&mut self, allocation: &Allocation) {
        let used = allocation.type_counts();
        self.remaining = LocationType::ALL
            .iter()
            .map(|t| {
                let quota = self.general.quota_of(*t);
                (*t, quota.saturating_sub(used.get(t).copied().unwrap_or(0)))
            })
            .collect();
    }
}

impl Solver for SandboxSolver {
    fn map(&self) -> &MapEntity {
        &self.map
    }

    fn mode(&self) -> Mode {
        Mode::Sandbox
    }

    fn distances(&self) -> &DistanceCache {
        &self.distances
    }

    fn initialize(&mut self) -> Allocation {
        info!(
            "sandbox solver for {} with {} candidate sites and neighborhoods: {}",
            self.map.map_name,
            self.sites.len(),
            neighborhood_names(&self.neighborhoods)
        );
        let allocation = Allocation::new();
        self.update_remaining(&allocation);
        allocation
    }

    fn list_actions<'a>(
        &'a self,
        allocation: &'a Allocation,
        ignored: &'a HashSet<String>,
        stale: bool,
    ) -> Box<dyn Iterator<Item = Delta> + 'a> {
        let ctx = SearchContext {
            allocation,
            sites: &self.sites,
            distances: &self.distances,
            ignored,
            max_stations: self.config.max_stations,
            remaining: &self.remaining,
        };
        Box::new(
            self.neighborhoods
                .iter()
                .filter(move |n| stale || !n.is_wide())
                .flat_map(move |n| n.suggestions(ctx)),
        )
    }

    fn calculate(&self, allocation: &Allocation, delta: &Delta) -> Result<ScoredResult> {
        if self.config.validate_candidates {
            validate_sandbox(
                &self.map,
                &self.general,
                allocation,
                delta,
                self.config.max_stations,
            )?;
        } else {
            self.check_quotas(allocation, delta)?;
        }
        let engine = ScoringEngine::new(
            &self.map,
            &self.general,
            &self.distances,
            self.config.max_stations,
        )
        .with_hotspot_footfall(&self.footfall);
        Ok(engine.score(allocation, delta)?)
    }

    fn post_improvement(&mut self, allocation: &Allocation, _committed: &Delta) {
        self.update_remaining(allocation);
        debug!("remaining sandbox quotas: {:?}", self.remaining);
    }

    fn validate(&self, allocation: &Allocation) -> std::result::Result<(), ValidationError> {
        validate_sandbox(
            &self.map,
            &self.general,
            allocation,
            &Delta::start(),
            self.config.max_stations,
        )
    }

    /// Scores against distances between the placed positions themselves, so
    /// allocations reloaded from snapshots (keyed by `location<n>`) work too.
    fn verify(&self, allocation: &Allocation) -> Result<ScoredResult> {
        self.validate(allocation)?;
        let positions: BTreeMap<String, Coordinates> = allocation
            .iter()
            .filter_map(|(key, placement)| placement.position.map(|p| (key.clone(), p)))
            .collect();
        let distances = DistanceCache::build(
            &positions,
            self.general.willingness_to_travel_in_meters,
            &self.config.spatial,
        );
        let engine = ScoringEngine::new(
            &self.map,
            &self.general,
            &distances,
            self.config.max_stations,
        );
        Ok(engine.score(allocation, &Delta::start())?)
    }
}

/// Build the solver matching the map's mode.
pub fn solver_for(map: MapEntity, general: GeneralData, config: SearchConfig) -> Box<dyn Solver> {
    match map.mode() {
        Mode::Regular => Box::new(RegularSolver::new(map, general, config)),
        Mode::Sandbox => Box::new(SandboxSolver::new(map, general, config)),
    }
}
