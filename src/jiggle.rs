//! Random-walk refinement around the best stored allocation.
//!
//! After the hill-climber has converged, single random perturbations are scored
//! one at a time. Improvements are stored, near-equal results are walked on and
//! anything clearly worse resets the walk to the best allocation.

use crate::config::SearchConfig;
use crate::delta::Delta;
use crate::error::{Error, Result, ScoreError};
use crate::problem::{Coordinates, GeneralData, MapEntity, Mode};
use crate::scoring::{ScoredResult, ScoringEngine};
use crate::solution::{Allocation, Placement};
use crate::spatial::DistanceCache;
use crate::store::PersistenceStore;
use crate::utils::format_total;
use log::{debug, info};
use rand::seq::IteratorRandom;
use rand::Rng;
use std::collections::BTreeMap;

/// Chance that a regular perturbation removes a unit instead of adding one.
const DECREASE_PROBABILITY: f64 = 0.4;

/// Outcome of a jiggle run.
#[derive(Debug, Clone)]
pub struct JiggleReport {
    pub iterations: u32,
    pub improvements: u32,
    pub resets: u32,
    pub start_total: f64,
    pub best_total: f64,
    pub best_id: String,
}

/// Add one unit, carrying a full f3100 slot over into an f9100.
fn increase(placement: &mut Placement, max_stations: u32) {
    if placement.f3 < max_stations {
        placement.f3 += 1;
    } else if placement.f9 < max_stations {
        placement.f3 = 0;
        placement.f9 += 1;
    }
}

/// Remove one unit, trading an f9100 for a full set of f3100 when needed.
fn decrease(placement: &mut Placement, max_stations: u32) {
    if placement.f3 > 0 {
        placement.f3 -= 1;
    } else if placement.f9 > 0 {
        placement.f9 -= 1;
        placement.f3 = max_stations;
    }
}

pub struct Jiggler<'a, R: Rng> {
    map: &'a MapEntity,
    general: &'a GeneralData,
    config: &'a SearchConfig,
    distances: DistanceCache,
    rng: R,
}

impl<'a, R: Rng> Jiggler<'a, R> {
    pub fn new(
        map: &'a MapEntity,
        general: &'a GeneralData,
        config: &'a SearchConfig,
        rng: R,
    ) -> Self {
        // Sandbox distances depend on the moving placements and are rebuilt per score.
        let distances = match map.mode() {
            Mode::Regular => DistanceCache::build(
                &map.positions(),
                general.willingness_to_travel_in_meters,
                &config.spatial,
            ),
            Mode::Sandbox => DistanceCache::default(),
        };
        Jiggler {
            map,
            general,
            config,
            distances,
            rng,
        }
    }

    /// Apply one random perturbation in place.
    pub fn perturb(&mut self, allocation: &mut Allocation) {
        match self.map.mode() {
            Mode::Regular => self.perturb_regular(allocation),
            Mode::Sandbox => self.perturb_sandbox(allocation),
        }
    }

    fn perturb_regular(&mut self, allocation: &mut Allocation) {
        let max_stations = self.config.max_stations;
        let remove = self.rng.gen::<f64>() <= DECREASE_PROBABILITY && !allocation.is_empty();

        let key = if remove {
            allocation.locations.keys().choose(&mut self.rng).cloned()
        } else {
            self.map.locations.keys().choose(&mut self.rng).cloned()
        };
        let Some(key) = key else {
            return;
        };

        let placement = allocation.locations.entry(key.clone()).or_default();
        if remove {
            decrease(placement, max_stations);
            if placement.is_empty() {
                allocation.locations.remove(&key);
            }
        } else {
            increase(placement, max_stations);
        }
    }

    fn perturb_sandbox(&mut self, allocation: &mut Allocation) {
        let border = self.map.border;
        let factor = self.config.jiggle_step_factor;
        let step_latitude = border.latitude_span() * factor * 2.0 * (self.rng.gen::<f64>() - 0.5);
        let step_longitude =
            border.longitude_span() * factor * 2.0 * (self.rng.gen::<f64>() - 0.5);

        let Some(placement) = allocation.locations.values_mut().choose(&mut self.rng) else {
            return;
        };
        if let Some(position) = placement.position {
            placement.position = Some(border.clamp(Coordinates::new(
                position.latitude + step_latitude,
                position.longitude + step_longitude,
            )));
        }
    }

    /// Score an allocation as it stands.
    pub fn score(&self, allocation: &Allocation) -> Result<ScoredResult> {
        let max_stations = self.config.max_stations;
        match self.map.mode() {
            Mode::Regular => {
                let engine =
                    ScoringEngine::new(self.map, self.general, &self.distances, max_stations);
                Ok(engine.score(allocation, &Delta::start())?)
            }
            Mode::Sandbox => {
                let positions: BTreeMap<String, Coordinates> = allocation
                    .iter()
                    .filter_map(|(key, placement)| placement.position.map(|p| (key.clone(), p)))
                    .collect();
                let distances = DistanceCache::build(
                    &positions,
                    self.general.willingness_to_travel_in_meters,
                    &self.config.spatial,
                );
                let engine = ScoringEngine::new(self.map, self.general, &distances, max_stations);
                Ok(engine.score(allocation, &Delta::start())?)
            }
        }
    }

    /// Walk from the best stored result for `iterations` perturbations.
    pub fn run(
        &mut self,
        store: &mut dyn PersistenceStore,
        iterations: u32,
    ) -> Result<JiggleReport> {
        let map_name = self.map.map_name.clone();
        let (_, best_id) = store.best(&map_name)?.ok_or_else(|| Error::DataUnavailable {
            what: format!("best result for {}", map_name),
            reason: "nothing stored yet".to_string(),
        })?;
        let snapshot = store.load(&best_id)?;
        let mut best = Allocation::from_scored(&snapshot, self.map.mode());
        let start_total = self.score(&best)?.total();
        info!("jiggling {} from {} ({})", map_name, format_total(start_total), best_id);

        let mut report = JiggleReport {
            iterations: 0,
            improvements: 0,
            resets: 0,
            start_total,
            best_total: start_total,
            best_id,
        };
        let mut current = best.clone();

        // Main walk
        for _ in 0..iterations {
            report.iterations += 1;
            let mut candidate = current.clone();
            self.perturb(&mut candidate);

            let total = match self.score(&candidate) {
                Ok(result) if result.total() > report.best_total => {
                    store.store(&result)?;
                    info!(
                        "jiggle {}: {} -> {}",
                        report.iterations,
                        format_total(report.best_total),
                        format_total(result.total())
                    );
                    report.improvements += 1;
                    report.best_total = result.total();
                    report.best_id = result.game_id;
                    best = candidate.clone();
                    current = candidate;
                    continue;
                }
                Ok(result) => result.total(),
                Err(Error::Score(ScoreError::NoServedLocations { .. })) => f64::NEG_INFINITY,
                Err(e) => return Err(e),
            };

            // Close enough keeps walking, anything else starts over from the best
            if (total - report.best_total).abs() < self.config.jiggle_tolerance {
                current = candidate;
            } else {
                debug!("jiggle {}: {} is too far off, resetting", report.iterations, total);
                report.resets += 1;
                current = best.clone();
            }
        }

        Ok(report)
    }
}
