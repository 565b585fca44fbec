//! Scoring model: turns a baseline allocation plus a delta into a full score.
//!
//! Scoring is a pure function of its inputs. Every call gets a fresh game id,
//! so two calls with the same inputs share the total but not the id.

use crate::config::ProxyPruning;
use crate::delta::Delta;
use crate::error::{ScoreError, ValidationError};
use crate::problem::{Coordinates, GeneralData, Hotspot, LocationType, MapEntity, Mode};
use crate::solution::{Allocation, Placement};
use crate::spatial::{haversine_meters, proxy_distance, DistanceCache, ProxyPruner};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

/// Hotspot scans start with a wider proxy bound than location pairs.
const HOTSPOT_PRUNING: ProxyPruning = ProxyPruning {
    initial_threshold: 10.0,
    shrink_multiplier: 10.0,
};

/// Each hotspot contributes a tenth of its decayed footfall.
const HOTSPOT_FOOTFALL_DIVISOR: f64 = 10.0;

/// Per-location breakdown of a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationScore {
    pub location_name: String,
    pub location_type: LocationType,
    pub latitude: f64,
    pub longitude: f64,
    pub footfall: f64,
    pub footfall_scale: u32,
    pub f3100_count: u32,
    pub f9100_count: u32,
    pub sales_volume: f64,
    pub sales_capacity: f64,
    pub leasing_cost: f64,
    pub revenue: f64,
    pub earnings: f64,
    pub co2_savings: f64,
}

/// Aggregate score components, in kilo-units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameScore {
    pub co2_savings: f64,
    pub total_footfall: f64,
    pub earnings: f64,
    pub total: f64,
}

/// A fully evaluated allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredResult {
    pub game_id: String,
    pub map_name: String,
    pub locations: BTreeMap<String, LocationScore>,
    pub game_score: GameScore,
    pub total_revenue: f64,
    pub total_leasing_cost: f64,
    pub total_f3100_count: u32,
    pub total_f9100_count: u32,
}

impl ScoredResult {
    pub fn total(&self) -> f64 {
        self.game_score.total
    }
}

/// Footfall a position collects from all hotspots whose spread reaches it.
pub fn hotspot_footfall(position: Coordinates, hotspots: &[Hotspot]) -> f64 {
    let mut pruner = ProxyPruner::new(HOTSPOT_PRUNING);
    let mut footfall = 0.0;

    for hotspot in hotspots {
        let proxy = proxy_distance(hotspot.position(), position);
        if !pruner.admits(proxy) {
            continue;
        }
        let distance = haversine_meters(hotspot.position(), position);
        if distance <= hotspot.spread {
            footfall +=
                hotspot.footfall * (1.0 - distance / hotspot.spread) / HOTSPOT_FOOTFALL_DIVISOR;
        } else {
            pruner.tighten(proxy);
        }
    }

    footfall
}

/// Precompute hotspot footfall for fixed sites; it does not depend on the delta.
pub fn hotspot_footfall_cache(
    sites: &BTreeMap<String, Coordinates>,
    hotspots: &[Hotspot],
) -> HashMap<String, f64> {
    sites
        .iter()
        .map(|(key, position)| (key.clone(), hotspot_footfall(*position, hotspots)))
        .collect()
}

/// Placements with units after the delta, paired with their `location<n>` names.
pub fn sandbox_placements(
    baseline: &Allocation,
    delta: &Delta,
    max_stations: u32,
) -> Vec<(String, String, Placement)> {
    baseline
        .locations
        .keys()
        .chain(delta.keys().filter(|key| !baseline.contains(key)))
        .filter_map(|key| {
            baseline
                .effective(key, delta, max_stations)
                .filter(|placement| !placement.is_empty())
                .map(|placement| (key.clone(), placement))
        })
        .enumerate()
        .map(|(i, (key, placement))| (key, format!("location{}", i + 1), placement))
        .collect()
}

/// Check that `name` is `location<n>` with `1 <= n <= max`.
pub fn validate_name(name: &str, max: usize) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidName {
        name: name.to_string(),
        max,
    };
    let number: usize = name
        .strip_prefix("location")
        .ok_or_else(invalid)?
        .parse()
        .map_err(|_| invalid())?;
    if number == 0 || number > max {
        return Err(invalid());
    }
    Ok(())
}

/// Structural checks for a sandbox allocation: names, bounds, types and quotas.
pub fn validate_sandbox(
    map: &MapEntity,
    general: &GeneralData,
    baseline: &Allocation,
    delta: &Delta,
    max_stations: u32,
) -> Result<(), ValidationError> {
    let total_quota = general.total_quota();
    let mut used: BTreeMap<LocationType, u32> = BTreeMap::new();

    for (key, name, placement) in sandbox_placements(baseline, delta, max_stations) {
        validate_name(&name, total_quota)?;

        let position = placement
            .position
            .ok_or_else(|| ValidationError::MissingPosition { key: key.clone() })?;
        if !map.border.contains_latitude(position.latitude) {
            return Err(ValidationError::LatitudeOutOfBounds {
                key,
                latitude: position.latitude,
            });
        }
        if !map.border.contains_longitude(position.longitude) {
            return Err(ValidationError::LongitudeOutOfBounds {
                key,
                longitude: position.longitude,
            });
        }

        let location_type = placement
            .location_type
            .ok_or_else(|| ValidationError::MissingType { key: key.clone() })?;
        let count = used.entry(location_type).or_insert(0);
        *count += 1;
        let quota = general.quota_of(location_type);
        if *count > quota {
            return Err(ValidationError::QuotaExceeded {
                location_type: location_type.to_string(),
                quota,
            });
        }
    }

    Ok(())
}

/// Structural checks for a regular allocation: known keys and counts in range.
pub fn validate_regular(
    map: &MapEntity,
    allocation: &Allocation,
    max_stations: u32,
) -> Result<(), ValidationError> {
    for (key, placement) in allocation.iter() {
        if !map.locations.contains_key(key) {
            return Err(ValidationError::UnknownLocation { key: key.clone() });
        }
        if placement.f3 > max_stations || placement.f9 > max_stations {
            return Err(ValidationError::CountOutOfRange {
                key: key.clone(),
                f3: placement.f3,
                f9: placement.f9,
                max: max_stations,
            });
        }
    }
    Ok(())
}

/// Evaluates (baseline, delta) pairs against one map.
#[derive(Clone, Copy)]
pub struct ScoringEngine<'a> {
    map: &'a MapEntity,
    general: &'a GeneralData,
    distances: &'a DistanceCache,
    max_stations: u32,
    hotspot_footfall: Option<&'a HashMap<String, f64>>,
}

impl<'a> ScoringEngine<'a> {
    pub fn new(
        map: &'a MapEntity,
        general: &'a GeneralData,
        distances: &'a DistanceCache,
        max_stations: u32,
    ) -> Self {
        ScoringEngine {
            map,
            general,
            distances,
            max_stations,
            hotspot_footfall: None,
        }
    }

    /// Use precomputed hotspot footfall for keys found in `cache`.
    pub fn with_hotspot_footfall(mut self, cache: &'a HashMap<String, f64>) -> Self {
        self.hotspot_footfall = Some(cache);
        self
    }

    pub fn mode(&self) -> Mode {
        self.map.mode()
    }

    /// Score `baseline` with `delta` applied.
    pub fn score(&self, baseline: &Allocation, delta: &Delta) -> Result<ScoredResult, ScoreError> {
        let locations = match self.mode() {
            Mode::Regular => self.regular_locations(baseline, delta)?,
            Mode::Sandbox => self.sandbox_locations(baseline, delta)?,
        };
        Ok(self.finish(locations))
    }

    fn regular_locations(
        &self,
        baseline: &Allocation,
        delta: &Delta,
    ) -> Result<BTreeMap<String, LocationScore>, ScoreError> {
        // Placements must refer to map locations
        if let Some(key) = baseline
            .locations
            .keys()
            .chain(delta.keys())
            .find(|key| !self.map.locations.contains_key(key.as_str()))
        {
            return Err(ScoreError::UnknownLocation { key: key.clone() });
        }

        let mut served = BTreeMap::new();
        let mut unserved = Vec::new();

        // Split map locations into served and unserved
        for (key, location) in &self.map.locations {
            let placement = baseline
                .effective(key, delta, self.max_stations)
                .unwrap_or_default();
            let sales_volume = location.sales_volume * self.general.refill_sales_factor;

            if placement.is_empty() {
                unserved.push((key, sales_volume));
                continue;
            }

            let sales_capacity = self.general.capacity(placement.f3, placement.f9);
            if sales_capacity <= 0.0 {
                return Err(ScoreError::NoCapacity {
                    location: location.location_name.clone(),
                });
            }

            served.insert(
                key.clone(),
                LocationScore {
                    location_name: location.location_name.clone(),
                    location_type: location.location_type,
                    latitude: location.latitude,
                    longitude: location.longitude,
                    footfall: location.footfall,
                    footfall_scale: location.footfall_scale,
                    f3100_count: placement.f3,
                    f9100_count: placement.f9,
                    sales_volume,
                    sales_capacity,
                    leasing_cost: self.general.leasing_cost(placement.f3, placement.f9),
                    revenue: 0.0,
                    earnings: 0.0,
                    co2_savings: 0.0,
                },
            );
        }

        if served.is_empty() {
            return Err(ScoreError::NoServedLocations {
                map: self.map.map_name.clone(),
            });
        }

        // Redistribute unserved sales, then share footfall between neighbors
        self.distribute_sales(&mut served, &unserved);
        let keys: BTreeSet<String> = served.keys().cloned().collect();
        self.divide_footfall(&mut served, |key| key.to_string(), &keys);

        Ok(served)
    }

    /// Hand the sales of unserved locations to served neighbors, favoring closer ones.
    fn distribute_sales(
        &self,
        served: &mut BTreeMap<String, LocationScore>,
        unserved: &[(&String, f64)],
    ) {
        let base = self.general.constant_exp_distribution_function;
        let willingness = self.general.willingness_to_travel_in_meters;
        let rate = self.general.refill_distribution_rate;

        for &(key, sales_volume) in unserved {
            let weights: Vec<(&String, f64)> = self
                .distances
                .neighbors(key)
                .filter(|(neighbor, _)| served.contains_key(*neighbor))
                .map(|(neighbor, distance)| (neighbor, base.powf(willingness - distance) - 1.0))
                .collect();
            let total: f64 = weights.iter().map(|(_, w)| w).sum();
            if weights.is_empty() || total <= 0.0 {
                continue;
            }

            for (neighbor, weight) in weights {
                if let Some(location) = served.get_mut(neighbor) {
                    location.sales_volume += weight / total * rate * sales_volume;
                }
            }
        }
    }

    /// Split footfall among locations that share a catchment area.
    fn divide_footfall<F>(
        &self,
        locations: &mut BTreeMap<String, LocationScore>,
        cache_key: F,
        placed: &BTreeSet<String>,
    ) where
        F: Fn(&str) -> String,
    {
        for (name, location) in locations.iter_mut() {
            let shared = 1 + self.count_placed_neighbors(&cache_key(name), placed);
            location.footfall /= shared as f64;
        }
    }

    fn count_placed_neighbors(&self, key: &str, placed: &BTreeSet<String>) -> usize {
        self.distances
            .neighbors(key)
            .filter(|(neighbor, _)| placed.contains(*neighbor))
            .count()
    }

    fn sandbox_locations(
        &self,
        baseline: &Allocation,
        delta: &Delta,
    ) -> Result<BTreeMap<String, LocationScore>, ScoreError> {
        let placements = sandbox_placements(baseline, delta, self.max_stations);
        let placed: BTreeSet<String> = placements.iter().map(|(key, _, _)| key.clone()).collect();
        let key_of: HashMap<String, String> = placements
            .iter()
            .map(|(key, name, _)| (name.clone(), key.clone()))
            .collect();

        let mut locations = BTreeMap::new();
        for (key, name, placement) in &placements {
            let location_type = placement
                .location_type
                .ok_or_else(|| ScoreError::MissingType { key: key.clone() })?;
            let position = placement
                .position
                .ok_or_else(|| ScoreError::MissingPosition { key: key.clone() })?;

            let shared = 1 + self.count_placed_neighbors(key, &placed);
            let sales_volume = self.general.sales_volume_of(location_type) / shared as f64;
            let footfall = self
                .hotspot_footfall
                .and_then(|cache| cache.get(key).copied())
                .unwrap_or_else(|| hotspot_footfall(position, &self.map.hotspots));

            locations.insert(
                name.clone(),
                LocationScore {
                    location_name: name.clone(),
                    location_type,
                    latitude: position.latitude,
                    longitude: position.longitude,
                    footfall,
                    footfall_scale: 0,
                    f3100_count: placement.f3,
                    f9100_count: placement.f9,
                    sales_volume,
                    sales_capacity: self.general.capacity(placement.f3, placement.f9),
                    leasing_cost: self.general.leasing_cost(placement.f3, placement.f9),
                    revenue: 0.0,
                    earnings: 0.0,
                    co2_savings: 0.0,
                },
            );
        }

        assign_footfall_scale(&mut locations);
        self.divide_footfall(
            &mut locations,
            |name| key_of.get(name).cloned().unwrap_or_default(),
            &placed,
        );

        Ok(locations)
    }

    /// Clip sales, compute per-location economics and aggregate the total.
    fn finish(&self, mut locations: BTreeMap<String, LocationScore>) -> ScoredResult {
        let general = self.general;
        let sandbox = self.mode() == Mode::Sandbox;
        let co2_per_sale = general.classic_unit_data.co2_per_unit_in_grams
            - general.refill_unit_data.co2_per_unit_in_grams;

        let mut co2_savings = 0.0;
        let mut total_footfall = 0.0;
        let mut total_revenue = 0.0;
        let mut total_leasing_cost = 0.0;
        let mut total_f3100_count = 0;
        let mut total_f9100_count = 0;

        for location in locations.values_mut() {
            // Clip sales to capacity
            location.sales_volume = location.sales_volume.round_ties_even();
            let sales = if sandbox && location.footfall <= 0.0 {
                0.0
            } else {
                location.sales_volume.min(location.sales_capacity)
            };

            // Per-location economics
            location.revenue = sales * general.refill_unit_data.profit_per_unit;
            location.earnings = location.revenue - location.leasing_cost;
            location.co2_savings = sales * co2_per_sale
                - general.static_co2(location.f3100_count, location.f9100_count);

            // Aggregate, CO2 and footfall in kilo units
            co2_savings += location.co2_savings / 1000.0;
            total_footfall += location.footfall / 1000.0;
            total_revenue += location.revenue;
            total_leasing_cost += location.leasing_cost;
            total_f3100_count += location.f3100_count;
            total_f9100_count += location.f9100_count;
        }

        // Footfall scales the whole score
        let earnings = (total_revenue - total_leasing_cost) / 1000.0;
        let total =
            (co2_savings * general.co2_price_per_kilo_in_sek + earnings) * (1.0 + total_footfall);

        ScoredResult {
            game_id: Uuid::new_v4().to_string(),
            map_name: self.map.map_name.clone(),
            locations,
            game_score: GameScore {
                co2_savings,
                total_footfall,
                earnings,
                total,
            },
            total_revenue,
            total_leasing_cost,
            total_f3100_count,
            total_f9100_count,
        }
    }
}

/// Footfall relative to the busiest location, on a 1..=10 scale.
fn assign_footfall_scale(locations: &mut BTreeMap<String, LocationScore>) {
    let max = locations
        .values()
        .map(|location| location.footfall)
        .fold(0.0, f64::max);
    if max <= 0.0 {
        return;
    }
    for location in locations.values_mut() {
        if location.footfall > 0.0 {
            location.footfall_scale = ((location.footfall / max * 10.0) as u32).max(1);
        }
    }
}
