//! Pairwise geo-distances between the locations the scoring model cares about.

use crate::config::{ProxyPruning, SpatialConfig};
use crate::problem::Coordinates;
use std::collections::BTreeMap;

/// Earth radius in meters for haversine calculation.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in whole meters.
pub fn haversine_meters(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    (EARTH_RADIUS_M * c).round()
}

/// Manhattan distance in degrees, a cheap stand-in for the real distance.
pub fn proxy_distance(a: Coordinates, b: Coordinates) -> f64 {
    (a.latitude - b.latitude).abs() + (a.longitude - b.longitude).abs()
}

/// Adaptive rejection threshold on the proxy distance.
///
/// Starts generous and only tightens, whenever a pair turns out to be too far.
#[derive(Debug, Clone, Copy)]
pub struct ProxyPruner {
    threshold: f64,
    shrink_multiplier: f64,
}

impl ProxyPruner {
    pub fn new(pruning: ProxyPruning) -> Self {
        ProxyPruner {
            threshold: pruning.initial_threshold,
            shrink_multiplier: pruning.shrink_multiplier,
        }
    }

    /// Never rejects anything.
    pub fn disabled() -> Self {
        ProxyPruner {
            threshold: f64::INFINITY,
            shrink_multiplier: f64::INFINITY,
        }
    }

    pub fn from_config(config: &SpatialConfig) -> Self {
        config
            .proxy_pruning
            .map(ProxyPruner::new)
            .unwrap_or_else(ProxyPruner::disabled)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn admits(&self, proxy: f64) -> bool {
        proxy <= self.threshold
    }

    /// Record a pair whose true distance was out of range.
    pub fn tighten(&mut self, proxy: f64) {
        self.threshold = self.threshold.min(self.shrink_multiplier * proxy);
    }
}

/// Symmetric mapping key -> key -> distance in meters.
///
/// Only pairs closer than the willingness radius are stored. A missing pair
/// means known or assumed too far, never unknown.
#[derive(Debug, Clone, Default)]
pub struct DistanceCache {
    entries: BTreeMap<String, BTreeMap<String, f64>>,
    radius: f64,
}

impl DistanceCache {
    /// Build the cache over `positions`.
    pub fn build<'a, I>(positions: I, radius: f64, config: &SpatialConfig) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a Coordinates)>,
    {
        let (keys, points): (Vec<&String>, Vec<Coordinates>) =
            positions.into_iter().map(|(k, p)| (k, *p)).unzip();

        let mut entries: BTreeMap<String, BTreeMap<String, f64>> = keys
            .iter()
            .map(|key| ((*key).clone(), BTreeMap::new()))
            .collect();
        let mut pruner = ProxyPruner::from_config(config);

        // Visit each unordered pair once
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                // Cheap rejection before the haversine
                let proxy = proxy_distance(points[i], points[j]);
                if !pruner.admits(proxy) {
                    continue;
                }

                // Store both directions, or tighten on a far pair
                let distance = haversine_meters(points[i], points[j]);
                if distance < radius {
                    if let Some(row) = entries.get_mut(keys[i]) {
                        row.insert(keys[j].clone(), distance);
                    }
                    if let Some(row) = entries.get_mut(keys[j]) {
                        row.insert(keys[i].clone(), distance);
                    }
                } else {
                    pruner.tighten(proxy);
                }
            }
        }

        DistanceCache { entries, radius }
    }

    /// The willingness radius the cache was built with.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn distance(&self, a: &str, b: &str) -> Option<f64> {
        self.entries.get(a).and_then(|row| row.get(b)).copied()
    }

    /// Keys within the radius of `key`, with their distances.
    pub fn neighbors<'a>(&'a self, key: &str) -> impl Iterator<Item = (&'a String, f64)> + 'a {
        self.entries
            .get(key)
            .into_iter()
            .flat_map(|row| row.iter().map(|(k, d)| (k, *d)))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of stored directed pairs.
    pub fn pair_count(&self) -> usize {
        self.entries.values().map(|row| row.len()).sum()
    }
}
