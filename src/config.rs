//! Configuration parameters for the allocation search.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// How the first allocation is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedStrategy {
    /// Start from nothing placed.
    Empty,
    /// One f3100 at every map location (regular maps only).
    Greedy,
}

/// Cheap rejection of far-away pairs before the haversine distance is computed.
///
/// This is an approximation: the threshold only ever shrinks, so a pair that is
/// inside the radius but is met after the threshold has tightened below its
/// proxy distance is left out of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProxyPruning {
    /// Starting bound on `|dlat| + |dlon|` in degrees.
    pub initial_threshold: f64,
    /// A far pair tightens the bound to `shrink_multiplier * proxy`.
    pub shrink_multiplier: f64,
}

impl Default for ProxyPruning {
    fn default() -> Self {
        ProxyPruning {
            initial_threshold: 1.0,
            shrink_multiplier: 10.0,
        }
    }
}

/// Settings for building distance caches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// `None` computes the exact haversine distance for every pair.
    pub proxy_pruning: Option<ProxyPruning>,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        SpatialConfig {
            proxy_pruning: Some(ProxyPruning::default()),
        }
    }
}

impl SpatialConfig {
    pub fn exact() -> Self {
        SpatialConfig {
            proxy_pruning: None,
        }
    }
}

/// Configuration settings for the search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Cap on each station kind per location
    pub max_stations: u32,
    /// Starting allocation
    pub seed: SeedStrategy,
    /// Skip keys that only produced non-improving deltas last generation
    pub set_pruning: bool,
    /// Build the conflict-free group candidate
    pub groups: bool,
    /// Number of claimed keys after which a group stops growing
    pub group_size: usize,
    /// Neighbors closer than this (meters) to a grouped key are claimed too
    pub group_distance_limit: f64,
    /// Generations in which all improving deltas are also merged into one candidate
    pub mega_rounds: u32,
    /// Size of the scoring thread pool
    pub workers: usize,
    /// Drop locations whose unit count reaches zero on commit
    pub auto_remove: bool,
    /// Run structural validation on every candidate (slow)
    pub validate_candidates: bool,
    /// Optional cap on the number of generations
    pub max_generations: Option<u32>,
    /// Optional time limit for the search
    pub time_limit: Option<Duration>,
    /// Sandbox candidate deduplication grid, cells per degree
    pub candidate_granularity: f64,
    /// Distance cache construction
    pub spatial: SpatialConfig,
    /// Jiggle results this close to the best keep walking instead of resetting
    pub jiggle_tolerance: f64,
    /// Largest jiggle coordinate step as a fraction of the map span
    pub jiggle_step_factor: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            max_stations: 2,
            seed: SeedStrategy::Greedy,
            set_pruning: true,
            groups: true,
            group_size: 16,
            group_distance_limit: 100.0,
            mega_rounds: 1,
            workers: 4,
            auto_remove: true,
            validate_candidates: false,
            max_generations: None,
            time_limit: None,
            candidate_granularity: 10_000.0,
            spatial: SpatialConfig::default(),
            jiggle_tolerance: 16.0,
            jiggle_step_factor: 0.001,
        }
    }
}

impl SearchConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        SearchConfig::default()
    }

    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Set the cap on each station kind per location.
    pub fn with_max_stations(mut self, max_stations: u32) -> Self {
        self.max_stations = max_stations;
        self
    }

    /// Set how the starting allocation is built.
    pub fn with_seed(mut self, seed: SeedStrategy) -> Self {
        self.seed = seed;
        self
    }

    /// Enable or disable set pruning.
    pub fn with_set_pruning(mut self, enabled: bool) -> Self {
        self.set_pruning = enabled;
        self
    }

    /// Enable or disable the group candidate.
    pub fn with_groups(mut self, enabled: bool) -> Self {
        self.groups = enabled;
        self
    }

    /// Set the number of keys after which a group stops growing.
    pub fn with_group_size(mut self, size: usize) -> Self {
        self.group_size = size;
        self
    }

    /// Set the claim radius around grouped keys, in meters.
    pub fn with_group_distance_limit(mut self, meters: f64) -> Self {
        self.group_distance_limit = meters;
        self
    }

    /// Set the number of generations that also build a mega candidate.
    pub fn with_mega_rounds(mut self, rounds: u32) -> Self {
        self.mega_rounds = rounds;
        self
    }

    /// Set the number of scoring workers (at least one).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Enable or disable dropping locations left without units.
    pub fn with_auto_remove(mut self, enabled: bool) -> Self {
        self.auto_remove = enabled;
        self
    }

    /// Enable or disable full validation of every candidate.
    pub fn with_validate_candidates(mut self, enabled: bool) -> Self {
        self.validate_candidates = enabled;
        self
    }

    /// Set the maximum number of generations.
    pub fn with_max_generations(mut self, generations: u32) -> Self {
        self.max_generations = Some(generations);
        self
    }

    /// Set the time limit for the search.
    pub fn with_time_limit(mut self, duration: Duration) -> Self {
        self.time_limit = Some(duration);
        self
    }

    /// Set the sandbox deduplication grid, in cells per degree.
    pub fn with_candidate_granularity(mut self, granularity: f64) -> Self {
        self.candidate_granularity = granularity;
        self
    }

    /// Set the distance cache settings.
    pub fn with_spatial(mut self, spatial: SpatialConfig) -> Self {
        self.spatial = spatial;
        self
    }

    /// Set how far below the best a jiggle result may be and still be walked on.
    pub fn with_jiggle_tolerance(mut self, tolerance: f64) -> Self {
        self.jiggle_tolerance = tolerance;
        self
    }

    /// Set the largest jiggle step as a fraction of the map span.
    pub fn with_jiggle_step_factor(mut self, factor: f64) -> Self {
        self.jiggle_step_factor = factor;
        self
    }
}
