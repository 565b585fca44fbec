//! Sparse proposed changes to an allocation.

use crate::problem::{Coordinates, LocationType};
use crate::scoring::ScoredResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a delta came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// The whole starting allocation, scored without changes.
    Start,
    /// Adds a location that is not yet part of the allocation.
    Add,
    /// Adjusts locations that are already allocated.
    Change,
    /// Several independent improving deltas merged into one.
    Group,
}

/// A partial change to a single location.
///
/// Counts are relative to the baseline, type and position are absolute overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub f3: i32,
    pub f9: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_type: Option<LocationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Coordinates>,
}

impl Change {
    pub fn counts(f3: i32, f9: i32) -> Self {
        Change {
            f3,
            f9,
            ..Default::default()
        }
    }

    pub fn with_type(mut self, location_type: LocationType) -> Self {
        self.location_type = Some(location_type);
        self
    }

    pub fn with_position(mut self, position: Coordinates) -> Self {
        self.position = Some(position);
        self
    }

    /// Fold `other` into this change: counts add up, overrides replace.
    pub fn merge(&mut self, other: &Change) {
        self.f3 += other.f3;
        self.f9 += other.f9;
        if other.location_type.is_some() {
            self.location_type = other.location_type;
        }
        if other.position.is_some() {
            self.position = other.position;
        }
    }
}

/// A sparse mapping from location key to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub changes: BTreeMap<String, Change>,
    pub origin: Origin,
}

impl Delta {
    pub fn new(origin: Origin) -> Self {
        Delta {
            changes: BTreeMap::new(),
            origin,
        }
    }

    /// The empty delta, used to score an allocation as it is.
    pub fn start() -> Self {
        Delta::new(Origin::Start)
    }

    pub fn single(key: impl Into<String>, change: Change, origin: Origin) -> Self {
        Delta::new(origin).with(key, change)
    }

    pub fn with(mut self, key: impl Into<String>, change: Change) -> Self {
        self.changes.insert(key.into(), change);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Change> {
        self.changes.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.changes.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.changes.keys()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Merge another delta into this one without any capping.
    pub fn merge(&mut self, other: &Delta) {
        for (key, change) in &other.changes {
            self.changes
                .entry(key.clone())
                .and_modify(|existing| existing.merge(change))
                .or_insert_with(|| change.clone());
        }
    }
}

/// A delta together with its evaluated score.
#[derive(Debug, Clone)]
pub struct ScoredDelta {
    pub delta: Delta,
    pub result: ScoredResult,
}

impl ScoredDelta {
    pub fn new(delta: Delta, result: ScoredResult) -> Self {
        ScoredDelta { delta, result }
    }

    pub fn total(&self) -> f64 {
        self.result.total()
    }

    pub fn id(&self) -> &str {
        &self.result.game_id
    }
}
