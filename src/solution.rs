//! Allocation representation: unit counts per location.

use crate::delta::{Change, Delta};
use crate::problem::{Coordinates, LocationType, Mode};
use crate::scoring::ScoredResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Clamp a possibly negative count into `0..=max_stations`.
pub fn clamp_count(value: i64, max_stations: u32) -> u32 {
    value.max(0).min(max_stations as i64) as u32
}

/// Units placed at one location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub f3: u32,
    pub f9: u32,
    /// Sandbox only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_type: Option<LocationType>,
    /// Sandbox only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Coordinates>,
}

impl Placement {
    pub fn new(f3: u32, f9: u32) -> Self {
        Placement {
            f3,
            f9,
            location_type: None,
            position: None,
        }
    }

    pub fn sandbox(f3: u32, f9: u32, location_type: LocationType, position: Coordinates) -> Self {
        Placement {
            f3,
            f9,
            location_type: Some(location_type),
            position: Some(position),
        }
    }

    pub fn units(&self) -> u32 {
        self.f3 + self.f9
    }

    pub fn is_empty(&self) -> bool {
        self.units() == 0
    }

    /// Both kinds are at the cap.
    pub fn is_full(&self, max_stations: u32) -> bool {
        self.f3 >= max_stations && self.f9 >= max_stations
    }

    /// The placement with `change` applied, counts clamped.
    pub fn changed(&self, change: &Change, max_stations: u32) -> Placement {
        Placement {
            f3: clamp_count(self.f3 as i64 + change.f3 as i64, max_stations),
            f9: clamp_count(self.f9 as i64 + change.f9 as i64, max_stations),
            location_type: change.location_type.or(self.location_type),
            position: change.position.or(self.position),
        }
    }
}

/// Mapping from location key to placed units.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub locations: BTreeMap<String, Placement>,
}

impl Allocation {
    pub fn new() -> Self {
        Allocation::default()
    }

    pub fn get(&self, key: &str) -> Option<&Placement> {
        self.locations.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.locations.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, placement: Placement) {
        self.locations.insert(key.into(), placement);
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Placement)> {
        self.locations.iter()
    }

    /// The placement at `key` after `delta`, or `None` when neither mentions the key.
    pub fn effective(&self, key: &str, delta: &Delta, max_stations: u32) -> Option<Placement> {
        match (self.locations.get(key), delta.get(key)) {
            (Some(placement), Some(change)) => Some(placement.changed(change, max_stations)),
            (Some(placement), None) => Some(placement.clone()),
            (None, Some(change)) => Some(Placement::default().changed(change, max_stations)),
            (None, None) => None,
        }
    }

    /// Apply a committed delta.
    ///
    /// Counts are always clamped to `0..=max_stations`. Locations left with no
    /// units are dropped unless `auto_remove` is off.
    pub fn apply(&mut self, delta: &Delta, max_stations: u32, auto_remove: bool) {
        for (key, change) in &delta.changes {
            let placement = self
                .locations
                .get(key)
                .cloned()
                .unwrap_or_default()
                .changed(change, max_stations);
            self.locations.insert(key.clone(), placement);
        }
        if auto_remove {
            self.locations.retain(|_, placement| !placement.is_empty());
        }
    }

    /// Number of placements per location type.
    pub fn type_counts(&self) -> BTreeMap<LocationType, u32> {
        let mut counts = BTreeMap::new();
        for placement in self.locations.values() {
            if let Some(location_type) = placement.location_type {
                *counts.entry(location_type).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Rebuild an allocation from a stored score snapshot.
    pub fn from_scored(scored: &ScoredResult, mode: Mode) -> Self {
        let mut allocation = Allocation::new();
        for (key, location) in &scored.locations {
            match mode {
                Mode::Regular => {
                    if location.f3100_count == 0 && location.f9100_count == 0 {
                        continue;
                    }
                    allocation.insert(
                        key.clone(),
                        Placement::new(location.f3100_count, location.f9100_count),
                    );
                }
                Mode::Sandbox => {
                    allocation.insert(
                        key.clone(),
                        Placement::sandbox(
                            location.f3100_count,
                            location.f9100_count,
                            location.location_type,
                            Coordinates::new(location.latitude, location.longitude),
                        ),
                    );
                }
            }
        }
        allocation
    }
}

impl fmt::Debug for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Allocation:")?;
        writeln!(f, "  Locations: {}", self.locations.len())?;

        for (key, placement) in &self.locations {
            write!(f, "  {}: f3={} f9={}", key, placement.f3, placement.f9)?;
            if let Some(location_type) = placement.location_type {
                write!(f, " type={}", location_type)?;
            }
            if let Some(position) = placement.position {
                write!(f, " at ({:.5}, {:.5})", position.latitude, position.longitude)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
