//! Neighborhoods explored by the allocation search.
//!
//! Each neighborhood turns a read-only view of the current search state into a
//! lazy sequence of deltas. Sequences are rebuilt from scratch every generation.

pub mod adjust;
pub mod consolidate;
pub mod relocate;
pub mod sandbox;
pub mod utils;

use crate::delta::Delta;
use crate::problem::{Coordinates, LocationType};
use crate::solution::Allocation;
use crate::spatial::DistanceCache;
use std::collections::{BTreeMap, HashSet};

pub use self::adjust::{MissingAddition, UnitAdjust};
pub use self::consolidate::Consolidate;
pub use self::relocate::Relocate;
pub use self::sandbox::{Retype, SandboxAddition, SandboxRelocate, SandboxSwap};

/// Read-only snapshot handed to the neighborhoods for one generation.
#[derive(Clone, Copy)]
pub struct SearchContext<'a> {
    pub allocation: &'a Allocation,
    /// Every key that may hold units: map locations, or sandbox candidate sites.
    pub sites: &'a BTreeMap<String, Coordinates>,
    pub distances: &'a DistanceCache,
    /// Keys skipped by the cheap neighborhoods this generation.
    pub ignored: &'a HashSet<String>,
    pub max_stations: u32,
    /// Remaining sandbox placements per type; empty on regular maps.
    pub remaining: &'a BTreeMap<LocationType, u32>,
}

impl<'a> SearchContext<'a> {
    pub fn is_ignored(&self, key: &str) -> bool {
        self.ignored.contains(key)
    }

    /// Allocated keys within the willingness radius of `key`.
    pub fn occupied_neighbors(&self, key: &str) -> impl Iterator<Item = &'a String> + 'a {
        let allocation = self.allocation;
        self.distances
            .neighbors(key)
            .map(|(neighbor, _)| neighbor)
            .filter(move |neighbor| allocation.contains(neighbor))
    }

    /// Types that may still be placed.
    pub fn open_types(&self) -> impl Iterator<Item = LocationType> + 'a {
        let remaining = self.remaining;
        LocationType::ALL
            .into_iter()
            .filter(move |t| remaining.get(t).copied().unwrap_or(0) > 0)
    }
}

/// A family of moves.
pub trait Neighborhood: Send + Sync {
    fn name(&self) -> &'static str;

    /// Wide neighborhoods are only explored once cheap moves stop improving.
    fn is_wide(&self) -> bool {
        false
    }

    fn suggestions<'a>(&'a self, ctx: SearchContext<'a>) -> Box<dyn Iterator<Item = Delta> + 'a>;
}
