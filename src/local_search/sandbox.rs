//! Sandbox-only neighborhoods: new placements, type changes, swaps and relocations.

use super::{Neighborhood, SearchContext};
use crate::delta::{Change, Delta, Origin};
use crate::problem::{GeneralData, LocationType};
use itertools::Itertools;
use std::collections::BTreeMap;

/// Place one f3100 of any type with remaining quota at a free candidate site.
pub struct SandboxAddition;

impl Neighborhood for SandboxAddition {
    fn name(&self) -> &'static str {
        "sandbox-addition"
    }

    fn suggestions<'a>(&'a self, ctx: SearchContext<'a>) -> Box<dyn Iterator<Item = Delta> + 'a> {
        Box::new(
            ctx.sites
                .iter()
                .filter(move |(key, _)| !ctx.is_ignored(key) && !ctx.allocation.contains(key))
                .flat_map(move |(key, position)| {
                    ctx.open_types().map(move |location_type| {
                        Delta::single(
                            key.clone(),
                            Change::counts(1, 0)
                                .with_type(location_type)
                                .with_position(*position),
                            Origin::Add,
                        )
                    })
                }),
        )
    }
}

/// Change the type of an existing placement to another type with remaining quota.
pub struct Retype;

impl Neighborhood for Retype {
    fn name(&self) -> &'static str {
        "retype"
    }

    fn suggestions<'a>(&'a self, ctx: SearchContext<'a>) -> Box<dyn Iterator<Item = Delta> + 'a> {
        Box::new(
            ctx.allocation
                .iter()
                .filter(move |(key, _)| !ctx.is_ignored(key))
                .flat_map(move |(key, placement)| {
                    let current = placement.location_type;
                    ctx.open_types()
                        .filter(move |t| Some(*t) != current)
                        .map(move |location_type| {
                            Delta::single(
                                key.clone(),
                                Change::counts(0, 0).with_type(location_type),
                                Origin::Change,
                            )
                        })
                }),
        )
    }
}

/// Exchange type and units between a higher-value and a lower-value placement.
///
/// Sites keep their keys, so this amounts to trading their coordinates while
/// the number of placements per type stays the same.
pub struct SandboxSwap {
    values: BTreeMap<LocationType, f64>,
}

impl SandboxSwap {
    pub fn new(general: &GeneralData) -> Self {
        SandboxSwap {
            values: LocationType::ALL
                .iter()
                .map(|t| (*t, general.sales_volume_of(*t)))
                .collect(),
        }
    }

    fn value(&self, location_type: Option<LocationType>) -> f64 {
        location_type
            .and_then(|t| self.values.get(&t).copied())
            .unwrap_or(0.0)
    }
}

impl Neighborhood for SandboxSwap {
    fn name(&self) -> &'static str {
        "sandbox-swap"
    }

    fn suggestions<'a>(&'a self, ctx: SearchContext<'a>) -> Box<dyn Iterator<Item = Delta> + 'a> {
        Box::new(
            ctx.allocation
                .locations
                .iter()
                .tuple_combinations()
                .filter(move |((a_key, a), (b_key, b))| {
                    !(ctx.is_ignored(a_key) && ctx.is_ignored(b_key))
                        && self.value(a.location_type) != self.value(b.location_type)
                })
                .filter_map(|((a_key, a), (b_key, b))| {
                    let a_type = a.location_type?;
                    let b_type = b.location_type?;
                    let f3 = b.f3 as i32 - a.f3 as i32;
                    let f9 = b.f9 as i32 - a.f9 as i32;
                    Some(
                        Delta::new(Origin::Change)
                            .with(a_key.clone(), Change::counts(f3, f9).with_type(b_type))
                            .with(b_key.clone(), Change::counts(-f3, -f9).with_type(a_type)),
                    )
                }),
        )
    }
}

/// Move a whole placement to a free candidate site within the willingness radius.
pub struct SandboxRelocate;

impl Neighborhood for SandboxRelocate {
    fn name(&self) -> &'static str {
        "sandbox-relocate"
    }

    fn is_wide(&self) -> bool {
        true
    }

    fn suggestions<'a>(&'a self, ctx: SearchContext<'a>) -> Box<dyn Iterator<Item = Delta> + 'a> {
        Box::new(
            ctx.allocation
                .iter()
                .filter(move |(key, _)| !ctx.is_ignored(key))
                .flat_map(move |(key, placement)| {
                    let f3 = placement.f3 as i32;
                    let f9 = placement.f9 as i32;
                    let location_type = placement.location_type;
                    ctx.distances
                        .neighbors(key)
                        .filter(move |(site, _)| !ctx.allocation.contains(site))
                        .filter_map(move |(site, _)| {
                            let position = *ctx.sites.get(site)?;
                            Some(
                                Delta::new(Origin::Change)
                                    .with(key.clone(), Change::counts(-f3, -f9))
                                    .with(
                                        site.clone(),
                                        Change::counts(f3, f9)
                                            .with_type(location_type?)
                                            .with_position(position),
                                    ),
                            )
                        })
                }),
        )
    }
}
