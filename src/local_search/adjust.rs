//! Unit adjustments at allocated locations, and additions of missing locations.

use super::utils::adjustments;
use super::{Neighborhood, SearchContext};
use crate::delta::{Change, Delta, Origin};

/// Add, remove or swap units at every allocated location that is not ignored.
pub struct UnitAdjust;

impl Neighborhood for UnitAdjust {
    fn name(&self) -> &'static str {
        "unit-adjust"
    }

    fn suggestions<'a>(&'a self, ctx: SearchContext<'a>) -> Box<dyn Iterator<Item = Delta> + 'a> {
        Box::new(
            ctx.allocation
                .iter()
                .filter(move |(key, _)| !ctx.is_ignored(key))
                .flat_map(move |(key, placement)| {
                    adjustments(placement, ctx.max_stations)
                        .into_iter()
                        .map(move |(f3, f9)| {
                            Delta::single(key.clone(), Change::counts(f3, f9), Origin::Change)
                        })
                }),
        )
    }
}

/// Place a single f3100 at map locations that hold nothing yet.
pub struct MissingAddition;

impl Neighborhood for MissingAddition {
    fn name(&self) -> &'static str {
        "missing-addition"
    }

    fn suggestions<'a>(&'a self, ctx: SearchContext<'a>) -> Box<dyn Iterator<Item = Delta> + 'a> {
        Box::new(
            ctx.sites
                .keys()
                .filter(move |key| !ctx.is_ignored(key) && !ctx.allocation.contains(key))
                .map(|key| Delta::single(key.clone(), Change::counts(1, 0), Origin::Add)),
        )
    }
}
