//! Consolidation neighborhood: pull capacity from two neighbors into one focal location.

use super::utils::{gains, release};
use super::{Neighborhood, SearchContext};
use crate::delta::{Change, Delta, Origin};
use itertools::Itertools;

/// Frees two neighboring slots at once while the focal location gains one unit.
pub struct Consolidate;

impl Neighborhood for Consolidate {
    fn name(&self) -> &'static str {
        "consolidate"
    }

    fn is_wide(&self) -> bool {
        true
    }

    fn suggestions<'a>(&'a self, ctx: SearchContext<'a>) -> Box<dyn Iterator<Item = Delta> + 'a> {
        Box::new(ctx.sites.keys().flat_map(move |focal_key| {
            let focal = ctx.allocation.get(focal_key);
            let donors: Vec<&'a String> = if focal.map_or(false, |p| p.is_full(ctx.max_stations)) {
                Vec::new()
            } else {
                ctx.occupied_neighbors(focal_key).collect()
            };
            let options = gains(focal, ctx.max_stations);

            donors
                .into_iter()
                .tuple_combinations()
                .filter_map(move |(first, second)| {
                    let a = ctx.allocation.get(first)?;
                    let b = ctx.allocation.get(second)?;
                    Some(((first, release(a)), (second, release(b))))
                })
                .flat_map(move |((first, (a3, a9)), (second, (b3, b9)))| {
                    options.clone().into_iter().map(move |(f3, f9)| {
                        Delta::new(Origin::Change)
                            .with(focal_key.clone(), Change::counts(f3, f9))
                            .with(first.clone(), Change::counts(a3, a9))
                            .with(second.clone(), Change::counts(b3, b9))
                    })
                })
        }))
    }
}
