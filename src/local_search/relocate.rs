//! Relocate neighborhood: shift one unit of capacity from a neighbor into a focal location.

use super::utils::{gains, release};
use super::{Neighborhood, SearchContext};
use crate::delta::{Change, Delta, Origin};

/// For every map location, take capacity from one allocated neighbor and add it here.
pub struct Relocate;

impl Neighborhood for Relocate {
    fn name(&self) -> &'static str {
        "relocate"
    }

    fn is_wide(&self) -> bool {
        true
    }

    fn suggestions<'a>(&'a self, ctx: SearchContext<'a>) -> Box<dyn Iterator<Item = Delta> + 'a> {
        Box::new(ctx.sites.keys().flat_map(move |focal_key| {
            let focal = ctx.allocation.get(focal_key);
            let full = focal.map_or(false, |p| p.is_full(ctx.max_stations));
            let origin = if focal.is_some() {
                Origin::Change
            } else {
                Origin::Add
            };
            let options = if full {
                Vec::new()
            } else {
                gains(focal, ctx.max_stations)
            };

            ctx.occupied_neighbors(focal_key)
                .filter_map(move |donor_key| {
                    ctx.allocation
                        .get(donor_key)
                        .map(|donor| (donor_key, release(donor)))
                })
                .flat_map(move |(donor_key, (d3, d9))| {
                    options.clone().into_iter().map(move |(f3, f9)| {
                        Delta::new(origin)
                            .with(focal_key.clone(), Change::counts(f3, f9))
                            .with(donor_key.clone(), Change::counts(d3, d9))
                    })
                })
        }))
    }
}
