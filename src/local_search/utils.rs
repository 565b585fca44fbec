//! Count arithmetic shared by the neighborhoods.

use crate::solution::Placement;

/// Single-location count changes that stay within `0..=max_stations`.
///
/// Order: remove f3, remove f9, f3 -> f9, two f3 -> f9, f9 -> f3, add f3, add f9.
pub fn adjustments(placement: &Placement, max_stations: u32) -> Vec<(i32, i32)> {
    let (f3, f9) = (placement.f3, placement.f9);
    let mut out = Vec::with_capacity(7);

    if f3 > 0 {
        out.push((-1, 0));
    }
    if f9 > 0 {
        out.push((0, -1));
    }
    if f3 > 0 && f9 < max_stations {
        out.push((-1, 1));
    }
    if f3 > 1 && f9 < max_stations {
        out.push((-2, 1));
    }
    if f9 > 0 && f3 < max_stations {
        out.push((1, -1));
    }
    if f3 < max_stations {
        out.push((1, 0));
    }
    if f9 < max_stations {
        out.push((0, 1));
    }

    out
}

/// Ways a focal location can take on one more unit of capacity.
pub fn gains(focal: Option<&Placement>, max_stations: u32) -> Vec<(i32, i32)> {
    let (f3, f9) = focal.map(|p| (p.f3, p.f9)).unwrap_or((0, 0));
    let mut out = Vec::with_capacity(3);

    if f3 < max_stations {
        out.push((1, 0));
    }
    if f9 < max_stations {
        out.push((0, 1));
    }
    if f3 > 0 && f9 < max_stations {
        out.push((-1, 1));
    }

    out
}

/// How a donor gives up capacity: drop an f3100, or downgrade an f9100 when it has none.
pub fn release(donor: &Placement) -> (i32, i32) {
    if donor.f3 == 0 {
        (1, -1)
    } else {
        (-1, 0)
    }
}
