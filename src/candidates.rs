//! Candidate sites for sandbox placements, derived from hotspot clusters.

use crate::config::SearchConfig;
use crate::problem::{Coordinates, GeneralData, MapEntity};
use crate::spatial::DistanceCache;
use log::info;
use std::collections::{BTreeMap, HashMap, HashSet};

fn hotspot_key(index: usize) -> String {
    format!("hotspot{:04}", index)
}

/// Collects sites, skipping positions that fall into an already used grid cell.
struct SiteCollector<'a> {
    map: &'a MapEntity,
    granularity: f64,
    taken: HashSet<(i64, i64)>,
    sites: BTreeMap<String, Coordinates>,
    next: usize,
}

impl<'a> SiteCollector<'a> {
    fn new(map: &'a MapEntity, granularity: f64) -> Self {
        SiteCollector {
            map,
            granularity,
            taken: HashSet::new(),
            sites: BTreeMap::new(),
            next: 1,
        }
    }

    fn add(&mut self, position: Coordinates, label: &str) {
        let position = self.map.border.clamp(position);
        let cell = (
            (position.latitude * self.granularity) as i64,
            (position.longitude * self.granularity) as i64,
        );
        if self.taken.insert(cell) {
            self.sites
                .insert(format!("c_{}_{}", label, self.next), position);
            self.next += 1;
        }
    }
}

/// Falls back to the plain mean when no point carries weight.
fn weighted_average(points: &[(Coordinates, f64)]) -> Coordinates {
    let weighted = points.iter().map(|(_, w)| w).sum::<f64>() > 0.0;
    let weight = |w: f64| if weighted { w } else { 1.0 };
    let total: f64 = points.iter().map(|(_, w)| weight(*w)).sum();
    let latitude = points.iter().map(|(p, w)| p.latitude * weight(*w)).sum::<f64>();
    let longitude = points.iter().map(|(p, w)| p.longitude * weight(*w)).sum::<f64>();
    Coordinates::new(latitude / total, longitude / total)
}

/// Build the sandbox candidate set.
///
/// For every hotspot this proposes the weighted midpoint with each hotspot
/// inside the willingness radius, the weighted centroid of that whole cluster,
/// and the hotspot itself. Weights are `footfall / spread`.
pub fn candidate_sites(
    map: &MapEntity,
    general: &GeneralData,
    config: &SearchConfig,
) -> BTreeMap<String, Coordinates> {
    let keys: Vec<String> = (0..map.hotspots.len()).map(hotspot_key).collect();
    let positions: BTreeMap<String, Coordinates> = keys
        .iter()
        .cloned()
        .zip(map.hotspots.iter().map(|hotspot| hotspot.position()))
        .collect();
    let index_of: HashMap<&str, usize> = keys
        .iter()
        .enumerate()
        .map(|(i, key)| (key.as_str(), i))
        .collect();
    let nearby = DistanceCache::build(
        &positions,
        general.willingness_to_travel_in_meters,
        &config.spatial,
    );

    let mut collector = SiteCollector::new(map, config.candidate_granularity);

    // Midpoints with each close hotspot, the cluster centroid, then the hotspot itself
    for (i, hotspot) in map.hotspots.iter().enumerate() {
        let own = (hotspot.position(), hotspot.weight());
        let mut cluster = vec![own];

        for (neighbor_key, _) in nearby.neighbors(&keys[i]) {
            let Some(&j) = index_of.get(neighbor_key.as_str()) else {
                continue;
            };
            let neighbor = (map.hotspots[j].position(), map.hotspots[j].weight());

            collector.add(weighted_average(&[own, neighbor]), "between");
            cluster.push(neighbor);
        }

        collector.add(weighted_average(&cluster), "cluster");
        collector.add(hotspot.position(), "hotspot");
    }

    info!(
        "{} candidate sites from {} hotspots",
        collector.sites.len(),
        map.hotspots.len()
    );
    collector.sites
}
