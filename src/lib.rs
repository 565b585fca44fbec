//! # Refill planner
//!
//! Local search for refill station allocations on a game map.
//!
//! Each generation the active [`solver::Solver`] proposes sparse deltas, the
//! scoring model evaluates them in parallel against the current allocation,
//! and the [`search::SearchController`] commits the best one, optionally merged
//! with other non-overlapping improvements. Set pruning skips keys that did not
//! help recently. When nothing improves, pruning is relaxed first and wider
//! neighborhoods are tried before the search stops.
//!
//! Regular maps adjust unit counts at fixed locations. Sandbox maps place new
//! locations at candidate sites derived from footfall hotspots.

pub mod candidates;
pub mod config;
pub mod delta;
pub mod error;
pub mod jiggle;
pub mod local_search;
pub mod pool;
pub mod problem;
pub mod provider;
pub mod scoring;
pub mod search;
pub mod solution;
pub mod solver;
pub mod spatial;
pub mod store;
pub mod utils;

pub use crate::config::{SearchConfig, SpatialConfig};
pub use crate::error::{Error, Result, ScoreError, ValidationError};
pub use crate::search::{Phase, SearchController, SearchState};
pub use crate::solver::{solver_for, RegularSolver, SandboxSolver, Solver};

use crate::provider::{GeneralDataProvider, MapDataProvider};
use crate::store::PersistenceStore;
use crate::utils::SearchStatistics;

/// Load a map, run the search to convergence and persist every commit.
pub fn solve<P>(
    provider: &P,
    map_name: &str,
    config: SearchConfig,
    store: Box<dyn PersistenceStore>,
) -> Result<SearchStatistics>
where
    P: MapDataProvider + GeneralDataProvider,
{
    let map = provider.map(map_name)?;
    let general = provider.general()?;
    let solver = solver_for(map, general, config.clone());

    let mut controller = SearchController::new(solver, config)?.with_store(store);
    controller.run()?;
    Ok(controller.statistics())
}
