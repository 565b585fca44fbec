//! Sources of map and general data, and the submission seam.

use crate::error::{Error, Result};
use crate::problem::{GeneralData, MapEntity};
use crate::scoring::ScoredResult;
use crate::solution::Allocation;
use crate::solver::Solver;
use crate::utils::format_total;
use log::info;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub trait MapDataProvider {
    fn map(&self, map_name: &str) -> Result<MapEntity>;
}

pub trait GeneralDataProvider {
    fn general(&self) -> Result<GeneralData>;
}

/// Hands a finished allocation to the game server. One shot, no retry.
pub trait SubmissionClient {
    fn submit(&mut self, map_name: &str, allocation: &Allocation) -> Result<ScoredResult>;
}

/// Reads `<dir>/<map>.json` and `<dir>/general.json` as the game API publishes them.
#[derive(Debug, Clone)]
pub struct JsonFileProvider {
    dir: PathBuf,
}

impl JsonFileProvider {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        JsonFileProvider {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn read<T: DeserializeOwned>(&self, file_name: &str, what: &str) -> Result<T> {
        let path = self.dir.join(file_name);
        let unavailable = |reason: String| Error::DataUnavailable {
            what: what.to_string(),
            reason,
        };
        let file = File::open(&path)
            .map_err(|e| unavailable(format!("{}: {}", path.display(), e)))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| unavailable(format!("{}: {}", path.display(), e)))
    }
}

impl MapDataProvider for JsonFileProvider {
    fn map(&self, map_name: &str) -> Result<MapEntity> {
        self.read(&format!("{}.json", map_name), &format!("map data for {}", map_name))
    }
}

impl GeneralDataProvider for JsonFileProvider {
    fn general(&self) -> Result<GeneralData> {
        self.read("general.json", "general game data")
    }
}

/// Verify locally, then submit. Validation failures never reach the client.
pub fn submit_allocation(
    solver: &dyn Solver,
    client: &mut dyn SubmissionClient,
    allocation: &Allocation,
) -> Result<ScoredResult> {
    let local = solver.verify(allocation)?;
    let map_name = &solver.map().map_name;
    info!("submitting {} with local total {}", map_name, format_total(local.total()));
    client.submit(map_name, allocation)
}
