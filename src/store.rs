//! Persistence of scored results: full snapshots plus a per-map log of totals.

use crate::error::{Error, Result};
use crate::scoring::ScoredResult;
use crate::utils::format_total;
use log::info;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Append-only storage for committed results.
pub trait PersistenceStore {
    /// Record a result under its map and game id.
    fn store(&mut self, result: &ScoredResult) -> Result<()>;

    /// The highest logged `(integer total, game id)` for a map, if any.
    fn best(&self, map_name: &str) -> Result<Option<(i64, String)>>;

    /// Load a full snapshot by game id.
    fn load(&self, game_id: &str) -> Result<ScoredResult>;
}

/// Snapshots as `<games>/<id>.json`, totals appended to `<logs>/<map>.txt`.
#[derive(Debug, Clone)]
pub struct FileStore {
    games_dir: PathBuf,
    log_dir: PathBuf,
}

impl FileStore {
    /// Create the store, making both directories if needed.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(games_dir: P, log_dir: Q) -> Result<Self> {
        let games_dir = games_dir.as_ref().to_path_buf();
        let log_dir = log_dir.as_ref().to_path_buf();
        fs::create_dir_all(&games_dir)?;
        fs::create_dir_all(&log_dir)?;
        Ok(FileStore { games_dir, log_dir })
    }

    pub fn snapshot_path(&self, game_id: &str) -> PathBuf {
        self.games_dir.join(format!("{}.json", game_id))
    }

    pub fn log_path(&self, map_name: &str) -> PathBuf {
        self.log_dir.join(format!("{}.txt", map_name))
    }
}

/// Largest `(total, id)` line of a log, compared as a pair.
fn parse_best<R: BufRead>(reader: R) -> Result<Option<(i64, String)>> {
    let mut best: Option<(i64, String)> = None;
    for line in reader.lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let (Some(total), Some(id)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(total) = total.parse::<i64>() else {
            continue;
        };
        let entry = (total, id.to_string());
        if best.as_ref().map_or(true, |b| entry > *b) {
            best = Some(entry);
        }
    }
    Ok(best)
}

impl PersistenceStore for FileStore {
    fn store(&mut self, result: &ScoredResult) -> Result<()> {
        let total = result.total();
        info!("{}\t\t{}", format_total(total), result.game_id);

        let file = File::create(self.snapshot_path(&result.game_id))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, result)?;
        writer.flush()?;

        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(&result.map_name))?;
        writeln!(log, "{} {}", total as i64, result.game_id)?;
        Ok(())
    }

    fn best(&self, map_name: &str) -> Result<Option<(i64, String)>> {
        let path = self.log_path(map_name);
        if !path.exists() {
            return Ok(None);
        }
        parse_best(BufReader::new(File::open(path)?))
    }

    fn load(&self, game_id: &str) -> Result<ScoredResult> {
        let path = self.snapshot_path(game_id);
        let file = File::open(&path).map_err(|e| Error::DataUnavailable {
            what: format!("snapshot {}", path.display()),
            reason: e.to_string(),
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Keeps everything in memory; used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    results: Vec<ScoredResult>,
    by_id: HashMap<String, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Stored results in commit order.
    pub fn results(&self) -> &[ScoredResult] {
        &self.results
    }
}

impl PersistenceStore for MemoryStore {
    fn store(&mut self, result: &ScoredResult) -> Result<()> {
        self.by_id
            .insert(result.game_id.clone(), self.results.len());
        self.results.push(result.clone());
        Ok(())
    }

    fn best(&self, map_name: &str) -> Result<Option<(i64, String)>> {
        Ok(self
            .results
            .iter()
            .filter(|result| result.map_name == map_name)
            .map(|result| (result.total() as i64, result.game_id.clone()))
            .max())
    }

    fn load(&self, game_id: &str) -> Result<ScoredResult> {
        self.by_id
            .get(game_id)
            .and_then(|&i| self.results.get(i))
            .cloned()
            .ok_or_else(|| Error::DataUnavailable {
                what: format!("snapshot {}", game_id),
                reason: "not stored".to_string(),
            })
    }
}
