//! The generation loop: propose, score in parallel, group, commit, relax.

use crate::config::SearchConfig;
use crate::delta::{Delta, Origin, ScoredDelta};
use crate::error::{Error, Result, ScoreError};
use crate::pool::ScoringPool;
use crate::scoring::ScoredResult;
use crate::solution::Allocation;
use crate::solver::Solver;
use crate::store::PersistenceStore;
use crate::utils::{format_total, SearchStatistics};
use log::{debug, info, trace, warn};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Where the controller is in its relaxation ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Cheap neighborhoods with set pruning.
    Exploring,
    /// Set pruning disabled, cheap neighborhoods over every key.
    PrunedRelaxed,
    /// Wide neighborhoods enabled as well.
    Stale,
    Terminal,
}

/// Mutable state carried from one generation to the next.
#[derive(Debug, Clone)]
pub struct SearchState {
    pub allocation: Allocation,
    pub best_total: f64,
    pub best_id: Option<String>,
    pub best_result: Option<ScoredResult>,
    /// Keys touched by an improving delta in the current generation.
    pub good: HashSet<String>,
    /// Keys touched by a non-improving delta.
    pub bad: HashSet<String>,
    /// Keys skipped by the cheap neighborhoods this generation.
    pub ignored: HashSet<String>,
    pub stale: bool,
    pub pruning: bool,
    pub terminal: bool,
}

impl SearchState {
    fn new(allocation: Allocation, pruning: bool) -> Self {
        SearchState {
            allocation,
            best_total: 0.0,
            best_id: None,
            best_result: None,
            good: HashSet::new(),
            bad: HashSet::new(),
            ignored: HashSet::new(),
            stale: false,
            pruning,
            terminal: false,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.terminal {
            Phase::Terminal
        } else if self.stale {
            Phase::Stale
        } else if !self.pruning {
            Phase::PrunedRelaxed
        } else {
            Phase::Exploring
        }
    }
}

/// Summary of one generation.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub generation: u32,
    pub phase: Phase,
    pub candidates: usize,
    pub improving: usize,
    pub ignored: usize,
    pub best_total: f64,
    /// Origin and key count of the committed delta, if any.
    pub committed: Option<(Origin, usize)>,
    /// Keys changed by the committed delta.
    pub changed: Vec<String>,
    /// Keys of every delta merged into the group candidate.
    pub group_members: Vec<Vec<String>>,
    pub elapsed: Duration,
}

/// Drives one solver to convergence.
pub struct SearchController {
    solver: Box<dyn Solver>,
    config: SearchConfig,
    pool: ScoringPool,
    store: Option<Box<dyn PersistenceStore>>,
    state: SearchState,
    history: Vec<GenerationReport>,
    generations: u32,
    commits: u32,
    mega_rounds_left: u32,
    start_time: Instant,
    run_time: Duration,
    initialized: bool,
}

impl SearchController {
    pub fn new(solver: Box<dyn Solver>, config: SearchConfig) -> Result<Self> {
        let pool = ScoringPool::new(config.workers)?;
        debug!("scoring pool started with {} workers", pool.workers());
        let state = SearchState::new(Allocation::new(), config.set_pruning);
        let mega_rounds_left = config.mega_rounds;

        Ok(SearchController {
            solver,
            config,
            pool,
            store: None,
            state,
            history: Vec::new(),
            generations: 0,
            commits: 0,
            mega_rounds_left,
            start_time: Instant::now(),
            run_time: Duration::from_secs(0),
            initialized: false,
        })
    }

    /// Persist every committed result into `store`.
    pub fn with_store(mut self, store: Box<dyn PersistenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn solver(&self) -> &dyn Solver {
        self.solver.as_ref()
    }

    pub fn store(&self) -> Option<&dyn PersistenceStore> {
        self.store.as_deref()
    }

    pub fn history(&self) -> &[GenerationReport] {
        &self.history
    }

    pub fn generations(&self) -> u32 {
        self.generations
    }

    /// Build the starting allocation and score it.
    pub fn initialize(&mut self) -> Result<()> {
        self.start_time = Instant::now();
        let allocation = self.solver.initialize();
        self.state = SearchState::new(allocation, self.config.set_pruning);
        self.initialized = true;

        if self.state.allocation.is_empty() {
            info!("starting {} from an empty allocation", self.solver.map().map_name);
            return Ok(());
        }

        match self.solver.calculate(&self.state.allocation, &Delta::start()) {
            Ok(result) => {
                info!(
                    "starting {} at {} with {} locations",
                    self.solver.map().map_name,
                    format_total(result.total()),
                    self.state.allocation.len()
                );
                if let Some(store) = self.store.as_mut() {
                    store.store(&result)?;
                }
                self.state.best_total = result.total();
                self.state.best_id = Some(result.game_id.clone());
                self.state.best_result = Some(result);
                Ok(())
            }
            Err(Error::Score(ScoreError::NoServedLocations { .. })) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Run generations until the search converges or hits a configured limit.
    pub fn run(&mut self) -> Result<&SearchState> {
        if !self.initialized {
            self.initialize()?;
        }

        while !self.should_terminate() {
            self.step()?;
        }

        self.run_time = self.start_time.elapsed();
        info!(
            "finished {} after {} generations and {} commits, best {}",
            self.solver.map().map_name,
            self.generations,
            self.commits,
            format_total(self.state.best_total)
        );
        Ok(&self.state)
    }

    /// Run a single generation.
    pub fn step(&mut self) -> Result<()> {
        if !self.initialized {
            self.initialize()?;
        }
        if self.state.terminal {
            return Ok(());
        }

        let generation_start = Instant::now();
        self.generations += 1;

        // Keys that only produced losing deltas are skipped while pruning
        if self.state.pruning {
            self.state.ignored = self
                .state
                .bad
                .difference(&self.state.good)
                .cloned()
                .collect();
        } else {
            self.state.ignored.clear();
        }
        self.state.good.clear();
        let phase = self.state.phase();

        // Generate candidates
        let deltas: Vec<Delta> = self
            .solver
            .list_actions(&self.state.allocation, &self.state.ignored, self.state.stale)
            .collect();
        let candidate_count = deltas.len();
        debug!(
            "generation {} ({:?}): {} candidates, {} ignored keys",
            self.generations,
            phase,
            candidate_count,
            self.state.ignored.len()
        );

        // Nothing to try: relax pruning first, stop if it is already off
        if deltas.is_empty() {
            if self.state.pruning {
                warn!("no candidates left, disabling set pruning");
                self.state.pruning = false;
            } else {
                warn!("no candidates left with set pruning disabled, stopping");
                self.state.terminal = true;
            }
            self.record(generation_start, phase, 0, 0, None, Vec::new());
            return Ok(());
        }

        // Evaluate all candidates in parallel
        let mut scored = self.score_all(deltas)?;

        // Split into improving and losing deltas
        let best_total = self.state.best_total;
        let mut improving: Vec<&ScoredDelta> = Vec::new();
        for candidate in &scored {
            if candidate.total() > best_total {
                self.state.good.extend(candidate.delta.keys().cloned());
                improving.push(candidate);
            } else {
                self.state.bad.extend(candidate.delta.keys().cloned());
            }
        }
        let improving_count = improving.len();

        // Merged candidates
        let mut extras = Vec::new();
        let mut group_members = Vec::new();
        if self.config.groups && improving.len() >= 2 {
            let (group, members) = self.build_group(&improving);
            group_members = members;
            extras.push(group);
        }
        if self.mega_rounds_left > 0 && improving.len() >= 2 {
            let mut mega = Delta::new(Origin::Group);
            for candidate in &improving {
                mega.merge(&candidate.delta);
            }
            extras.push(mega);
        }
        self.mega_rounds_left = self.mega_rounds_left.saturating_sub(1);

        for delta in extras {
            if let Some(candidate) = self.score_one(delta)? {
                scored.push(candidate);
            }
        }

        // Commit the best candidate, or relax when nothing improves
        let mut committed = None;
        match best_candidate(&scored) {
            Some(index) if scored[index].total() > self.state.best_total => {
                let winner = scored.swap_remove(index);
                committed = Some(winner.delta.clone());
                self.commit(winner)?;
            }
            _ => self.relax(),
        }

        self.record(
            generation_start,
            phase,
            candidate_count,
            improving_count,
            committed.as_ref(),
            group_members,
        );
        Ok(())
    }

    fn score_all(&self, deltas: Vec<Delta>) -> Result<Vec<ScoredDelta>> {
        let solver = self.solver.as_ref();
        let allocation = &self.state.allocation;
        let results = self
            .pool
            .map(&deltas, |delta| solver.calculate(allocation, delta));

        let mut scored = Vec::with_capacity(deltas.len());
        for (delta, result) in deltas.into_iter().zip(results) {
            if let Some(result) = discard_invalid(&delta, result)? {
                scored.push(ScoredDelta::new(delta, result));
            }
        }
        Ok(scored)
    }

    fn score_one(&self, delta: Delta) -> Result<Option<ScoredDelta>> {
        let result = self.solver.calculate(&self.state.allocation, &delta);
        Ok(discard_invalid(&delta, result)?.map(|result| ScoredDelta::new(delta, result)))
    }

    /// Merge the best improving deltas whose keys (and nearby keys) do not overlap.
    fn build_group(&self, improving: &[&ScoredDelta]) -> (Delta, Vec<Vec<String>>) {
        let mut ranked: Vec<&ScoredDelta> = improving.to_vec();
        ranked.sort_by(|a, b| b.total().total_cmp(&a.total()));

        let distances = self.solver.distances();
        let mut claimed: HashSet<&str> = HashSet::new();
        let mut group = Delta::new(Origin::Group);
        let mut members = Vec::new();
        let mut pick_count = 0;

        for candidate in ranked {
            // Skip deltas touching anything already claimed
            if candidate.delta.keys().any(|key| claimed.contains(key.as_str())) {
                continue;
            }
            // Claim the keys and everything close to them
            for key in candidate.delta.keys() {
                claimed.insert(key.as_str());
                for (neighbor, distance) in distances.neighbors(key) {
                    if distance < self.config.group_distance_limit {
                        claimed.insert(neighbor.as_str());
                    }
                }
            }
            group.merge(&candidate.delta);
            members.push(candidate.delta.keys().cloned().collect());
            pick_count += candidate.delta.len();
            if pick_count >= self.config.group_size {
                break;
            }
        }

        debug!(
            "group candidate merges {} deltas over {} keys",
            members.len(),
            group.len()
        );
        (group, members)
    }

    fn commit(&mut self, winner: ScoredDelta) -> Result<()> {
        let previous = self.state.best_total;
        self.state.allocation.apply(
            &winner.delta,
            self.config.max_stations,
            self.config.auto_remove,
        );
        if let Some(store) = self.store.as_mut() {
            store.store(&winner.result)?;
        }

        info!(
            "generation {}: {} -> {} via {:?} over {} keys",
            self.generations,
            format_total(previous),
            format_total(winner.total()),
            winner.delta.origin,
            winner.delta.len()
        );

        self.state.best_total = winner.total();
        self.state.best_id = Some(winner.id().to_string());
        self.state.stale = false;
        self.commits += 1;
        self.solver
            .post_improvement(&self.state.allocation, &winner.delta);
        self.unsuppress(&winner.delta);
        self.state.best_result = Some(winner.result);
        Ok(())
    }

    /// Changed keys and their neighbors are worth looking at again.
    fn unsuppress(&mut self, delta: &Delta) {
        let distances = self.solver.distances();
        for key in delta.keys() {
            self.state.bad.remove(key);
            for (neighbor, _) in distances.neighbors(key) {
                self.state.bad.remove(neighbor);
            }
        }
    }

    fn relax(&mut self) {
        if self.state.pruning {
            info!("no improvement, disabling set pruning");
            self.state.pruning = false;
        } else if !self.state.stale {
            info!("no improvement, enabling wide neighborhoods");
            self.state.stale = true;
        } else {
            info!("no improvement with wide neighborhoods, converged");
            self.state.terminal = true;
        }
    }

    fn record(
        &mut self,
        start: Instant,
        phase: Phase,
        candidates: usize,
        improving: usize,
        committed: Option<&Delta>,
        group_members: Vec<Vec<String>>,
    ) {
        self.history.push(GenerationReport {
            generation: self.generations,
            phase,
            candidates,
            improving,
            ignored: self.state.ignored.len(),
            best_total: self.state.best_total,
            committed: committed.map(|delta| (delta.origin, delta.len())),
            changed: committed
                .map(|delta| delta.keys().cloned().collect())
                .unwrap_or_default(),
            group_members,
            elapsed: start.elapsed(),
        });
    }

    fn should_terminate(&self) -> bool {
        if self.state.terminal {
            return true;
        }

        if let Some(max_generations) = self.config.max_generations {
            if self.generations >= max_generations {
                return true;
            }
        }

        if let Some(time_limit) = self.config.time_limit {
            if self.start_time.elapsed() >= time_limit {
                return true;
            }
        }

        false
    }

    pub fn statistics(&self) -> SearchStatistics {
        let runtime = if self.run_time.is_zero() {
            self.start_time.elapsed()
        } else {
            self.run_time
        };
        SearchStatistics {
            map_name: self.solver.map().map_name.clone(),
            generations: self.generations,
            commits: self.commits,
            runtime,
            best_total: self.state.best_total,
            best_id: self.state.best_id.clone(),
            locations: self.state.allocation.len(),
            converged: self.state.terminal,
        }
    }
}

/// Index of the first highest-scoring candidate.
fn best_candidate(scored: &[ScoredDelta]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, candidate) in scored.iter().enumerate() {
        match best {
            Some(b) if scored[b].total() >= candidate.total() => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Candidates that cannot be scored as a valid allocation are dropped, anything
/// else is a real failure.
fn discard_invalid(delta: &Delta, result: Result<ScoredResult>) -> Result<Option<ScoredResult>> {
    match result {
        Ok(result) => Ok(Some(result)),
        Err(Error::Score(ScoreError::NoServedLocations { .. })) => {
            trace!("dropping {:?} delta that leaves nothing served", delta.origin);
            Ok(None)
        }
        Err(Error::Validation(e)) => {
            trace!("dropping invalid {:?} delta: {}", delta.origin, e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
