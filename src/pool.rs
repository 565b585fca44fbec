//! Bounded worker pool for scoring candidates in parallel.

use crate::error::Result;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// A fixed-size pool running pure maps over a batch.
///
/// Every call blocks until the whole batch is done and returns results in input order.
pub struct ScoringPool {
    pool: ThreadPool,
}

impl ScoringPool {
    pub fn new(workers: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("scoring-{}", i))
            .build()?;
        Ok(ScoringPool { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        self.pool.install(|| items.par_iter().map(|item| f(item)).collect())
    }
}
