//! Configuration for running independent replications of a line.
//!
//! Controls whether replications run one after another or on a Rayon thread
//! pool, how their seeds are derived and how much wall-clock time they may use.

use std::time::Duration;

/// Enumeration of supported concurrency modes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConcurrencyMode {
    /// Replications run in seed order on the calling thread
    #[default]
    Sequential,
    /// Replications are spread over a Rayon thread pool
    Rayon,
}

/// Configuration for a batch of replications
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// The concurrency mode to use for execution
    pub concurrency_mode: ConcurrencyMode,
    /// The size of the thread pool for parallel execution.
    /// Only relevant when concurrency_mode is Rayon; `None` lets Rayon decide.
    pub thread_pool_size: Option<usize>,
    /// Replication `i` is seeded with `base_seed + i`
    pub base_seed: u64,
    /// Replications not started within this wall-clock budget are skipped
    pub time_budget: Option<Duration>,
}

impl ReplicationConfig {
    /// Sequential execution, seeds starting at zero, no time budget
    pub fn new() -> Self {
        Self {
            concurrency_mode: ConcurrencyMode::default(),
            thread_pool_size: None,
            base_seed: 0,
            time_budget: None,
        }
    }

    /// Run on `jobs` worker threads; one job means sequential execution
    ///
    /// # Arguments
    /// * `jobs` - Number of worker threads; zero and one both run sequentially
    ///
    /// # Returns
    /// A configuration with seeds starting at zero and no time budget
    pub fn with_jobs(jobs: usize) -> Self {
        if jobs > 1 {
            Self::new()
                .with_concurrency(ConcurrencyMode::Rayon)
                .with_thread_pool_size(jobs)
        } else {
            Self::new()
        }
    }

    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency_mode = mode;
        self
    }

    /// Only affects execution when concurrency_mode is Rayon
    pub fn with_thread_pool_size(mut self, size: usize) -> Self {
        self.thread_pool_size = Some(size);
        self
    }

    pub fn with_base_seed(mut self, seed: u64) -> Self {
        self.base_seed = seed;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Seed of the replication at `index`
    pub fn seed_for(&self, index: usize) -> u64 {
        self.base_seed.wrapping_add(index as u64)
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self::new()
    }
}
