use super::config::{ConcurrencyMode, ReplicationConfig};
use super::system::System;
use crate::core::config::LineConfig;
use crate::core::errors::{SimError, SimResult};
use crate::core::stats::{RunSummary, SampleStats};
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;

/// Per-replication summaries of a batch and their aggregate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicationReport {
    /// Completed runs in seed order
    pub runs: Vec<RunSummary>,
    /// Replications never started because the time budget ran out
    pub skipped: usize,
    /// Runs that ended with an empty event queue
    pub deadlocked: usize,
    pub throughput: SampleStats,
    pub total_produced: SampleStats,
    pub availability: SampleStats,
}

impl ReplicationReport {
    fn from_runs(runs: Vec<RunSummary>, skipped: usize) -> Self {
        let collect = |f: fn(&RunSummary) -> f64| runs.iter().map(f).collect::<Vec<_>>();
        let throughput = SampleStats::from_samples(&collect(|r| r.throughput()));
        let total_produced = SampleStats::from_samples(&collect(|r| r.total_produced as f64));
        let availability = SampleStats::from_samples(&collect(|r| r.mean_availability()));
        let deadlocked = runs.iter().filter(|r| !r.outcome.is_completed()).count();
        Self {
            runs,
            skipped,
            deadlocked,
            throughput,
            total_produced,
            availability,
        }
    }
}

/// Run `replications` independent copies of the line and aggregate their results.
///
/// Every replication builds its own [`System`] with seed `base_seed + i`, so results
/// do not depend on the concurrency mode or on thread scheduling.
///
/// # Arguments
/// * `config` - Line shared by every replication
/// * `replications` - Number of runs to start
/// * `warm_up_time` - Warm-up of each run
/// * `simulation_time` - Measurement window of each run
/// * `settings` - Concurrency mode, pool size, base seed and time budget
///
/// # Returns
/// The runs in seed order with their aggregates, or the first error any run raised
pub fn iterate_simulation(
    config: &LineConfig,
    replications: usize,
    warm_up_time: f64,
    simulation_time: f64,
    settings: &ReplicationConfig,
) -> SimResult<ReplicationReport> {
    // Surface configuration errors once, before any worker starts
    System::new(config.clone(), settings.base_seed)?;

    info!(
        "Starting {} replications ({:?}, base seed {})",
        replications, settings.concurrency_mode, settings.base_seed
    );
    let started = Instant::now();
    let run_one = |index: usize| -> SimResult<Option<RunSummary>> {
        if let Some(budget) = settings.time_budget {
            if started.elapsed() >= budget {
                return Ok(None);
            }
        }
        let mut system = System::new(config.clone(), settings.seed_for(index))?;
        system.simulate(warm_up_time, simulation_time, false).map(Some)
    };

    let results: Vec<Option<RunSummary>> = match settings.concurrency_mode {
        ConcurrencyMode::Sequential => (0..replications).map(run_one).collect::<SimResult<_>>()?,
        ConcurrencyMode::Rayon => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(settings.thread_pool_size.unwrap_or(0))
                .build()
                .map_err(|e| SimError::Replication(format!("cannot build thread pool: {}", e)))?;
            pool.install(|| {
                (0..replications)
                    .into_par_iter()
                    .map(run_one)
                    .collect::<SimResult<Vec<_>>>()
            })?
        }
    };

    let runs: Vec<RunSummary> = results.into_iter().flatten().collect();
    let skipped = replications - runs.len();
    if skipped > 0 {
        warn!("Time budget exhausted: {} of {} replications skipped", skipped, replications);
    }
    let report = ReplicationReport::from_runs(runs, skipped);
    info!(
        "Finished {} replications in {:.2?}: mean throughput {:.4} (std dev {:.4})",
        report.runs.len(),
        started.elapsed(),
        report.throughput.mean,
        report.throughput.std_dev
    );
    Ok(report)
}
