//! Run statistics: time-weighted accumulators and the plain numeric summaries a run exposes.

use crate::core::components::machine::MachineStatus;
use crate::core::event::Event;
use serde::Serialize;

/// Time-weighted integral of a piecewise-constant level (buffer occupancy, busy slots)
#[derive(Debug, Clone, PartialEq)]
pub struct LevelTracker {
    since: f64,
    last_change: f64,
    value: f64,
    area: f64,
    max: f64,
}

impl LevelTracker {
    pub fn new(start: f64) -> Self {
        Self {
            since: start,
            last_change: start,
            value: 0.0,
            area: 0.0,
            max: 0.0,
        }
    }

    /// Record that the level changed to `value` at time `now`
    pub fn record(&mut self, now: f64, value: f64) {
        self.area += self.value * (now - self.last_change);
        self.last_change = now;
        self.value = value;
        self.max = self.max.max(value);
    }

    /// Drop everything accumulated so far and start a new window at `now`
    pub fn reset(&mut self, now: f64, value: f64) {
        self.since = now;
        self.last_change = now;
        self.value = value;
        self.area = 0.0;
        self.max = value;
    }

    pub fn current(&self) -> f64 {
        self.value
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Integral of the level over `[since, end]`
    pub fn area(&self, end: f64) -> f64 {
        self.area + self.value * (end - self.last_change).max(0.0)
    }

    /// Time-average of the level over `[since, end]`
    pub fn mean(&self, end: f64) -> f64 {
        let span = end - self.since;
        if span > 0.0 {
            self.area(end) / span
        } else {
            self.value
        }
    }
}

/// Accumulated time a machine spent in each status
#[derive(Debug, Clone, PartialEq)]
pub struct StatusTimer {
    current: MachineStatus,
    last_change: f64,
    totals: [f64; MachineStatus::COUNT],
}

impl StatusTimer {
    pub fn new(start: f64, status: MachineStatus) -> Self {
        Self {
            current: status,
            last_change: start,
            totals: [0.0; MachineStatus::COUNT],
        }
    }

    pub fn current(&self) -> MachineStatus {
        self.current
    }

    /// Switch to `status` at `now`; returns true when the status actually changed
    pub fn transition(&mut self, now: f64, status: MachineStatus) -> bool {
        if status == self.current {
            return false;
        }
        self.totals[self.current.index()] += now - self.last_change;
        self.current = status;
        self.last_change = now;
        true
    }

    pub fn reset(&mut self, now: f64) {
        self.totals = [0.0; MachineStatus::COUNT];
        self.last_change = now;
    }

    /// Time spent in `status` up to `end`
    pub fn time_in(&self, status: MachineStatus, end: f64) -> f64 {
        let mut total = self.totals[status.index()];
        if status == self.current {
            total += (end - self.last_change).max(0.0);
        }
        total
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum RunOutcome {
    /// The clock reached `warm_up_time + simulation_time`
    Completed,
    /// The event queue emptied before the time bound; nothing could ever happen again
    Deadlocked { at: f64 },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStats {
    pub name: String,
    /// Parts that left the source during the measurement window
    pub released: u64,
    /// Parts that left the source since time zero
    pub released_total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkStats {
    pub name: String,
    /// Parts received during the measurement window
    pub received: u64,
    /// Parts received since time zero
    pub received_total: u64,
    /// Mean time between leaving the source and reaching the sink, measured parts only
    pub mean_time_in_system: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BufferStats {
    pub name: String,
    pub capacity: usize,
    pub mean_level: f64,
    pub max_level: f64,
    pub admitted: u64,
    pub final_level: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineStats {
    pub name: String,
    pub parts_produced: u64,
    pub idle_time: f64,
    pub processing_time: f64,
    pub blocked_time: f64,
    pub waiting_for_maintenance_time: f64,
    pub down_time: f64,
    pub repair_time: f64,
    /// Fraction of the window spent processing
    pub utilization: f64,
    /// Fraction of the window the machine was able to process
    pub availability: f64,
    pub failures: u64,
    pub preventive_repairs: u64,
    pub corrective_repairs: u64,
    pub final_degradation_state: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintainerStats {
    pub capacity: usize,
    pub requests: u64,
    pub grants: u64,
    /// Time-average number of occupied repair slots
    pub mean_busy_slots: f64,
    pub queued_at_end: usize,
}

/// Degradation and status history of one machine, recorded when `collect_data` is set
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MachineTrace {
    pub degradation: Vec<(f64, usize)>,
    pub status: Vec<(f64, MachineStatus)>,
}

/// Everything recorded when `collect_data` is set
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunTrace {
    pub machines: Vec<MachineTrace>,
    pub buffer_levels: Vec<Vec<(f64, usize)>>,
    pub events: Vec<Event>,
}

/// Aggregated numbers of one run, ready for any reporting layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub seed: u64,
    pub outcome: RunOutcome,
    pub warm_up_time: f64,
    pub simulation_time: f64,
    /// Length of the measurement window actually simulated
    pub measured_time: f64,
    pub end_time: f64,
    pub events_processed: u64,
    /// Parts received by all sinks during the measurement window
    pub total_produced: u64,
    pub sources: Vec<SourceStats>,
    pub sinks: Vec<SinkStats>,
    pub machines: Vec<MachineStats>,
    pub buffers: Vec<BufferStats>,
    pub maintainer: MaintainerStats,
    pub trace: Option<RunTrace>,
}

impl RunSummary {
    /// Parts per unit of time over the measurement window
    pub fn throughput(&self) -> f64 {
        if self.measured_time > 0.0 {
            self.total_produced as f64 / self.measured_time
        } else {
            0.0
        }
    }

    /// Mean availability across machines
    pub fn mean_availability(&self) -> f64 {
        if self.machines.is_empty() {
            return 1.0;
        }
        self.machines.iter().map(|m| m.availability).sum::<f64>() / self.machines.len() as f64
    }
}

/// Mean and spread of one measure across replications
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SampleStats {
    pub count: usize,
    pub mean: f64,
    /// Sample variance (n - 1 denominator); zero for fewer than two samples
    pub variance: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl SampleStats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let count = samples.len();
        if count == 0 {
            return Self::default();
        }
        let mean = samples.iter().sum::<f64>() / count as f64;
        let variance = if count > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count - 1) as f64
        } else {
            0.0
        };
        Self {
            count,
            mean,
            variance,
            std_dev: variance.sqrt(),
            min: samples.iter().cloned().fold(f64::INFINITY, f64::min),
            max: samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}
