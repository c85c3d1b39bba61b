//! Discrete-event simulation of production lines with machine degradation,
//! condition-based maintenance and a shared repair crew.

pub mod core;

// Re-export commonly used types
pub use crate::core::builder::LineBuilder;
pub use crate::core::components::{MachineStatus, MaintenanceKind, PreventivePolicy, SelectionPolicy, SelectionStrategy};
pub use crate::core::config::{BufferConfig, LineConfig, MachineConfig, MaintainerConfig, SinkConfig, SourceConfig};
pub use crate::core::distributions::TimeDistribution;
pub use crate::core::errors::{SimError, SimResult};
pub use crate::core::event::{Event, EventKind};
pub use crate::core::execution::{
    iterate_simulation, ConcurrencyMode, ReplicationConfig, ReplicationReport, SimulationObserver, System,
};
pub use crate::core::stats::{RunOutcome, RunSummary, SampleStats};
pub use crate::core::types::{BufferId, MachineId, Node, SinkId, SourceId};
