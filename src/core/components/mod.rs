pub mod buffer;
pub mod degradation;
pub mod machine;
pub mod maintainer;
pub mod sink;
pub mod source;

// Re-export commonly used types
pub use buffer::{Buffer, Feeder};
pub use degradation::DegradationChain;
pub use machine::{Activity, Health, Machine, MachineStatus, MaintenanceModel, PreventivePolicy};
pub use maintainer::{
    CorrectiveFirst, Fifo, MaintenanceKind, MaintenanceRequest, Maintainer, RequestOutcome, SelectionPolicy,
    SelectionStrategy, ShortestRepairFirst,
};
pub use sink::Sink;
pub use source::{Source, SourceOutlet};
