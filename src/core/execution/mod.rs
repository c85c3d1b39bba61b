pub mod config;
pub mod replication;
pub mod system;

pub use config::{ConcurrencyMode, ReplicationConfig};
pub use replication::{iterate_simulation, ReplicationReport};
pub use system::{SimulationObserver, System};
