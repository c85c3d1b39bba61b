//! Error types for line construction and simulation runs.

use thiserror::Error;

/// Errors raised while building or running a line.
///
/// Operational dynamics (full buffers, failed machines, a saturated maintainer)
/// are never reported here; they are ordinary state transitions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// The line description was rejected before any event was scheduled.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A kernel invariant was violated while running.
    #[error("Invariant violated by {entity}: {detail}")]
    Invariant { entity: String, detail: String },

    /// The replication runner could not be set up.
    #[error("Replication error: {0}")]
    Replication(String),
}

impl SimError {
    pub fn config(msg: impl Into<String>) -> Self {
        SimError::Config(msg.into())
    }

    pub fn invariant(entity: impl ToString, detail: impl Into<String>) -> Self {
        SimError::Invariant {
            entity: entity.to_string(),
            detail: detail.into(),
        }
    }

    /// Prefix a configuration message with the entity it concerns
    pub fn within(self, entity: impl std::fmt::Display) -> Self {
        match self {
            SimError::Config(msg) => SimError::Config(format!("{}: {}", entity, msg)),
            other => other,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, SimError::Config(_))
    }
}

pub type SimResult<T> = Result<T, SimError>;
