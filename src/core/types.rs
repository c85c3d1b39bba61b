use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub usize);

        impl $name {
            /// Position of the entity in its owning collection
            pub fn index(&self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "{}"), self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a part source
    SourceId,
    "Source"
);
entity_id!(
    /// Identifier of a bounded buffer
    BufferId,
    "Buffer"
);
entity_id!(
    /// Identifier of a processing machine
    MachineId,
    "Machine"
);
entity_id!(
    /// Identifier of a part sink
    SinkId,
    "Sink"
);

/// Reference to any node of the routing graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Node {
    Source(SourceId),
    Buffer(BufferId),
    Machine(MachineId),
    Sink(SinkId),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Source(id) => id.fmt(f),
            Node::Buffer(id) => id.fmt(f),
            Node::Machine(id) => id.fmt(f),
            Node::Sink(id) => id.fmt(f),
        }
    }
}

impl From<SourceId> for Node {
    fn from(id: SourceId) -> Self {
        Node::Source(id)
    }
}

impl From<BufferId> for Node {
    fn from(id: BufferId) -> Self {
        Node::Buffer(id)
    }
}

impl From<MachineId> for Node {
    fn from(id: MachineId) -> Self {
        Node::Machine(id)
    }
}

impl From<SinkId> for Node {
    fn from(id: SinkId) -> Self {
        Node::Sink(id)
    }
}

/// Where a machine withdraws its parts from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Source(SourceId),
    Buffer(BufferId),
}

/// Where a machine hands its finished parts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Downstream {
    Buffer(BufferId),
    Sink(SinkId),
}

/// Unit of flow through the line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Part {
    pub id: u64,
    /// Time the part left its source's generator
    pub created_at: f64,
}

impl Part {
    pub fn new(id: u64, created_at: f64) -> Self {
        Self { id, created_at }
    }
}
