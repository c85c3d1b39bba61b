use super::types::{MachineId, SourceId};
use serde::Serialize;
use std::fmt;

/// Timed activity owned by one entity of the line.
///
/// When several events share a timestamp they are dispatched by [`EventKind::rank`]
/// and then by insertion order, so a seeded run always replays the same sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    /// A machine finishes its repair and releases its maintenance slot
    RepairComplete(MachineId),
    /// A machine finishes the cycle of the part it holds
    ProcessingComplete(MachineId),
    /// A source makes its next part available
    Arrival(SourceId),
}

impl EventKind {
    /// Tie-break rank for events at the same time; lower runs first.
    ///
    /// Repair completions precede processing completions, which precede arrivals.
    pub fn rank(&self) -> u8 {
        match self {
            EventKind::RepairComplete(_) => 0,
            EventKind::ProcessingComplete(_) => 1,
            EventKind::Arrival(_) => 2,
        }
    }

    /// Entity that scheduled the event and will handle it
    pub fn subject(&self) -> String {
        match self {
            EventKind::RepairComplete(id) | EventKind::ProcessingComplete(id) => id.to_string(),
            EventKind::Arrival(id) => id.to_string(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::RepairComplete(id) => write!(f, "repair_complete({})", id),
            EventKind::ProcessingComplete(id) => write!(f, "processing_complete({})", id),
            EventKind::Arrival(id) => write!(f, "arrival({})", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Event {
    pub time: f64,
    pub kind: EventKind,
}

impl Event {
    pub fn new(time: f64, kind: EventKind) -> Self {
        Self { time, kind }
    }
}
