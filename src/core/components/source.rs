use crate::core::distributions::Sampler;
use crate::core::types::{BufferId, MachineId, Part, SourceId};

/// Where a source's parts go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutlet {
    /// The source pushes each part into one buffer
    Buffer(BufferId),
    /// One or more machines pull parts straight from the source
    Machines(Vec<MachineId>),
}

/// Infinite supply of parts released at an interarrival cadence.
///
/// A source holds at most one generated part. The next arrival is timed from the
/// moment the held part leaves, so a stalled source never drops or piles up parts.
#[derive(Debug, Clone)]
pub struct Source {
    pub id: SourceId,
    pub name: String,
    interarrival: Sampler,
    outlet: SourceOutlet,
    held: Option<Part>,
    released: u64,
    released_total: u64,
}

impl Source {
    pub fn new(id: SourceId, name: String, interarrival: Sampler, outlet: SourceOutlet) -> Self {
        Self {
            id,
            name,
            interarrival,
            outlet,
            held: None,
            released: 0,
            released_total: 0,
        }
    }

    pub fn outlet(&self) -> &SourceOutlet {
        &self.outlet
    }

    pub fn interarrival(&self) -> &Sampler {
        &self.interarrival
    }

    pub fn has_part(&self) -> bool {
        self.held.is_some()
    }

    /// Store a newly generated part; false if one is already waiting
    pub fn generate(&mut self, part: Part) -> bool {
        if self.held.is_some() {
            return false;
        }
        self.held = Some(part);
        true
    }

    /// Hand the waiting part to the next station
    pub fn release(&mut self) -> Option<Part> {
        let part = self.held.take()?;
        self.released += 1;
        self.released_total += 1;
        Some(part)
    }

    /// The waiting part, left in place
    pub fn peek(&self) -> Option<Part> {
        self.held
    }

    pub fn released(&self) -> u64 {
        self.released
    }

    pub fn released_total(&self) -> u64 {
        self.released_total
    }

    pub fn reset_counters(&mut self) {
        self.released = 0;
    }
}
