use crate::core::types::{Part, SinkId};

/// End of the line: accepts every part and counts it
#[derive(Debug, Clone)]
pub struct Sink {
    pub id: SinkId,
    pub name: String,
    received: u64,
    received_total: u64,
    time_in_system: f64,
}

impl Sink {
    pub fn new(id: SinkId, name: String) -> Self {
        Self {
            id,
            name,
            received: 0,
            received_total: 0,
            time_in_system: 0.0,
        }
    }

    pub fn accept(&mut self, part: Part, now: f64) {
        self.received += 1;
        self.received_total += 1;
        self.time_in_system += now - part.created_at;
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn received_total(&self) -> u64 {
        self.received_total
    }

    pub fn mean_time_in_system(&self) -> f64 {
        if self.received == 0 {
            0.0
        } else {
            self.time_in_system / self.received as f64
        }
    }

    pub fn reset_counters(&mut self) {
        self.received = 0;
        self.time_in_system = 0.0;
    }
}
