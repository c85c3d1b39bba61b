use crate::core::stats::LevelTracker;
use crate::core::types::{BufferId, MachineId, Part, SourceId};
use log::trace;
use std::collections::VecDeque;

/// Station that feeds a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feeder {
    Source(SourceId),
    Machine(MachineId),
}

/// Bounded FIFO store between two adjacent stations.
///
/// Admission and withdrawal never suspend: a full or empty buffer simply says no,
/// and the adjacent station retries when the system wakes it after the level changes.
#[derive(Debug, Clone)]
pub struct Buffer {
    pub id: BufferId,
    pub name: String,
    capacity: usize,
    contents: VecDeque<Part>,
    upstream: Feeder,
    downstream: MachineId,
    admitted: u64,
    level: LevelTracker,
}

impl Buffer {
    pub fn new(
        id: BufferId,
        name: String,
        capacity: usize,
        upstream: Feeder,
        downstream: MachineId,
    ) -> Self {
        Self {
            id,
            name,
            capacity,
            contents: VecDeque::with_capacity(capacity.min(1024)),
            upstream,
            downstream,
            admitted: 0,
            level: LevelTracker::new(0.0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn level(&self) -> usize {
        self.contents.len()
    }

    pub fn is_full(&self) -> bool {
        self.contents.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn upstream(&self) -> Feeder {
        self.upstream
    }

    pub fn downstream(&self) -> MachineId {
        self.downstream
    }

    /// Parts admitted since the counters were last reset
    pub fn admitted(&self) -> u64 {
        self.admitted
    }

    pub fn level_tracker(&self) -> &LevelTracker {
        &self.level
    }

    /// Store a part at the back, giving it back when the buffer is full
    pub fn try_admit(&mut self, part: Part, now: f64) -> Result<(), Part> {
        if self.is_full() {
            trace!("[Buffer:{}] full ({}/{}), refusing part {}", self.id, self.level(), self.capacity, part.id);
            return Err(part);
        }

        self.contents.push_back(part);
        self.admitted += 1;
        self.level.record(now, self.contents.len() as f64);
        trace!("[Buffer:{}] admitted part {} ({}/{})", self.id, part.id, self.level(), self.capacity);
        Ok(())
    }

    /// Take the oldest part, if any
    pub fn try_withdraw(&mut self, now: f64) -> Option<Part> {
        let part = self.contents.pop_front()?;
        self.level.record(now, self.contents.len() as f64);
        trace!("[Buffer:{}] released part {} ({}/{})", self.id, part.id, self.level(), self.capacity);
        Some(part)
    }

    /// Restart the statistics window at `now`, keeping the contents
    pub fn reset_counters(&mut self, now: f64) {
        self.admitted = 0;
        self.level.reset(now, self.contents.len() as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(capacity: usize) -> Buffer {
        Buffer::new(BufferId(0), "b".to_string(), capacity, Feeder::Source(SourceId(0)), MachineId(0))
    }

    #[test]
    fn test_fifo_order() {
        let mut b = buffer(3);
        for id in 0..3 {
            assert!(b.try_admit(Part::new(id, 0.0), 0.0).is_ok());
        }
        let ids: Vec<u64> = std::iter::from_fn(|| b.try_withdraw(1.0)).map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_full_buffer_refuses_and_returns_part() {
        let mut b = buffer(1);
        b.try_admit(Part::new(1, 0.0), 0.0).unwrap();
        let refused = b.try_admit(Part::new(2, 0.0), 0.0).unwrap_err();
        assert_eq!(refused.id, 2);
        assert_eq!(b.level(), 1);
        assert_eq!(b.admitted(), 1);
    }

    #[test]
    fn test_empty_buffer_withdraw_is_none() {
        let mut b = buffer(2);
        assert!(b.try_withdraw(0.0).is_none());
        assert_eq!(b.level(), 0);
    }

    #[test]
    fn test_zero_capacity_never_admits() {
        let mut b = buffer(0);
        assert!(b.try_admit(Part::new(0, 0.0), 0.0).is_err());
    }

    #[test]
    fn test_time_weighted_level() {
        let mut b = buffer(5);
        b.try_admit(Part::new(0, 0.0), 0.0).unwrap();
        b.try_admit(Part::new(1, 0.0), 2.0).unwrap();
        b.try_withdraw(4.0);
        // level 1 on [0,2), 2 on [2,4), 1 on [4,6)
        assert!((b.level_tracker().mean(6.0) - (2.0 + 4.0 + 2.0) / 6.0).abs() < 1e-12);
        assert_eq!(b.level_tracker().max(), 2.0);
    }

    #[test]
    fn test_reset_counters_keeps_contents() {
        let mut b = buffer(2);
        b.try_admit(Part::new(0, 0.0), 0.0).unwrap();
        b.try_admit(Part::new(1, 0.0), 1.0).unwrap();
        b.reset_counters(5.0);

        assert_eq!(b.admitted(), 0);
        assert_eq!(b.level(), 2);
        assert_eq!(b.level_tracker().current(), 2.0);
        assert_eq!(b.level_tracker().mean(10.0), 2.0);
        assert_eq!(b.try_admit(Part::new(2, 0.0), 6.0).unwrap_err().id, 2);
        assert_eq!(b.try_withdraw(7.0).map(|p| p.id), Some(0));
        assert_eq!(b.level_tracker().current(), 1.0);
    }
}
