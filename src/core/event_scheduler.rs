use super::errors::{SimError, SimResult};
use super::event::{Event, EventKind};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug)]
pub struct ScheduledEvent {
    pub sequence_num: u64,
    pub event: Event,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (BinaryHeap is max-heap by default)
        other
            .event
            .time
            .total_cmp(&self.event.time)
            .then_with(|| other.event.kind.rank().cmp(&self.event.kind.rank()))
            .then_with(|| other.sequence_num.cmp(&self.sequence_num))
    }
}

/// Pending-event queue and logical clock of one run
#[derive(Debug, Default)]
pub struct EventScheduler {
    event_queue: BinaryHeap<ScheduledEvent>,
    sequence_counter: u64,
    now: f64,
}

impl EventScheduler {
    /// Create a new EventScheduler with the clock at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical time
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Schedule an event at an absolute time, which may equal but never precede `now`
    pub fn schedule(&mut self, time: f64, kind: EventKind) -> SimResult<()> {
        if !time.is_finite() || time < self.now {
            return Err(SimError::invariant(
                kind.subject(),
                format!("{} scheduled at t={} while clock is at t={}", kind, time, self.now),
            ));
        }

        self.event_queue.push(ScheduledEvent {
            sequence_num: self.sequence_counter,
            event: Event::new(time, kind),
        });
        self.sequence_counter += 1;
        Ok(())
    }

    /// Remove the earliest event and advance the clock to its time
    pub fn next(&mut self) -> Option<Event> {
        let scheduled = self.event_queue.pop()?;
        self.now = scheduled.event.time;
        Some(scheduled.event)
    }

    /// Get the next event time without removing it
    pub fn peek_time(&self) -> Option<f64> {
        self.event_queue.peek().map(|scheduled| scheduled.event.time)
    }

    /// Move the clock forward without dispatching anything
    pub fn advance_to(&mut self, time: f64) {
        if time > self.now {
            self.now = time;
        }
    }

    /// Check if there are any events remaining in the queue
    pub fn has_events(&self) -> bool {
        !self.event_queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.event_queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.event_queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{MachineId, SourceId};

    #[test]
    fn test_events_come_out_in_time_order() {
        let mut scheduler = EventScheduler::new();
        scheduler.schedule(5.0, EventKind::Arrival(SourceId(0))).unwrap();
        scheduler.schedule(1.0, EventKind::ProcessingComplete(MachineId(0))).unwrap();
        scheduler.schedule(3.0, EventKind::RepairComplete(MachineId(1))).unwrap();

        let times: Vec<f64> = std::iter::from_fn(|| scheduler.next()).map(|e| e.time).collect();
        assert_eq!(times, vec![1.0, 3.0, 5.0]);
        assert_eq!(scheduler.now(), 5.0);
    }

    #[test]
    fn test_same_time_ties_follow_kind_rank() {
        let mut scheduler = EventScheduler::new();
        scheduler.schedule(2.0, EventKind::Arrival(SourceId(0))).unwrap();
        scheduler.schedule(2.0, EventKind::ProcessingComplete(MachineId(0))).unwrap();
        scheduler.schedule(2.0, EventKind::RepairComplete(MachineId(1))).unwrap();

        let kinds: Vec<EventKind> = std::iter::from_fn(|| scheduler.next()).map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::RepairComplete(MachineId(1)),
                EventKind::ProcessingComplete(MachineId(0)),
                EventKind::Arrival(SourceId(0)),
            ]
        );
    }

    #[test]
    fn test_same_time_same_kind_is_fifo() {
        let mut scheduler = EventScheduler::new();
        for id in [3, 1, 2] {
            scheduler.schedule(4.0, EventKind::ProcessingComplete(MachineId(id))).unwrap();
        }

        let ids: Vec<EventKind> = std::iter::from_fn(|| scheduler.next()).map(|e| e.kind).collect();
        assert_eq!(
            ids,
            vec![
                EventKind::ProcessingComplete(MachineId(3)),
                EventKind::ProcessingComplete(MachineId(1)),
                EventKind::ProcessingComplete(MachineId(2)),
            ]
        );
    }

    #[test]
    fn test_scheduling_in_the_past_is_an_invariant_violation() {
        let mut scheduler = EventScheduler::new();
        scheduler.schedule(10.0, EventKind::Arrival(SourceId(0))).unwrap();
        scheduler.next();

        let err = scheduler
            .schedule(9.5, EventKind::ProcessingComplete(MachineId(4)))
            .unwrap_err();
        match err {
            SimError::Invariant { entity, .. } => assert_eq!(entity, "Machine4"),
            other => panic!("unexpected error {other:?}"),
        }
        // Scheduling at the current instant is fine
        assert!(scheduler.schedule(10.0, EventKind::Arrival(SourceId(0))).is_ok());
    }

    #[test]
    fn test_empty_queue_returns_none() {
        let mut scheduler = EventScheduler::new();
        assert!(scheduler.next().is_none());
        assert!(!scheduler.has_events());
        assert_eq!(scheduler.peek_time(), None);
    }
}
