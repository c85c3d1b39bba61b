use crate::core::errors::{SimError, SimResult};
use crate::core::stats::LevelTracker;
use crate::core::types::MachineId;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaintenanceKind {
    /// Condition-based repair of a degraded but working machine
    Preventive,
    /// Mandatory repair of a failed machine
    Corrective,
}

/// Outstanding maintenance request of one machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MaintenanceRequest {
    pub machine: MachineId,
    pub kind: MaintenanceKind,
    pub requested_at: f64,
    /// Arrival order at the maintainer; breaks ties between equal timestamps
    pub sequence: u64,
    /// Mean of the repair distribution matching `kind`
    pub expected_duration: f64,
}

/// Picks which pending request gets the next free repair slot.
///
/// `queue` is never empty and is ordered by arrival. Implementations return an index
/// into it; the maintainer handles everything else.
pub trait SelectionPolicy: Debug + Send + Sync {
    fn select(&self, queue: &[MaintenanceRequest], now: f64) -> usize;
}

/// Earliest request first
#[derive(Debug, Clone, Copy, Default)]
pub struct Fifo;

impl SelectionPolicy for Fifo {
    fn select(&self, queue: &[MaintenanceRequest], _now: f64) -> usize {
        earliest_by(queue, |_| 0.0)
    }
}

/// Failed machines before degraded ones, FIFO within each kind
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrectiveFirst;

impl SelectionPolicy for CorrectiveFirst {
    fn select(&self, queue: &[MaintenanceRequest], _now: f64) -> usize {
        earliest_by(queue, |req| match req.kind {
            MaintenanceKind::Corrective => 0.0,
            MaintenanceKind::Preventive => 1.0,
        })
    }
}

/// Shortest expected repair first, FIFO among equal expectations
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortestRepairFirst;

impl SelectionPolicy for ShortestRepairFirst {
    fn select(&self, queue: &[MaintenanceRequest], _now: f64) -> usize {
        earliest_by(queue, |req| req.expected_duration)
    }
}

/// Index of the minimum of (key, requested_at, sequence)
fn earliest_by<F: Fn(&MaintenanceRequest) -> f64>(queue: &[MaintenanceRequest], key: F) -> usize {
    queue
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            key(a)
                .total_cmp(&key(b))
                .then_with(|| a.requested_at.total_cmp(&b.requested_at))
                .then_with(|| a.sequence.cmp(&b.sequence))
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Built-in selection strategies that can be named in a config file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    #[default]
    Fifo,
    CorrectiveFirst,
    ShortestRepairFirst,
}

impl SelectionStrategy {
    pub fn policy(&self) -> Arc<dyn SelectionPolicy> {
        match self {
            SelectionStrategy::Fifo => Arc::new(Fifo),
            SelectionStrategy::CorrectiveFirst => Arc::new(CorrectiveFirst),
            SelectionStrategy::ShortestRepairFirst => Arc::new(ShortestRepairFirst),
        }
    }
}

/// Answer to a maintenance request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RequestOutcome {
    Granted(MaintenanceRequest),
    Queued,
}

/// Capacity-limited pool of repair slots shared by every machine of a line
#[derive(Debug, Clone)]
pub struct Maintainer {
    capacity: usize,
    queue: Vec<MaintenanceRequest>,
    in_service: BTreeSet<MachineId>,
    policy: Arc<dyn SelectionPolicy>,
    sequence: u64,
    requests: u64,
    grants: u64,
    busy: LevelTracker,
}

impl Maintainer {
    pub fn new(capacity: usize, policy: Arc<dyn SelectionPolicy>) -> Self {
        Self {
            capacity,
            queue: Vec::new(),
            in_service: BTreeSet::new(),
            policy,
            sequence: 0,
            requests: 0,
            grants: 0,
            busy: LevelTracker::new(0.0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free_slots(&self) -> usize {
        self.capacity - self.in_service.len()
    }

    pub fn queue(&self) -> &[MaintenanceRequest] {
        &self.queue
    }

    pub fn in_service(&self) -> &BTreeSet<MachineId> {
        &self.in_service
    }

    pub fn is_queued(&self, machine: MachineId) -> bool {
        self.queue.iter().any(|req| req.machine == machine)
    }

    pub fn is_in_service(&self, machine: MachineId) -> bool {
        self.in_service.contains(&machine)
    }

    /// Ask for a repair slot; granted at once when one is free, queued otherwise
    pub fn request(
        &mut self,
        machine: MachineId,
        kind: MaintenanceKind,
        expected_duration: f64,
        now: f64,
    ) -> SimResult<RequestOutcome> {
        if self.is_queued(machine) || self.is_in_service(machine) {
            return Err(SimError::invariant(
                machine,
                "requested maintenance while already queued or in service",
            ));
        }

        let request = MaintenanceRequest {
            machine,
            kind,
            requested_at: now,
            sequence: self.sequence,
            expected_duration,
        };
        self.sequence += 1;
        self.requests += 1;

        if self.free_slots() > 0 {
            self.grant(request, now)?;
            Ok(RequestOutcome::Granted(request))
        } else {
            debug!("[Maintainer] queued {:?} request from {} ({} waiting)", kind, machine, self.queue.len() + 1);
            self.queue.push(request);
            Ok(RequestOutcome::Queued)
        }
    }

    /// Upgrade a queued request to corrective, keeping its place in line
    pub fn escalate(&mut self, machine: MachineId, expected_duration: f64) -> SimResult<()> {
        let request = self
            .queue
            .iter_mut()
            .find(|req| req.machine == machine)
            .ok_or_else(|| SimError::invariant(machine, "escalated a request that is not queued"))?;
        request.kind = MaintenanceKind::Corrective;
        request.expected_duration = expected_duration;
        Ok(())
    }

    /// Free the machine's slot and hand it to the request the policy picks, if any
    pub fn release(&mut self, machine: MachineId, now: f64) -> SimResult<Option<MaintenanceRequest>> {
        if !self.in_service.remove(&machine) {
            return Err(SimError::invariant(machine, "released a repair slot it does not hold"));
        }
        self.busy.record(now, self.in_service.len() as f64);

        if self.queue.is_empty() || self.free_slots() == 0 {
            return Ok(None);
        }

        let index = self.policy.select(&self.queue, now);
        if index >= self.queue.len() {
            return Err(SimError::invariant(
                "Maintainer",
                format!("selection policy picked index {} of {} requests", index, self.queue.len()),
            ));
        }
        let next = self.queue.remove(index);
        self.grant(next, now)?;
        Ok(Some(next))
    }

    fn grant(&mut self, request: MaintenanceRequest, now: f64) -> SimResult<()> {
        if self.in_service.len() >= self.capacity {
            return Err(SimError::invariant(
                request.machine,
                format!("granted a slot beyond capacity {}", self.capacity),
            ));
        }
        self.in_service.insert(request.machine);
        self.grants += 1;
        self.busy.record(now, self.in_service.len() as f64);
        debug!(
            "[Maintainer] granted {:?} repair to {} ({}/{} slots busy)",
            request.kind,
            request.machine,
            self.in_service.len(),
            self.capacity
        );
        Ok(())
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn grants(&self) -> u64 {
        self.grants
    }

    pub fn busy_tracker(&self) -> &LevelTracker {
        &self.busy
    }

    pub fn reset_counters(&mut self, now: f64) {
        self.requests = 0;
        self.grants = 0;
        self.busy.reset(now, self.in_service.len() as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fifo(capacity: usize) -> Maintainer {
        Maintainer::new(capacity, Arc::new(Fifo))
    }

    #[test]
    fn test_capacity_one_grants_first_and_queues_second() {
        let mut m = fifo(1);
        let first = m.request(MachineId(0), MaintenanceKind::Corrective, 10.0, 5.0).unwrap();
        let second = m.request(MachineId(1), MaintenanceKind::Corrective, 10.0, 5.0).unwrap();
        assert!(matches!(first, RequestOutcome::Granted(req) if req.machine == MachineId(0)));
        assert_eq!(second, RequestOutcome::Queued);
        assert!(m.is_in_service(MachineId(0)));
        assert!(m.is_queued(MachineId(1)));

        let next = m.release(MachineId(0), 8.0).unwrap().unwrap();
        assert_eq!(next.machine, MachineId(1));
        assert!(m.queue().is_empty());
        assert_eq!(m.in_service().len(), 1);
    }

    #[test]
    fn test_fifo_respects_request_order_on_equal_timestamps() {
        let mut m = fifo(1);
        for id in [7, 3, 5] {
            m.request(MachineId(id), MaintenanceKind::Preventive, 1.0, 2.0).unwrap();
        }
        assert_eq!(m.release(MachineId(7), 3.0).unwrap().unwrap().machine, MachineId(3));
        assert_eq!(m.release(MachineId(3), 4.0).unwrap().unwrap().machine, MachineId(5));
        assert!(m.release(MachineId(5), 5.0).unwrap().is_none());
    }

    #[test]
    fn test_corrective_first_policy() {
        let mut m = Maintainer::new(1, Arc::new(CorrectiveFirst));
        m.request(MachineId(0), MaintenanceKind::Preventive, 1.0, 0.0).unwrap();
        m.request(MachineId(1), MaintenanceKind::Preventive, 1.0, 1.0).unwrap();
        m.request(MachineId(2), MaintenanceKind::Corrective, 1.0, 2.0).unwrap();
        assert_eq!(m.release(MachineId(0), 3.0).unwrap().unwrap().machine, MachineId(2));
    }

    #[test]
    fn test_shortest_repair_first_policy() {
        let mut m = Maintainer::new(1, SelectionStrategy::ShortestRepairFirst.policy());
        m.request(MachineId(0), MaintenanceKind::Corrective, 1.0, 0.0).unwrap();
        m.request(MachineId(1), MaintenanceKind::Corrective, 30.0, 1.0).unwrap();
        m.request(MachineId(2), MaintenanceKind::Preventive, 5.0, 2.0).unwrap();
        assert_eq!(m.release(MachineId(0), 3.0).unwrap().unwrap().machine, MachineId(2));
    }

    #[test]
    fn test_custom_policy_is_plugged_in() {
        #[derive(Debug)]
        struct LastInFirstOut;
        impl SelectionPolicy for LastInFirstOut {
            fn select(&self, queue: &[MaintenanceRequest], _now: f64) -> usize {
                queue.len() - 1
            }
        }

        let mut m = Maintainer::new(1, Arc::new(LastInFirstOut));
        for id in 0..4 {
            m.request(MachineId(id), MaintenanceKind::Corrective, 1.0, id as f64).unwrap();
        }
        assert_eq!(m.release(MachineId(0), 9.0).unwrap().unwrap().machine, MachineId(3));
    }

    #[test]
    fn test_duplicate_request_is_invariant_violation() {
        let mut m = fifo(1);
        m.request(MachineId(0), MaintenanceKind::Corrective, 1.0, 0.0).unwrap();
        m.request(MachineId(1), MaintenanceKind::Preventive, 1.0, 0.0).unwrap();
        assert!(matches!(
            m.request(MachineId(0), MaintenanceKind::Corrective, 1.0, 1.0),
            Err(SimError::Invariant { .. })
        ));
        assert!(matches!(
            m.request(MachineId(1), MaintenanceKind::Corrective, 1.0, 1.0),
            Err(SimError::Invariant { .. })
        ));
    }

    #[test]
    fn test_release_without_slot_is_invariant_violation() {
        let mut m = fifo(2);
        assert!(m.release(MachineId(4), 0.0).is_err());
    }

    #[test]
    fn test_escalation_keeps_position() {
        let mut m = Maintainer::new(1, Arc::new(CorrectiveFirst));
        m.request(MachineId(0), MaintenanceKind::Corrective, 1.0, 0.0).unwrap();
        m.request(MachineId(1), MaintenanceKind::Preventive, 1.0, 1.0).unwrap();
        m.request(MachineId(2), MaintenanceKind::Corrective, 1.0, 2.0).unwrap();
        m.escalate(MachineId(1), 4.0).unwrap();
        let next = m.release(MachineId(0), 3.0).unwrap().unwrap();
        assert_eq!(next.machine, MachineId(1));
        assert_eq!(next.kind, MaintenanceKind::Corrective);
        assert_eq!(next.requested_at, 1.0);
    }

    #[test]
    fn test_zero_capacity_queues_everything() {
        let mut m = fifo(0);
        assert_eq!(
            m.request(MachineId(0), MaintenanceKind::Corrective, 1.0, 0.0).unwrap(),
            RequestOutcome::Queued
        );
        assert!(m.in_service().is_empty());
    }

    #[test]
    fn test_busy_slots_are_time_weighted() {
        let mut m = fifo(2);
        m.request(MachineId(0), MaintenanceKind::Corrective, 1.0, 0.0).unwrap();
        m.request(MachineId(1), MaintenanceKind::Corrective, 1.0, 5.0).unwrap();
        m.release(MachineId(0), 10.0).unwrap();
        m.release(MachineId(1), 10.0).unwrap();
        // 1 slot on [0,5), 2 slots on [5,10)
        assert_eq!(m.busy_tracker().mean(10.0), 1.5);
    }
}
