use crate::core::components::degradation::DegradationChain;
use crate::core::components::maintainer::MaintenanceKind;
use crate::core::distributions::Sampler;
use crate::core::errors::{SimError, SimResult};
use crate::core::stats::{MachineStats, StatusTimer};
use crate::core::types::{Downstream, MachineId, Part, Upstream};
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Externally visible status of a machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineStatus {
    Idle,
    Processing,
    /// Holding a finished part that the downstream container refused
    Blocked,
    /// Queued for preventive maintenance and not allowed to process
    WaitingForMaintenance,
    /// Failed and queued for corrective maintenance
    Down,
    UnderRepair,
}

impl MachineStatus {
    pub const COUNT: usize = 6;

    pub fn index(&self) -> usize {
        match self {
            MachineStatus::Idle => 0,
            MachineStatus::Processing => 1,
            MachineStatus::Blocked => 2,
            MachineStatus::WaitingForMaintenance => 3,
            MachineStatus::Down => 4,
            MachineStatus::UnderRepair => 5,
        }
    }

    /// Whether the machine counts as available in this status
    pub fn is_available(&self) -> bool {
        !matches!(
            self,
            MachineStatus::WaitingForMaintenance | MachineStatus::Down | MachineStatus::UnderRepair
        )
    }
}

/// What a machine does between raising a preventive request and getting its repair slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreventivePolicy {
    /// Keep processing parts; a slot granted mid-cycle is used at the cycle boundary
    #[default]
    KeepProducing,
    /// Stop taking new parts as soon as the request is raised
    StopImmediately,
}

/// Part-flow axis of the machine state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activity {
    Idle,
    Processing(Part),
    Blocked(Part),
}

/// Maintenance axis of the machine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Operational,
    /// Request queued at the maintainer
    Requested(MaintenanceKind),
    /// Slot granted while a cycle was running; repair starts when it completes
    Granted(MaintenanceKind),
    UnderRepair(MaintenanceKind),
}

/// Result of sampling the degradation chain after a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradationStep {
    Unchanged,
    Degraded(usize),
    Failed,
}

/// Repair-related parameters of a machine
#[derive(Debug, Clone)]
pub struct MaintenanceModel {
    pub chain: DegradationChain,
    pub cbm_threshold: Option<usize>,
    pub preventive: Option<(Sampler, f64)>,
    pub corrective: (Sampler, f64),
    pub policy: PreventivePolicy,
}

/// Processing station with a Markov degradation chain.
///
/// The machine only keeps its own state; the system drives it, routes its parts and
/// talks to the maintainer on its behalf.
#[derive(Debug, Clone)]
pub struct Machine {
    pub id: MachineId,
    pub name: String,
    cycle_time: f64,
    upstream: Upstream,
    downstream: Downstream,
    maintenance: Option<MaintenanceModel>,
    degradation_state: usize,
    activity: Activity,
    health: Health,
    timer: StatusTimer,
    parts_produced: u64,
    failures: u64,
    preventive_repairs: u64,
    corrective_repairs: u64,
}

impl Machine {
    pub fn new(
        id: MachineId,
        name: String,
        cycle_time: f64,
        upstream: Upstream,
        downstream: Downstream,
        maintenance: Option<MaintenanceModel>,
    ) -> Self {
        Self {
            id,
            name,
            cycle_time,
            upstream,
            downstream,
            maintenance,
            degradation_state: 0,
            activity: Activity::Idle,
            health: Health::Operational,
            timer: StatusTimer::new(0.0, MachineStatus::Idle),
            parts_produced: 0,
            failures: 0,
            preventive_repairs: 0,
            corrective_repairs: 0,
        }
    }

    pub fn cycle_time(&self) -> f64 {
        self.cycle_time
    }

    pub fn upstream(&self) -> Upstream {
        self.upstream
    }

    pub fn downstream(&self) -> Downstream {
        self.downstream
    }

    pub fn degradation_state(&self) -> usize {
        self.degradation_state
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn maintenance(&self) -> Option<&MaintenanceModel> {
        self.maintenance.as_ref()
    }

    pub fn parts_produced(&self) -> u64 {
        self.parts_produced
    }

    /// Status derived from both axes; the maintenance axis wins
    pub fn status(&self) -> MachineStatus {
        let stop_on_request = self
            .maintenance
            .as_ref()
            .map_or(false, |m| m.policy == PreventivePolicy::StopImmediately);
        match self.health {
            Health::UnderRepair(_) => MachineStatus::UnderRepair,
            Health::Requested(MaintenanceKind::Corrective) => MachineStatus::Down,
            Health::Requested(MaintenanceKind::Preventive) if stop_on_request => {
                MachineStatus::WaitingForMaintenance
            }
            _ => match self.activity {
                Activity::Idle => MachineStatus::Idle,
                Activity::Processing(_) => MachineStatus::Processing,
                Activity::Blocked(_) => MachineStatus::Blocked,
            },
        }
    }

    /// True when idle and allowed to take a new part
    pub fn can_start(&self) -> bool {
        if self.activity != Activity::Idle {
            return false;
        }
        match self.health {
            Health::Operational => true,
            Health::Requested(MaintenanceKind::Preventive) => self
                .maintenance
                .as_ref()
                .map_or(true, |m| m.policy == PreventivePolicy::KeepProducing),
            _ => false,
        }
    }

    pub fn start(&mut self, part: Part) -> SimResult<()> {
        if !self.can_start() {
            return Err(SimError::invariant(
                self.id,
                format!("started a part while {:?}/{:?}", self.activity, self.health),
            ));
        }
        debug!("[Machine:{}] processing part {}", self.id, part.id);
        self.activity = Activity::Processing(part);
        Ok(())
    }

    /// End the running cycle and hand back the finished part
    pub fn finish(&mut self) -> SimResult<Part> {
        match self.activity {
            Activity::Processing(part) => {
                self.activity = Activity::Idle;
                self.parts_produced += 1;
                Ok(part)
            }
            other => Err(SimError::invariant(
                self.id,
                format!("cycle completed while {:?}", other),
            )),
        }
    }

    /// Hold a finished part until the downstream container has room
    pub fn block(&mut self, part: Part) {
        debug!("[Machine:{}] blocked holding part {}", self.id, part.id);
        self.activity = Activity::Blocked(part);
    }

    pub fn blocked_part(&self) -> Option<Part> {
        match self.activity {
            Activity::Blocked(part) => Some(part),
            _ => None,
        }
    }

    pub fn unblock(&mut self) {
        if matches!(self.activity, Activity::Blocked(_)) {
            self.activity = Activity::Idle;
        }
    }

    /// Sample one Markov step of the degradation chain
    pub fn degrade<R: Rng + ?Sized>(&mut self, rng: &mut R) -> DegradationStep {
        let Some(model) = &self.maintenance else {
            return DegradationStep::Unchanged;
        };
        let next = model.chain.step(self.degradation_state, rng);
        if next == self.degradation_state {
            return DegradationStep::Unchanged;
        }
        self.degradation_state = next;
        if next == model.chain.failed_state() {
            self.failures += 1;
            debug!("[Machine:{}] failed", self.id);
            DegradationStep::Failed
        } else {
            debug!("[Machine:{}] degraded to state {}", self.id, next);
            DegradationStep::Degraded(next)
        }
    }

    pub fn is_failed(&self) -> bool {
        self.maintenance
            .as_ref()
            .map_or(false, |m| self.degradation_state == m.chain.failed_state())
    }

    /// Degraded past the CBM threshold with no request raised yet in this episode
    pub fn needs_preventive(&self) -> bool {
        match &self.maintenance {
            Some(model) => {
                self.health == Health::Operational
                    && model.cbm_threshold.map_or(false, |t| self.degradation_state >= t)
                    && self.degradation_state < model.chain.failed_state()
            }
            None => false,
        }
    }

    /// Mean repair duration for a request of `kind`
    pub fn expected_repair(&self, kind: MaintenanceKind) -> SimResult<f64> {
        Ok(self.repair_model(kind)?.1)
    }

    pub fn sample_repair<R: Rng + ?Sized>(&self, kind: MaintenanceKind, rng: &mut R) -> SimResult<f64> {
        Ok(self.repair_model(kind)?.0.sample(rng))
    }

    fn repair_model(&self, kind: MaintenanceKind) -> SimResult<&(Sampler, f64)> {
        let model = self
            .maintenance
            .as_ref()
            .ok_or_else(|| SimError::invariant(self.id, "needs repair without a maintenance model"))?;
        match kind {
            MaintenanceKind::Corrective => Ok(&model.corrective),
            MaintenanceKind::Preventive => model
                .preventive
                .as_ref()
                .ok_or_else(|| SimError::invariant(self.id, "needs preventive repair without a distribution")),
        }
    }

    pub fn set_health(&mut self, health: Health) {
        self.health = health;
    }

    /// Mark the start of a repair of `kind`
    pub fn begin_repair(&mut self, kind: MaintenanceKind) -> SimResult<()> {
        if matches!(self.activity, Activity::Processing(_)) {
            return Err(SimError::invariant(self.id, "repair started in the middle of a cycle"));
        }
        match kind {
            MaintenanceKind::Preventive => self.preventive_repairs += 1,
            MaintenanceKind::Corrective => self.corrective_repairs += 1,
        }
        self.health = Health::UnderRepair(kind);
        Ok(())
    }

    /// Finish the running repair, restoring the machine to as-new
    pub fn complete_repair(&mut self) -> SimResult<MaintenanceKind> {
        let Health::UnderRepair(kind) = self.health else {
            return Err(SimError::invariant(
                self.id,
                format!("repair completed while {:?}", self.health),
            ));
        };
        self.degradation_state = 0;
        self.health = Health::Operational;
        debug!("[Machine:{}] {:?} repair complete", self.id, kind);
        Ok(kind)
    }

    /// Bring the status timer up to `now`; returns the new status when it changed
    pub fn sync_status(&mut self, now: f64) -> Option<MachineStatus> {
        let status = self.status();
        if self.timer.transition(now, status) {
            Some(status)
        } else {
            None
        }
    }

    pub fn reset_counters(&mut self, now: f64) {
        self.timer.reset(now);
        self.parts_produced = 0;
        self.failures = 0;
        self.preventive_repairs = 0;
        self.corrective_repairs = 0;
    }

    /// Summary over the window `[end - window, end]`
    pub fn stats(&self, end: f64, window: f64) -> MachineStats {
        let time = |status| self.timer.time_in(status, end);
        let processing = time(MachineStatus::Processing);
        let unavailable = time(MachineStatus::WaitingForMaintenance)
            + time(MachineStatus::Down)
            + time(MachineStatus::UnderRepair);
        let (utilization, availability) = if window > 0.0 {
            (processing / window, 1.0 - unavailable / window)
        } else {
            (0.0, if self.status().is_available() { 1.0 } else { 0.0 })
        };

        MachineStats {
            name: self.name.clone(),
            parts_produced: self.parts_produced,
            idle_time: time(MachineStatus::Idle),
            processing_time: processing,
            blocked_time: time(MachineStatus::Blocked),
            waiting_for_maintenance_time: time(MachineStatus::WaitingForMaintenance),
            down_time: time(MachineStatus::Down),
            repair_time: time(MachineStatus::UnderRepair),
            utilization,
            availability,
            failures: self.failures,
            preventive_repairs: self.preventive_repairs,
            corrective_repairs: self.corrective_repairs,
            final_degradation_state: self.degradation_state,
        }
    }
}
