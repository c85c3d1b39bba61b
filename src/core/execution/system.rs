use crate::core::builder::routing::RoutingValidator;
use crate::core::components::buffer::{Buffer, Feeder};
use crate::core::components::machine::{Activity, DegradationStep, Health, Machine};
use crate::core::components::maintainer::{MaintenanceKind, Maintainer, RequestOutcome};
use crate::core::components::sink::Sink;
use crate::core::components::source::{Source, SourceOutlet};
use crate::core::config::LineConfig;
use crate::core::errors::{SimError, SimResult};
use crate::core::event::{Event, EventKind};
use crate::core::event_scheduler::EventScheduler;
use crate::core::stats::{
    BufferStats, MachineTrace, MaintainerStats, RunOutcome, RunSummary, RunTrace, SinkStats, SourceStats,
};
use crate::core::types::{BufferId, Downstream, MachineId, Part, SinkId, SourceId, Upstream};
use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;

/// Observer hook called at every event boundary
pub trait SimulationObserver {
    /// Called after an event and every reaction it triggered have been applied
    fn on_event(&mut self, event: &Event, system: &System);

    /// Called once statistics counters have been reset at the end of the warm-up
    fn on_warm_up_complete(&mut self, _time: f64) {}
}

/// Station that may be able to move a part after a neighbouring container changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wakeup {
    Source(SourceId),
    Machine(MachineId),
}

/// One production line and its event loop.
///
/// The system owns every entity, the event queue, the maintainer and the random
/// stream of the run. Entities never call each other; the system routes parts and
/// turns "capacity changed" notifications into wake-ups that are drained after each
/// event, so the loop stays single-threaded and inspectable between events.
pub struct System {
    config: LineConfig,
    seed: u64,
    rng: StdRng,
    scheduler: EventScheduler,
    sources: Vec<Source>,
    buffers: Vec<Buffer>,
    machines: Vec<Machine>,
    sinks: Vec<Sink>,
    maintainer: Maintainer,
    wakeups: VecDeque<Wakeup>,
    next_part_id: u64,
    events_processed: u64,
    warmed_up: bool,
    started: bool,
    trace: Option<RunTrace>,
    observers: Vec<Box<dyn SimulationObserver>>,
}

impl System {
    /// Validate `config` and build a fresh system whose random stream is seeded with `seed`
    ///
    /// # Arguments
    /// * `config` - Line description; routing, matrices and distributions are checked here
    /// * `seed` - Seed of the run's random stream
    ///
    /// # Returns
    /// The system at time zero, or a configuration error naming the offending entity
    pub fn new(config: LineConfig, seed: u64) -> SimResult<Self> {
        let topology = RoutingValidator::resolve(&config)?;

        let mut sources = Vec::with_capacity(config.sources.len());
        for (index, (source, outlet)) in config.sources.iter().zip(topology.source_outlets).enumerate() {
            let id = SourceId(index);
            let interarrival = source.interarrival.sampler().map_err(|e| e.within(id))?;
            sources.push(Source::new(id, display_name(&source.name, id), interarrival, outlet));
        }

        let buffers = config
            .buffers
            .iter()
            .zip(topology.buffer_feeders.iter().zip(&topology.buffer_consumers))
            .enumerate()
            .map(|(index, (buffer, (feeder, consumer)))| {
                let id = BufferId(index);
                Buffer::new(id, display_name(&buffer.name, id), buffer.capacity, *feeder, *consumer)
            })
            .collect();

        let mut machines = Vec::with_capacity(config.machines.len());
        for (index, machine) in config.machines.iter().enumerate() {
            let id = MachineId(index);
            let cycle_time = machine.validate_cycle_time().map_err(|e| e.within(id))?;
            let model = machine.maintenance_model().map_err(|e| e.within(id))?;
            machines.push(Machine::new(
                id,
                display_name(&machine.name, id),
                cycle_time,
                topology.machine_upstreams[index],
                topology.machine_downstreams[index],
                model,
            ));
        }

        let sinks = config
            .sinks
            .iter()
            .enumerate()
            .map(|(index, sink)| Sink::new(SinkId(index), display_name(&sink.name, SinkId(index))))
            .collect();

        if config.maintainer.capacity == 0 && machines.iter().any(|m| m.maintenance().is_some()) {
            warn!("[Maintainer] capacity is zero; degrading machines will never be repaired");
        }
        let maintainer = Maintainer::new(config.maintainer.capacity, config.maintainer.policy());

        Ok(Self {
            config,
            seed,
            rng: StdRng::seed_from_u64(seed),
            scheduler: EventScheduler::new(),
            sources,
            buffers,
            machines,
            sinks,
            maintainer,
            wakeups: VecDeque::new(),
            next_part_id: 0,
            events_processed: 0,
            warmed_up: false,
            started: false,
            trace: None,
            observers: Vec::new(),
        })
    }

    /// Discard all run state and rebuild from the stored configuration; observers are kept
    pub fn reset(&mut self, seed: u64) -> SimResult<()> {
        let observers = std::mem::take(&mut self.observers);
        *self = Self::new(self.config.clone(), seed)?;
        self.observers = observers;
        Ok(())
    }

    pub fn add_observer(&mut self, observer: Box<dyn SimulationObserver>) {
        self.observers.push(observer);
    }

    pub fn config(&self) -> &LineConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn now(&self) -> f64 {
        self.scheduler.now()
    }

    pub fn is_warmed_up(&self) -> bool {
        self.warmed_up
    }

    pub fn pending_events(&self) -> usize {
        self.scheduler.len()
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn sinks(&self) -> &[Sink] {
        &self.sinks
    }

    pub fn source(&self, id: SourceId) -> Option<&Source> {
        self.sources.get(id.index())
    }

    pub fn buffer(&self, id: BufferId) -> Option<&Buffer> {
        self.buffers.get(id.index())
    }

    pub fn machine(&self, id: MachineId) -> Option<&Machine> {
        self.machines.get(id.index())
    }

    pub fn sink(&self, id: SinkId) -> Option<&Sink> {
        self.sinks.get(id.index())
    }

    pub fn maintainer(&self) -> &Maintainer {
        &self.maintainer
    }

    /// Run a warm-up of `warm_up_time` followed by a measurement window of `simulation_time`.
    ///
    /// Events at exactly `warm_up_time` belong to the warm-up; events at exactly the end
    /// of the window are still processed. When the queue empties early the summary's
    /// outcome is [`RunOutcome::Deadlocked`] with the time the last event fired, and the
    /// stuck line is measured as it stands up to the end of the window.
    ///
    /// # Arguments
    /// * `warm_up_time` - Time simulated before counters are reset (finite, non-negative)
    /// * `simulation_time` - Length of the measurement window (finite, positive)
    /// * `collect_data` - Record degradation, status and buffer trajectories plus the event log
    ///
    /// # Returns
    /// The run summary, or a configuration error for invalid times or a system that was
    /// already simulated without a [`System::reset`] in between
    pub fn simulate(&mut self, warm_up_time: f64, simulation_time: f64, collect_data: bool) -> SimResult<RunSummary> {
        if !warm_up_time.is_finite() || warm_up_time < 0.0 {
            return Err(SimError::config(format!("warm-up time {} must be finite and non-negative", warm_up_time)));
        }
        if !simulation_time.is_finite() || simulation_time <= 0.0 {
            return Err(SimError::config(format!("simulation time {} must be finite and positive", simulation_time)));
        }
        if self.started {
            return Err(SimError::config("system has already been simulated; reset it first"));
        }
        self.started = true;

        let end = warm_up_time + simulation_time;
        info!(
            "Starting run (seed {}, warm-up {}, measurement {})",
            self.seed, warm_up_time, simulation_time
        );

        if collect_data {
            self.trace = Some(RunTrace {
                machines: vec![MachineTrace::default(); self.machines.len()],
                buffer_levels: vec![Vec::new(); self.buffers.len()],
                events: Vec::new(),
            });
            self.record_trace(0.0);
        }

        for index in 0..self.sources.len() {
            self.scheduler.schedule(0.0, EventKind::Arrival(SourceId(index)))?;
        }

        let outcome = loop {
            let Some(next_time) = self.scheduler.peek_time() else {
                let at = self.scheduler.now();
                warn!("Event queue exhausted at t={:.3} before the end of the run at t={:.3}", at, end);
                // No state can change any more; carry the frozen line to the end of the window
                if !self.warmed_up {
                    self.scheduler.advance_to(warm_up_time);
                    self.finish_warm_up(warm_up_time);
                }
                self.scheduler.advance_to(end);
                break RunOutcome::Deadlocked { at };
            };

            if !self.warmed_up && next_time > warm_up_time {
                self.scheduler.advance_to(warm_up_time);
                self.finish_warm_up(warm_up_time);
            }
            if next_time > end {
                self.scheduler.advance_to(end);
                break RunOutcome::Completed;
            }

            let Some(event) = self.scheduler.next() else {
                continue;
            };
            self.dispatch(event)?;
            self.events_processed += 1;
            self.after_event(event);
        };

        let end_time = self.scheduler.now();
        self.sync_statuses(end_time);
        let summary = self.summarize(outcome, warm_up_time, simulation_time, end_time);
        info!(
            "Run finished at t={:.3}: {} parts in {:.3} time units ({:?})",
            end_time, summary.total_produced, summary.measured_time, outcome
        );
        Ok(summary)
    }

    fn finish_warm_up(&mut self, now: f64) {
        self.sync_statuses(now);
        for source in &mut self.sources {
            source.reset_counters();
        }
        for sink in &mut self.sinks {
            sink.reset_counters();
        }
        for buffer in &mut self.buffers {
            buffer.reset_counters(now);
        }
        for machine in &mut self.machines {
            machine.reset_counters(now);
        }
        self.maintainer.reset_counters(now);
        self.warmed_up = true;
        info!("Warm-up complete at t={:.3}", now);

        let mut observers = std::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            observer.on_warm_up_complete(now);
        }
        self.observers = observers;
    }

    fn dispatch(&mut self, event: Event) -> SimResult<()> {
        trace!("t={:.3} dispatching {}", event.time, event.kind);
        match event.kind {
            EventKind::Arrival(source) => self.on_arrival(source)?,
            EventKind::ProcessingComplete(machine) => self.on_processing_complete(machine)?,
            EventKind::RepairComplete(machine) => self.on_repair_complete(machine)?,
        }
        self.drain_wakeups()
    }

    fn after_event(&mut self, event: Event) {
        self.sync_statuses(event.time);
        if let Some(trace) = self.trace.as_mut() {
            trace.events.push(event);
        }
        self.record_trace(event.time);

        let mut observers = std::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            observer.on_event(&event, self);
        }
        self.observers = observers;
    }

    fn drain_wakeups(&mut self) -> SimResult<()> {
        while let Some(wakeup) = self.wakeups.pop_front() {
            trace!("waking {:?}", wakeup);
            match wakeup {
                Wakeup::Source(source) => self.push_from_source(source)?,
                Wakeup::Machine(machine) => self.advance_machine(machine)?,
            }
        }
        Ok(())
    }

    fn on_arrival(&mut self, id: SourceId) -> SimResult<()> {
        let part = Part::new(self.next_part_id, self.scheduler.now());
        self.next_part_id += 1;
        let source = &mut self.sources[id.index()];
        if !source.generate(part) {
            return Err(SimError::invariant(id, "generated a part while still holding one"));
        }
        trace!("[Source:{}] part {} ready", id, part.id);
        self.push_from_source(id)
    }

    /// Push a waiting part into the source's buffer, or let its machines pull it
    fn push_from_source(&mut self, id: SourceId) -> SimResult<()> {
        let now = self.scheduler.now();
        match self.sources[id.index()].outlet().clone() {
            SourceOutlet::Buffer(buffer) => {
                let Some(part) = self.sources[id.index()].peek() else {
                    return Ok(());
                };
                if self.buffers[buffer.index()].try_admit(part, now).is_ok() {
                    self.release_from_source(id)?;
                    self.wakeups.push_back(Wakeup::Machine(self.buffers[buffer.index()].downstream()));
                }
            }
            SourceOutlet::Machines(machines) => {
                if self.sources[id.index()].has_part() {
                    self.wakeups.extend(machines.into_iter().map(Wakeup::Machine));
                }
            }
        }
        Ok(())
    }

    /// Hand over the source's part and time the next arrival from now
    fn release_from_source(&mut self, id: SourceId) -> SimResult<Option<Part>> {
        let source = &mut self.sources[id.index()];
        let Some(part) = source.release() else {
            return Ok(None);
        };
        let delay = source.interarrival().sample(&mut self.rng);
        let now = self.scheduler.now();
        self.scheduler.schedule(now + delay, EventKind::Arrival(id))?;
        Ok(Some(part))
    }

    fn on_processing_complete(&mut self, id: MachineId) -> SimResult<()> {
        let now = self.scheduler.now();
        let part = self.machines[id.index()].finish()?;
        debug!("[Machine:{}] finished part {} at t={:.3}", id, part.id, now);
        if let Err(part) = self.deliver(id, part)? {
            self.machines[id.index()].block(part);
        }

        let step = self.machines[id.index()].degrade(&mut self.rng);
        match step {
            DegradationStep::Failed => self.on_failure(id)?,
            _ if self.machines[id.index()].needs_preventive() => {
                self.request_maintenance(id, MaintenanceKind::Preventive)?;
            }
            _ => {}
        }
        self.advance_machine(id)
    }

    fn on_failure(&mut self, id: MachineId) -> SimResult<()> {
        let now = self.scheduler.now();
        let health = self.machines[id.index()].health();
        debug!(
            "[Machine:{}] failed at t={:.3} (state {})",
            id,
            now,
            self.machines[id.index()].degradation_state()
        );
        match health {
            Health::Operational => self.request_maintenance(id, MaintenanceKind::Corrective)?,
            Health::Requested(MaintenanceKind::Preventive) => {
                let machine = &mut self.machines[id.index()];
                let expected = machine.expected_repair(MaintenanceKind::Corrective)?;
                machine.set_health(Health::Requested(MaintenanceKind::Corrective));
                self.maintainer.escalate(id, expected)?;
                debug!("[Machine:{}] preventive request escalated to corrective", id);
            }
            Health::Granted(_) => {
                self.machines[id.index()].set_health(Health::Granted(MaintenanceKind::Corrective));
            }
            Health::Requested(MaintenanceKind::Corrective) | Health::UnderRepair(_) => {
                return Err(SimError::invariant(id, format!("failed while {:?}", health)));
            }
        }
        Ok(())
    }

    fn request_maintenance(&mut self, id: MachineId, kind: MaintenanceKind) -> SimResult<()> {
        let now = self.scheduler.now();
        let expected = self.machines[id.index()].expected_repair(kind)?;
        match self.maintainer.request(id, kind, expected, now)? {
            RequestOutcome::Granted(_) => self.machines[id.index()].set_health(Health::Granted(kind)),
            RequestOutcome::Queued => self.machines[id.index()].set_health(Health::Requested(kind)),
        }
        Ok(())
    }

    fn on_repair_complete(&mut self, id: MachineId) -> SimResult<()> {
        let now = self.scheduler.now();
        let kind = self.machines[id.index()].complete_repair()?;
        debug!("[Machine:{}] {:?} repair complete at t={:.3}", id, kind, now);
        if let Some(next) = self.maintainer.release(id, now)? {
            self.machines[next.machine.index()].set_health(Health::Granted(next.kind));
            self.wakeups.push_back(Wakeup::Machine(next.machine));
        }
        self.advance_machine(id)
    }

    /// Move the machine as far as its state allows: clear a blocked part, start a
    /// granted repair, or take a new part from upstream
    fn advance_machine(&mut self, id: MachineId) -> SimResult<()> {
        if let Some(part) = self.machines[id.index()].blocked_part() {
            if self.deliver(id, part)?.is_ok() {
                self.machines[id.index()].unblock();
                debug!("[Machine:{}] unblocked", id);
            }
        }

        if let Health::Granted(kind) = self.machines[id.index()].health() {
            if !matches!(self.machines[id.index()].activity(), Activity::Processing(_)) {
                self.begin_repair(id, kind)?;
            }
        }

        if self.machines[id.index()].can_start() {
            if let Some(part) = self.take_part(id)? {
                let machine = &mut self.machines[id.index()];
                machine.start(part)?;
                let done = self.scheduler.now() + machine.cycle_time();
                self.scheduler.schedule(done, EventKind::ProcessingComplete(id))?;
            }
        }
        Ok(())
    }

    fn begin_repair(&mut self, id: MachineId, kind: MaintenanceKind) -> SimResult<()> {
        let now = self.scheduler.now();
        let machine = &mut self.machines[id.index()];
        machine.begin_repair(kind)?;
        let duration = machine.sample_repair(kind, &mut self.rng)?;
        debug!(
            "[Machine:{}] {:?} repair started at t={:.3} for {:.3}",
            id, kind, now, duration
        );
        self.scheduler.schedule(now + duration, EventKind::RepairComplete(id))
    }

    /// Withdraw a part from the machine's upstream container, waking its feeder
    fn take_part(&mut self, id: MachineId) -> SimResult<Option<Part>> {
        let now = self.scheduler.now();
        match self.machines[id.index()].upstream() {
            Upstream::Source(source) => self.release_from_source(source),
            Upstream::Buffer(buffer) => {
                let buffer = &mut self.buffers[buffer.index()];
                let part = buffer.try_withdraw(now);
                if part.is_some() {
                    self.wakeups.push_back(match buffer.upstream() {
                        Feeder::Source(source) => Wakeup::Source(source),
                        Feeder::Machine(machine) => Wakeup::Machine(machine),
                    });
                }
                Ok(part)
            }
        }
    }

    /// Hand a finished part downstream; the part comes back when the buffer is full
    fn deliver(&mut self, id: MachineId, part: Part) -> SimResult<Result<(), Part>> {
        let now = self.scheduler.now();
        match self.machines[id.index()].downstream() {
            Downstream::Sink(sink) => {
                self.sinks[sink.index()].accept(part, now);
                trace!("[Sink:{}] received part {}", sink, part.id);
                Ok(Ok(()))
            }
            Downstream::Buffer(buffer) => {
                let buffer = &mut self.buffers[buffer.index()];
                let admitted = buffer.try_admit(part, now);
                if admitted.is_ok() {
                    self.wakeups.push_back(Wakeup::Machine(buffer.downstream()));
                }
                Ok(admitted)
            }
        }
    }

    fn sync_statuses(&mut self, now: f64) {
        for machine in &mut self.machines {
            if let Some(status) = machine.sync_status(now) {
                trace!("[Machine:{}] now {:?}", machine.id, status);
            }
        }
    }

    fn record_trace(&mut self, now: f64) {
        let Some(trace) = self.trace.as_mut() else {
            return;
        };
        for (machine, history) in self.machines.iter().zip(trace.machines.iter_mut()) {
            let state = machine.degradation_state();
            if history.degradation.last().map_or(true, |&(_, last)| last != state) {
                history.degradation.push((now, state));
            }
            let status = machine.status();
            if history.status.last().map_or(true, |&(_, last)| last != status) {
                history.status.push((now, status));
            }
        }
        for (buffer, history) in self.buffers.iter().zip(trace.buffer_levels.iter_mut()) {
            let level = buffer.level();
            if history.last().map_or(true, |&(_, last)| last != level) {
                history.push((now, level));
            }
        }
    }

    fn summarize(&mut self, outcome: RunOutcome, warm_up_time: f64, simulation_time: f64, end_time: f64) -> RunSummary {
        let measured_time = (end_time - warm_up_time).max(0.0);

        let sources = self
            .sources
            .iter()
            .map(|s| SourceStats {
                name: s.name.clone(),
                released: s.released(),
                released_total: s.released_total(),
            })
            .collect();
        let sinks: Vec<SinkStats> = self
            .sinks
            .iter()
            .map(|s| SinkStats {
                name: s.name.clone(),
                received: s.received(),
                received_total: s.received_total(),
                mean_time_in_system: s.mean_time_in_system(),
            })
            .collect();
        let machines = self.machines.iter().map(|m| m.stats(end_time, measured_time)).collect();
        let buffers = self
            .buffers
            .iter()
            .map(|b| BufferStats {
                name: b.name.clone(),
                capacity: b.capacity(),
                mean_level: b.level_tracker().mean(end_time),
                max_level: b.level_tracker().max(),
                admitted: b.admitted(),
                final_level: b.level(),
            })
            .collect();
        let maintainer = MaintainerStats {
            capacity: self.maintainer.capacity(),
            requests: self.maintainer.requests(),
            grants: self.maintainer.grants(),
            mean_busy_slots: self.maintainer.busy_tracker().mean(end_time),
            queued_at_end: self.maintainer.queue().len(),
        };

        RunSummary {
            seed: self.seed,
            outcome,
            warm_up_time,
            simulation_time,
            measured_time,
            end_time,
            events_processed: self.events_processed,
            total_produced: sinks.iter().map(|s| s.received).sum(),
            sources,
            sinks,
            machines,
            buffers,
            maintainer,
            trace: self.trace.take(),
        }
    }
}

fn display_name(name: &Option<String>, id: impl ToString) -> String {
    name.clone().unwrap_or_else(|| id.to_string())
}
