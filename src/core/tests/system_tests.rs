// Tests for the System event loop: part flow, warm-up, outcomes and traces
#[cfg(test)]
mod tests {
    use super::super::{always_fails, init_logger, parallel_line};
    use crate::core::builder::LineBuilder;
    use crate::core::components::machine::MachineStatus;
    use crate::core::config::{BufferConfig, MachineConfig, SinkConfig, SourceConfig};
    use crate::core::distributions::TimeDistribution;
    use crate::core::event::EventKind;
    use crate::core::execution::System;
    use crate::core::stats::RunOutcome;

    #[test]
    fn test_single_machine_counts_end_time_completion() {
        init_logger();
        let config = parallel_line(vec![MachineConfig::new(1.0)], 1);
        let mut system = System::new(config, 7).unwrap();
        let summary = system.simulate(0.0, 100.0, false).unwrap();

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.total_produced, 100, "completions at t=1..=100 are all measured");
        assert_eq!(summary.end_time, 100.0);
        assert_eq!(summary.machines[0].utilization, 1.0);
        assert_eq!(summary.machines[0].availability, 1.0);
        assert_eq!(summary.sources[0].released_total, 101);
        assert!(system.pending_events() > 0, "work scheduled past the window stays queued");
    }

    #[test]
    fn test_interarrival_starves_machine() {
        let mut builder = LineBuilder::new();
        let source = builder.add_source(SourceConfig::with_interarrival(TimeDistribution::constant(2.0)));
        let machine = builder.add_machine(MachineConfig::new(1.0));
        let sink = builder.add_sink(SinkConfig::default());
        builder.connect(source, machine).unwrap();
        builder.connect(machine, sink).unwrap();

        let mut system = System::new(builder.build().unwrap(), 0).unwrap();
        let summary = system.simulate(0.0, 100.0, false).unwrap();

        assert_eq!(summary.total_produced, 50);
        assert_eq!(summary.machines[0].processing_time, 50.0);
        assert_eq!(summary.machines[0].idle_time, 50.0);
    }

    #[test]
    fn test_warm_up_excludes_early_parts() {
        let config = parallel_line(vec![MachineConfig::new(1.0)], 1);
        let mut system = System::new(config, 0).unwrap();
        let summary = system.simulate(10.0, 50.0, false).unwrap();

        assert_eq!(summary.total_produced, 50);
        assert_eq!(summary.sinks[0].received_total, 60);
        assert_eq!(summary.measured_time, 50.0);
        assert_eq!(summary.end_time, 60.0);
        assert!(system.is_warmed_up());
    }

    #[test]
    fn test_source_pushes_into_buffer_until_full() {
        let mut builder = LineBuilder::new();
        let source = builder.add_source(SourceConfig::unlimited());
        let buffer = builder.add_buffer(BufferConfig::new(3));
        let machine = builder.add_machine(MachineConfig::new(1.0));
        let sink = builder.add_sink(SinkConfig::default());
        builder.connect(source, buffer).unwrap();
        builder.connect(buffer, machine).unwrap();
        builder.connect(machine, sink).unwrap();

        let mut system = System::new(builder.build().unwrap(), 0).unwrap();
        let summary = system.simulate(0.0, 20.0, false).unwrap();

        assert_eq!(summary.total_produced, 20);
        assert_eq!(summary.buffers[0].final_level, 3);
        assert_eq!(summary.buffers[0].max_level, 3.0);
        assert!(system.sources()[0].has_part(), "source holds one part while the buffer is full");
    }

    #[test]
    fn test_repair_cycle_timeline() {
        // Fails after every part; each failure costs a 4-unit corrective repair
        let machine = MachineConfig::new(1.0).with_degradation(always_fails(), TimeDistribution::constant(4.0));
        let mut system = System::new(parallel_line(vec![machine], 1), 3).unwrap();
        let summary = system.simulate(0.0, 100.0, false).unwrap();

        let stats = &summary.machines[0];
        assert_eq!(summary.total_produced, 20);
        assert_eq!(stats.failures, 20);
        assert_eq!(stats.corrective_repairs, 20);
        assert_eq!(stats.preventive_repairs, 0);
        assert_eq!(stats.repair_time, 80.0);
        assert!((stats.availability - 0.2).abs() < 1e-12);
        assert_eq!(summary.maintainer.grants, 20);
    }

    #[test]
    fn test_deadlock_is_reported() {
        let machine = MachineConfig::new(1.0).with_degradation(always_fails(), TimeDistribution::constant(4.0));
        let mut system = System::new(parallel_line(vec![machine], 0), 0).unwrap();
        let summary = system.simulate(0.0, 100.0, false).unwrap();

        assert_eq!(summary.outcome, RunOutcome::Deadlocked { at: 1.0 });
        assert!(!summary.outcome.is_completed());
        assert_eq!(system.pending_events(), 0);
        assert_eq!(summary.total_produced, 1);
        assert_eq!(summary.maintainer.queued_at_end, 1);
        assert_eq!(system.machines()[0].status(), MachineStatus::Down);

        // The stuck line is measured over the whole window, not up to the last event
        assert_eq!(summary.end_time, 100.0);
        assert_eq!(summary.measured_time, 100.0);
        assert_eq!(summary.throughput(), 0.01);
        let stats = &summary.machines[0];
        assert_eq!(stats.down_time, 99.0);
        assert!((stats.availability - 0.01).abs() < 1e-12);
        assert!((stats.utilization - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_deadlock_during_warm_up() {
        let machine = MachineConfig::new(1.0).with_degradation(always_fails(), TimeDistribution::constant(4.0));
        let mut system = System::new(parallel_line(vec![machine], 0), 0).unwrap();
        let summary = system.simulate(50.0, 100.0, false).unwrap();

        assert_eq!(summary.outcome, RunOutcome::Deadlocked { at: 1.0 });
        assert!(system.is_warmed_up());
        assert_eq!(summary.end_time, 150.0);
        assert_eq!(summary.measured_time, 100.0);
        assert_eq!(summary.total_produced, 0);
        assert_eq!(summary.throughput(), 0.0);
        assert_eq!(summary.machines[0].down_time, 100.0);
        assert_eq!(summary.machines[0].availability, 0.0);
        assert_eq!(summary.maintainer.mean_busy_slots, 0.0);
    }

    #[test]
    fn test_collect_data_records_trajectories() {
        let machine = MachineConfig::new(1.0).with_degradation(always_fails(), TimeDistribution::constant(4.0));
        let mut system = System::new(parallel_line(vec![machine], 1), 0).unwrap();
        let summary = system.simulate(0.0, 10.0, true).unwrap();

        let trace = summary.trace.expect("trace requested");
        assert_eq!(trace.events.len() as u64, summary.events_processed);
        assert_eq!(trace.events[0].kind, EventKind::Arrival(crate::core::types::SourceId(0)));
        assert!(trace.events.windows(2).all(|w| w[0].time <= w[1].time));

        let degradation: Vec<usize> = trace.machines[0].degradation.iter().map(|&(_, s)| s).collect();
        assert_eq!(degradation, vec![0, 1, 0, 1, 0]);
        assert_eq!(trace.machines[0].status[0], (0.0, MachineStatus::Idle));
        assert!(trace.machines[0]
            .status
            .iter()
            .any(|&(t, s)| t == 1.0 && s == MachineStatus::UnderRepair));
    }

    #[test]
    fn test_no_trace_without_collect_data() {
        let mut system = System::new(parallel_line(vec![MachineConfig::new(1.0)], 1), 0).unwrap();
        assert!(system.simulate(0.0, 5.0, false).unwrap().trace.is_none());
    }

    #[test]
    fn test_simulate_validates_times_and_reuse() {
        let config = parallel_line(vec![MachineConfig::new(1.0)], 1);
        let mut system = System::new(config, 0).unwrap();
        assert!(system.simulate(-1.0, 10.0, false).unwrap_err().is_config());
        assert!(system.simulate(0.0, 0.0, false).unwrap_err().is_config());
        assert!(system.simulate(0.0, f64::NAN, false).unwrap_err().is_config());

        let first = system.simulate(0.0, 10.0, false).unwrap();
        assert!(system.simulate(0.0, 10.0, false).is_err());

        system.reset(0).unwrap();
        let second = system.simulate(0.0, 10.0, false).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reset_changes_seed() {
        let machine = MachineConfig::new(1.0).with_degradation(
            vec![vec![0.9, 0.1], vec![0.0, 1.0]],
            TimeDistribution::uniform(1.0, 5.0),
        );
        let mut system = System::new(parallel_line(vec![machine], 1), 1).unwrap();
        system.simulate(0.0, 10.0, false).unwrap();
        system.reset(99).unwrap();
        assert_eq!(system.seed(), 99);
        assert_eq!(system.now(), 0.0);
        assert!(!system.is_warmed_up());
    }

    #[test]
    fn test_bad_machine_config_names_machine() {
        let mut machine = MachineConfig::new(1.0);
        machine.degradation = Some(vec![vec![0.5, 0.4], vec![0.0, 1.0]]);
        machine.cm_distribution = Some(TimeDistribution::constant(1.0));
        let config = parallel_line(vec![MachineConfig::new(1.0), machine], 1);
        let err = System::new(config, 0).err().expect("matrix rows must sum to one");
        assert!(err.is_config());
        assert!(err.to_string().contains("Machine1"), "{}", err);
    }
}
