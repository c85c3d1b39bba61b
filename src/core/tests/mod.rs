mod system_tests;

use crate::core::builder::LineBuilder;
use crate::core::config::{LineConfig, MachineConfig, SinkConfig, SourceConfig};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Unlimited source feeding the given machines in parallel, all emptying into one sink
fn parallel_line(machines: Vec<MachineConfig>, maintainer_capacity: usize) -> LineConfig {
    let mut builder = LineBuilder::new();
    let source = builder.add_source(SourceConfig::unlimited());
    let sink = builder.add_sink(SinkConfig::default());
    for machine in machines {
        let id = builder.add_machine(machine);
        builder.connect(source, id).unwrap();
        builder.connect(id, sink).unwrap();
    }
    builder.with_maintainer(maintainer_capacity);
    builder.build().unwrap()
}

/// Two-state chain that fails after every cycle
fn always_fails() -> Vec<Vec<f64>> {
    vec![vec![0.0, 1.0], vec![0.0, 1.0]]
}

/// Three-state chain moving one state per cycle
fn one_step_per_cycle() -> Vec<Vec<f64>> {
    vec![vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0], vec![0.0, 0.0, 1.0]]
}
