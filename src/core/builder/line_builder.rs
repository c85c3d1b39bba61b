use super::routing::RoutingValidator;
use crate::core::components::maintainer::{SelectionPolicy, SelectionStrategy};
use crate::core::config::{
    BufferConfig, LineConfig, MachineConfig, MaintainerConfig, Route, SinkConfig, SourceConfig,
};
use crate::core::errors::{SimError, SimResult};
use crate::core::types::{BufferId, MachineId, Node, SinkId, SourceId};
use std::sync::Arc;

/// Imperative API for assembling a production line
///
/// Entities receive sequential ids per kind. Every `connect` is checked against the
/// entities added so far; the full topology is checked by [`LineBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct LineBuilder {
    config: LineConfig,
}

impl LineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, source: SourceConfig) -> SourceId {
        self.config.sources.push(source);
        SourceId(self.config.sources.len() - 1)
    }

    pub fn add_buffer(&mut self, buffer: BufferConfig) -> BufferId {
        self.config.buffers.push(buffer);
        BufferId(self.config.buffers.len() - 1)
    }

    pub fn add_machine(&mut self, machine: MachineConfig) -> MachineId {
        self.config.machines.push(machine);
        MachineId(self.config.machines.len() - 1)
    }

    pub fn add_sink(&mut self, sink: SinkConfig) -> SinkId {
        self.config.sinks.push(sink);
        SinkId(self.config.sinks.len() - 1)
    }

    /// Route parts from one station to another
    pub fn connect(&mut self, from: impl Into<Node>, to: impl Into<Node>) -> SimResult<()> {
        let (from, to) = (from.into(), to.into());
        RoutingValidator::validate_route(&self.config, from, to)?;
        if self.config.routes.iter().any(|r| r.from == from && r.to == to) {
            return Err(SimError::config(format!("{} is already connected to {}", from, to)));
        }
        self.config.routes.push(Route { from, to });
        Ok(())
    }

    pub fn with_maintainer(&mut self, capacity: usize) -> &mut Self {
        self.config.maintainer.capacity = capacity;
        self
    }

    pub fn with_selection_strategy(&mut self, strategy: SelectionStrategy) -> &mut Self {
        self.config.maintainer.strategy = strategy;
        self
    }

    pub fn with_selection_policy(&mut self, policy: Arc<dyn SelectionPolicy>) -> &mut Self {
        self.config.maintainer.custom_policy = Some(policy);
        self
    }

    pub fn maintainer(&self) -> &MaintainerConfig {
        &self.config.maintainer
    }

    /// Validate the topology and hand out the finished description
    pub fn build(self) -> SimResult<LineConfig> {
        RoutingValidator::resolve(&self.config)?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential_per_kind() {
        let mut builder = LineBuilder::new();
        assert_eq!(builder.add_machine(MachineConfig::new(1.0)), MachineId(0));
        assert_eq!(builder.add_machine(MachineConfig::new(1.0)), MachineId(1));
        assert_eq!(builder.add_buffer(BufferConfig::new(3)), BufferId(0));
        assert_eq!(builder.add_source(SourceConfig::unlimited()), SourceId(0));
    }

    #[test]
    fn test_connect_rejects_unknown_and_duplicate() {
        let mut builder = LineBuilder::new();
        let source = builder.add_source(SourceConfig::unlimited());
        let machine = builder.add_machine(MachineConfig::new(1.0));
        assert!(builder.connect(machine, SinkId(0)).is_err());
        builder.connect(source, machine).unwrap();
        assert!(builder.connect(source, machine).is_err());
    }

    #[test]
    fn test_build_validates_topology() {
        let mut builder = LineBuilder::new();
        let source = builder.add_source(SourceConfig::unlimited());
        let machine = builder.add_machine(MachineConfig::new(1.0));
        builder.add_sink(SinkConfig::default());
        builder.connect(source, machine).unwrap();
        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("Machine0 has no downstream"), "{}", err);
    }

    #[test]
    fn test_maintainer_settings() {
        let mut builder = LineBuilder::new();
        builder
            .with_maintainer(3)
            .with_selection_strategy(SelectionStrategy::ShortestRepairFirst);
        assert_eq!(builder.maintainer().capacity, 3);
        assert_eq!(builder.maintainer().strategy, SelectionStrategy::ShortestRepairFirst);
    }
}
