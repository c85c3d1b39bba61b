use crate::core::components::buffer::Feeder;
use crate::core::components::source::SourceOutlet;
use crate::core::config::LineConfig;
use crate::core::errors::{SimError, SimResult};
use crate::core::types::{BufferId, Downstream, MachineId, Node, SinkId, SourceId, Upstream};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Neighbour references of every entity, resolved from the route list
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    pub source_outlets: Vec<SourceOutlet>,
    pub buffer_feeders: Vec<Feeder>,
    pub buffer_consumers: Vec<MachineId>,
    pub machine_upstreams: Vec<Upstream>,
    pub machine_downstreams: Vec<Downstream>,
}

/// Validates the routing graph of a line and resolves each entity's neighbours
pub struct RoutingValidator;

impl RoutingValidator {
    /// Check a single edge against the entity counts and the allowed station pairings
    pub fn validate_route(config: &LineConfig, from: Node, to: Node) -> SimResult<()> {
        Self::check_exists(config, from)?;
        Self::check_exists(config, to)?;
        match (from, to) {
            (Node::Source(_), Node::Buffer(_))
            | (Node::Source(_), Node::Machine(_))
            | (Node::Buffer(_), Node::Machine(_))
            | (Node::Machine(_), Node::Buffer(_))
            | (Node::Machine(_), Node::Sink(_)) => Ok(()),
            _ => Err(SimError::config(format!("cannot route {} to {}", from, to))),
        }
    }

    fn check_exists(config: &LineConfig, node: Node) -> SimResult<()> {
        let exists = match node {
            Node::Source(id) => id.index() < config.sources.len(),
            Node::Buffer(id) => id.index() < config.buffers.len(),
            Node::Machine(id) => id.index() < config.machines.len(),
            Node::Sink(id) => id.index() < config.sinks.len(),
        };
        if exists {
            Ok(())
        } else {
            Err(SimError::config(format!("route references unknown {}", node)))
        }
    }

    /// Validate the whole graph and resolve it into a [`Topology`]
    pub fn resolve(config: &LineConfig) -> SimResult<Topology> {
        if config.sources.is_empty() {
            return Err(SimError::config("line has no source"));
        }
        if config.sinks.is_empty() {
            return Err(SimError::config("line has no sink"));
        }

        let mut seen = BTreeSet::new();
        let mut outgoing: BTreeMap<Node, Vec<Node>> = BTreeMap::new();
        let mut incoming: BTreeMap<Node, Vec<Node>> = BTreeMap::new();
        for route in &config.routes {
            Self::validate_route(config, route.from, route.to)?;
            if !seen.insert((route.from, route.to)) {
                return Err(SimError::config(format!(
                    "route {} -> {} is declared twice",
                    route.from, route.to
                )));
            }
            outgoing.entry(route.from).or_default().push(route.to);
            incoming.entry(route.to).or_default().push(route.from);
        }
        let outs = |node: Node| outgoing.get(&node).map(Vec::as_slice).unwrap_or(&[]);
        let ins = |node: Node| incoming.get(&node).map(Vec::as_slice).unwrap_or(&[]);

        let mut machine_upstreams = Vec::with_capacity(config.machines.len());
        let mut machine_downstreams = Vec::with_capacity(config.machines.len());
        for index in 0..config.machines.len() {
            let node = Node::Machine(MachineId(index));
            let upstream = match exactly_one(node, "upstream", ins(node))? {
                Node::Source(id) => Upstream::Source(id),
                Node::Buffer(id) => Upstream::Buffer(id),
                other => unreachable_route(other, node)?,
            };
            let downstream = match exactly_one(node, "downstream", outs(node))? {
                Node::Buffer(id) => Downstream::Buffer(id),
                Node::Sink(id) => Downstream::Sink(id),
                other => unreachable_route(node, other)?,
            };
            machine_upstreams.push(upstream);
            machine_downstreams.push(downstream);
        }

        let mut buffer_feeders = Vec::with_capacity(config.buffers.len());
        let mut buffer_consumers = Vec::with_capacity(config.buffers.len());
        for (index, buffer) in config.buffers.iter().enumerate() {
            let node = Node::Buffer(BufferId(index));
            if buffer.capacity == 0 {
                return Err(SimError::config(format!("{} has zero capacity", node)));
            }
            let feeder = match exactly_one(node, "upstream", ins(node))? {
                Node::Source(id) => Feeder::Source(id),
                Node::Machine(id) => Feeder::Machine(id),
                other => unreachable_route(other, node)?,
            };
            let consumer = match exactly_one(node, "downstream", outs(node))? {
                Node::Machine(id) => id,
                other => unreachable_route(node, other)?,
            };
            buffer_feeders.push(feeder);
            buffer_consumers.push(consumer);
        }

        let mut source_outlets = Vec::with_capacity(config.sources.len());
        for index in 0..config.sources.len() {
            let node = Node::Source(SourceId(index));
            let targets = outs(node);
            let outlet = match targets {
                [] => return Err(SimError::config(format!("{} has no downstream", node))),
                [Node::Buffer(id)] => SourceOutlet::Buffer(*id),
                _ => {
                    let mut machines = Vec::with_capacity(targets.len());
                    for target in targets {
                        match target {
                            Node::Machine(id) => machines.push(*id),
                            _ => {
                                return Err(SimError::config(format!(
                                    "{} feeding a buffer cannot have other downstream stations",
                                    node
                                )))
                            }
                        }
                    }
                    SourceOutlet::Machines(machines)
                }
            };
            source_outlets.push(outlet);
        }

        for index in 0..config.sinks.len() {
            let node = Node::Sink(SinkId(index));
            if ins(node).is_empty() {
                return Err(SimError::config(format!("{} has no upstream", node)));
            }
        }

        Self::check_acyclic(config, &outgoing)?;

        Ok(Topology {
            source_outlets,
            buffer_feeders,
            buffer_consumers,
            machine_upstreams,
            machine_downstreams,
        })
    }

    /// Kahn's algorithm over every node; anything left unprocessed sits on a cycle
    fn check_acyclic(config: &LineConfig, outgoing: &BTreeMap<Node, Vec<Node>>) -> SimResult<()> {
        let nodes: Vec<Node> = (0..config.sources.len())
            .map(|i| Node::Source(SourceId(i)))
            .chain((0..config.buffers.len()).map(|i| Node::Buffer(BufferId(i))))
            .chain((0..config.machines.len()).map(|i| Node::Machine(MachineId(i))))
            .chain((0..config.sinks.len()).map(|i| Node::Sink(SinkId(i))))
            .collect();

        let mut in_degree: BTreeMap<Node, usize> = nodes.iter().map(|n| (*n, 0)).collect();
        for targets in outgoing.values() {
            for target in targets {
                if let Some(degree) = in_degree.get_mut(target) {
                    *degree += 1;
                }
            }
        }

        let mut ready: VecDeque<Node> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(node, _)| *node)
            .collect();
        let mut processed = 0;
        while let Some(node) = ready.pop_front() {
            processed += 1;
            for target in outgoing.get(&node).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(target) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(*target);
                    }
                }
            }
        }

        if processed < nodes.len() {
            let on_cycle: Vec<String> = in_degree
                .iter()
                .filter(|(_, &degree)| degree > 0)
                .map(|(node, _)| node.to_string())
                .collect();
            return Err(SimError::config(format!(
                "routing graph has a cycle through {}",
                on_cycle.join(", ")
            )));
        }
        Ok(())
    }
}

fn exactly_one(node: Node, side: &str, neighbours: &[Node]) -> SimResult<Node> {
    match neighbours {
        [single] => Ok(*single),
        [] => Err(SimError::config(format!("{} has no {} station", node, side))),
        many => Err(SimError::config(format!(
            "{} has {} {} stations, expected exactly one",
            node,
            many.len(),
            side
        ))),
    }
}

fn unreachable_route<T>(from: Node, to: Node) -> SimResult<T> {
    Err(SimError::config(format!("cannot route {} to {}", from, to)))
}
