//! Serializable description of a production line.

use crate::core::components::degradation::DegradationChain;
use crate::core::components::machine::{MaintenanceModel, PreventivePolicy};
use crate::core::components::maintainer::{SelectionPolicy, SelectionStrategy};
use crate::core::distributions::{Sampler, TimeDistribution};
use crate::core::errors::{SimError, SimResult};
use crate::core::types::Node;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Time between a part leaving the source and the next one being ready
    #[serde(default = "SourceConfig::default_interarrival")]
    pub interarrival: TimeDistribution,
}

impl SourceConfig {
    fn default_interarrival() -> TimeDistribution {
        TimeDistribution::constant(0.0)
    }

    /// Source that always has a part ready
    pub fn unlimited() -> Self {
        Self {
            name: None,
            interarrival: Self::default_interarrival(),
        }
    }

    pub fn with_interarrival(interarrival: TimeDistribution) -> Self {
        Self {
            name: None,
            interarrival,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::unlimited()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub capacity: usize,
}

impl BufferConfig {
    pub fn new(capacity: usize) -> Self {
        Self { name: None, capacity }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub name: Option<String>,
}

impl SinkConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub cycle_time: f64,
    /// Row-stochastic, upper-triangular matrix; `None` means the machine never degrades
    #[serde(default)]
    pub degradation: Option<Vec<Vec<f64>>>,
    /// Health state at or above which a preventive request is raised
    #[serde(default)]
    pub cbm_threshold: Option<usize>,
    #[serde(default)]
    pub pm_distribution: Option<TimeDistribution>,
    #[serde(default)]
    pub cm_distribution: Option<TimeDistribution>,
    #[serde(default)]
    pub preventive_policy: PreventivePolicy,
}

impl MachineConfig {
    pub fn new(cycle_time: f64) -> Self {
        Self {
            name: None,
            cycle_time,
            degradation: None,
            cbm_threshold: None,
            pm_distribution: None,
            cm_distribution: None,
            preventive_policy: PreventivePolicy::default(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_degradation(mut self, matrix: Vec<Vec<f64>>, cm_distribution: TimeDistribution) -> Self {
        self.degradation = Some(matrix);
        self.cm_distribution = Some(cm_distribution);
        self
    }

    pub fn with_cbm(mut self, threshold: usize, pm_distribution: TimeDistribution) -> Self {
        self.cbm_threshold = Some(threshold);
        self.pm_distribution = Some(pm_distribution);
        self
    }

    pub fn with_preventive_policy(mut self, policy: PreventivePolicy) -> Self {
        self.preventive_policy = policy;
        self
    }

    pub fn validate_cycle_time(&self) -> SimResult<f64> {
        if !self.cycle_time.is_finite() || self.cycle_time <= 0.0 {
            return Err(SimError::config(format!(
                "cycle time {} must be positive and finite",
                self.cycle_time
            )));
        }
        Ok(self.cycle_time)
    }

    /// Validate the degradation and repair parameters
    pub fn maintenance_model(&self) -> SimResult<Option<MaintenanceModel>> {
        let Some(matrix) = &self.degradation else {
            if self.cbm_threshold.is_some() {
                return Err(SimError::config("CBM threshold set without a degradation matrix"));
            }
            if self.pm_distribution.is_some() || self.cm_distribution.is_some() {
                warn!("repair distributions given for a machine that never degrades; ignoring them");
            }
            return Ok(None);
        };

        let chain = DegradationChain::new(matrix.clone())?;
        let failed = chain.failed_state();

        if let Some(threshold) = self.cbm_threshold {
            if threshold > failed {
                return Err(SimError::config(format!(
                    "CBM threshold {} outside [0, {}]",
                    threshold, failed
                )));
            }
        }

        let corrective = match &self.cm_distribution {
            Some(dist) => with_mean(dist)?,
            None => {
                return Err(SimError::config(
                    "degrading machine needs a corrective repair distribution",
                ))
            }
        };

        let preventive = match (&self.pm_distribution, self.cbm_threshold) {
            (Some(dist), _) => Some(with_mean(dist)?),
            (None, Some(threshold)) if threshold < failed => {
                return Err(SimError::config(
                    "CBM threshold below the failed state needs a preventive repair distribution",
                ))
            }
            (None, _) => None,
        };

        Ok(Some(MaintenanceModel {
            chain,
            cbm_threshold: self.cbm_threshold,
            preventive,
            corrective,
            policy: self.preventive_policy,
        }))
    }
}

fn with_mean(dist: &TimeDistribution) -> SimResult<(Sampler, f64)> {
    Ok((dist.sampler()?, dist.mean()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintainerConfig {
    /// Number of repairs that can run at once
    pub capacity: usize,
    #[serde(default)]
    pub strategy: SelectionStrategy,
    /// Overrides `strategy` when set
    #[serde(skip)]
    pub custom_policy: Option<Arc<dyn SelectionPolicy>>,
}

impl MaintainerConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            strategy: SelectionStrategy::default(),
            custom_policy: None,
        }
    }

    pub fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn SelectionPolicy>) -> Self {
        self.custom_policy = Some(policy);
        self
    }

    pub fn policy(&self) -> Arc<dyn SelectionPolicy> {
        match &self.custom_policy {
            Some(policy) => Arc::clone(policy),
            None => self.strategy.policy(),
        }
    }
}

impl Default for MaintainerConfig {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Directed edge of the routing graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub from: Node,
    pub to: Node,
}

/// Complete static description of a line; immutable once a run starts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineConfig {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub buffers: Vec<BufferConfig>,
    #[serde(default)]
    pub machines: Vec<MachineConfig>,
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub maintainer: MaintainerConfig,
}

impl LineConfig {
    pub fn from_json(json: &str) -> SimResult<Self> {
        serde_json::from_str(json).map_err(|e| SimError::config(format!("invalid line description: {}", e)))
    }

    pub fn to_json(&self) -> SimResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SimError::config(format!("cannot serialize line description: {}", e)))
    }
}
