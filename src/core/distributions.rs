//! Duration distributions for interarrival and repair times.
//!
//! [`TimeDistribution`] is the serializable description used in configs;
//! [`Sampler`] is the validated form that draws samples from a run's RNG.

use super::errors::{SimError, SimResult};
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use rand_distr::{Exp, LogNormal, Normal, Triangular};
use serde::{Deserialize, Serialize};

/// Named duration distribution with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeDistribution {
    Constant { value: f64 },
    Uniform { low: f64, high: f64 },
    Exponential { mean: f64 },
    /// Samples below zero are clamped to zero
    Normal { mean: f64, std_dev: f64 },
    LogNormal { mu: f64, sigma: f64 },
    Triangular { min: f64, mode: f64, max: f64 },
}

impl TimeDistribution {
    pub fn constant(value: f64) -> Self {
        TimeDistribution::Constant { value }
    }

    pub fn uniform(low: f64, high: f64) -> Self {
        TimeDistribution::Uniform { low, high }
    }

    pub fn exponential(mean: f64) -> Self {
        TimeDistribution::Exponential { mean }
    }

    /// Expected value of the (untruncated) distribution
    pub fn mean(&self) -> f64 {
        match *self {
            TimeDistribution::Constant { value } => value,
            TimeDistribution::Uniform { low, high } => (low + high) / 2.0,
            TimeDistribution::Exponential { mean } => mean,
            TimeDistribution::Normal { mean, .. } => mean,
            TimeDistribution::LogNormal { mu, sigma } => (mu + sigma * sigma / 2.0).exp(),
            TimeDistribution::Triangular { min, mode, max } => (min + mode + max) / 3.0,
        }
    }

    /// Validate the parameters and build a sampler
    pub fn sampler(&self) -> SimResult<Sampler> {
        let params = self.params();
        if params.iter().any(|p| !p.is_finite()) {
            return Err(SimError::config(format!("{:?} has non-finite parameters", self)));
        }

        let sampler = match *self {
            TimeDistribution::Constant { value } => {
                if value < 0.0 {
                    return Err(SimError::config(format!("constant duration {} is negative", value)));
                }
                Sampler::Constant(value)
            }
            TimeDistribution::Uniform { low, high } => {
                if low < 0.0 || low > high {
                    return Err(SimError::config(format!(
                        "uniform({}, {}) needs 0 <= low <= high",
                        low, high
                    )));
                }
                Sampler::Uniform(Uniform::new_inclusive(low, high))
            }
            TimeDistribution::Exponential { mean } => {
                if mean <= 0.0 {
                    return Err(SimError::config(format!("exponential mean {} must be positive", mean)));
                }
                Sampler::Exponential(Exp::new(1.0 / mean).map_err(|e| {
                    SimError::config(format!("exponential(mean={}): {}", mean, e))
                })?)
            }
            TimeDistribution::Normal { mean, std_dev } => {
                // rand_distr accepts a negative std_dev and mirrors it
                if std_dev <= 0.0 {
                    return Err(SimError::config(format!("normal std_dev {} must be positive", std_dev)));
                }
                if mean <= 0.0 {
                    return Err(SimError::config(format!("normal mean {} must be positive", mean)));
                }
                Sampler::Normal(
                    Normal::new(mean, std_dev)
                        .map_err(|e| SimError::config(format!("normal({}, {}): {}", mean, std_dev, e)))?,
                )
            }
            TimeDistribution::LogNormal { mu, sigma } => {
                if sigma <= 0.0 {
                    return Err(SimError::config(format!("lognormal sigma {} must be positive", sigma)));
                }
                Sampler::LogNormal(
                    LogNormal::new(mu, sigma)
                        .map_err(|e| SimError::config(format!("lognormal({}, {}): {}", mu, sigma, e)))?,
                )
            }
            TimeDistribution::Triangular { min, mode, max } => {
                if min < 0.0 {
                    return Err(SimError::config(format!("triangular min {} is negative", min)));
                }
                Sampler::Triangular(Triangular::new(min, max, mode).map_err(|e| {
                    SimError::config(format!("triangular({}, {}, {}): {}", min, mode, max, e))
                })?)
            }
        };
        Ok(sampler)
    }

    fn params(&self) -> Vec<f64> {
        match *self {
            TimeDistribution::Constant { value } => vec![value],
            TimeDistribution::Uniform { low, high } => vec![low, high],
            TimeDistribution::Exponential { mean } => vec![mean],
            TimeDistribution::Normal { mean, std_dev } => vec![mean, std_dev],
            TimeDistribution::LogNormal { mu, sigma } => vec![mu, sigma],
            TimeDistribution::Triangular { min, mode, max } => vec![min, mode, max],
        }
    }
}

/// Validated distribution ready to draw durations
#[derive(Debug, Clone)]
pub enum Sampler {
    Constant(f64),
    Uniform(Uniform<f64>),
    Exponential(Exp<f64>),
    Normal(Normal<f64>),
    LogNormal(LogNormal<f64>),
    Triangular(Triangular<f64>),
}

impl Sampler {
    /// Draw a non-negative duration
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let value = match self {
            Sampler::Constant(value) => *value,
            Sampler::Uniform(dist) => dist.sample(rng),
            Sampler::Exponential(dist) => dist.sample(rng),
            Sampler::Normal(dist) => dist.sample(rng),
            Sampler::LogNormal(dist) => dist.sample(rng),
            Sampler::Triangular(dist) => dist.sample(rng),
        };
        value.max(0.0)
    }

    /// True when every sample is the same value
    pub fn is_deterministic(&self) -> bool {
        matches!(self, Sampler::Constant(_))
    }
}
