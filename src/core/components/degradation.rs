use crate::core::errors::{SimError, SimResult};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

/// Row sums may deviate from one by at most this much
pub const ROW_SUM_TOLERANCE: f64 = 1e-9;

/// Discrete-time Markov chain over health states `0..n`, with `n - 1` the absorbing failed state.
///
/// Matrices are validated on construction: square, at least two states, entries in
/// `[0, 1]`, rows summing to one, no transition to a healthier state, and the last
/// state absorbing.
#[derive(Debug, Clone)]
pub struct DegradationChain {
    matrix: Vec<Vec<f64>>,
    rows: Vec<Option<WeightedIndex<f64>>>,
}

impl DegradationChain {
    pub fn new(matrix: Vec<Vec<f64>>) -> SimResult<Self> {
        let n = matrix.len();
        if n < 2 {
            return Err(SimError::config(format!(
                "degradation matrix needs at least 2 states, got {}",
                n
            )));
        }

        let mut rows = Vec::with_capacity(n);
        for (i, row) in matrix.iter().enumerate() {
            if row.len() != n {
                return Err(SimError::config(format!(
                    "degradation matrix row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
            if let Some(p) = row.iter().find(|p| !p.is_finite() || **p < 0.0 || **p > 1.0) {
                return Err(SimError::config(format!(
                    "degradation matrix row {} has probability {} outside [0, 1]",
                    i, p
                )));
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(SimError::config(format!(
                    "degradation matrix row {} sums to {}, not 1",
                    i, sum
                )));
            }
            if row[..i].iter().any(|p| *p > 0.0) {
                return Err(SimError::config(format!(
                    "degradation matrix row {} allows recovery to a healthier state",
                    i
                )));
            }

            // Rows that always stay put need no sampling
            if row[i] >= 1.0 {
                rows.push(None);
            } else {
                let dist = WeightedIndex::new(row.iter().copied())
                    .map_err(|e| SimError::config(format!("degradation matrix row {}: {}", i, e)))?;
                rows.push(Some(dist));
            }
        }

        if rows[n - 1].is_some() {
            return Err(SimError::config(
                "last degradation state must be absorbing (self-probability 1)",
            ));
        }

        Ok(Self { matrix, rows })
    }

    /// Number of health states
    pub fn states(&self) -> usize {
        self.matrix.len()
    }

    /// Index of the absorbing failed state
    pub fn failed_state(&self) -> usize {
        self.matrix.len() - 1
    }

    pub fn matrix(&self) -> &[Vec<f64>] {
        &self.matrix
    }

    /// One Markov step from `current`; depends on nothing but `current` and the RNG
    pub fn step<R: Rng + ?Sized>(&self, current: usize, rng: &mut R) -> usize {
        match &self.rows[current] {
            Some(dist) => dist.sample(rng),
            None => current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_two_state_chain() {
        let chain = DegradationChain::new(vec![vec![0.99, 0.01], vec![0.0, 1.0]]).unwrap();
        assert_eq!(chain.states(), 2);
        assert_eq!(chain.failed_state(), 1);
        let mut rng = StdRng::seed_from_u64(3);
        // Failed state never leaves
        assert!((0..100).all(|_| chain.step(1, &mut rng) == 1));
    }

    #[test]
    fn test_steps_never_go_backwards() {
        let chain = DegradationChain::new(vec![
            vec![0.5, 0.3, 0.1, 0.1],
            vec![0.0, 0.6, 0.3, 0.1],
            vec![0.0, 0.0, 0.7, 0.3],
            vec![0.0, 0.0, 0.0, 1.0],
        ])
        .unwrap();
        let mut rng = StdRng::seed_from_u64(99);
        let mut state = 0;
        for _ in 0..1000 {
            let next = chain.step(state, &mut rng);
            assert!(next >= state);
            state = if next == chain.failed_state() { 0 } else { next };
        }
    }

    #[test]
    fn test_transition_frequencies_follow_row() {
        let chain = DegradationChain::new(vec![vec![0.75, 0.25], vec![0.0, 1.0]]).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let trials = 20_000;
        let failures = (0..trials).filter(|_| chain.step(0, &mut rng) == 1).count();
        let freq = failures as f64 / trials as f64;
        assert!((freq - 0.25).abs() < 0.02, "observed {}", freq);
    }

    #[test]
    fn test_rejects_non_stochastic_rows() {
        let err = DegradationChain::new(vec![vec![0.9, 0.2], vec![0.0, 1.0]]).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_rejects_non_square_and_tiny() {
        assert!(DegradationChain::new(vec![vec![1.0]]).is_err());
        assert!(DegradationChain::new(vec![vec![0.5, 0.5], vec![0.0, 0.5, 0.5]]).is_err());
    }

    #[test]
    fn test_rejects_recovery_and_non_absorbing_last_state() {
        assert!(DegradationChain::new(vec![vec![0.5, 0.5], vec![0.1, 0.9]]).is_err());
        assert!(DegradationChain::new(vec![
            vec![0.5, 0.5, 0.0],
            vec![0.0, 0.5, 0.5],
            vec![0.0, 0.0, 1.0],
        ])
        .is_ok());
    }

    #[test]
    fn test_tolerates_rounding_in_row_sums() {
        let third = 1.0 / 3.0;
        assert!(DegradationChain::new(vec![vec![third, third, third], vec![0.0, 0.5, 0.5], vec![0.0, 0.0, 1.0]]).is_ok());
    }
}
