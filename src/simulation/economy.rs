use crate::core::config::{Calibration, ConfigError, EconomyConfig};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

/// Discrete-state Markov chain driving the consumption regime.
///
/// State `i` selects `consumption_regimes[i]` of the calibration.
#[derive(Debug, Clone)]
pub struct EconomyChain {
    start: WeightedIndex<f64>,
    transitions: Vec<WeightedIndex<f64>>,
    fixed_path: Vec<usize>,
}

impl EconomyChain {
    pub fn new(config: &EconomyConfig) -> Result<Self, ConfigError> {
        if !config.fixed_path.is_empty() {
            // Placeholder distributions; a fixed path is never sampled.
            let single = WeightedIndex::new([1.0]).map_err(invalid)?;
            return Ok(Self {
                start: single,
                transitions: Vec::new(),
                fixed_path: config.fixed_path.clone(),
            });
        }
        let start = WeightedIndex::new(&config.starting_prob).map_err(invalid)?;
        let transitions = config
            .transition_matrix
            .iter()
            .map(|row| WeightedIndex::new(row).map_err(invalid))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            start,
            transitions,
            fixed_path: Vec::new(),
        })
    }

    pub fn from_calibration(calibration: &Calibration) -> Result<Self, ConfigError> {
        Self::new(&calibration.economy)
    }

    /// State for each of `periods` periods.
    ///
    /// A configured fixed path is repeated cyclically when shorter than the
    /// run; otherwise the first state is drawn from the starting
    /// probabilities and each later state from the previous state's row.
    pub fn path<R: Rng + ?Sized>(&self, rng: &mut R, periods: usize) -> Vec<usize> {
        if !self.fixed_path.is_empty() {
            return self.fixed_path.iter().copied().cycle().take(periods).collect();
        }
        if periods == 0 {
            return Vec::new();
        }
        let mut path = Vec::with_capacity(periods);
        let mut state = self.start.sample(rng);
        for period in 0..periods {
            if period > 0 {
                state = self.transitions[state].sample(rng);
            }
            path.push(state);
        }
        path
    }
}

fn invalid(err: rand::distributions::WeightedError) -> ConfigError {
    ConfigError::InvalidEconomy(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_chain_starts_good() {
        let chain = EconomyChain::new(&EconomyConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            let path = chain.path(&mut rng, 10);
            assert_eq!(path.len(), 10);
            assert_eq!(path[0], 0);
            assert!(path.iter().all(|&s| s < 2));
        }
    }

    #[test]
    fn test_absorbing_state() {
        let config = EconomyConfig {
            starting_prob: vec![0.0, 1.0],
            transition_matrix: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            fixed_path: Vec::new(),
        };
        let chain = EconomyChain::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(chain.path(&mut rng, 5), vec![1; 5]);
    }

    #[test]
    fn test_fixed_path_cycles() {
        let config = EconomyConfig {
            fixed_path: vec![0, 1],
            ..Default::default()
        };
        let chain = EconomyChain::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(chain.path(&mut rng, 5), vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_empty_path_draws_nothing() {
        let chain = EconomyChain::new(&EconomyConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        assert!(chain.path(&mut rng, 0).is_empty());
        assert_eq!(rng.gen::<u64>(), StdRng::seed_from_u64(4).gen::<u64>());
    }

    #[test]
    fn test_zero_row_rejected() {
        let config = EconomyConfig {
            starting_prob: vec![0.0, 0.0],
            ..Default::default()
        };
        assert!(matches!(
            EconomyChain::new(&config),
            Err(ConfigError::InvalidEconomy(_))
        ));
    }
}
