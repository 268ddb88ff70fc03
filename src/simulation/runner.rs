use crate::core::config::Calibration;
use crate::core::store::EntityStore;
use crate::simulation::economy::EconomyChain;
use crate::simulation::period::{run_period, PeriodOutcome, PeriodSummary, SimulationError};
use log::warn;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A completed multi-period run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub seed: u64,
    pub economy_path: Vec<usize>,
    pub outcomes: Vec<PeriodOutcome>,
    /// State carried out of the final period.
    pub store: EntityStore,
}

impl RunReport {
    pub fn summaries(&self) -> Vec<PeriodSummary> {
        self.outcomes.iter().map(PeriodOutcome::summary).collect()
    }

    pub fn total_firm_defaults(&self) -> usize {
        self.outcomes.iter().map(|o| o.firms.defaulting.len()).sum()
    }

    pub fn total_bank_defaults(&self) -> usize {
        self.outcomes.iter().map(|o| o.defaulting_banks().len()).sum()
    }
}

/// Run every configured period from an existing random stream.
///
/// The calibration is validated before anything is drawn. The economy path
/// for the whole run is drawn before the first period.
pub fn run_with_rng(
    rng: &mut StdRng,
    seed: u64,
    calibration: &Calibration,
    mut store: EntityStore,
) -> Result<RunReport, SimulationError> {
    calibration.validate()?;
    let chain = EconomyChain::from_calibration(calibration)?;
    let economy_path = chain.path(rng, calibration.periods);

    let mut outcomes = Vec::with_capacity(economy_path.len());
    for (period, &state) in economy_path.iter().enumerate() {
        outcomes.push(run_period(rng, calibration, &mut store, period, state)?);
    }
    Ok(RunReport {
        seed,
        economy_path,
        outcomes,
        store,
    })
}

/// Run every configured period with a stream seeded from `seed`.
///
/// # Examples
///
/// ```
/// use credit_contagion::core::config::Calibration;
/// use credit_contagion::simulation::population::{generate_store, PopulationConfig};
/// use credit_contagion::simulation::runner::run;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let calibration = Calibration { periods: 2, ..Default::default() };
/// let population = PopulationConfig { num_firms: 20, num_banks: 3, ..Default::default() };
/// let store = generate_store(&mut StdRng::seed_from_u64(1), &population, &calibration).unwrap();
///
/// let report = run(7, &calibration, store).unwrap();
/// assert_eq!(report.outcomes.len(), 2);
/// ```
pub fn run(
    seed: u64,
    calibration: &Calibration,
    store: EntityStore,
) -> Result<RunReport, SimulationError> {
    let mut rng = StdRng::seed_from_u64(seed);
    run_with_rng(&mut rng, seed, calibration, store)
}

/// Monte-Carlo batch settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub runs: usize,
    pub base_seed: u64,
    /// Attempts per run before it is reported as failed.
    pub max_attempts: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            runs: 10,
            base_seed: 0,
            max_attempts: 5,
        }
    }
}

/// One run of a batch.
#[derive(Debug)]
pub struct BatchRun {
    pub run: usize,
    /// Seed of the last attempt.
    pub seed: u64,
    pub attempts: usize,
    pub result: Result<RunReport, SimulationError>,
}

/// Seed of attempt `attempt` (from 0) of run `run`.
///
/// Attempt `a` of run `k` uses `base_seed + k + a * runs`, so retries never
/// reuse a seed belonging to another run of the same batch.
pub fn attempt_seed(config: &BatchConfig, run: usize, attempt: usize) -> u64 {
    let stride = config.runs.max(1) as u64;
    config
        .base_seed
        .wrapping_add(run as u64)
        .wrapping_add((attempt as u64).wrapping_mul(stride))
}

/// Run independent seeded simulations in parallel.
///
/// The calibration is validated once before any run is dispatched. `setup`
/// builds the initial population from the run's stream before the first
/// period. A run that fails is retried under its next seed from
/// [`attempt_seed`], up to `max_attempts` times. Results come back in run
/// order.
pub fn run_batch<F>(
    calibration: &Calibration,
    config: &BatchConfig,
    setup: F,
) -> Result<Vec<BatchRun>, SimulationError>
where
    F: Fn(&mut StdRng) -> Result<EntityStore, SimulationError> + Sync,
{
    calibration.validate()?;
    Ok((0..config.runs)
        .into_par_iter()
        .map(|run| {
            let mut attempts = 0;
            loop {
                let seed = attempt_seed(config, run, attempts);
                attempts += 1;
                let mut rng = StdRng::seed_from_u64(seed);
                let result = setup(&mut rng)
                    .and_then(|store| run_with_rng(&mut rng, seed, calibration, store));
                match result {
                    Err(err) if attempts < config.max_attempts => {
                        warn!("run {} failed under seed {}: {}; retrying", run, seed, err);
                    }
                    result => {
                        return BatchRun {
                            run,
                            seed,
                            attempts,
                            result,
                        }
                    }
                }
            }
        })
        .collect())
}
