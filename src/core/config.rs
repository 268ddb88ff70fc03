use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors arising from calibration loading and validation.
///
/// Malformed calibration is rejected here, before any period runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a probability in [0, 1], got {value}")]
    Probability { name: &'static str, value: f64 },
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("{name} must be non-negative, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },
    #[error("capital requirement must be in (0, 1], got {0}")]
    CapitalRequirement(f64),
    #[error("consumption bounds must satisfy 0 <= min <= max <= 1, got [{min}, {max}]")]
    ConsumptionBounds { min: f64, max: f64 },
    #[error("at least one consumption regime is required")]
    EmptyRegimes,
    #[error("economy state {state} has no consumption regime ({count} configured)")]
    UnknownRegime { state: usize, count: usize },
    #[error("invalid economy chain: {0}")]
    InvalidEconomy(String),
    #[error("failed to parse calibration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read calibration: {0}")]
    Io(#[from] std::io::Error),
}

/// Consumption distribution for one economy state.
///
/// The realised consumption share of each firm is drawn from
/// `Normal(mean, std)` and clamped to the calibration's consumption bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRegime {
    pub mean: f64,
    pub std: f64,
}

impl ConsumptionRegime {
    pub const fn new(mean: f64, std: f64) -> Self {
        Self { mean, std }
    }
}

/// Markov chain over economy states (index `i` selects `consumption_regimes[i]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub starting_prob: Vec<f64>,
    pub transition_matrix: Vec<Vec<f64>>,
    /// When non-empty, used verbatim as the per-period state path instead of
    /// sampling the chain.
    pub fixed_path: Vec<usize>,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_prob: vec![1.0, 0.0],
            transition_matrix: vec![vec![0.7, 0.3], vec![0.8, 0.2]],
            fixed_path: Vec::new(),
        }
    }
}

/// Read-only run configuration passed into every component.
///
/// Loaded from JSON; any key left out falls back to [`Calibration::default`].
///
/// # Examples
///
/// ```
/// use credit_contagion::core::config::Calibration;
///
/// let calibration = Calibration::from_json_str(r#"{ "policy_rate": 0.01 }"#).unwrap();
/// assert_eq!(calibration.policy_rate, 0.01);
/// assert_eq!(calibration.max_bank_loan, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Number of periods simulated per run.
    pub periods: usize,
    pub policy_rate: f64,
    /// Fraction of deposits banks must hold; `max_credit = deposits / capital_req`.
    pub capital_req: f64,
    /// Upper bound of the uniform markup noise in the loan rate formula.
    pub h_theta: f64,
    pub max_bank_loan: usize,
    pub max_interbank_loan: usize,
    pub max_cds_requests: usize,
    pub covered_cds_prob: f64,
    pub naked_cds_prob: f64,
    /// Recovery rate assumed by CDS sellers when quoting spreads.
    pub cds_recovery_assumption: f64,
    pub consumption_regimes: Vec<ConsumptionRegime>,
    pub min_consumption: f64,
    pub max_consumption: f64,
    pub economy: EconomyConfig,
    /// Mean deposit growth, in percent per period.
    pub mu_deposit_growth: f64,
    /// Deposit growth standard deviation, in percent per period.
    pub std_deposit_growth: f64,
    /// Market price at the start of the run.
    pub market_price: f64,
    pub min_wage: f64,
    /// Probability of a firm having excess supply; drives price/supply cuts.
    pub excess_supply_prob: f64,
    pub max_clearing_iterations: usize,
    pub clearing_tolerance: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            periods: 1,
            policy_rate: 0.025,
            capital_req: 0.85,
            h_theta: 0.1,
            max_bank_loan: 5,
            max_interbank_loan: 3,
            max_cds_requests: 3,
            covered_cds_prob: 0.5,
            naked_cds_prob: 0.1,
            cds_recovery_assumption: 0.3,
            consumption_regimes: vec![
                ConsumptionRegime::new(0.88, 0.01),
                ConsumptionRegime::new(0.83, 0.01),
            ],
            min_consumption: 0.7,
            max_consumption: 1.0,
            economy: EconomyConfig::default(),
            mu_deposit_growth: 0.0,
            std_deposit_growth: 3.0,
            market_price: 600.0,
            min_wage: 80_000.0,
            excess_supply_prob: 0.25,
            max_clearing_iterations: 10_000,
            clearing_tolerance: 1e-6,
        }
    }
}

impl Calibration {
    /// Parse and validate a calibration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let calibration: Calibration = serde_json::from_str(json)?;
        calibration.validate()?;
        Ok(calibration)
    }

    /// Read, parse and validate a calibration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Reject ranges the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("covered_cds_prob", self.covered_cds_prob),
            ("naked_cds_prob", self.naked_cds_prob),
            ("cds_recovery_assumption", self.cds_recovery_assumption),
        ] {
            check_probability(name, value)?;
        }
        // Also a divisor in p / (1 - p).
        if !(0.0..1.0).contains(&self.excess_supply_prob) {
            return Err(ConfigError::Probability {
                name: "excess_supply_prob",
                value: self.excess_supply_prob,
            });
        }
        if !(self.capital_req > 0.0 && self.capital_req <= 1.0) {
            return Err(ConfigError::CapitalRequirement(self.capital_req));
        }
        for (name, value) in [
            ("policy_rate", self.policy_rate),
            ("h_theta", self.h_theta),
            ("std_deposit_growth", self.std_deposit_growth),
        ] {
            check_non_negative(name, value)?;
        }
        for (name, value) in [
            ("market_price", self.market_price),
            ("min_wage", self.min_wage),
            ("clearing_tolerance", self.clearing_tolerance),
            ("max_clearing_iterations", self.max_clearing_iterations as f64),
        ] {
            check_positive(name, value)?;
        }
        if !self.mu_deposit_growth.is_finite() {
            return Err(ConfigError::NonFinite {
                name: "mu_deposit_growth",
                value: self.mu_deposit_growth,
            });
        }
        if !(0.0 <= self.min_consumption
            && self.min_consumption <= self.max_consumption
            && self.max_consumption <= 1.0)
        {
            return Err(ConfigError::ConsumptionBounds {
                min: self.min_consumption,
                max: self.max_consumption,
            });
        }
        if self.consumption_regimes.is_empty() {
            return Err(ConfigError::EmptyRegimes);
        }
        for regime in &self.consumption_regimes {
            check_non_negative("consumption std", regime.std)?;
            if !regime.mean.is_finite() {
                return Err(ConfigError::NonFinite {
                    name: "consumption mean",
                    value: regime.mean,
                });
            }
        }
        self.validate_economy()
    }

    fn validate_economy(&self) -> Result<(), ConfigError> {
        let states = self.consumption_regimes.len();
        let economy = &self.economy;
        if let Some(&state) = economy.fixed_path.iter().find(|&&s| s >= states) {
            return Err(ConfigError::UnknownRegime {
                state,
                count: states,
            });
        }
        if !economy.fixed_path.is_empty() {
            // The chain is never sampled.
            return Ok(());
        }
        if economy.starting_prob.len() != states {
            return Err(ConfigError::InvalidEconomy(format!(
                "{} starting probabilities for {} states",
                economy.starting_prob.len(),
                states
            )));
        }
        if economy.transition_matrix.len() != states
            || economy.transition_matrix.iter().any(|row| row.len() != states)
        {
            return Err(ConfigError::InvalidEconomy(format!(
                "transition matrix must be {states}x{states}"
            )));
        }
        let rows = std::iter::once(&economy.starting_prob).chain(&economy.transition_matrix);
        for row in rows {
            for &p in row {
                check_probability("economy probability", p)?;
            }
            let total: f64 = row.iter().sum();
            if (total - 1.0).abs() > 1e-9 {
                return Err(ConfigError::InvalidEconomy(format!(
                    "probabilities must sum to 1, got {total}"
                )));
            }
        }
        Ok(())
    }

    /// Consumption distribution for the given economy state.
    pub fn regime(&self, state: usize) -> Result<ConsumptionRegime, ConfigError> {
        self.consumption_regimes
            .get(state)
            .copied()
            .ok_or(ConfigError::UnknownRegime {
                state,
                count: self.consumption_regimes.len(),
            })
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Probability { name, value })
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

fn check_non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Negative { name, value })
    }
}
