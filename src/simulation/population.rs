//! Synthetic firm and bank populations.
//!
//! Firm equity and supply are drawn jointly from truncated Pareto marginals
//! tied by a Gaussian copula; wages, leverage limits and prices are spread
//! around the calibration's reference values.

use crate::core::bank::Bank;
use crate::core::config::Calibration;
use crate::core::entity::{BankId, FirmId};
use crate::core::firm::Firm;
use crate::core::store::{EntityStore, StoreError};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Parameters for generating a random population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub num_firms: usize,
    pub num_banks: usize,
    /// Productivity shared by every firm.
    pub productivity: f64,
    pub min_max_leverage: u32,
    pub max_max_leverage: u32,
    /// Default probability of the most leveraged firms.
    pub leverage_severity: f64,
    /// Copula correlation between firm equity and supply.
    pub equity_supply_correlation: f64,
    pub equity_bounds: (f64, f64),
    pub equity_tail: f64,
    pub supply_bounds: (f64, f64),
    pub supply_tail: f64,
    pub bank_deposit_bounds: (f64, f64),
    pub bank_deposit_tail: f64,
    /// Range of bank equity as a fraction of deposits.
    pub bank_equity_ratio: (f64, f64),
    /// Range of gross loans as a fraction of deposits.
    pub bank_loan_ratio: (f64, f64),
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            num_firms: 200,
            num_banks: 10,
            productivity: 140.844_727,
            min_max_leverage: 2,
            max_max_leverage: 15,
            leverage_severity: 0.30,
            equity_supply_correlation: 0.937_765_503,
            equity_bounds: (9.870_300_29e5, 1.510_208_13e8),
            equity_tail: 1.667_138_67,
            supply_bounds: (7.814_712_52e3, 6.986_114_50e5),
            supply_tail: 1.665_084_84,
            bank_deposit_bounds: (5e8, 2e10),
            bank_deposit_tail: 1.2,
            bank_equity_ratio: (0.05, 0.15),
            bank_loan_ratio: (0.6, 1.0),
        }
    }
}

/// Default probability implied by a firm's leverage limit:
/// `severity * (1 + lev - min) / (1 + max - min)`.
///
/// # Examples
///
/// ```
/// use credit_contagion::simulation::population::default_probability;
///
/// assert!((default_probability(15, 2, 15, 0.3) - 0.3).abs() < 1e-12);
/// assert!((default_probability(2, 2, 15, 0.3) - 0.3 / 14.0).abs() < 1e-12);
/// ```
pub fn default_probability(max_leverage: u32, min: u32, max: u32, severity: f64) -> f64 {
    let span = 1 + max.saturating_sub(min);
    severity * f64::from(1 + max_leverage.saturating_sub(min)) / f64::from(span)
}

/// Inverse CDF of the Pareto distribution with tail index `alpha` truncated
/// to `[lb, ub]`.
pub fn truncated_pareto_inv(y: f64, alpha: f64, lb: f64, ub: f64) -> f64 {
    let (la, ua) = (lb.powf(alpha), ub.powf(alpha));
    (-(y * ua - y * la - ua) / (la * ua)).powf(-1.0 / alpha)
}

/// Standard normal CDF via the Abramowitz and Stegun erfc approximation
/// (absolute error below 1.5e-7).
pub fn norm_cdf(x: f64) -> f64 {
    let z = x.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + 0.327_591_1 * z);
    let poly = 0.254_829_592
        + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429)));
    let erfc = t * poly * (-z * z).exp();
    if x >= 0.0 {
        1.0 - 0.5 * erfc
    } else {
        0.5 * erfc
    }
}

/// Draw `n` pairs of uniforms coupled through a Gaussian copula.
fn copula_uniforms<R: Rng + ?Sized>(rng: &mut R, n: usize, rho: f64) -> Vec<(f64, f64)> {
    let scale = (1.0 - rho * rho).max(0.0).sqrt();
    (0..n)
        .map(|_| {
            let z1: f64 = rng.sample(StandardNormal);
            let e: f64 = rng.sample(StandardNormal);
            let z2 = rho * z1 + scale * e;
            (norm_cdf(z1), norm_cdf(z2))
        })
        .collect()
}

/// Generate firms around the calibration's wage, price and excess-supply
/// parameters.
pub fn generate_firms<R: Rng + ?Sized>(
    rng: &mut R,
    config: &PopulationConfig,
    calibration: &Calibration,
) -> Vec<Firm> {
    let n = config.num_firms;
    let excess: Vec<bool> = (0..n)
        .map(|_| rng.gen_bool(calibration.excess_supply_prob))
        .collect();
    let wages: Vec<f64> = (0..n)
        .map(|_| {
            let z: f64 = rng.sample(StandardNormal);
            let bump = calibration.min_wage * 0.05 + (calibration.min_wage * 0.1).sqrt() * z;
            calibration.min_wage + bump.abs()
        })
        .collect();
    let leverage: Vec<u32> = (0..n)
        .map(|_| rng.gen_range(config.min_max_leverage..=config.max_max_leverage))
        .collect();
    let balance = copula_uniforms(rng, n, config.equity_supply_correlation);
    let prices: Vec<f64> = (0..n)
        .map(|_| {
            let z: f64 = rng.sample(StandardNormal);
            calibration.market_price * (1.0 + 0.01 * z)
        })
        .collect();

    (0..n)
        .map(|i| {
            let (u_equity, u_supply) = balance[i];
            let (elb, eub) = config.equity_bounds;
            let (slb, sub) = config.supply_bounds;
            Firm {
                id: FirmId::new(i),
                equity: truncated_pareto_inv(u_equity, config.equity_tail, elb, eub),
                supply: truncated_pareto_inv(u_supply, config.supply_tail, slb, sub),
                price: prices[i],
                wage: wages[i],
                productivity: config.productivity,
                excess_supply: if excess[i] { 1.0 } else { 0.0 },
                max_leverage: leverage[i],
                default_probability: default_probability(
                    leverage[i],
                    config.min_max_leverage,
                    config.max_max_leverage,
                    config.leverage_severity,
                ),
                profit: 0.0,
            }
        })
        .collect()
}

/// Generate banks with Pareto-distributed deposit bases.
pub fn generate_banks<R: Rng + ?Sized>(
    rng: &mut R,
    config: &PopulationConfig,
    calibration: &Calibration,
) -> Vec<Bank> {
    let (lb, ub) = config.bank_deposit_bounds;
    (0..config.num_banks)
        .map(|i| {
            let id = BankId::new(i);
            let u: f64 = rng.gen();
            let deposits = truncated_pareto_inv(u, config.bank_deposit_tail, lb, ub);
            let (e_lo, e_hi) = config.bank_equity_ratio;
            let (l_lo, l_hi) = config.bank_loan_ratio;
            let equity_ratio = rng.gen_range(e_lo..=e_hi);
            let loan_ratio = rng.gen_range(l_lo..=l_hi);
            Bank {
                id,
                name: id.to_string(),
                equity: deposits * equity_ratio,
                deposits,
                gross_loans: deposits * loan_ratio,
                tier1_capital: None,
                capital_requirement: calibration.capital_req,
                covered_cds_prob: calibration.covered_cds_prob,
                naked_cds_prob: calibration.naked_cds_prob,
            }
        })
        .collect()
}

/// Generate a complete store: firms first, then banks.
pub fn generate_store<R: Rng + ?Sized>(
    rng: &mut R,
    config: &PopulationConfig,
    calibration: &Calibration,
) -> Result<EntityStore, StoreError> {
    let firms = generate_firms(rng, config, calibration);
    let banks = generate_banks(rng, config, calibration);
    EntityStore::new(firms, banks, calibration.market_price)
}
