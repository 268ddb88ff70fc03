//! Interest-rate and CDS spread formulas.
//!
//! Every random term is drawn from the caller's stream, in a fixed order per
//! quote, so identical seeds reproduce identical prices.

use rand::Rng;
use rand_distr::StandardNormal;

/// Floor applied to the noisy default probability used in CDS quotes.
pub const MIN_QUOTED_DEFAULT_PROBABILITY: f64 = 0.01;

/// Standard deviation of the noise added to the default probability.
pub const DEFAULT_PROBABILITY_NOISE: f64 = 0.01;

/// Rate a bank offers a firm:
/// `policy_rate * (1 + U(0, h_theta) * tanh((1 + U(0.9, 1.1) * pd) * fragility))`.
///
/// Draws the markup noise first, then the default-probability scaling.
pub fn firm_loan_rate<R: Rng + ?Sized>(
    rng: &mut R,
    policy_rate: f64,
    h_theta: f64,
    prob_default: f64,
    financial_fragility: f64,
) -> f64 {
    let markup = rng.gen_range(0.0..=h_theta);
    let pd_scale = rng.gen_range(0.9..=1.1);
    policy_rate * (1.0 + markup * ((1.0 + pd_scale * prob_default) * financial_fragility).tanh())
}

/// Rate a bank offers another bank: `policy_rate * (1 + U(0, h_theta) * tanh(fragility))`.
pub fn interbank_rate<R: Rng + ?Sized>(
    rng: &mut R,
    policy_rate: f64,
    h_theta: f64,
    financial_fragility: f64,
) -> f64 {
    let markup = rng.gen_range(0.0..=h_theta);
    policy_rate * (1.0 + markup * financial_fragility.tanh())
}

/// Default probability as perceived by a protection seller:
/// `pd + max(N(0, 0.01), 0.01 - pd)`, so never below 1%.
pub fn quoted_default_probability<R: Rng + ?Sized>(rng: &mut R, prob_default: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    prob_default
        + (DEFAULT_PROBABILITY_NOISE * z).max(MIN_QUOTED_DEFAULT_PROBABILITY - prob_default)
}

/// One-period Hull CDS spread.
///
/// `spread = (1 - R - A·R) · q · v / (q · (u + e) + (1 - q) · u)` with
/// `u = v = e = 1 / (1 + policy_rate)`, `q` the default probability, `R` the
/// assumed recovery and `A` the accrued interest of the underlying loan.
///
/// # Examples
///
/// ```
/// use credit_contagion::market::pricing::cds_spread;
///
/// // Zero rates: spread = (1 - R) * q / (q + 1).
/// let s = cds_spread(0.1, 0.0, 0.0, 0.3);
/// assert!((s - 0.7 * 0.1 / 1.1).abs() < 1e-12);
/// ```
pub fn cds_spread(prob_default: f64, policy_rate: f64, loan_rate: f64, recovery: f64) -> f64 {
    let discount = 1.0 / (1.0 + policy_rate);
    let (u, v, e) = (discount, discount, discount);
    let q = prob_default;
    let expected_payoff = (1.0 - recovery - loan_rate * recovery) * q * v;
    let expected_payments = q * (u + e) + (1.0 - q) * u;
    expected_payoff / expected_payments
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_loan_rate_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1_000 {
            let r = firm_loan_rate(&mut rng, 0.02, 0.1, 0.05, 3.0);
            assert!(r >= 0.02);
            assert!(r <= 0.02 * 1.1 + 1e-15);
        }
    }

    #[test]
    fn test_zero_fragility_prices_at_policy_rate() {
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(firm_loan_rate(&mut rng, 0.025, 0.1, 0.2, 0.0), 0.025);
        assert_eq!(interbank_rate(&mut rng, 0.025, 0.1, 0.0), 0.025);
    }

    #[test]
    fn test_zero_theta_is_allowed() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(firm_loan_rate(&mut rng, 0.03, 0.0, 0.2, 5.0), 0.03);
    }

    #[test]
    fn test_quoted_default_probability_floor() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..1_000 {
            assert!(quoted_default_probability(&mut rng, 0.0) >= 0.01 - 1e-15);
        }
    }

    #[test]
    fn test_cds_spread_known_value() {
        let r: f64 = 0.025;
        let d = 1.0 / (1.0 + r);
        let q = 0.05;
        let expected = (1.0 - 0.3 - 0.04 * 0.3) * q * d / (q * 2.0 * d + (1.0 - q) * d);
        assert_relative_eq!(cds_spread(q, r, 0.04, 0.3), expected, epsilon = 1e-14);
    }

    #[test]
    fn test_cds_spread_increases_with_default_probability() {
        let low = cds_spread(0.02, 0.025, 0.04, 0.3);
        let high = cds_spread(0.2, 0.025, 0.04, 0.3);
        assert!(high > low);
    }
}
