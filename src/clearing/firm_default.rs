//! Goods-market clearing and firm default resolution.

use crate::core::config::{Calibration, ConfigError, ConsumptionRegime};
use crate::core::contract::ContractLog;
use crate::core::entity::FirmId;
use crate::core::firm::Firm;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Share of its loan obligations a firm can pay out of `equity`.
///
/// Returns 1 when the firm owes nothing or can pay in full; otherwise the
/// non-negative part of equity spread pro rata over what is owed.
///
/// # Examples
///
/// ```
/// use credit_contagion::clearing::firm_default::recovery_rate;
///
/// assert_eq!(recovery_rate(500.0, 400.0), 1.0);
/// assert_eq!(recovery_rate(100.0, 400.0), 0.25);
/// assert_eq!(recovery_rate(-50.0, 400.0), 0.0);
/// ```
pub fn recovery_rate(equity: f64, owed: f64) -> f64 {
    if owed <= 0.0 || equity >= owed {
        1.0
    } else {
        equity.max(0.0) / owed
    }
}

/// Result of resolving firm defaults for one period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirmSettlement {
    /// Indexed by firm id; 1.0 for every firm that paid in full.
    pub recovery_rates: Vec<f64>,
    /// Firms that could not cover their loan obligations, in id order.
    pub defaulting: Vec<FirmId>,
    /// Principal plus interest owed per firm.
    pub owed: Vec<f64>,
    /// Amount each bank recovers from its firm loans, indexed by bank id.
    pub loan_proceeds: Vec<f64>,
    /// Realised consumption share per firm.
    pub consumption: Vec<f64>,
}

impl FirmSettlement {
    pub fn recovery_rate(&self, firm: FirmId) -> f64 {
        self.recovery_rates[firm.index()]
    }

    pub fn is_defaulting(&self, firm: FirmId) -> bool {
        self.recovery_rates[firm.index()] < 1.0
    }

    pub fn total_proceeds(&self) -> f64 {
        self.loan_proceeds.iter().sum()
    }
}

/// Clears the goods market for every firm and settles its loans.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FirmDefaultResolver {
    regime: ConsumptionRegime,
    min_consumption: f64,
    max_consumption: f64,
}

impl FirmDefaultResolver {
    pub fn new(regime: ConsumptionRegime, min_consumption: f64, max_consumption: f64) -> Self {
        Self {
            regime,
            min_consumption,
            max_consumption,
        }
    }

    /// Resolver for the given economy state.
    pub fn for_state(calibration: &Calibration, state: usize) -> Result<Self, ConfigError> {
        Ok(Self::new(
            calibration.regime(state)?,
            calibration.min_consumption,
            calibration.max_consumption,
        ))
    }

    /// One draw of `clamp(Normal(mean, std), min, max)`.
    pub fn consumption_share<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let z: f64 = rng.sample(StandardNormal);
        (self.regime.mean + self.regime.std * z).clamp(self.min_consumption, self.max_consumption)
    }

    /// Pay wages, sell `share` of supply and record the unsold units.
    ///
    /// The wage bill is capped at available equity, cutting supply to match.
    pub fn produce_and_sell(&self, firm: &mut Firm, share: f64) {
        let mut wage_bill = firm.wage_bill_for(firm.supply);
        if wage_bill > firm.equity {
            wage_bill = firm.equity.max(0.0);
            firm.supply = firm.supply_for_budget(wage_bill);
        }
        firm.equity -= wage_bill;
        firm.equity += firm.price * share * firm.supply;
        firm.excess_supply = (1.0 - share) * firm.supply;
    }

    /// Clear the goods market for every firm, in id order, then settle each
    /// firm's loans recorded in `log`.
    ///
    /// Defaulting firms pay out what equity they have and are left with
    /// zero equity.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        firms: &mut [Firm],
        log: &ContractLog,
        num_banks: usize,
    ) -> FirmSettlement {
        let mut owed = vec![0.0; firms.len()];
        for loan in log.firm_loans() {
            owed[loan.borrower.index()] += loan.amount_owed();
        }

        let mut consumption = Vec::with_capacity(firms.len());
        let mut recovery_rates = Vec::with_capacity(firms.len());
        let mut defaulting = Vec::new();
        for firm in firms.iter_mut() {
            let share = self.consumption_share(rng);
            self.produce_and_sell(firm, share);
            consumption.push(share);

            let due = owed[firm.id.index()];
            let recovery = recovery_rate(firm.equity, due);
            if recovery < 1.0 {
                defaulting.push(firm.id);
                firm.equity = 0.0;
            } else {
                firm.equity -= due;
            }
            recovery_rates.push(recovery);
        }

        let mut loan_proceeds = vec![0.0; num_banks];
        for loan in log.firm_loans() {
            loan_proceeds[loan.lender.index()] +=
                recovery_rates[loan.borrower.index()] * loan.amount_owed();
        }

        FirmSettlement {
            recovery_rates,
            defaulting,
            owed,
            loan_proceeds,
            consumption,
        }
    }
}
