use crate::core::entity::FirmId;
use serde::{Deserialize, Serialize};

/// Balance sheet and production state of a firm.
///
/// A flat record: all per-period behaviour lives in free functions in
/// [`simulation::planning`](crate::simulation::planning) and
/// [`clearing::firm_default`](crate::clearing::firm_default). Loans owed by the
/// firm are not stored here; they are recorded in the period's
/// [`ContractLog`](crate::core::contract::ContractLog).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Firm {
    pub id: FirmId,
    /// Authoritative balance-sheet equity. May be negative transiently
    /// before default processing.
    pub equity: f64,
    pub supply: f64,
    pub price: f64,
    pub wage: f64,
    pub productivity: f64,
    /// Units left unsold last period.
    pub excess_supply: f64,
    /// Cap on the loan-financed wage bill relative to equity.
    pub max_leverage: u32,
    /// Derived from `max_leverage`; only used to price CDS and loans.
    pub default_probability: f64,
    /// Relative equity change over the previous period.
    pub profit: f64,
}

impl Firm {
    /// Units of output a given wage budget pays for.
    pub fn supply_for_budget(&self, budget: f64) -> f64 {
        budget * self.productivity / self.wage
    }

    /// Wage bill needed to produce `supply` units.
    pub fn wage_bill_for(&self, supply: f64) -> f64 {
        self.wage * supply / self.productivity
    }

    pub fn is_finite(&self) -> bool {
        [
            self.equity,
            self.supply,
            self.price,
            self.wage,
            self.excess_supply,
            self.profit,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_firm() -> Firm {
        Firm {
            id: FirmId::new(0),
            equity: 1_000.0,
            supply: 50.0,
            price: 10.0,
            wage: 20.0,
            productivity: 2.0,
            excess_supply: 0.0,
            max_leverage: 3,
            default_probability: 0.05,
            profit: 0.0,
        }
    }

    #[test]
    fn test_wage_bill_and_budget_are_inverse() {
        let firm = sample_firm();
        let bill = firm.wage_bill_for(50.0);
        assert_eq!(bill, 500.0);
        assert_eq!(firm.supply_for_budget(bill), 50.0);
    }

    #[test]
    fn test_nan_detected() {
        let mut firm = sample_firm();
        assert!(firm.is_finite());
        firm.equity = f64::NAN;
        assert!(!firm.is_finite());
    }
}
