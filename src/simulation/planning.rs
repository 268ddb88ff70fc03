//! Firm production planning ahead of the credit market.
//!
//! Each firm resets its wage, adjusts price or supply against the market
//! price, caps supply at what its leverage limit can fund and works out how
//! much credit it needs for the resulting wage bill.

use crate::core::config::Calibration;
use crate::core::entity::FirmId;
use crate::core::firm::Firm;
use crate::market::loan_matcher::LoanRequest;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Largest per-period relative move of a wage.
pub const MAX_WAGE_ADJUSTMENT: f64 = 0.02;
/// Largest per-period relative move of a price.
pub const MAX_PRICE_ADJUSTMENT: f64 = 0.02;
/// Largest per-period relative move of supply.
pub const MAX_SUPPLY_ADJUSTMENT: f64 = 0.02;

/// A firm's plan for the period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FirmPlan {
    pub firm: FirmId,
    pub wage_bill: f64,
    /// `max(0, wage_bill - equity)`.
    pub credit_demand: f64,
    /// `credit_demand / equity`, or 0 without positive equity.
    pub financial_fragility: f64,
}

impl FirmPlan {
    pub fn wants_credit(&self) -> bool {
        self.credit_demand > 0.0
    }
}

/// Plans for every firm plus planning diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionPlan {
    /// Indexed by firm id.
    pub plans: Vec<FirmPlan>,
    /// Firms whose planned supply exceeded their leverage limit.
    pub supply_threshold_breaches: usize,
    /// Repriced firms whose price was lifted to cover minimum cost.
    pub min_price_breaches: usize,
}

impl ProductionPlan {
    /// Credit requests for firms that need funding, in the given firm order.
    pub fn loan_requests(&self, firms: &[Firm], order: &[FirmId]) -> Vec<LoanRequest> {
        order
            .iter()
            .map(|id| &self.plans[id.index()])
            .filter(|plan| plan.wants_credit())
            .map(|plan| LoanRequest {
                firm: plan.firm,
                amount: plan.credit_demand,
                financial_fragility: plan.financial_fragility,
                prob_default: firms[plan.firm.index()].default_probability,
            })
            .collect()
    }

    pub fn total_credit_demand(&self) -> f64 {
        self.plans.iter().map(|p| p.credit_demand).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adjustment {
    CutPrice,
    RaisePrice,
    CutSupply,
    RaiseSupply,
}

impl Adjustment {
    fn for_firm(firm: &Firm, market_price: f64) -> Self {
        let unsold = firm.excess_supply > 0.0;
        let cheap = firm.price < market_price;
        match (unsold, cheap) {
            (true, false) => Adjustment::CutPrice,
            (false, true) => Adjustment::RaisePrice,
            (true, true) => Adjustment::CutSupply,
            (false, false) => Adjustment::RaiseSupply,
        }
    }

    fn reprices(self) -> bool {
        matches!(self, Adjustment::CutPrice | Adjustment::RaisePrice)
    }
}

/// Plan production for every firm, updating wage, price and supply in place.
///
/// Draws one wage adjustment per firm, then one price adjustment per firm,
/// then one supply adjustment per firm, each pass in id order.
pub fn plan_production<R: Rng + ?Sized>(
    rng: &mut R,
    calibration: &Calibration,
    market_price: f64,
    firms: &mut [Firm],
) -> ProductionPlan {
    let n = firms.len();
    let wage_moves: Vec<f64> = (0..n)
        .map(|_| rng.gen_range(-MAX_WAGE_ADJUSTMENT..MAX_WAGE_ADJUSTMENT))
        .collect();
    let price_moves: Vec<f64> = (0..n)
        .map(|_| rng.gen_range(0.0..MAX_PRICE_ADJUSTMENT))
        .collect();
    let supply_moves: Vec<f64> = (0..n)
        .map(|_| rng.gen_range(0.0..MAX_SUPPLY_ADJUSTMENT))
        .collect();

    let p = calibration.excess_supply_prob;
    let cut_factor = -p / (1.0 - p);

    let mut plan = ProductionPlan {
        plans: Vec::with_capacity(n),
        ..Default::default()
    };
    for (i, firm) in firms.iter_mut().enumerate() {
        firm.wage = (firm.wage * (1.0 + wage_moves[i])).max(calibration.min_wage);
        firm.supply *= 1.0 + firm.profit;

        let adjustment = Adjustment::for_firm(firm, market_price);
        match adjustment {
            Adjustment::CutPrice => firm.price *= 1.0 + price_moves[i] * cut_factor,
            Adjustment::RaisePrice => firm.price *= 1.0 + price_moves[i],
            Adjustment::CutSupply => firm.supply *= 1.0 + supply_moves[i] * cut_factor,
            Adjustment::RaiseSupply => firm.supply *= 1.0 + supply_moves[i],
        }

        let threshold = firm.supply_for_budget((1.0 + f64::from(firm.max_leverage)) * firm.equity);
        if firm.supply > threshold {
            plan.supply_threshold_breaches += 1;
            firm.supply = threshold;
        }
        firm.supply = firm.supply.max(0.0);
        let wage_bill = firm.wage_bill_for(firm.supply);

        if adjustment.reprices() {
            let mut min_price = firm.wage / firm.productivity;
            if firm.supply > 0.0 {
                min_price +=
                    calibration.policy_rate * (wage_bill - firm.equity).max(0.0) / firm.supply;
            }
            if min_price > firm.price {
                plan.min_price_breaches += 1;
                firm.price = min_price;
            }
        }

        let credit_demand = (wage_bill - firm.equity.max(0.0)).max(0.0);
        let financial_fragility = if firm.equity > 0.0 {
            credit_demand / firm.equity
        } else {
            0.0
        };
        plan.plans.push(FirmPlan {
            firm: firm.id,
            wage_bill,
            credit_demand,
            financial_fragility,
        });
    }
    plan
}
