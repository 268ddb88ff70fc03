use crate::core::entity::BankId;
use serde::{Deserialize, Serialize};

/// A bank's persistent balance-sheet state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    pub id: BankId,
    pub name: String,
    /// Non-negative after clearing.
    pub equity: f64,
    /// Non-negative after clearing.
    pub deposits: f64,
    /// Loan book size reported by the bank; drives its market-share weight.
    pub gross_loans: f64,
    pub tier1_capital: Option<f64>,
    /// Fraction in (0, 1].
    pub capital_requirement: f64,
    pub covered_cds_prob: f64,
    pub naked_cds_prob: f64,
}

impl Bank {
    /// Ceiling on cumulative loan assets for the coming period.
    pub fn max_credit(&self) -> f64 {
        self.deposits / self.capital_requirement
    }

    pub fn is_finite(&self) -> bool {
        self.equity.is_finite() && self.deposits.is_finite()
    }
}

/// Per-period working balance sheet of one bank.
///
/// Opened from the [`Bank`] record before any loan is assessed; the matchers
/// book every committed contract here so later requests in the same period
/// see the running totals rather than the period-start snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BankBook {
    /// Fixed at period start.
    pub max_credit: f64,
    pub deposits: f64,
    pub equity: f64,
    pub loan_assets: f64,
    pub loan_liabilities: f64,
    pub cds_assets: f64,
    pub cds_liabilities: f64,
    /// Deposit balance after lending and interbank borrowing, before clearing.
    pub current_deposits: f64,
}

impl BankBook {
    pub fn open(bank: &Bank) -> Self {
        Self {
            max_credit: bank.max_credit(),
            deposits: bank.deposits,
            equity: bank.equity,
            current_deposits: bank.deposits,
            ..Default::default()
        }
    }

    /// Funding left after lending `amount` more:
    /// `deposits + loan_liabilities - (amount + loan_assets)`.
    ///
    /// Negative values are the shortfall that must be borrowed interbank.
    pub fn residual_capacity(&self, amount: f64) -> f64 {
        self.deposits + self.loan_liabilities - (amount + self.loan_assets)
    }

    /// Whether lending `amount` more keeps loan assets within `max_credit`.
    pub fn within_max_credit(&self, amount: f64) -> bool {
        amount + self.loan_assets <= self.max_credit
    }

    /// Seller affordability test for writing protection with the given premium.
    pub fn can_write_protection(&self, premium: f64) -> bool {
        self.deposits + self.loan_liabilities + self.equity - self.loan_assets + self.cds_assets
            >= premium
    }

    pub fn book_loan_asset(&mut self, amount: f64) {
        self.loan_assets += amount;
        self.current_deposits -= amount;
    }

    pub fn book_borrowing(&mut self, amount: f64) {
        self.loan_liabilities += amount;
        self.current_deposits += amount;
    }
}
