//! Interbank clearing: Eisenberg–Noe clearing vector extended with CDS
//! obligations, followed by deposit settlement.
//!
//! # Algorithm
//!
//! With `Lbar` the row sums of the liability matrix and `Π` its row-normalised
//! form, payments start at `Lbar` and are repeatedly reset to
//! `clamp(initial_wealth + Πᵀ·payments, 0, Lbar)` until no entry moves by more
//! than the tolerance. The iteration is monotone non-increasing, so it
//! converges for any non-negative matrix; the iteration bound only guards
//! against a tolerance too tight for floating point.

use crate::clearing::liability::LiabilityMatrix;
use crate::core::bank::{Bank, BankBook};
use crate::core::config::Calibration;
use crate::core::entity::BankId;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the clearing fixed point.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClearingError {
    #[error("clearing vector did not converge within {iterations} iterations")]
    NotConverged { iterations: usize },
    #[error("non-finite clearing input for {bank}")]
    NonFinite { bank: BankId },
    #[error("{field} has {found} entries for {expected} banks")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Fixed point of the clearing iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearingVector {
    /// Actual payment made by each bank.
    pub payments: Vec<f64>,
    /// Total obligations per bank (`Lbar`).
    pub obligations: Vec<f64>,
    /// Payments received per bank at the fixed point (`Πᵀ·payments`).
    pub inflows: Vec<f64>,
    /// Banks whose wealth falls short of their obligations.
    pub default_set: Vec<BankId>,
    pub iterations: usize,
}

impl ClearingVector {
    /// Shortfall of each bank's payment against its obligations.
    pub fn shortfalls(&self) -> Vec<f64> {
        self.obligations
            .iter()
            .zip(&self.payments)
            .map(|(owed, paid)| owed - paid)
            .collect()
    }
}

fn inflows(relative: &[Vec<f64>], payments: &[f64]) -> Vec<f64> {
    let mut received = vec![0.0; payments.len()];
    for (row, &paid) in relative.iter().zip(payments) {
        if paid == 0.0 {
            continue;
        }
        for (r, share) in received.iter_mut().zip(row) {
            *r += share * paid;
        }
    }
    received
}

/// One run of the clearing iteration, stepped explicitly.
///
/// Starts from full payment and moves one Picard step per [`step`]; each
/// step can only lower payments. [`clearing_vector`] drives this to its
/// fixed point.
///
/// [`step`]: ClearingIteration::step
#[derive(Debug, Clone)]
pub struct ClearingIteration {
    relative: Vec<Vec<f64>>,
    obligations: Vec<f64>,
    initial_wealth: Vec<f64>,
    payments: Vec<f64>,
    iterations: usize,
}

impl ClearingIteration {
    /// Validate the inputs and set payments to `Lbar`.
    pub fn new(matrix: &LiabilityMatrix, initial_wealth: &[f64]) -> Result<Self, ClearingError> {
        let n = matrix.size();
        if initial_wealth.len() != n {
            return Err(ClearingError::LengthMismatch {
                field: "initial wealth",
                expected: n,
                found: initial_wealth.len(),
            });
        }
        if let Some((bank, _)) = matrix.first_non_finite() {
            return Err(ClearingError::NonFinite { bank });
        }
        if let Some(i) = initial_wealth.iter().position(|w| !w.is_finite()) {
            return Err(ClearingError::NonFinite {
                bank: BankId::new(i),
            });
        }

        let obligations = matrix.row_sums();
        Ok(Self {
            relative: matrix.relative(),
            payments: obligations.clone(),
            obligations,
            initial_wealth: initial_wealth.to_vec(),
            iterations: 0,
        })
    }

    /// Reset every payment to `clamp(wealth + inflow, 0, Lbar)` and return
    /// the largest change.
    pub fn step(&mut self) -> f64 {
        self.iterations += 1;
        let received = inflows(&self.relative, &self.payments);
        let mut max_change: f64 = 0.0;
        for (i, payment) in self.payments.iter_mut().enumerate() {
            let next = (self.initial_wealth[i] + received[i]).clamp(0.0, self.obligations[i]);
            max_change = max_change.max((next - *payment).abs());
            *payment = next;
        }
        max_change
    }

    pub fn payments(&self) -> &[f64] {
        &self.payments
    }

    pub fn obligations(&self) -> &[f64] {
        &self.obligations
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Close the iteration: inflows and default set under the current payments.
    pub fn finish(self) -> ClearingVector {
        let received = inflows(&self.relative, &self.payments);
        let default_set = (0..self.payments.len())
            .filter(|&i| self.initial_wealth[i] + received[i] < self.obligations[i])
            .map(BankId::new)
            .collect();
        ClearingVector {
            payments: self.payments,
            obligations: self.obligations,
            inflows: received,
            default_set,
            iterations: self.iterations,
        }
    }
}

/// Solve for the clearing vector.
///
/// # Examples
///
/// ```
/// use credit_contagion::clearing::interbank::clearing_vector;
/// use credit_contagion::clearing::liability::LiabilityMatrix;
///
/// // Bank 0 owes bank 1 50 but only has 30.
/// let matrix = LiabilityMatrix::from_rows(&[vec![0.0, 50.0], vec![0.0, 0.0]]).unwrap();
/// let result = clearing_vector(&matrix, &[30.0, 0.0], 1e-6, 100).unwrap();
/// assert_eq!(result.payments, vec![30.0, 0.0]);
/// assert_eq!(result.default_set.len(), 1);
/// ```
pub fn clearing_vector(
    matrix: &LiabilityMatrix,
    initial_wealth: &[f64],
    tolerance: f64,
    max_iterations: usize,
) -> Result<ClearingVector, ClearingError> {
    let mut iteration = ClearingIteration::new(matrix, initial_wealth)?;
    loop {
        if iteration.iterations() == max_iterations {
            return Err(ClearingError::NotConverged {
                iterations: max_iterations,
            });
        }
        if iteration.step() < tolerance {
            return Ok(iteration.finish());
        }
    }
}

/// Outcome of a bank's period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankStatus {
    Solvent,
    /// Could not meet its interbank obligations at the clearing fixed point.
    DefaultedByContagion,
    /// Cleared interbank but could not honour deposit withdrawals.
    DefaultedByDepositRun,
}

impl BankStatus {
    pub fn is_default(self) -> bool {
        !matches!(self, BankStatus::Solvent)
    }
}

impl std::fmt::Display for BankStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BankStatus::Solvent => "solvent",
            BankStatus::DefaultedByContagion => "defaulted (contagion)",
            BankStatus::DefaultedByDepositRun => "defaulted (deposit run)",
        };
        f.write_str(label)
    }
}

/// Per-bank result of interbank clearing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankClearing {
    pub vector: ClearingVector,
    /// Indexed by bank id.
    pub statuses: Vec<BankStatus>,
    /// Wealth left after interbank settlement, before deposits.
    pub earnings: Vec<f64>,
}

impl BankClearing {
    pub fn defaulting_banks(&self) -> Vec<BankId> {
        self.statuses
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_default())
            .map(|(i, _)| BankId::new(i))
            .collect()
    }

    pub fn count(&self, status: BankStatus) -> usize {
        self.statuses.iter().filter(|&&s| s == status).count()
    }
}

/// Clears the interbank market and settles each bank's balance sheet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterbankClearingEngine {
    tolerance: f64,
    max_iterations: usize,
}

impl Default for InterbankClearingEngine {
    fn default() -> Self {
        Self::new(1e-6, 10_000)
    }
}

impl InterbankClearingEngine {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    pub fn from_calibration(calibration: &Calibration) -> Self {
        Self::new(
            calibration.clearing_tolerance,
            calibration.max_clearing_iterations,
        )
    }

    /// Wealth available before interbank payments:
    /// `equity + loan_proceeds + min(deposit_change, 0)`.
    ///
    /// Deposit inflows only count once interbank obligations are settled.
    pub fn initial_wealth(banks: &[Bank], loan_proceeds: &[f64], deposit_change: &[f64]) -> Vec<f64> {
        banks
            .iter()
            .zip(loan_proceeds)
            .zip(deposit_change)
            .map(|((bank, proceeds), change)| bank.equity + proceeds + change.min(0.0))
            .collect()
    }

    /// Clear `matrix` and update every bank's equity and deposits.
    ///
    /// `books` supply the post-lending deposit balances; `loan_proceeds` and
    /// `deposit_change` are indexed by bank id.
    pub fn clear(
        &self,
        banks: &mut [Bank],
        books: &[BankBook],
        matrix: &LiabilityMatrix,
        loan_proceeds: &[f64],
        deposit_change: &[f64],
    ) -> Result<BankClearing, ClearingError> {
        let n = banks.len();
        for (field, len) in [
            ("bank books", books.len()),
            ("loan proceeds", loan_proceeds.len()),
            ("deposit change", deposit_change.len()),
            ("liability matrix", matrix.size()),
        ] {
            if len != n {
                return Err(ClearingError::LengthMismatch {
                    field,
                    expected: n,
                    found: len,
                });
            }
        }

        let wealth = Self::initial_wealth(banks, loan_proceeds, deposit_change);
        let vector = clearing_vector(matrix, &wealth, self.tolerance, self.max_iterations)?;
        debug!(
            "clearing vector converged after {} iterations, {} in default",
            vector.iterations,
            vector.default_set.len()
        );

        let mut statuses = vec![BankStatus::Solvent; n];
        for bank in &vector.default_set {
            statuses[bank.index()] = BankStatus::DefaultedByContagion;
        }

        let mut earnings = Vec::with_capacity(n);
        for (i, bank) in banks.iter_mut().enumerate() {
            let earned = wealth[i] + vector.inflows[i] - vector.payments[i];
            earnings.push(earned);

            let change = deposit_change[i];
            let inflow = change.max(0.0);
            let mut current = books[i].current_deposits;
            let money_for_deposits = bank.deposits + change - current - inflow;

            if statuses[i] == BankStatus::Solvent && earned < money_for_deposits {
                statuses[i] = BankStatus::DefaultedByDepositRun;
            }
            if statuses[i].is_default() {
                bank.equity = 0.0;
                current += earned;
                bank.deposits = (current + inflow).max(0.0);
            } else {
                current += money_for_deposits;
                bank.deposits = current + inflow;
                bank.equity = earned - money_for_deposits;
            }
        }

        Ok(BankClearing {
            vector,
            statuses,
            earnings,
        })
    }
}
