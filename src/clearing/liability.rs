use crate::clearing::firm_default::FirmSettlement;
use crate::core::contract::ContractLog;
use crate::core::entity::BankId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MatrixError {
    #[error("liability matrix must be square: row {row} has {found} entries, expected {expected}")]
    NotSquare {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("liability entry ({row}, {col}) must be finite and non-negative, got {value}")]
    InvalidEntry { row: usize, col: usize, value: f64 },
}

/// Gross amounts each bank owes each other bank this period, split by
/// the kind of obligation that created them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LiabilityBreakdown {
    pub interbank_loans: f64,
    pub cds_premia: f64,
    pub cds_payouts: f64,
}

impl LiabilityBreakdown {
    pub fn total(&self) -> f64 {
        self.interbank_loans + self.cds_premia + self.cds_payouts
    }
}

/// Square matrix over banks: entry `(i, j)` is everything bank `i` owes
/// bank `j` this period.
///
/// Stored row-major. Rebuilt from the period's contracts and discarded once
/// the period has cleared.
///
/// # Examples
///
/// ```
/// use credit_contagion::clearing::liability::LiabilityMatrix;
/// use credit_contagion::core::entity::BankId;
///
/// let mut matrix = LiabilityMatrix::zeros(2);
/// matrix.add(BankId::new(0), BankId::new(1), 50.0);
/// assert_eq!(matrix.row_sums(), vec![50.0, 0.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiabilityMatrix {
    size: usize,
    entries: Vec<f64>,
    #[serde(default)]
    breakdown: LiabilityBreakdown,
}

impl LiabilityMatrix {
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            entries: vec![0.0; size * size],
            breakdown: LiabilityBreakdown::default(),
        }
    }

    /// Build from nested rows, rejecting ragged or negative input.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, MatrixError> {
        let size = rows.len();
        let mut matrix = Self::zeros(size);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != size {
                return Err(MatrixError::NotSquare {
                    row,
                    expected: size,
                    found: values.len(),
                });
            }
            for (col, &value) in values.iter().enumerate() {
                if !(value.is_finite() && value >= 0.0) {
                    return Err(MatrixError::InvalidEntry { row, col, value });
                }
                matrix.entries[row * size + col] = value;
            }
        }
        // Raw rows carry no contract kinds; book them all as loans.
        matrix.breakdown.interbank_loans = matrix.total();
        Ok(matrix)
    }

    /// Assemble the period's obligations:
    ///
    /// - interbank loan, `i` borrowed from `j`: `L[i][j] += (1 + rate) * notional`
    /// - CDS premium, `i` bought from `j`: `L[i][j] += spread * notional`
    /// - CDS on a defaulted firm: `L[seller][buyer] += (1 - recovery) * notional`
    ///
    /// Premia are always owed in full and never netted against payouts.
    pub fn from_contracts(num_banks: usize, log: &ContractLog, firms: &FirmSettlement) -> Self {
        let mut matrix = Self::zeros(num_banks);
        for loan in log.interbank_loans() {
            let owed = loan.amount_owed();
            matrix.add(loan.borrower, loan.lender, owed);
            matrix.breakdown.interbank_loans += owed;
        }
        for cds in log.cds() {
            let premium = cds.premium();
            matrix.add(cds.buyer, cds.seller, premium);
            matrix.breakdown.cds_premia += premium;

            if firms.is_defaulting(cds.reference_entity) {
                let payout = cds.contingent_payout(firms.recovery_rate(cds.reference_entity));
                matrix.add(cds.seller, cds.buyer, payout);
                matrix.breakdown.cds_payouts += payout;
            }
        }
        matrix
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, from: BankId, to: BankId) -> f64 {
        self.entries[from.index() * self.size + to.index()]
    }

    pub fn add(&mut self, from: BankId, to: BankId, amount: f64) {
        self.entries[from.index() * self.size + to.index()] += amount;
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.entries[i * self.size..(i + 1) * self.size]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.entries.chunks(self.size.max(1)).take(self.size)
    }

    /// Total obligations per bank (`Lbar`).
    pub fn row_sums(&self) -> Vec<f64> {
        self.rows().map(|row| row.iter().sum()).collect()
    }

    /// Total claims per bank.
    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.size];
        for row in self.rows() {
            for (sum, value) in sums.iter_mut().zip(row) {
                *sum += value;
            }
        }
        sums
    }

    /// Relative liability matrix `Π`: each row divided by its sum, or all
    /// zeros for a bank that owes nothing.
    pub fn relative(&self) -> Vec<Vec<f64>> {
        self.rows()
            .map(|row| {
                let total: f64 = row.iter().sum();
                if total > 0.0 {
                    row.iter().map(|v| v / total).collect()
                } else {
                    vec![0.0; row.len()]
                }
            })
            .collect()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().sum()
    }

    pub fn breakdown(&self) -> LiabilityBreakdown {
        self.breakdown
    }

    /// Non-zero entries as `(from, to, amount)`.
    pub fn edges(&self) -> impl Iterator<Item = (BankId, BankId, f64)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > 0.0)
            .map(move |(k, &v)| (BankId::new(k / self.size), BankId::new(k % self.size), v))
    }

    /// Position of the first NaN or infinite entry.
    pub fn first_non_finite(&self) -> Option<(BankId, BankId)> {
        self.entries
            .iter()
            .position(|v| !v.is_finite())
            .map(|k| (BankId::new(k / self.size), BankId::new(k % self.size)))
    }
}
