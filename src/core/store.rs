use crate::core::bank::Bank;
use crate::core::config::Calibration;
use crate::core::entity::{BankId, FirmId};
use crate::core::firm::Firm;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors raised while assembling the entity store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bank data vectors disagree in length: {field} has {found}, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("at least one bank is required")]
    NoBanks,
    #[error("duplicate bank name '{0}'")]
    DuplicateBank(String),
    #[error("{entity}: {field} must be positive, got {value}")]
    NonPositive {
        entity: String,
        field: &'static str,
        value: f64,
    },
    #[error("{entity}: {field} must be finite and non-negative, got {value}")]
    InvalidBalance {
        entity: String,
        field: &'static str,
        value: f64,
    },
    #[error("firm ids must be dense: position {position} holds {id}")]
    SparseFirmIds { position: usize, id: FirmId },
    #[error("failed to parse bank data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read bank data: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-bank input vectors, aligned by bank index.
///
/// `names` and `tier1_capital` are optional; missing names default to the
/// bank's display id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BankData {
    #[serde(default)]
    pub names: Vec<String>,
    pub equity: Vec<f64>,
    pub deposits: Vec<f64>,
    pub gross_loans: Vec<f64>,
    #[serde(default)]
    pub tier1_capital: Vec<f64>,
}

impl BankData {
    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn len(&self) -> usize {
        self.equity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equity.is_empty()
    }

    /// Build bank records, applying the calibration's capital requirement
    /// and CDS appetites.
    pub fn into_banks(self, calibration: &Calibration) -> Result<Vec<Bank>, StoreError> {
        let n = self.len();
        if n == 0 {
            return Err(StoreError::NoBanks);
        }
        for (field, len) in [
            ("deposits", self.deposits.len()),
            ("gross_loans", self.gross_loans.len()),
        ] {
            if len != n {
                return Err(StoreError::LengthMismatch {
                    field,
                    expected: n,
                    found: len,
                });
            }
        }
        for (field, len) in [
            ("names", self.names.len()),
            ("tier1_capital", self.tier1_capital.len()),
        ] {
            if len != 0 && len != n {
                return Err(StoreError::LengthMismatch {
                    field,
                    expected: n,
                    found: len,
                });
            }
        }

        let mut banks = Vec::with_capacity(n);
        for i in 0..n {
            let id = BankId::new(i);
            let name = self
                .names
                .get(i)
                .cloned()
                .unwrap_or_else(|| id.to_string());
            for (field, value) in [
                ("equity", self.equity[i]),
                ("deposits", self.deposits[i]),
                ("gross_loans", self.gross_loans[i]),
            ] {
                if !(value.is_finite() && value >= 0.0) {
                    return Err(StoreError::InvalidBalance {
                        entity: name,
                        field,
                        value,
                    });
                }
            }
            banks.push(Bank {
                id,
                name,
                equity: self.equity[i],
                deposits: self.deposits[i],
                gross_loans: self.gross_loans[i],
                tier1_capital: self.tier1_capital.get(i).copied(),
                capital_requirement: calibration.capital_req,
                covered_cds_prob: calibration.covered_cds_prob,
                naked_cds_prob: calibration.naked_cds_prob,
            });
        }
        Ok(banks)
    }
}

/// Dense per-run state of every firm and bank.
///
/// Supplied by an initializer, mutated in place by one component at a time
/// during each period, and carried forward between periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStore {
    firms: Vec<Firm>,
    banks: Vec<Bank>,
    #[serde(skip)]
    bank_index: HashMap<String, BankId>,
    /// Reference price firms plan against.
    pub market_price: f64,
}

impl EntityStore {
    pub fn new(firms: Vec<Firm>, banks: Vec<Bank>, market_price: f64) -> Result<Self, StoreError> {
        if banks.is_empty() {
            return Err(StoreError::NoBanks);
        }
        for (position, firm) in firms.iter().enumerate() {
            if firm.id.index() != position {
                return Err(StoreError::SparseFirmIds {
                    position,
                    id: firm.id,
                });
            }
            for (field, value) in [("productivity", firm.productivity), ("wage", firm.wage)] {
                if !(value > 0.0 && value.is_finite()) {
                    return Err(StoreError::NonPositive {
                        entity: firm.id.to_string(),
                        field,
                        value,
                    });
                }
            }
        }
        let mut bank_index = HashMap::with_capacity(banks.len());
        for bank in &banks {
            if bank_index.insert(bank.name.clone(), bank.id).is_some() {
                return Err(StoreError::DuplicateBank(bank.name.clone()));
            }
        }
        Ok(Self {
            firms,
            banks,
            bank_index,
            market_price,
        })
    }

    /// Build a store from firm records and external bank data.
    pub fn from_bank_data(
        firms: Vec<Firm>,
        bank_data: BankData,
        calibration: &Calibration,
    ) -> Result<Self, StoreError> {
        let banks = bank_data.into_banks(calibration)?;
        Self::new(firms, banks, calibration.market_price)
    }

    pub fn firms(&self) -> &[Firm] {
        &self.firms
    }

    pub fn firms_mut(&mut self) -> &mut [Firm] {
        &mut self.firms
    }

    pub fn banks(&self) -> &[Bank] {
        &self.banks
    }

    pub fn banks_mut(&mut self) -> &mut [Bank] {
        &mut self.banks
    }

    pub fn firm(&self, id: FirmId) -> &Firm {
        &self.firms[id.index()]
    }

    pub fn bank(&self, id: BankId) -> &Bank {
        &self.banks[id.index()]
    }

    pub fn bank_by_name(&self, name: &str) -> Option<BankId> {
        self.bank_index.get(name).copied()
    }

    pub fn num_firms(&self) -> usize {
        self.firms.len()
    }

    pub fn num_banks(&self) -> usize {
        self.banks.len()
    }

    /// Market-share weights: each bank's share of total gross loans,
    /// uniform when no bank reports a loan book.
    pub fn bank_weights(&self) -> Vec<f64> {
        let total: f64 = self.banks.iter().map(|b| b.gross_loans).sum();
        if total > 0.0 {
            self.banks.iter().map(|b| b.gross_loans / total).collect()
        } else {
            vec![1.0 / self.banks.len() as f64; self.banks.len()]
        }
    }

    /// Sum of bank equity.
    pub fn total_bank_equity(&self) -> f64 {
        self.banks.iter().map(|b| b.equity).sum()
    }

    /// First entity holding a NaN or infinite balance, if any.
    pub fn first_non_finite(&self) -> Option<String> {
        self.firms
            .iter()
            .find(|f| !f.is_finite())
            .map(|f| f.id.to_string())
            .or_else(|| {
                self.banks
                    .iter()
                    .find(|b| !b.is_finite())
                    .map(|b| b.id.to_string())
            })
            .or_else(|| (!self.market_price.is_finite()).then(|| "market price".to_string()))
    }

    /// Rebuild the name lookup after deserialization.
    pub fn reindex(&mut self) {
        self.bank_index = self.banks.iter().map(|b| (b.name.clone(), b.id)).collect();
    }
}
