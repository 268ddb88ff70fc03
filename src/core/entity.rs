use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense identifier of a bank in the simulated network.
///
/// Banks are stored in a flat vector and a `BankId` is the stable index into
/// it for the whole run. External names (e.g. from a bank data file) map to
/// ids through [`EntityStore::bank_by_name`](crate::core::store::EntityStore::bank_by_name).
///
/// # Examples
///
/// ```
/// use credit_contagion::core::entity::BankId;
///
/// let a = BankId::new(3);
/// assert_eq!(a.index(), 3);
/// assert_eq!(a.to_string(), "BANK-003");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BankId(usize);

impl BankId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position of the bank in every per-bank vector.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BANK-{:03}", self.0)
    }
}

impl From<usize> for BankId {
    fn from(index: usize) -> Self {
        Self::new(index)
    }
}

/// Dense identifier of a firm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FirmId(usize);

impl FirmId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FirmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FIRM-{:05}", self.0)
    }
}

impl From<usize> for FirmId {
    fn from(index: usize) -> Self {
        Self::new(index)
    }
}
