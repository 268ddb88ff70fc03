use crate::core::entity::{BankId, FirmId};
use serde::{Deserialize, Serialize};

/// A committed bank-to-firm loan.
///
/// Priced by the lending bank at offer time and committed at most once.
/// The borrower owes `(1 + interest_rate) * notional_amount` at period end.
///
/// # Examples
///
/// ```
/// use credit_contagion::core::contract::Loan;
/// use credit_contagion::core::entity::{BankId, FirmId};
///
/// let loan = Loan::new(BankId::new(0), FirmId::new(3), 1_000.0, 0.05, 0.4, 0.02);
/// assert!((loan.amount_owed() - 1_050.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub lender: BankId,
    pub borrower: FirmId,
    pub notional_amount: f64,
    pub interest_rate: f64,
    pub financial_fragility_borrower: f64,
    pub prob_default_borrower: f64,
}

impl Loan {
    /// Create a loan.
    ///
    /// # Panics
    ///
    /// Panics if `notional_amount` is not positive.
    pub fn new(
        lender: BankId,
        borrower: FirmId,
        notional_amount: f64,
        interest_rate: f64,
        financial_fragility_borrower: f64,
        prob_default_borrower: f64,
    ) -> Self {
        assert!(
            notional_amount > 0.0,
            "Loan notional must be positive, got {}",
            notional_amount
        );
        Self {
            lender,
            borrower,
            notional_amount,
            interest_rate,
            financial_fragility_borrower,
            prob_default_borrower,
        }
    }

    /// Principal plus interest.
    pub fn amount_owed(&self) -> f64 {
        (1.0 + self.interest_rate) * self.notional_amount
    }
}

/// A loan between two banks, taken to fund a firm loan the borrowing bank
/// could not cover from its own deposits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterbankLoan {
    pub lender: BankId,
    pub borrower: BankId,
    pub notional_amount: f64,
    pub interest_rate: f64,
    pub financial_fragility_borrower: f64,
}

impl InterbankLoan {
    /// # Panics
    ///
    /// Panics if `notional_amount` is not positive or lender equals borrower.
    pub fn new(
        lender: BankId,
        borrower: BankId,
        notional_amount: f64,
        interest_rate: f64,
        financial_fragility_borrower: f64,
    ) -> Self {
        assert!(
            notional_amount > 0.0,
            "Interbank notional must be positive, got {}",
            notional_amount
        );
        assert_ne!(lender, borrower, "a bank cannot borrow from itself");
        Self {
            lender,
            borrower,
            notional_amount,
            interest_rate,
            financial_fragility_borrower,
        }
    }

    pub fn amount_owed(&self) -> f64 {
        (1.0 + self.interest_rate) * self.notional_amount
    }
}

/// One-period credit default swap between two banks on a firm.
///
/// The buyer always owes the premium `spread * notional_amount`. If the
/// reference firm defaults the seller additionally owes the buyer
/// `(1 - recovery_rate) * notional_amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cds {
    pub buyer: BankId,
    pub seller: BankId,
    pub reference_entity: FirmId,
    pub notional_amount: f64,
    pub spread: f64,
}

impl Cds {
    /// # Panics
    ///
    /// Panics if `notional_amount` is not positive or buyer equals seller.
    pub fn new(
        buyer: BankId,
        seller: BankId,
        reference_entity: FirmId,
        notional_amount: f64,
        spread: f64,
    ) -> Self {
        assert!(
            notional_amount > 0.0,
            "CDS notional must be positive, got {}",
            notional_amount
        );
        assert_ne!(buyer, seller, "a bank cannot sell protection to itself");
        Self {
            buyer,
            seller,
            reference_entity,
            notional_amount,
            spread,
        }
    }

    pub fn premium(&self) -> f64 {
        self.spread * self.notional_amount
    }

    /// Protection payment owed by the seller for a given recovery rate.
    pub fn contingent_payout(&self, recovery_rate: f64) -> f64 {
        (1.0 - recovery_rate) * self.notional_amount
    }
}

/// A contract committed during network formation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContractEvent {
    FirmLoan(Loan),
    InterbankLoan(InterbankLoan),
    Cds(Cds),
}

/// Append-only record of the contracts committed in one period.
///
/// Kept apart from the entity state it affects: the matchers append here,
/// firm default resolution and interbank clearing read from here, and the
/// whole log is discarded once the period has cleared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractLog {
    events: Vec<ContractEvent>,
}

impl ContractLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn record(&mut self, event: ContractEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn firm_loans(&self) -> impl Iterator<Item = &Loan> {
        self.events.iter().filter_map(|e| match e {
            ContractEvent::FirmLoan(loan) => Some(loan),
            _ => None,
        })
    }

    pub fn interbank_loans(&self) -> impl Iterator<Item = &InterbankLoan> {
        self.events.iter().filter_map(|e| match e {
            ContractEvent::InterbankLoan(loan) => Some(loan),
            _ => None,
        })
    }

    pub fn cds(&self) -> impl Iterator<Item = &Cds> {
        self.events.iter().filter_map(|e| match e {
            ContractEvent::Cds(cds) => Some(cds),
            _ => None,
        })
    }

    /// Loans owed by a firm this period.
    pub fn loans_of(&self, firm: FirmId) -> impl Iterator<Item = &Loan> {
        self.firm_loans().filter(move |l| l.borrower == firm)
    }

    /// CDS contracts referencing a firm.
    pub fn cds_on(&self, firm: FirmId) -> impl Iterator<Item = &Cds> {
        self.cds().filter(move |c| c.reference_entity == firm)
    }

    /// Total firm credit extended this period.
    pub fn firm_credit_total(&self) -> f64 {
        self.firm_loans().map(|l| l.notional_amount).sum()
    }
}

impl FromIterator<ContractEvent> for ContractLog {
    fn from_iter<T: IntoIterator<Item = ContractEvent>>(iter: T) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}
