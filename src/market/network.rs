use crate::core::bank::BankBook;
use crate::core::config::Calibration;
use crate::core::contract::ContractLog;
use crate::core::store::EntityStore;
use crate::market::cds_matcher::CdsMatcher;
use crate::market::loan_matcher::{LoanMatcher, LoanRequest};
use rand::Rng;

/// Contracts and working balance sheets produced by one round of matching.
#[derive(Debug, Clone, Default)]
pub struct CreditNetwork {
    pub log: ContractLog,
    /// Indexed by bank id.
    pub books: Vec<BankBook>,
}

impl CreditNetwork {
    /// Every bank's book opened from its period-start balance sheet.
    pub fn open(store: &EntityStore) -> Self {
        Self {
            log: ContractLog::new(),
            books: store.banks().iter().map(BankBook::open).collect(),
        }
    }
}

/// Match every request, in the order given, to loans and CDS.
///
/// Random draws follow a fixed order: candidate banks for every request,
/// then offer pricing for every request, then for each request the
/// interbank search behind its commit followed by CDS origination on the
/// committed loan. Loan proceeds are credited to the borrowing firm's equity.
pub fn form_network<R: Rng + ?Sized>(
    rng: &mut R,
    calibration: &Calibration,
    store: &mut EntityStore,
    requests: &[LoanRequest],
) -> CreditNetwork {
    let mut network = CreditNetwork::open(store);
    let weights = store.bank_weights();
    let loans = LoanMatcher::new(calibration, &weights);
    let cds = CdsMatcher::new(calibration);

    let candidates: Vec<_> = requests
        .iter()
        .map(|_| loans.candidate_banks(rng))
        .collect();
    let offers: Vec<_> = requests
        .iter()
        .zip(&candidates)
        .map(|(request, banks)| loans.price_offers(rng, request, banks, &network.books))
        .collect();

    for (request, offers) in requests.iter().zip(&offers) {
        let Some(loan) = loans.commit(rng, request, offers, &mut network.books, &mut network.log)
        else {
            continue;
        };
        store.firms_mut()[loan.borrower.index()].equity += loan.notional_amount;
        cds.originate(rng, &loan, store.banks(), &mut network.books, &mut network.log);
    }
    network
}
