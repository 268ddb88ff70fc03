use crate::core::bank::BankBook;
use crate::core::config::Calibration;
use crate::core::contract::{ContractEvent, ContractLog, InterbankLoan, Loan};
use crate::core::entity::{BankId, FirmId};
use crate::market::pricing::{firm_loan_rate, interbank_rate};
use crate::market::sampling::{banks_except, uniform_banks, weighted_banks};
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A firm's unpriced credit request for the period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub firm: FirmId,
    pub amount: f64,
    pub financial_fragility: f64,
    pub prob_default: f64,
}

/// A bank's priced answer to a [`LoanRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanOffer {
    pub bank: BankId,
    pub interest_rate: f64,
}

/// Matches firm credit demand to capacity-constrained banks.
///
/// All capacity checks read the running [`BankBook`] totals, so each request
/// sees the loans committed before it in the same period.
pub struct LoanMatcher<'a> {
    calibration: &'a Calibration,
    weights: &'a [f64],
}

impl<'a> LoanMatcher<'a> {
    /// `weights` are the banks' market shares, indexed by bank id.
    pub fn new(calibration: &'a Calibration, weights: &'a [f64]) -> Self {
        Self {
            calibration,
            weights,
        }
    }

    /// Up to `max_bank_loan` distinct banks, sampled by market share.
    pub fn candidate_banks<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<BankId> {
        weighted_banks(rng, self.weights, self.calibration.max_bank_loan)
    }

    /// Price the request at every candidate whose max credit covers it,
    /// cheapest first.
    pub fn price_offers<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        request: &LoanRequest,
        candidates: &[BankId],
        books: &[BankBook],
    ) -> Vec<LoanOffer> {
        let mut offers: Vec<LoanOffer> = candidates
            .iter()
            .filter(|bank| request.amount <= books[bank.index()].max_credit)
            .map(|&bank| LoanOffer {
                bank,
                interest_rate: firm_loan_rate(
                    rng,
                    self.calibration.policy_rate,
                    self.calibration.h_theta,
                    request.prob_default,
                    request.financial_fragility,
                ),
            })
            .collect();
        offers.sort_by(|a, b| a.interest_rate.total_cmp(&b.interest_rate));
        offers
    }

    /// Walk the offers cheapest first and commit the first one the lending
    /// bank can fund, borrowing interbank for any shortfall.
    ///
    /// Returns the committed loan; at most one loan is committed per request.
    pub fn commit<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        request: &LoanRequest,
        offers: &[LoanOffer],
        books: &mut [BankBook],
        log: &mut ContractLog,
    ) -> Option<Loan> {
        for offer in offers {
            let book = &books[offer.bank.index()];
            if !book.within_max_credit(request.amount) {
                continue;
            }
            let capacity = book.residual_capacity(request.amount);
            if capacity < 0.0 {
                let credit_needed = -capacity;
                match self.source_interbank(rng, offer.bank, credit_needed, books) {
                    Some(interbank) => {
                        books[interbank.lender.index()].book_loan_asset(credit_needed);
                        books[offer.bank.index()].book_borrowing(credit_needed);
                        debug!(
                            "{} borrows {:.2} from {} at {:.4}",
                            interbank.borrower,
                            interbank.notional_amount,
                            interbank.lender,
                            interbank.interest_rate
                        );
                        log.record(ContractEvent::InterbankLoan(interbank));
                    }
                    None => continue,
                }
            }

            books[offer.bank.index()].book_loan_asset(request.amount);
            let loan = Loan::new(
                offer.bank,
                request.firm,
                request.amount,
                offer.interest_rate,
                request.financial_fragility,
                request.prob_default,
            );
            debug!(
                "{} lends {:.2} to {} at {:.4}",
                loan.lender, loan.notional_amount, loan.borrower, loan.interest_rate
            );
            log.record(ContractEvent::FirmLoan(loan.clone()));
            return Some(loan);
        }
        None
    }

    /// Cheapest feasible interbank lender for `credit_needed`, if any.
    ///
    /// The borrowing bank's fragility is its loan book after this borrowing
    /// relative to its deposits.
    fn source_interbank<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        borrower: BankId,
        credit_needed: f64,
        books: &[BankBook],
    ) -> Option<InterbankLoan> {
        let pool = banks_except(books.len(), &[borrower]);
        let lenders = uniform_banks(rng, &pool, self.calibration.max_interbank_loan);

        let book = &books[borrower.index()];
        let fragility = if book.deposits > 0.0 {
            (credit_needed + book.loan_assets) / book.deposits
        } else {
            f64::INFINITY
        };

        let mut quotes: Vec<LoanOffer> = lenders
            .into_iter()
            .map(|bank| LoanOffer {
                bank,
                interest_rate: interbank_rate(
                    rng,
                    self.calibration.policy_rate,
                    self.calibration.h_theta,
                    fragility,
                ),
            })
            .filter(|quote| {
                let lender = &books[quote.bank.index()];
                lender.residual_capacity(credit_needed) > 0.0
                    && lender.within_max_credit(credit_needed)
            })
            .collect();
        quotes.sort_by(|a, b| a.interest_rate.total_cmp(&b.interest_rate));

        quotes.first().map(|quote| {
            InterbankLoan::new(
                quote.bank,
                borrower,
                credit_needed,
                quote.interest_rate,
                fragility,
            )
        })
    }
}
