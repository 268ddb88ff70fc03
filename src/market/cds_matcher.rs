use crate::core::bank::{Bank, BankBook};
use crate::core::config::Calibration;
use crate::core::contract::{Cds, ContractEvent, ContractLog, Loan};
use crate::core::entity::BankId;
use crate::market::pricing::{cds_spread, quoted_default_probability};
use crate::market::sampling::{banks_except, uniform_banks};
use log::debug;
use rand::Rng;

/// A seller's quoted spread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CdsQuote {
    pub seller: BankId,
    pub spread: f64,
}

/// Originates credit default swaps on newly committed firm loans.
pub struct CdsMatcher<'a> {
    calibration: &'a Calibration,
}

impl<'a> CdsMatcher<'a> {
    pub fn new(calibration: &'a Calibration) -> Self {
        Self { calibration }
    }

    /// Draw the protection buyers for a loan: the lender itself with its
    /// covered probability, then every other bank with its naked probability.
    pub fn buyers<R: Rng + ?Sized>(&self, rng: &mut R, loan: &Loan, banks: &[Bank]) -> Vec<BankId> {
        let mut buyers = Vec::new();
        if rng.gen::<f64>() < banks[loan.lender.index()].covered_cds_prob {
            buyers.push(loan.lender);
        }
        for bank in banks.iter().filter(|b| b.id != loan.lender) {
            if rng.gen::<f64>() < bank.naked_cds_prob {
                buyers.push(bank.id);
            }
        }
        buyers
    }

    /// Quotes from up to `max_cds_requests` sellers, cheapest first.
    ///
    /// Sellers exclude the buyer and the lender on the underlying loan.
    pub fn quotes<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        buyer: BankId,
        loan: &Loan,
        num_banks: usize,
    ) -> Vec<CdsQuote> {
        let pool = banks_except(num_banks, &[buyer, loan.lender]);
        let sellers = uniform_banks(rng, &pool, self.calibration.max_cds_requests);
        let mut quotes: Vec<CdsQuote> = sellers
            .into_iter()
            .map(|seller| {
                let q = quoted_default_probability(rng, loan.prob_default_borrower);
                CdsQuote {
                    seller,
                    spread: cds_spread(
                        q,
                        self.calibration.policy_rate,
                        loan.interest_rate,
                        self.calibration.cds_recovery_assumption,
                    ),
                }
            })
            .collect();
        quotes.sort_by(|a, b| a.spread.total_cmp(&b.spread));
        quotes
    }

    /// Originate CDS contracts on `loan`, one per buyer at most.
    ///
    /// Each buyer takes the cheapest quote whose seller can afford the
    /// premium given everything booked so far. Returns the number of
    /// contracts written.
    pub fn originate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        loan: &Loan,
        banks: &[Bank],
        books: &mut [BankBook],
        log: &mut ContractLog,
    ) -> usize {
        let lender = &banks[loan.lender.index()];
        if lender.covered_cds_prob == 0.0 && banks.iter().all(|b| b.naked_cds_prob == 0.0) {
            return 0;
        }

        let mut written = 0;
        for buyer in self.buyers(rng, loan, banks) {
            let quotes = self.quotes(rng, buyer, loan, banks.len());
            let Some(quote) = quotes.into_iter().find(|q| {
                books[q.seller.index()].can_write_protection(q.spread * loan.notional_amount)
            }) else {
                continue;
            };

            let cds = Cds::new(
                buyer,
                quote.seller,
                loan.borrower,
                loan.notional_amount,
                quote.spread,
            );
            let premium = cds.premium();
            books[buyer.index()].cds_assets += premium;
            books[quote.seller.index()].cds_liabilities += premium;
            debug!(
                "{} buys protection on {} from {} at {:.5}",
                cds.buyer, cds.reference_entity, cds.seller, cds.spread
            );
            log.record(ContractEvent::Cds(cds));
            written += 1;
        }
        written
    }
}
