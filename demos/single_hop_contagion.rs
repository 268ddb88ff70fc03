//! Single-hop contagion and a CDS payout through the clearing vector.
//!
//! Builds the contracts of one period by hand, resolves the clearing
//! vector and shows which banks default and why.

use credit_contagion::prelude::*;

fn bank(id: usize, name: &str, equity: f64, deposits: f64) -> Bank {
    Bank {
        id: BankId::new(id),
        name: name.to_string(),
        equity,
        deposits,
        gross_loans: deposits,
        tier1_capital: None,
        capital_requirement: 1.0,
        covered_cds_prob: 0.0,
        naked_cds_prob: 0.0,
    }
}

fn main() {
    println!("╔════════════════════════════════════════════════╗");
    println!("║  credit-contagion: Single-Hop Contagion Demo   ║");
    println!("╚════════════════════════════════════════════════╝\n");

    // --- Scenario 1: interbank shortfall ---
    println!("━━━ Scenario 1: Interbank Shortfall ━━━\n");

    let log: ContractLog = [interbank_loan(1, 0, 50.0)].into_iter().collect();
    let settlement = FirmSettlement {
        loan_proceeds: vec![0.0, 0.0],
        ..Default::default()
    };
    let matrix = LiabilityMatrix::from_contracts(2, &log, &settlement);
    let mut banks = vec![bank(0, "ALPHA", 30.0, 0.0), bank(1, "BETA", 0.0, 0.0)];
    report(&mut banks, &matrix, &settlement.loan_proceeds);

    // --- Scenario 2: CDS payout on a defaulted firm ---
    println!("━━━ Scenario 2: CDS Payout ━━━\n");

    let firm = FirmId::new(0);
    let log: ContractLog = [
        ContractEvent::FirmLoan(Loan::new(BankId::new(0), firm, 1_000.0, 0.0, 0.5, 0.05)),
        ContractEvent::Cds(Cds::new(BankId::new(0), BankId::new(1), firm, 1_000.0, 0.01)),
        interbank_loan(2, 1, 500.0),
    ]
    .into_iter()
    .collect();
    let settlement = FirmSettlement {
        recovery_rates: vec![0.4],
        defaulting: vec![firm],
        owed: vec![1_000.0],
        loan_proceeds: vec![400.0, 0.0, 0.0],
        consumption: vec![0.75],
    };
    let matrix = LiabilityMatrix::from_contracts(3, &log, &settlement);
    let breakdown = matrix.breakdown();
    println!("Interbank loans:    {:.2}", breakdown.interbank_loans);
    println!("CDS premia:         {:.2}", breakdown.cds_premia);
    println!("CDS payouts:        {:.2}\n", breakdown.cds_payouts);

    let mut banks = vec![
        bank(0, "ALPHA", 100.0, 0.0),
        bank(1, "BETA", 250.0, 0.0),
        bank(2, "GAMMA", 20.0, 0.0),
    ];
    report(&mut banks, &matrix, &settlement.loan_proceeds);

    let graph = ExposureGraph::from_matrix(&matrix);
    for bank in 0..3 {
        let id = BankId::new(bank);
        let exposed: Vec<String> = graph.exposed_to(id).iter().map(|b| b.to_string()).collect();
        println!("Exposed to {}: [{}]", id, exposed.join(", "));
    }
}

fn interbank_loan(lender: usize, borrower: usize, amount: f64) -> ContractEvent {
    ContractEvent::InterbankLoan(InterbankLoan::new(
        BankId::new(lender),
        BankId::new(borrower),
        amount,
        0.0,
        0.0,
    ))
}

fn report(banks: &mut [Bank], matrix: &LiabilityMatrix, proceeds: &[f64]) {
    let books: Vec<BankBook> = banks.iter().map(BankBook::open).collect();
    let changes = vec![0.0; banks.len()];
    let engine = InterbankClearingEngine::default();
    let result = match engine.clear(banks, &books, matrix, proceeds, &changes) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("clearing failed: {err}");
            return;
        }
    };

    for (i, bank) in banks.iter().enumerate() {
        println!(
            "{:<6} owes {:>8.2}  pays {:>8.2}  receives {:>8.2}  equity {:>8.2}  {}",
            bank.name,
            result.vector.obligations[i],
            result.vector.payments[i],
            result.vector.inflows[i],
            bank.equity,
            result.statuses[i],
        );
    }
    println!("Iterations: {}\n", result.vector.iterations);
}
