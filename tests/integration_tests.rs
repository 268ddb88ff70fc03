use approx::assert_relative_eq;
use credit_contagion::clearing::firm_default::FirmSettlement;
use credit_contagion::clearing::interbank::{clearing_vector, BankStatus, InterbankClearingEngine};
use credit_contagion::clearing::liability::LiabilityMatrix;
use credit_contagion::core::bank::{Bank, BankBook};
use credit_contagion::core::config::{Calibration, EconomyConfig};
use credit_contagion::core::contract::{Cds, ContractEvent, ContractLog, InterbankLoan, Loan};
use credit_contagion::core::entity::{BankId, FirmId};
use credit_contagion::core::store::{BankData, EntityStore};
use credit_contagion::graph::exposure::ExposureGraph;
use credit_contagion::simulation::period::SimulationError;
use credit_contagion::simulation::population::{generate_firms, generate_store, PopulationConfig};
use credit_contagion::simulation::runner::{run, run_batch, BatchConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn bank(id: usize, equity: f64, deposits: f64) -> Bank {
    Bank {
        id: BankId::new(id),
        name: format!("B{id}"),
        equity,
        deposits,
        gross_loans: deposits,
        tier1_capital: None,
        capital_requirement: 1.0,
        covered_cds_prob: 0.0,
        naked_cds_prob: 0.0,
    }
}

fn population(num_firms: usize, num_banks: usize) -> PopulationConfig {
    PopulationConfig {
        num_firms,
        num_banks,
        ..Default::default()
    }
}

fn store(seed: u64, calibration: &Calibration) -> EntityStore {
    generate_store(
        &mut StdRng::seed_from_u64(seed),
        &population(80, 6),
        calibration,
    )
    .unwrap()
}

/// Two banks, nothing lent between them: nobody pays, nobody defaults.
#[test]
fn no_contagion_without_interbank_exposure() {
    let mut banks = vec![bank(0, 10.0, 100.0), bank(1, 5.0, 0.0)];
    let books: Vec<BankBook> = banks.iter().map(BankBook::open).collect();
    let matrix = LiabilityMatrix::zeros(2);

    let result = InterbankClearingEngine::default()
        .clear(&mut banks, &books, &matrix, &[0.0, 0.0], &[0.0, 0.0])
        .unwrap();

    assert_eq!(result.vector.payments, vec![0.0, 0.0]);
    assert_eq!(result.vector.obligations, vec![0.0, 0.0]);
    assert!(result.defaulting_banks().is_empty());
    assert_relative_eq!(banks[0].equity, 10.0);
    assert_relative_eq!(banks[1].equity, 5.0);
}

/// Bank A owes B 50 at 0% and holds 30: A defaults and B absorbs the 20 shortfall.
#[test]
fn single_hop_contagion_through_interbank_loan() {
    let log: ContractLog = [ContractEvent::InterbankLoan(InterbankLoan::new(
        BankId::new(1),
        BankId::new(0),
        50.0,
        0.0,
        0.0,
    ))]
    .into_iter()
    .collect();
    let settlement = FirmSettlement {
        loan_proceeds: vec![0.0, 0.0],
        ..Default::default()
    };
    let matrix = LiabilityMatrix::from_contracts(2, &log, &settlement);
    assert_relative_eq!(matrix.get(BankId::new(0), BankId::new(1)), 50.0);

    let result = clearing_vector(&matrix, &[30.0, 0.0], 1e-9, 100).unwrap();
    assert_eq!(result.default_set, vec![BankId::new(0)]);
    assert_relative_eq!(result.payments[0], 30.0);
    assert_relative_eq!(result.inflows[1], 30.0);
    assert_relative_eq!(result.shortfalls()[0], 20.0);

    let mut banks = vec![bank(0, 30.0, 0.0), bank(1, 0.0, 0.0)];
    let books: Vec<BankBook> = banks.iter().map(BankBook::open).collect();
    let cleared = InterbankClearingEngine::default()
        .clear(&mut banks, &books, &matrix, &[0.0, 0.0], &[0.0, 0.0])
        .unwrap();
    assert_eq!(
        cleared.statuses,
        vec![BankStatus::DefaultedByContagion, BankStatus::Solvent]
    );
    assert_eq!(banks[0].equity, 0.0);
    // Nominally owed 50, received 30.
    assert_relative_eq!(cleared.earnings[1], 50.0 - 20.0);
}

/// A defaulting reference firm with recovery 0.4 triggers a 600 payout on a 1000 CDS.
#[test]
fn cds_payout_enters_liability_matrix_and_clears() {
    let buyer = BankId::new(0);
    let seller = BankId::new(1);
    let firm = FirmId::new(0);
    let log: ContractLog = [
        ContractEvent::FirmLoan(Loan::new(buyer, firm, 1_000.0, 0.0, 0.5, 0.05)),
        ContractEvent::Cds(Cds::new(buyer, seller, firm, 1_000.0, 0.01)),
    ]
    .into_iter()
    .collect();
    let settlement = FirmSettlement {
        recovery_rates: vec![0.4],
        defaulting: vec![firm],
        owed: vec![1_000.0],
        loan_proceeds: vec![400.0, 0.0],
        consumption: vec![0.8],
    };

    let matrix = LiabilityMatrix::from_contracts(2, &log, &settlement);
    assert_relative_eq!(matrix.get(seller, buyer), 600.0);
    assert_relative_eq!(matrix.get(buyer, seller), 10.0);

    let mut banks = vec![bank(0, 100.0, 0.0), bank(1, 1_000.0, 0.0)];
    let books: Vec<BankBook> = banks.iter().map(BankBook::open).collect();
    let cleared = InterbankClearingEngine::default()
        .clear(
            &mut banks,
            &books,
            &matrix,
            &settlement.loan_proceeds,
            &[0.0, 0.0],
        )
        .unwrap();
    assert!(cleared.defaulting_banks().is_empty());
    // 100 + 400 proceeds - 10 premium + 600 protection.
    assert_relative_eq!(banks[0].equity, 1_090.0, epsilon = 1e-6);
    assert_relative_eq!(banks[1].equity, 1_000.0 + 10.0 - 600.0, epsilon = 1e-6);

    let graph = ExposureGraph::from_matrix(&matrix);
    let clusters = graph.contagion_clusters();
    assert_eq!(clusters.len(), 1);
    assert!(clusters[0].contains(buyer) && clusters[0].contains(seller));
}

/// Full pipeline: generated population, multi-period run, invariants after each period.
#[test]
fn full_pipeline_keeps_balance_sheets_valid() {
    let calibration = Calibration {
        periods: 6,
        ..Default::default()
    };
    let report = run(11, &calibration, store(11, &calibration)).unwrap();

    assert_eq!(report.outcomes.len(), 6);
    assert_eq!(report.economy_path.len(), 6);
    for outcome in &report.outcomes {
        assert!(outcome.bank_equity.iter().all(|e| *e >= 0.0));
        assert!(outcome.bank_deposits.iter().all(|d| *d >= 0.0));
        assert!(outcome.market_price.is_finite());
        for firm in outcome.defaulting_firms() {
            assert_eq!(outcome.firm_equity[firm.index()], 0.0);
        }
        for bank in outcome.defaulting_banks() {
            assert_eq!(outcome.bank_equity[bank.index()], 0.0);
        }
        let vector = &outcome.banks.vector;
        for (paid, owed) in vector.payments.iter().zip(&vector.obligations) {
            assert!(*paid >= 0.0 && *paid <= owed + 1e-9);
        }
        // At most one firm loan per firm per period.
        let mut borrowers: Vec<FirmId> =
            outcome.contracts.firm_loans().map(|l| l.borrower).collect();
        let total = borrowers.len();
        borrowers.sort();
        borrowers.dedup();
        assert_eq!(borrowers.len(), total);
    }
    let summaries = report.summaries();
    assert_eq!(summaries.len(), 6);
    assert_eq!(
        summaries.iter().map(|s| s.defaulting_firms).sum::<usize>(),
        report.total_firm_defaults()
    );
}

#[test]
fn same_seed_reproduces_run() {
    let calibration = Calibration {
        periods: 4,
        ..Default::default()
    };
    let a = run(5, &calibration, store(3, &calibration)).unwrap();
    let b = run(5, &calibration, store(3, &calibration)).unwrap();
    assert_eq!(a.economy_path, b.economy_path);
    assert_eq!(a.outcomes, b.outcomes);
    assert_eq!(a.store, b.store);

    let c = run(6, &calibration, store(3, &calibration)).unwrap();
    assert_ne!(a.outcomes, c.outcomes);
}

#[test]
fn fixed_economy_path_is_followed() {
    let calibration = Calibration {
        periods: 5,
        economy: EconomyConfig {
            fixed_path: vec![1, 0],
            ..Default::default()
        },
        ..Default::default()
    };
    let report = run(2, &calibration, store(2, &calibration)).unwrap();
    assert_eq!(report.economy_path, vec![1, 0, 1, 0, 1]);
    let states: Vec<usize> = report.outcomes.iter().map(|o| o.economy_state).collect();
    assert_eq!(states, report.economy_path);
}

#[test]
fn calibration_from_json_overrides_and_validates() {
    let json = r#"{
        "periods": 3,
        "capital_req": 0.5,
        "consumption_regimes": [{ "mean": 0.9, "std": 0.02 }],
        "economy": { "starting_prob": [1.0], "transition_matrix": [[1.0]] }
    }"#;
    let calibration = Calibration::from_json_str(json).unwrap();
    assert_eq!(calibration.periods, 3);
    assert_eq!(calibration.capital_req, 0.5);
    assert_eq!(calibration.max_cds_requests, 3);

    let report = run(1, &calibration, store(1, &calibration)).unwrap();
    assert!(report.economy_path.iter().all(|s| *s == 0));

    assert!(Calibration::from_json_str(r#"{ "capital_req": 0.0 }"#).is_err());
    assert!(Calibration::from_json_str(r#"{ "naked_cds_prob": 1.5 }"#).is_err());
}

#[test]
fn store_from_bank_data_runs() {
    let calibration = Calibration {
        periods: 2,
        ..Default::default()
    };
    let data = BankData::from_json_str(
        r#"{
            "names": ["North", "South", "East"],
            "equity": [4.0e8, 2.5e8, 1.0e8],
            "deposits": [6.0e9, 3.0e9, 1.5e9],
            "gross_loans": [5.0e9, 2.0e9, 1.0e9]
        }"#,
    )
    .unwrap();
    let mut rng = StdRng::seed_from_u64(9);
    let firms = generate_firms(&mut rng, &population(50, 0), &calibration);
    let store = EntityStore::from_bank_data(firms, data, &calibration).unwrap();
    assert_eq!(store.num_banks(), 3);
    assert_eq!(store.bank_by_name("South"), Some(BankId::new(1)));

    let report = run(9, &calibration, store).unwrap();
    assert_eq!(report.store.num_banks(), 3);
    assert_eq!(report.outcomes[0].liabilities.size(), 3);
}

#[test]
fn mismatched_bank_data_is_rejected() {
    let data = BankData {
        equity: vec![1.0, 2.0],
        deposits: vec![10.0],
        gross_loans: vec![5.0, 5.0],
        ..Default::default()
    };
    assert!(EntityStore::from_bank_data(Vec::new(), data, &Calibration::default()).is_err());
}

#[test]
fn batch_runs_are_independent_and_ordered() {
    let calibration = Calibration {
        periods: 2,
        ..Default::default()
    };
    let config = BatchConfig {
        runs: 6,
        base_seed: 40,
        max_attempts: 2,
    };
    let setup = |rng: &mut StdRng| -> Result<EntityStore, SimulationError> {
        Ok(generate_store(rng, &population(40, 4), &calibration)?)
    };
    let batch = run_batch(&calibration, &config, setup).unwrap();
    assert_eq!(batch.len(), 6);

    for run in &batch {
        let report = run.result.as_ref().unwrap();
        assert_eq!(report.seed, run.seed);
        assert_eq!(report.outcomes.len(), 2);
    }

    // Re-running one seed alone gives the same report as inside the batch.
    let again = run_batch(
        &calibration,
        &BatchConfig {
            runs: 1,
            base_seed: 43,
            max_attempts: 2,
        },
        setup,
    )
    .unwrap();
    assert_eq!(
        again[0].result.as_ref().unwrap().outcomes,
        batch[3].result.as_ref().unwrap().outcomes
    );
}
