use credit_contagion::clearing::firm_default::recovery_rate;
use credit_contagion::clearing::interbank::{clearing_vector, ClearingIteration};
use credit_contagion::clearing::liability::LiabilityMatrix;
use credit_contagion::core::config::Calibration;
use credit_contagion::market::network::form_network;
use credit_contagion::simulation::period::run_period;
use credit_contagion::simulation::planning::plan_production;
use credit_contagion::simulation::population::{generate_store, PopulationConfig};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

const TOLERANCE: f64 = 1e-10;
const MAX_ITERATIONS: usize = 1_000_000;

/// Generate a square liability matrix of 2..8 banks with an empty diagonal.
fn arb_matrix() -> impl Strategy<Value = LiabilityMatrix> {
    (2usize..8)
        .prop_flat_map(|n| prop::collection::vec(prop::collection::vec(0.0f64..1_000.0, n), n))
        .prop_map(|mut rows| {
            for (i, row) in rows.iter_mut().enumerate() {
                row[i] = 0.0;
            }
            LiabilityMatrix::from_rows(&rows).unwrap()
        })
}

/// A matrix together with initial wealth for each of its banks.
fn arb_network() -> impl Strategy<Value = (LiabilityMatrix, Vec<f64>)> {
    arb_matrix().prop_flat_map(|matrix| {
        let n = matrix.size();
        (Just(matrix), prop::collection::vec(0.0f64..500.0, n))
    })
}

fn small_population() -> PopulationConfig {
    PopulationConfig {
        num_firms: 40,
        num_banks: 5,
        ..Default::default()
    }
}

proptest! {
    // ===================================================================
    // INVARIANT 1: Payments are bounded by 0 and total obligations.
    //
    // A bank never pays a negative amount and never pays more than it owes.
    // ===================================================================
    #[test]
    fn payments_within_obligations((matrix, wealth) in arb_network()) {
        let result = clearing_vector(&matrix, &wealth, TOLERANCE, MAX_ITERATIONS).unwrap();
        for (paid, owed) in result.payments.iter().zip(&result.obligations) {
            prop_assert!(*paid >= 0.0, "payment {} must be non-negative", paid);
            prop_assert!(*paid <= *owed, "payment {} must not exceed obligation {}", paid, owed);
        }
    }

    // ===================================================================
    // INVARIANT 2: The result is a fixed point.
    //
    // Each payment equals what the bank can afford given what it
    // receives under the same vector, capped by its obligations.
    // ===================================================================
    #[test]
    fn result_is_fixed_point((matrix, wealth) in arb_network()) {
        let result = clearing_vector(&matrix, &wealth, TOLERANCE, MAX_ITERATIONS).unwrap();
        for i in 0..matrix.size() {
            let affordable = (wealth[i] + result.inflows[i]).clamp(0.0, result.obligations[i]);
            prop_assert!(
                (affordable - result.payments[i]).abs() < 1e-6,
                "bank {} pays {} but can afford {}",
                i,
                result.payments[i],
                affordable
            );
        }
    }

    // ===================================================================
    // INVARIANT 3: Money paid equals money received.
    //
    // Every unit paid out by a debtor is credited to some creditor.
    // ===================================================================
    #[test]
    fn payments_are_conserved((matrix, wealth) in arb_network()) {
        let result = clearing_vector(&matrix, &wealth, TOLERANCE, MAX_ITERATIONS).unwrap();
        let paid: f64 = result.payments.iter().sum();
        let received: f64 = result.inflows.iter().sum();
        prop_assert!(
            (paid - received).abs() <= 1e-9 * paid.max(1.0),
            "paid {} != received {}",
            paid,
            received
        );
    }

    // ===================================================================
    // INVARIANT 4: Only short payers are in the default set.
    //
    // A bank outside the default set pays its obligations in full.
    // ===================================================================
    #[test]
    fn solvent_banks_pay_in_full((matrix, wealth) in arb_network()) {
        let result = clearing_vector(&matrix, &wealth, TOLERANCE, MAX_ITERATIONS).unwrap();
        for i in 0..matrix.size() {
            let defaulted = result.default_set.iter().any(|b| b.index() == i);
            if !defaulted {
                prop_assert!((result.payments[i] - result.obligations[i]).abs() < 1e-6);
            }
        }
    }

    // ===================================================================
    // INVARIANT 5: More outside wealth never lowers any payment.
    // ===================================================================
    #[test]
    fn payments_monotone_in_wealth(
        (matrix, wealth) in arb_network(),
        extra in 0.0f64..200.0,
        bank in 0usize..8,
    ) {
        let base = clearing_vector(&matrix, &wealth, TOLERANCE, MAX_ITERATIONS).unwrap();
        let mut richer = wealth.clone();
        let bank = bank % richer.len();
        richer[bank] += extra;
        let boosted = clearing_vector(&matrix, &richer, TOLERANCE, MAX_ITERATIONS).unwrap();
        for (before, after) in base.payments.iter().zip(&boosted.payments) {
            prop_assert!(*after >= before - 1e-6);
        }
    }

    // ===================================================================
    // INVARIANT 6: Payments never rise between iterations.
    //
    // Starting from full payment, every step of the iteration lowers or
    // keeps each payment, and the path ends at the returned vector.
    // ===================================================================
    #[test]
    fn iteration_path_is_non_increasing((matrix, wealth) in arb_network()) {
        let mut iteration = ClearingIteration::new(&matrix, &wealth).unwrap();
        prop_assert_eq!(iteration.payments(), iteration.obligations());
        loop {
            prop_assert!(iteration.iterations() < MAX_ITERATIONS, "iteration did not converge");
            let previous = iteration.payments().to_vec();
            let change = iteration.step();
            for (i, (next, prev)) in iteration.payments().iter().zip(&previous).enumerate() {
                prop_assert!(
                    *next <= *prev + 1e-9,
                    "bank {} payment rose from {} to {} at step {}",
                    i,
                    prev,
                    next,
                    iteration.iterations()
                );
            }
            if change < TOLERANCE {
                break;
            }
        }
        let steps = iteration.iterations();
        let path_end = iteration.finish();
        let solved = clearing_vector(&matrix, &wealth, TOLERANCE, MAX_ITERATIONS).unwrap();
        prop_assert_eq!(path_end.iterations, steps);
        prop_assert_eq!(path_end.payments, solved.payments);
    }

    // ===================================================================
    // INVARIANT 7: Recovery rates lie in [0, 1] and rise with equity.
    // ===================================================================
    #[test]
    fn recovery_rate_bounded_and_monotone(
        equity in -1_000.0f64..2_000.0,
        extra in 0.0f64..500.0,
        owed in 0.0f64..1_500.0,
    ) {
        let rate = recovery_rate(equity, owed);
        prop_assert!((0.0..=1.0).contains(&rate));
        prop_assert!(recovery_rate(equity + extra, owed) >= rate);
        if equity >= owed {
            prop_assert_eq!(rate, 1.0);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    // ===================================================================
    // INVARIANT 8: No bank lends beyond its period-start ceiling.
    //
    // Firm loans plus interbank lending booked in a period never exceed
    // deposits / capital requirement.
    // ===================================================================
    #[test]
    fn lending_within_max_credit(seed in any::<u64>()) {
        let calibration = Calibration::default();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut store = generate_store(&mut rng, &small_population(), &calibration).unwrap();
        let order: Vec<_> = store.firms().iter().map(|f| f.id).collect();
        let market_price = store.market_price;
        let plan = plan_production(&mut rng, &calibration, market_price, store.firms_mut());
        let requests = plan.loan_requests(store.firms(), &order);
        let network = form_network(&mut rng, &calibration, &mut store, &requests);

        for (bank, book) in store.banks().iter().zip(&network.books) {
            prop_assert!(
                book.loan_assets <= bank.max_credit() * (1.0 + 1e-12),
                "{} lent {} over ceiling {}",
                bank.id,
                book.loan_assets,
                bank.max_credit()
            );
        }
        for cds in network.log.cds() {
            prop_assert_ne!(cds.buyer, cds.seller);
        }
    }

    // ===================================================================
    // INVARIANT 9: A period is deterministic given the seed.
    // ===================================================================
    #[test]
    fn period_is_deterministic(seed in any::<u64>()) {
        let calibration = Calibration::default();
        let start =
            generate_store(&mut StdRng::seed_from_u64(seed), &small_population(), &calibration)
                .unwrap();

        let mut a = start.clone();
        let mut b = start;
        let first = run_period(&mut StdRng::seed_from_u64(seed), &calibration, &mut a, 0, 0).unwrap();
        let second = run_period(&mut StdRng::seed_from_u64(seed), &calibration, &mut b, 0, 0).unwrap();
        prop_assert_eq!(first, second);
        prop_assert_eq!(a, b);
    }
}
