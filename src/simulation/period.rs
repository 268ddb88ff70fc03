use crate::clearing::firm_default::{FirmDefaultResolver, FirmSettlement};
use crate::clearing::interbank::{BankClearing, BankStatus, ClearingError, InterbankClearingEngine};
use crate::clearing::liability::{LiabilityBreakdown, LiabilityMatrix};
use crate::core::config::{Calibration, ConfigError};
use crate::core::contract::ContractLog;
use crate::core::entity::{BankId, FirmId};
use crate::core::store::{EntityStore, StoreError};
use crate::graph::exposure::{ContagionCluster, ExposureGraph};
use crate::market::network::form_network;
use crate::simulation::planning::plan_production;
use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abandon a run.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("period {period}: {source}")]
    Clearing {
        period: usize,
        #[source]
        source: ClearingError,
    },
    #[error("period {period}: non-finite state in {entity}")]
    NonFiniteState { period: usize, entity: String },
}

/// Everything one period produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodOutcome {
    pub period: usize,
    pub economy_state: usize,
    /// Firm processing order drawn for the period.
    pub firm_order: Vec<FirmId>,
    pub contracts: ContractLog,
    pub firms: FirmSettlement,
    pub deposit_change: Vec<f64>,
    pub liabilities: LiabilityMatrix,
    pub banks: BankClearing,
    pub contagion_clusters: Vec<ContagionCluster>,
    pub supply_threshold_breaches: usize,
    pub min_price_breaches: usize,
    pub market_price: f64,
    pub firm_equity: Vec<f64>,
    pub bank_equity: Vec<f64>,
    pub bank_deposits: Vec<f64>,
}

impl PeriodOutcome {
    pub fn defaulting_firms(&self) -> &[FirmId] {
        &self.firms.defaulting
    }

    pub fn defaulting_banks(&self) -> Vec<BankId> {
        self.banks.defaulting_banks()
    }

    pub fn summary(&self) -> PeriodSummary {
        PeriodSummary {
            period: self.period,
            economy_state: self.economy_state,
            firm_loans: self.contracts.firm_loans().count(),
            interbank_loans: self.contracts.interbank_loans().count(),
            cds_contracts: self.contracts.cds().count(),
            credit_extended: self.contracts.firm_credit_total(),
            defaulting_firms: self.firms.defaulting.len(),
            contagion_defaults: self.banks.count(BankStatus::DefaultedByContagion),
            deposit_run_defaults: self.banks.count(BankStatus::DefaultedByDepositRun),
            liabilities: self.liabilities.breakdown(),
            largest_cluster: self.contagion_clusters.first().map_or(0, |c| c.len()),
            clearing_iterations: self.banks.vector.iterations,
            market_price: self.market_price,
            total_bank_equity: self.bank_equity.iter().sum(),
        }
    }
}

/// Headline figures for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period: usize,
    pub economy_state: usize,
    pub firm_loans: usize,
    pub interbank_loans: usize,
    pub cds_contracts: usize,
    pub credit_extended: f64,
    pub defaulting_firms: usize,
    pub contagion_defaults: usize,
    pub deposit_run_defaults: usize,
    pub liabilities: LiabilityBreakdown,
    pub largest_cluster: usize,
    pub clearing_iterations: usize,
    pub market_price: f64,
    pub total_bank_equity: f64,
}

impl PeriodSummary {
    pub fn defaulting_banks(&self) -> usize {
        self.contagion_defaults + self.deposit_run_defaults
    }
}

impl std::fmt::Display for PeriodSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "period {:>3} [state {}]: {} loans ({:.0}), {} interbank, {} CDS | \
             {} firm defaults, {} bank defaults ({} contagion, {} deposit run)",
            self.period,
            self.economy_state,
            self.firm_loans,
            self.credit_extended,
            self.interbank_loans,
            self.cds_contracts,
            self.defaulting_firms,
            self.defaulting_banks(),
            self.contagion_defaults,
            self.deposit_run_defaults,
        )
    }
}

/// Per-bank exogenous deposit change: `N(mu, std) / 100 * deposits`.
pub fn deposit_shock<R: Rng + ?Sized>(
    rng: &mut R,
    calibration: &Calibration,
    store: &EntityStore,
) -> Vec<f64> {
    store
        .banks()
        .iter()
        .map(|bank| {
            let z: f64 = rng.sample(StandardNormal);
            let growth = calibration.mu_deposit_growth + calibration.std_deposit_growth * z;
            growth / 100.0 * bank.deposits
        })
        .collect()
}

/// Run one period against `store`, mutating it in place.
///
/// Steps, each fully completed before the next: shuffle firms, plan
/// production, match loans and CDS, clear the goods market and firm
/// defaults, draw deposit shocks, clear the interbank market. Fails rather
/// than let NaN or infinite balances cross into the next period.
pub fn run_period<R: Rng + ?Sized>(
    rng: &mut R,
    calibration: &Calibration,
    store: &mut EntityStore,
    period: usize,
    economy_state: usize,
) -> Result<PeriodOutcome, SimulationError> {
    let resolver = FirmDefaultResolver::for_state(calibration, economy_state)?;
    let engine = InterbankClearingEngine::from_calibration(calibration);

    let mut firm_order: Vec<FirmId> = store.firms().iter().map(|f| f.id).collect();
    firm_order.shuffle(rng);

    let market_price = store.market_price;
    let production = plan_production(rng, calibration, market_price, store.firms_mut());
    let requests = production.loan_requests(store.firms(), &firm_order);
    let network = form_network(rng, calibration, store, &requests);

    let funded_equity: Vec<f64> = store.firms().iter().map(|f| f.equity).collect();
    let num_banks = store.num_banks();
    let firms = resolver.resolve(rng, store.firms_mut(), &network.log, num_banks);
    for (firm, &before) in store.firms_mut().iter_mut().zip(&funded_equity) {
        firm.profit = if before > 0.0 {
            (firm.equity - before) / before
        } else {
            0.0
        };
    }

    let deposit_change = deposit_shock(rng, calibration, store);
    let liabilities = LiabilityMatrix::from_contracts(num_banks, &network.log, &firms);
    let banks = engine
        .clear(
            store.banks_mut(),
            &network.books,
            &liabilities,
            &firms.loan_proceeds,
            &deposit_change,
        )
        .map_err(|source| SimulationError::Clearing { period, source })?;

    if !store.firms().is_empty() {
        store.market_price =
            store.firms().iter().map(|f| f.price).sum::<f64>() / store.num_firms() as f64;
    }
    let contagion_clusters = ExposureGraph::from_matrix(&liabilities).contagion_clusters();

    if let Some(entity) = store.first_non_finite() {
        return Err(SimulationError::NonFiniteState { period, entity });
    }

    let outcome = PeriodOutcome {
        period,
        economy_state,
        firm_order,
        contracts: network.log,
        firms,
        deposit_change,
        liabilities,
        banks,
        contagion_clusters,
        supply_threshold_breaches: production.supply_threshold_breaches,
        min_price_breaches: production.min_price_breaches,
        market_price: store.market_price,
        firm_equity: store.firms().iter().map(|f| f.equity).collect(),
        bank_equity: store.banks().iter().map(|b| b.equity).collect(),
        bank_deposits: store.banks().iter().map(|b| b.deposits).collect(),
    };
    info!("{}", outcome.summary());
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::population::{generate_store, PopulationConfig};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_store(seed: u64) -> EntityStore {
        let config = PopulationConfig {
            num_firms: 60,
            num_banks: 5,
            ..Default::default()
        };
        generate_store(
            &mut StdRng::seed_from_u64(seed),
            &config,
            &Calibration::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_period_runs_and_balances_stay_valid() {
        let calibration = Calibration::default();
        let mut store = small_store(1);
        let mut rng = StdRng::seed_from_u64(1);
        let outcome = run_period(&mut rng, &calibration, &mut store, 0, 0).unwrap();

        assert_eq!(outcome.firm_order.len(), 60);
        assert_eq!(outcome.liabilities.size(), 5);
        for bank in store.banks() {
            assert!(bank.equity >= 0.0);
            assert!(bank.deposits >= 0.0);
        }
        for firm in outcome.defaulting_firms() {
            assert_eq!(store.firm(*firm).equity, 0.0);
        }
        for bank in outcome.defaulting_banks() {
            assert_eq!(store.bank(bank).equity, 0.0);
        }
    }

    #[test]
    fn test_capacity_respected_each_period() {
        let calibration = Calibration::default();
        let mut store = small_store(2);
        let max_credit: Vec<f64> = store.banks().iter().map(|b| b.max_credit()).collect();
        let mut rng = StdRng::seed_from_u64(2);
        let outcome = run_period(&mut rng, &calibration, &mut store, 0, 0).unwrap();

        let mut lent = vec![0.0; max_credit.len()];
        for loan in outcome.contracts.firm_loans() {
            lent[loan.lender.index()] += loan.notional_amount;
        }
        for loan in outcome.contracts.interbank_loans() {
            lent[loan.lender.index()] += loan.notional_amount;
        }
        for (assets, cap) in lent.iter().zip(&max_credit) {
            assert!(*assets <= cap * (1.0 + 1e-12));
        }
    }

    #[test]
    fn test_unknown_economy_state_is_config_error() {
        let calibration = Calibration::default();
        let mut store = small_store(3);
        let mut rng = StdRng::seed_from_u64(3);
        let err = run_period(&mut rng, &calibration, &mut store, 0, 7).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Config(ConfigError::UnknownRegime { state: 7, .. })
        ));
    }

    #[test]
    fn test_nan_state_stops_the_run() {
        let calibration = Calibration::default();
        let mut store = small_store(4);
        store.firms_mut()[0].price = f64::NAN;
        let mut rng = StdRng::seed_from_u64(4);
        let err = run_period(&mut rng, &calibration, &mut store, 3, 0).unwrap_err();
        assert!(matches!(err, SimulationError::NonFiniteState { period: 3, .. }));
    }
}
