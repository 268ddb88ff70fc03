//! # credit-contagion
//!
//! Agent-based simulation of credit and credit-risk transfer between firms
//! and banks, with simultaneous default resolution across the resulting
//! obligation network.
//!
//! Each period firms plan production and borrow, banks fund loans out of
//! deposits or the interbank market and trade credit default swaps on the
//! loans they see, firms sell into a random goods market and default when
//! they cannot repay, and banks clear their mutual obligations through an
//! Eisenberg–Noe clearing vector.
//!
//! ## Architecture
//!
//! - **core** — Entity records, contracts, the entity store, calibration
//! - **market** — Loan and CDS pricing and matching
//! - **clearing** — Firm defaults, liability matrix, interbank clearing vector
//! - **graph** — Exposure graph and contagion clusters
//! - **simulation** — Planning, economy chain, period pipeline, seeded runs

pub mod clearing;
pub mod core;
pub mod graph;
pub mod market;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::clearing::firm_default::{FirmDefaultResolver, FirmSettlement};
    pub use crate::clearing::interbank::{
        clearing_vector, BankStatus, ClearingError, ClearingIteration, ClearingVector,
        InterbankClearingEngine,
    };
    pub use crate::clearing::liability::LiabilityMatrix;
    pub use crate::core::bank::{Bank, BankBook};
    pub use crate::core::config::Calibration;
    pub use crate::core::contract::{Cds, ContractEvent, ContractLog, InterbankLoan, Loan};
    pub use crate::core::entity::{BankId, FirmId};
    pub use crate::core::firm::Firm;
    pub use crate::core::store::{BankData, EntityStore};
    pub use crate::graph::exposure::{ContagionCluster, ExposureGraph};
    pub use crate::market::cds_matcher::CdsMatcher;
    pub use crate::market::loan_matcher::{LoanMatcher, LoanRequest};
    pub use crate::simulation::period::{run_period, PeriodOutcome, SimulationError};
    pub use crate::simulation::runner::{run, run_batch, BatchConfig, RunReport};
}
