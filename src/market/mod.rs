//! Credit market: loan and CDS matching between firms and banks.

pub mod cds_matcher;
pub mod loan_matcher;
pub mod network;
pub mod pricing;
pub mod sampling;
