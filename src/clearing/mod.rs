//! End-of-period settlement: firm defaults, liability matrix, interbank clearing.

pub mod firm_default;
pub mod interbank;
pub mod liability;
