//! Graph views of the interbank obligation network.

pub mod exposure;
