//! Entity records, contracts and run configuration.

pub mod bank;
pub mod config;
pub mod contract;
pub mod entity;
pub mod firm;
pub mod store;
