//! Period pipeline, multi-period runs and the inputs that drive them.

pub mod economy;
pub mod period;
pub mod planning;
pub mod population;
pub mod runner;
