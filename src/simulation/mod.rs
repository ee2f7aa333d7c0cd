//! Monte Carlo path generation

pub mod engine;
pub mod ensemble;

pub use engine::{GbmSimulator, SimulationEngine};
pub use ensemble::PathEnsemble;
