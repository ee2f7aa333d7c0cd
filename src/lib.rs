//! GBM Risk Library
//!
//! Estimates geometric Brownian motion parameters from recent market
//! microstructure, simulates price paths and reduces them to the risk
//! statistics served to the dashboard.

pub mod analytics;
pub mod cli;
pub mod config;
pub mod error;
pub mod estimator;
pub mod market;
pub mod pipeline;
pub mod server;
pub mod simulation;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::RiskPipeline;
