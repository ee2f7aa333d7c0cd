//! Risk analytics over a simulated path ensemble
//!
//! - `tail_risk`: VaR/CVaR at 95% and probability of profit
//! - `drawdown`: underwater-streak distribution
//! - `histogram`: terminal-price histogram over the 2nd-98th percentile span
//! - `sampling`: path subsets for visualization
//! - `report`: the versioned dashboard document

pub mod drawdown;
pub mod histogram;
pub mod report;
pub mod sampling;
pub mod tail_risk;

pub use drawdown::{DrawdownDistribution, DRAWDOWN_LABELS};
pub use histogram::Histogram;
pub use report::{
    round_to, MonteCarloSample, RiskAnalytics, RiskAnalyzer, RiskReport, REPORT_SCHEMA_VERSION,
};
pub use sampling::{sample_indices, sample_paths};
pub use tail_risk::{tail_risk, TailRisk};
