//! Market parameter estimation
//!
//! - `params`: per-second drift/volatility from aggregate bars
//! - `order_flow`: sentiment-scaled drift correction from trade ticks
//! - `acquisition`: the live chain with its fallback boundary

pub mod acquisition;
pub mod order_flow;
pub mod params;

pub use acquisition::{
    AcquiredParameters, FallbackParameters, LiveParameters, ParameterAcquirer, ParameterSource,
};
pub use order_flow::{FlowAdjustment, OrderFlowAdjuster};
pub use params::{estimate_params, Estimate, GbmParams, ParameterEstimator};
