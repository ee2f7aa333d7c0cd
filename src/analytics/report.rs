//! Risk report assembly
//!
//! `RiskAnalyzer` reduces an ensemble to raw statistics; `RiskReport` is the
//! fixed, versioned document served to the dashboard.

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::drawdown::{drawdown_distribution, DrawdownDistribution};
use super::histogram::{jittered_counts, Histogram};
use super::sampling::sample_paths;
use super::tail_risk::{sorted_ascending, tail_risk, TailRisk};
use crate::config::AnalyticsConfig;
use crate::error::Result;
use crate::estimator::{AcquiredParameters, FlowAdjustment, ParameterSource};
use crate::simulation::PathEnsemble;

/// Bumped whenever a report field changes meaning or is removed
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Raw (unrounded) statistics for one ensemble
#[derive(Debug, Clone)]
pub struct RiskAnalytics {
    pub n_paths: usize,
    pub n_steps: usize,
    pub tail: TailRisk,
    pub drawdown: DrawdownDistribution,
    pub histogram: Histogram,
    /// Second histogram series; identical to `histogram.counts` unless
    /// legacy noise injection is enabled
    pub comparison_counts: Vec<u64>,
    pub sample_paths: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct RiskAnalyzer {
    histogram_bins: usize,
    histogram_noise: bool,
}

impl RiskAnalyzer {
    pub fn new(histogram_bins: usize, histogram_noise: bool) -> Self {
        Self {
            histogram_bins,
            histogram_noise,
        }
    }

    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self::new(config.histogram_bins, config.histogram_noise)
    }

    pub fn analyze<R: Rng + ?Sized>(
        &self,
        ensemble: &PathEnsemble,
        s0: f64,
        sample_size: usize,
        rng: &mut R,
    ) -> Result<RiskAnalytics> {
        let final_prices = ensemble.final_prices();
        let sorted = sorted_ascending(&final_prices);

        // Same f32 precision as the grid
        let tail = tail_risk(&sorted, (s0 as f32) as f64)?;

        let drawdown = drawdown_distribution(ensemble, s0);
        let histogram = Histogram::of_terminal_prices(&sorted, self.histogram_bins);
        let comparison_counts = if self.histogram_noise {
            jittered_counts(&histogram.counts, rng)
        } else {
            histogram.counts.clone()
        };

        Ok(RiskAnalytics {
            n_paths: ensemble.n_paths(),
            n_steps: ensemble.n_steps(),
            tail,
            drawdown,
            histogram,
            comparison_counts,
            sample_paths: sample_paths(ensemble, sample_size, rng),
        })
    }
}

/// Dashboard report, schema version [`REPORT_SCHEMA_VERSION`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub schema_version: u32,
    pub request_id: Uuid,
    pub ticker: String,
    pub start_price: f64,
    pub mu: f64,
    pub sigma: f64,
    pub parameter_source: ParameterSource,
    pub fallback_reason: Option<String>,
    pub order_flow: Option<FlowAdjustment>,
    pub n_paths: usize,
    pub n_steps: usize,
    pub cpu_time_ms: f64,
    /// No hardware engine exists; always null
    pub fpga_time_ms: Option<f64>,
    /// No hardware engine exists; always null
    pub speed_improvement_x: Option<f64>,
    pub value_at_risk_95: f64,
    pub conditional_value_at_risk_95: f64,
    pub probability_of_profit: f64,
    pub average_drawdown_days: f64,
    pub histogram_bin_edges: Vec<f64>,
    pub histogram_fpga_counts: Vec<u64>,
    pub histogram_cpu_counts: Vec<u64>,
    pub drawdown_bin_edges: Vec<String>,
    pub drawdown_counts: Vec<usize>,
    pub sample_paths: Vec<Vec<f64>>,
}

impl RiskReport {
    pub fn assemble(
        request_id: Uuid,
        ticker: &str,
        acquired: &AcquiredParameters,
        cpu_time_ms: f64,
        analytics: RiskAnalytics,
    ) -> Self {
        let params = acquired.params();
        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            request_id,
            ticker: ticker.to_string(),
            start_price: round_to(params.s0, 2),
            mu: params.mu,
            sigma: params.sigma,
            parameter_source: acquired.source(),
            fallback_reason: acquired.fallback_reason().map(str::to_string),
            order_flow: acquired.order_flow(),
            n_paths: analytics.n_paths,
            n_steps: analytics.n_steps,
            cpu_time_ms: round_to(cpu_time_ms, 2),
            fpga_time_ms: None,
            speed_improvement_x: None,
            value_at_risk_95: round_to(analytics.tail.value_at_risk_95, 2),
            conditional_value_at_risk_95: round_to(analytics.tail.conditional_value_at_risk_95, 2),
            probability_of_profit: round_to(analytics.tail.probability_of_profit, 1),
            average_drawdown_days: round_to(analytics.drawdown.average_drawdown_days, 1),
            histogram_bin_edges: analytics
                .histogram
                .bin_edges
                .iter()
                .map(|&e| round_to(e, 2))
                .collect(),
            histogram_fpga_counts: analytics.histogram.counts,
            histogram_cpu_counts: analytics.comparison_counts,
            drawdown_bin_edges: analytics.drawdown.bin_labels,
            drawdown_counts: analytics.drawdown.counts,
            sample_paths: analytics.sample_paths,
        }
    }
}

/// Legacy sample-only response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloSample {
    pub paths: Vec<Vec<f64>>,
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}
