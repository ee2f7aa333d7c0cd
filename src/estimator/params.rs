//! GBM parameter estimation from aggregate bars
//!
//! Observation spacing is trade time, not calendar time, so sample moments
//! of the log returns are rescaled to wall-clock seconds: drift scales with
//! the effective sampling rate `N / T`, volatility with its square root.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::market::AggregateBar;

/// Default minimum number of aggregates for an estimate
pub const MIN_AGGREGATES: usize = 10;

/// GBM parameters handed to the simulator (per-second units)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GbmParams {
    /// Reference price
    pub s0: f64,
    /// Drift per second
    pub mu: f64,
    /// Volatility per second
    pub sigma: f64,
}

impl GbmParams {
    pub fn new(s0: f64, mu: f64, sigma: f64) -> Result<Self> {
        if s0 <= 0.0 || !s0.is_finite() {
            return Err(Error::Internal(format!("S0 must be positive, got {}", s0)));
        }
        if sigma < 0.0 || !sigma.is_finite() || !mu.is_finite() {
            return Err(Error::Internal(format!(
                "Invalid drift/volatility: mu={}, sigma={}",
                mu, sigma
            )));
        }
        Ok(Self { s0, mu, sigma })
    }

    /// Dollar standard deviation over `horizon_secs`
    pub fn implied_std(&self, horizon_secs: f64) -> f64 {
        self.s0 * self.sigma * horizon_secs.sqrt()
    }
}

/// Sample mean and Bessel-corrected standard deviation of log returns
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleMoments {
    pub mean: f64,
    pub std_dev: f64,
    pub count: usize,
}

pub fn log_return_moments(closes: &[f64]) -> SampleMoments {
    let returns: Vec<f64> = closes.windows(2).map(|w| w[1].ln() - w[0].ln()).collect();
    let count = returns.len();
    if count == 0 {
        return SampleMoments {
            mean: 0.0,
            std_dev: 0.0,
            count,
        };
    }

    let mean = returns.iter().sum::<f64>() / count as f64;
    let std_dev = if count > 1 {
        let ss: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum();
        (ss / (count - 1) as f64).sqrt()
    } else {
        0.0
    };

    SampleMoments {
        mean,
        std_dev,
        count,
    }
}

/// Rescale per-observation moments to per-second units
pub fn rescale_per_second(moments: &SampleMoments, first_ts_ms: i64, last_ts_ms: i64) -> (f64, f64) {
    let elapsed = ((last_ts_ms - first_ts_ms) as f64 / 1000.0).max(1.0);
    let n = moments.count.max(1) as f64;
    let rate = n / elapsed;
    (moments.mean * rate, moments.std_dev * rate.sqrt())
}

/// Result of a per-second estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    pub mu_per_sec: f64,
    pub sigma_per_sec: f64,
    /// Close of the final aggregate
    pub s0: f64,
    pub aggregate_count: usize,
}

/// Turns raw aggregates into a per-second drift/volatility pair
#[derive(Debug, Clone)]
pub struct ParameterEstimator {
    min_aggregates: usize,
}

impl Default for ParameterEstimator {
    fn default() -> Self {
        Self::new(MIN_AGGREGATES)
    }
}

impl ParameterEstimator {
    pub fn new(min_aggregates: usize) -> Self {
        Self { min_aggregates }
    }

    pub fn estimate(&self, aggregates: &[AggregateBar]) -> Result<Estimate> {
        let mut bars: Vec<AggregateBar> = aggregates
            .iter()
            .filter(|a| a.close > 0.0 && a.close.is_finite())
            .copied()
            .collect();
        if bars.len() != aggregates.len() {
            warn!(
                "Dropped {} aggregates with non-positive close",
                aggregates.len() - bars.len()
            );
        }

        if bars.len() < self.min_aggregates {
            return Err(Error::InsufficientData {
                required: self.min_aggregates,
                actual: bars.len(),
            });
        }

        bars.sort_by_key(|a| a.timestamp_ms);

        let closes: Vec<f64> = bars.iter().map(|a| a.close).collect();
        let moments = log_return_moments(&closes);
        let first = bars[0].timestamp_ms;
        let last = bars[bars.len() - 1].timestamp_ms;
        let (mu_per_sec, sigma_per_sec) = rescale_per_second(&moments, first, last);

        debug!(
            "Sample moments: mean={:.3e} std={:.3e} over {} returns in {:.0}s",
            moments.mean,
            moments.std_dev,
            moments.count,
            (last - first) as f64 / 1000.0
        );

        Ok(Estimate {
            mu_per_sec,
            sigma_per_sec,
            s0: closes[closes.len() - 1],
            aggregate_count: bars.len(),
        })
    }
}

/// Per-second (mu, sigma) with the default minimum of 10 aggregates
pub fn estimate_params(aggregates: &[AggregateBar]) -> Result<(f64, f64)> {
    let estimate = ParameterEstimator::default().estimate(aggregates)?;
    Ok((estimate.mu_per_sec, estimate.sigma_per_sec))
}
