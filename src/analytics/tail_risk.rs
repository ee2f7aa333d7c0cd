//! Tail-risk statistics over terminal prices

use serde::Serialize;

use crate::error::{Error, Result};

/// Left-tail fraction for the 95% VaR
pub const VAR_TAIL_FRACTION: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TailRisk {
    pub value_at_risk_95: f64,
    pub conditional_value_at_risk_95: f64,
    /// Percentage of paths finishing above S0
    pub probability_of_profit: f64,
}

/// Index of the VaR order statistic: `floor(0.05 * n)`
pub fn var_index(n: usize) -> usize {
    (VAR_TAIL_FRACTION * n as f64).floor() as usize
}

/// VaR95 and CVaR95 from ascending-sorted terminal prices.
///
/// CVaR is the mean of `sorted[0..=idx]`, so it never exceeds VaR.
pub fn var_cvar(sorted: &[f64]) -> Result<(f64, f64)> {
    if sorted.is_empty() {
        return Err(Error::EmptyEnsemble { paths: 0, steps: 0 });
    }
    let idx = var_index(sorted.len());
    let var = sorted[idx];
    let cvar = if idx == 0 {
        var
    } else {
        let tail = &sorted[..=idx];
        // Summation rounding can lift the mean of a flat tail past its boundary
        (tail.iter().sum::<f64>() / tail.len() as f64).min(var)
    };
    Ok((var, cvar))
}

pub fn probability_of_profit(final_prices: &[f64], s0: f64) -> f64 {
    if final_prices.is_empty() {
        return 0.0;
    }
    let winners = final_prices.iter().filter(|&&p| p > s0).count();
    100.0 * (winners as f64 / final_prices.len() as f64)
}

/// Sort a copy ascending (total order, NaN last)
pub fn sorted_ascending(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Tail statistics from ascending-sorted terminal prices
pub fn tail_risk(sorted: &[f64], s0: f64) -> Result<TailRisk> {
    let (value_at_risk_95, conditional_value_at_risk_95) = var_cvar(sorted)?;
    Ok(TailRisk {
        value_at_risk_95,
        conditional_value_at_risk_95,
        probability_of_profit: probability_of_profit(sorted, s0),
    })
}
