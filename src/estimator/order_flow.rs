//! Order-flow drift adjustment
//!
//! Volume-weighted price changes over recent trades act as an order-flow
//! imbalance proxy. The proxy is squashed through `tanh` and the resulting
//! drift nudge is capped at a fixed multiple of sigma, so flow noise cannot
//! produce an unrealistic drift no matter how many trades there are.

use serde::{Deserialize, Serialize};

use crate::config::OrderFlowConfig;
use crate::market::TradeTick;

/// Outcome of a drift adjustment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowAdjustment {
    pub mu_adjusted: f64,
    pub net_flow: f64,
    /// tanh-scaled net flow, in (-1, 1)
    pub sentiment: f64,
    pub delta_mu: f64,
}

impl FlowAdjustment {
    fn unchanged(mu: f64) -> Self {
        Self {
            mu_adjusted: mu,
            net_flow: 0.0,
            sentiment: 0.0,
            delta_mu: 0.0,
        }
    }
}

/// `sum(size_i * (price_i - price_{i-1}))`, sizes aligned to the later tick
pub fn net_flow(trades: &[TradeTick]) -> f64 {
    trades
        .windows(2)
        .map(|w| w[1].size * (w[1].price - w[0].price))
        .sum()
}

#[derive(Debug, Clone, Copy)]
pub struct OrderFlowAdjuster {
    flow_scale: f64,
    max_shift_sigmas: f64,
}

impl Default for OrderFlowAdjuster {
    fn default() -> Self {
        Self::from_config(&OrderFlowConfig::default())
    }
}

impl OrderFlowAdjuster {
    pub fn new(flow_scale: f64, max_shift_sigmas: f64) -> Self {
        Self {
            flow_scale,
            max_shift_sigmas,
        }
    }

    pub fn from_config(config: &OrderFlowConfig) -> Self {
        Self::new(config.flow_scale, config.max_shift_sigmas)
    }

    /// Nudge `mu` by the order-flow sentiment; fewer than two trades is a no-op
    pub fn adjust_drift(&self, mu: f64, sigma: f64, trades: &[TradeTick]) -> FlowAdjustment {
        if trades.len() < 2 {
            return FlowAdjustment::unchanged(mu);
        }

        let net_flow = net_flow(trades);
        let sentiment = (self.flow_scale * net_flow).tanh();
        let delta_mu = sentiment.clamp(-self.max_shift_sigmas, self.max_shift_sigmas) * sigma;

        FlowAdjustment {
            mu_adjusted: mu + delta_mu,
            net_flow,
            sentiment,
            delta_mu,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticks(points: &[(f64, f64)]) -> Vec<TradeTick> {
        points
            .iter()
            .enumerate()
            .map(|(i, &(price, size))| TradeTick::new(i as i64 * 100, price, size))
            .collect()
    }

    #[test]
    fn test_noop_for_short_windows() {
        let adjuster = OrderFlowAdjuster::default();
        let expected = FlowAdjustment {
            mu_adjusted: 0.3,
            net_flow: 0.0,
            sentiment: 0.0,
            delta_mu: 0.0,
        };
        assert_eq!(adjuster.adjust_drift(0.3, 0.2, &[]), expected);
        assert_eq!(adjuster.adjust_drift(0.3, 0.2, &ticks(&[(100.0, 50.0)])), expected);
    }

    #[test]
    fn test_net_flow_uses_later_size() {
        // 2 * (101 - 100) + 1 * (99 - 101) = 0
        let trades = ticks(&[(100.0, 1.0), (101.0, 2.0), (99.0, 1.0)]);
        assert_eq!(net_flow(&trades), 0.0);

        let adj = OrderFlowAdjuster::default().adjust_drift(0.1, 0.2, &trades);
        assert_eq!(adj.mu_adjusted, 0.1);
        assert_eq!(adj.sentiment, 0.0);
    }

    #[test]
    fn test_small_flow_is_linear_nudge() {
        // net flow = 10 * 0.5 = 5, sentiment = tanh(5e-4)
        let trades = ticks(&[(100.0, 1.0), (100.5, 10.0)]);
        let adj = OrderFlowAdjuster::default().adjust_drift(0.0, 0.2, &trades);
        assert!((adj.net_flow - 5.0).abs() < 1e-12);
        assert!((adj.sentiment - (5e-4f64).tanh()).abs() < 1e-15);
        assert!((adj.delta_mu - adj.sentiment * 0.2).abs() < 1e-15);
        assert!((adj.mu_adjusted - adj.delta_mu).abs() < 1e-15);
    }

    #[test]
    fn test_shift_capped_at_sigma_multiple() {
        let buying = ticks(&[(100.0, 1.0), (110.0, 1_000_000.0)]);
        let selling = ticks(&[(110.0, 1.0), (100.0, 1_000_000.0)]);
        let adjuster = OrderFlowAdjuster::default();

        let up = adjuster.adjust_drift(0.01, 0.4, &buying);
        assert!(up.sentiment > 0.99);
        assert!((up.delta_mu - 0.2).abs() < 1e-12);

        let down = adjuster.adjust_drift(0.01, 0.4, &selling);
        assert!(down.sentiment < -0.99);
        assert!((down.delta_mu + 0.2).abs() < 1e-12);
        assert!((down.mu_adjusted - (0.01 - 0.2)).abs() < 1e-12);
    }

    #[test]
    fn test_zero_sigma_means_no_shift() {
        let trades = ticks(&[(100.0, 1.0), (110.0, 1_000.0)]);
        let adj = OrderFlowAdjuster::default().adjust_drift(0.05, 0.0, &trades);
        assert_eq!(adj.delta_mu, 0.0);
        assert_eq!(adj.mu_adjusted, 0.05);
    }
}
