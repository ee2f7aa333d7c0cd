//! Live parameter acquisition with fallback
//!
//! Live data is best-effort: any failure along the locate → fetch →
//! estimate → adjust chain yields the configured fallback triple instead of
//! failing the request. The variant tells callers which path was taken.

use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::order_flow::{FlowAdjustment, OrderFlowAdjuster};
use super::params::{GbmParams, ParameterEstimator};
use crate::config::Config;
use crate::error::Result;
use crate::market::{Granularity, MarketDataProvider, TimeWindow, TradingDayLocator, WindowSpec};

/// Which path produced the simulation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterSource {
    Live,
    Fallback,
}

/// Parameters estimated from market data
#[derive(Debug, Clone, Serialize)]
pub struct LiveParameters {
    pub params: GbmParams,
    /// Drift before the order-flow nudge
    pub unadjusted_mu: f64,
    pub order_flow: FlowAdjustment,
    pub aggregate_window: TimeWindow,
    pub aggregate_count: usize,
    pub trade_window: TimeWindow,
    pub trade_count: usize,
}

/// Hardcoded parameters used when live acquisition fails
#[derive(Debug, Clone, Serialize)]
pub struct FallbackParameters {
    pub params: GbmParams,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AcquiredParameters {
    Live(LiveParameters),
    Fallback(FallbackParameters),
}

impl AcquiredParameters {
    pub fn params(&self) -> GbmParams {
        match self {
            AcquiredParameters::Live(live) => live.params,
            AcquiredParameters::Fallback(fallback) => fallback.params,
        }
    }

    pub fn source(&self) -> ParameterSource {
        match self {
            AcquiredParameters::Live(_) => ParameterSource::Live,
            AcquiredParameters::Fallback(_) => ParameterSource::Fallback,
        }
    }

    pub fn order_flow(&self) -> Option<FlowAdjustment> {
        match self {
            AcquiredParameters::Live(live) => Some(live.order_flow),
            AcquiredParameters::Fallback(_) => None,
        }
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            AcquiredParameters::Live(_) => None,
            AcquiredParameters::Fallback(fallback) => Some(&fallback.reason),
        }
    }
}

/// Runs the estimation chain for one request
pub struct ParameterAcquirer {
    locator: TradingDayLocator,
    estimator: ParameterEstimator,
    adjuster: OrderFlowAdjuster,
    trailing: WindowSpec,
    end_of_session: WindowSpec,
    min_aggregate_points: usize,
    min_trade_points: usize,
    aggs_limit: u32,
    max_trades: usize,
    fallback: GbmParams,
}

impl ParameterAcquirer {
    pub fn from_config(config: &Config) -> Result<Self> {
        let market = &config.market;
        Ok(Self {
            locator: TradingDayLocator::from_config(market, &config.provider)?,
            estimator: ParameterEstimator::new(config.estimator.min_aggregates),
            adjuster: OrderFlowAdjuster::from_config(&config.order_flow),
            trailing: WindowSpec::ClampedTrailing {
                minutes: market.trailing_window_minutes,
                data_delay_minutes: market.data_delay_minutes,
            },
            end_of_session: WindowSpec::EndOfSession {
                minutes: market.trade_window_minutes,
            },
            min_aggregate_points: market.min_aggregate_points,
            min_trade_points: market.min_trade_points,
            aggs_limit: config.provider.aggs_limit,
            max_trades: config.provider.max_trades,
            fallback: config.fallback.params(),
        })
    }

    /// Current time on the exchange clock
    pub fn now(&self) -> DateTime<Tz> {
        self.locator.clock().now()
    }

    /// Acquire parameters, never failing
    pub async fn acquire(
        &self,
        provider: &dyn MarketDataProvider,
        ticker: &str,
        now: DateTime<Tz>,
    ) -> AcquiredParameters {
        match self.acquire_live(provider, ticker, now).await {
            Ok(live) => AcquiredParameters::Live(live),
            Err(e) => {
                warn!(
                    "Live parameter acquisition for {} failed ({}), using fallback S0={} mu={} sigma={}",
                    ticker, e, self.fallback.s0, self.fallback.mu, self.fallback.sigma
                );
                AcquiredParameters::Fallback(FallbackParameters {
                    params: self.fallback,
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn acquire_live(
        &self,
        provider: &dyn MarketDataProvider,
        ticker: &str,
        now: DateTime<Tz>,
    ) -> Result<LiveParameters> {
        let aggregate_window = self
            .locator
            .find_recent_liquid_window(provider, ticker, self.trailing, now, self.min_aggregate_points)
            .await?;
        let aggs = provider
            .get_aggs(ticker, Granularity::Second, aggregate_window, self.aggs_limit)
            .await?;
        info!(
            "Using window {} with {} trade-seconds",
            aggregate_window.describe(),
            aggs.len()
        );

        let estimate = self.estimator.estimate(&aggs)?;

        let trade_window = self
            .locator
            .find_recent_liquid_window(
                provider,
                ticker,
                self.end_of_session,
                now,
                self.min_trade_points,
            )
            .await?;
        let trades = provider
            .list_trades(ticker, trade_window, self.max_trades)
            .await?;

        let order_flow =
            self.adjuster
                .adjust_drift(estimate.mu_per_sec, estimate.sigma_per_sec, &trades);
        let params = GbmParams::new(estimate.s0, order_flow.mu_adjusted, estimate.sigma_per_sec)?;

        info!(
            "GBM parameters for {}: S0={} mu={:.6e} (raw {:.6e}, delta {:.6e}, sentiment {:.4}) sigma={:.6e}, implied 1-minute std ${:.4}",
            ticker,
            params.s0,
            params.mu,
            estimate.mu_per_sec,
            order_flow.delta_mu,
            order_flow.sentiment,
            params.sigma,
            params.implied_std(60.0)
        );

        Ok(LiveParameters {
            params,
            unadjusted_mu: estimate.mu_per_sec,
            order_flow,
            aggregate_window,
            aggregate_count: estimate.aggregate_count,
            trade_window,
            trade_count: trades.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::provider::mock::MockProvider;
    use crate::market::{AggregateBar, TradeTick};
    use chrono::TimeZone;
    use chrono_tz::America::Chicago;

    fn ct(d: u32, h: u32, m: u32, s: u32) -> DateTime<Tz> {
        Chicago.with_ymd_and_hms(2024, 3, d, h, m, s).unwrap()
    }

    fn friday_market() -> MockProvider {
        let aggs = (0..120)
            .map(|i| AggregateBar {
                timestamp_ms: ct(1, 14, 20, 0).timestamp_millis() + i * 2_000,
                close: 500.0 + ((i % 7) as f64 - 3.0) * 0.05,
            })
            .collect();
        let trades = vec![
            TradeTick::new(ct(1, 14, 51, 0).timestamp_millis(), 500.00, 100.0),
            TradeTick::new(ct(1, 14, 52, 0).timestamp_millis(), 500.10, 200.0),
            TradeTick::new(ct(1, 14, 53, 0).timestamp_millis(), 500.05, 50.0),
        ];
        MockProvider::new(aggs, trades)
    }

    #[tokio::test]
    async fn test_live_acquisition() {
        let provider = friday_market();
        let acquirer = ParameterAcquirer::from_config(&Config::default()).unwrap();

        let acquired = acquirer.acquire(&provider, "SPY", ct(4, 16, 0, 0)).await;
        assert_eq!(acquired.source(), ParameterSource::Live);
        assert!(acquired.fallback_reason().is_none());

        let AcquiredParameters::Live(live) = acquired else {
            panic!("expected live parameters");
        };
        let last_close = 500.0 + ((119 % 7) as f64 - 3.0) * 0.05;
        assert_eq!(live.params.s0, last_close);
        assert_eq!(live.aggregate_count, 120);
        assert_eq!(live.trade_count, 3);
        assert!(live.params.sigma > 0.0);

        // 200 * 0.10 + 50 * (-0.05) = 17.5
        assert!((live.order_flow.net_flow - 17.5).abs() < 1e-9);
        assert!((live.params.mu - (live.unadjusted_mu + live.order_flow.delta_mu)).abs() < 1e-18);
        assert_eq!(live.trade_window.end_ms, ct(1, 15, 0, 0).timestamp_millis());
    }

    #[tokio::test]
    async fn test_provider_outage_falls_back() {
        let provider = MockProvider::failing();
        let config = Config::default();
        let acquirer = ParameterAcquirer::from_config(&config).unwrap();

        let acquired = acquirer.acquire(&provider, "SPY", ct(4, 16, 0, 0)).await;
        assert_eq!(acquired.source(), ParameterSource::Fallback);
        assert_eq!(acquired.params(), config.fallback.params());
        assert!(acquired.order_flow().is_none());
        assert!(acquired
            .fallback_reason()
            .unwrap()
            .contains("provider unavailable"));
    }

    #[tokio::test]
    async fn test_no_liquid_day_falls_back() {
        let provider = MockProvider::new(vec![], vec![]);
        let acquirer = ParameterAcquirer::from_config(&Config::default()).unwrap();

        let acquired = acquirer.acquire(&provider, "SPY", ct(4, 16, 0, 0)).await;
        assert_eq!(acquired.source(), ParameterSource::Fallback);
        assert!(acquired.fallback_reason().unwrap().contains("No liquid window"));
    }

    #[tokio::test]
    async fn test_insufficient_aggregates_fall_back() {
        let provider = friday_market();
        let mut config = Config::default();
        config.estimator.min_aggregates = 500;
        let acquirer = ParameterAcquirer::from_config(&config).unwrap();

        let acquired = acquirer.acquire(&provider, "SPY", ct(4, 16, 0, 0)).await;
        assert_eq!(acquired.source(), ParameterSource::Fallback);
        assert!(acquired.fallback_reason().unwrap().contains("Insufficient data"));
    }

    #[test]
    fn test_fallback_serializes_with_source_tag() {
        let acquired = AcquiredParameters::Fallback(FallbackParameters {
            params: GbmParams {
                s0: 190.17,
                mu: 0.5202,
                sigma: 0.326202,
            },
            reason: "offline".into(),
        });
        let json = serde_json::to_value(&acquired).unwrap();
        assert_eq!(json["source"], "fallback");
        assert_eq!(json["reason"], "offline");
        assert_eq!(json["params"]["s0"], 190.17);
    }
}
