//! Polygon REST API client
//!
//! Implements [`MarketDataProvider`] over the v3 trades and v2 aggregates
//! endpoints. Trade listing follows `next_url` pagination until the
//! requested limit is reached.

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::provider::MarketDataProvider;
use super::types::{is_valid_ticker, AggregateBar, Granularity, TimeWindow, TradeTick};
use crate::config::ProviderConfig;
use crate::error::{Error, Result};

const NANOS_PER_MILLI: i64 = 1_000_000;

#[derive(Debug, Clone, Deserialize)]
struct TradesResponse {
    #[serde(default)]
    results: Vec<PolygonTrade>,
    next_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PolygonTrade {
    price: f64,
    #[serde(default)]
    size: f64,
    /// SIP timestamp, nanoseconds
    sip_timestamp: i64,
}

impl From<PolygonTrade> for TradeTick {
    fn from(t: PolygonTrade) -> Self {
        TradeTick::new(t.sip_timestamp / NANOS_PER_MILLI, t.price, t.size)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AggsResponse {
    #[serde(default)]
    results: Vec<PolygonAgg>,
}

#[derive(Debug, Clone, Deserialize)]
struct PolygonAgg {
    /// Close
    c: f64,
    /// Bar start, milliseconds
    t: i64,
}

impl From<PolygonAgg> for AggregateBar {
    fn from(a: PolygonAgg) -> Self {
        AggregateBar {
            timestamp_ms: a.t,
            close: a.c,
        }
    }
}

/// Polygon market data client
pub struct PolygonClient {
    client: Client,
    config: ProviderConfig,
}

impl PolygonClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Base URL extended with percent-encoded path segments
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| Error::Config(format!("Invalid provider URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("Provider URL cannot take a path: {}", self.config.base_url)))?
            .pop_if_empty()
            .extend(segments.iter().copied());
        Ok(url)
    }

    fn with_key(&self, mut url: Url) -> Url {
        if !url.query_pairs().any(|(k, _)| k == "apiKey") {
            url.query_pairs_mut().append_pair("apiKey", &self.config.api_key);
        }
        url
    }

    fn retry_policy(&self) -> ExponentialBackoff {
        let base = Duration::from_millis(200);
        ExponentialBackoff {
            initial_interval: base,
            max_interval: base * 4,
            max_elapsed_time: Some(base * 4 * self.config.max_retries.max(1)),
            ..Default::default()
        }
    }

    /// GET with retry on transient failures (timeouts, 429, 5xx)
    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T> {
        let url = self.with_key(url);
        retry(self.retry_policy(), || async {
            match self.get_once(url.clone()).await {
                Ok(body) => Ok(body),
                Err(e) if e.is_retryable() => {
                    warn!("Retryable provider error: {}", e);
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }

    async fn get_once<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let msg = format!("HTTP {} from provider", status);
            return if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                Err(Error::ProviderUnavailable(msg))
            } else {
                // Client errors will not improve on retry
                Err(Error::Internal(msg))
            };
        }
        Ok(resp.json::<T>().await?)
    }
}

#[async_trait]
impl MarketDataProvider for PolygonClient {
    fn name(&self) -> &'static str {
        "polygon"
    }

    async fn list_trades(
        &self,
        ticker: &str,
        window: TimeWindow,
        limit: usize,
    ) -> Result<Vec<TradeTick>> {
        check_ticker(ticker)?;
        let mut url = self.endpoint(&["v3", "trades", ticker])?;
        url.query_pairs_mut()
            .append_pair(
                "timestamp.gte",
                &(window.start_ms * NANOS_PER_MILLI).to_string(),
            )
            .append_pair("timestamp.lt", &(window.end_ms * NANOS_PER_MILLI).to_string())
            .append_pair("order", "asc")
            .append_pair("sort", "timestamp")
            .append_pair(
                "limit",
                &self.config.trades_page_limit.min(limit as u32).max(1).to_string(),
            );

        let mut trades = Vec::new();
        let mut next = Some(url);
        while let Some(page_url) = next.take() {
            let page: TradesResponse = self
                .get_json(page_url)
                .await
                .map_err(into_provider_error)?;
            let page_len = page.results.len();
            debug!("Fetched {} trades for {}", page_len, ticker);
            trades.extend(page.results.into_iter().map(TradeTick::from));

            if !should_follow_cursor(page_len, trades.len(), limit) {
                trades.truncate(limit);
                break;
            }
            next = match page.next_url {
                Some(raw) => Some(
                    Url::parse(&raw)
                        .map_err(|e| Error::ProviderUnavailable(format!("Bad next_url: {}", e)))?,
                ),
                None => None,
            };
        }

        Ok(trades)
    }

    async fn get_aggs(
        &self,
        ticker: &str,
        granularity: Granularity,
        window: TimeWindow,
        limit: u32,
    ) -> Result<Vec<AggregateBar>> {
        check_ticker(ticker)?;
        let (from, to) = (window.start_ms.to_string(), window.end_ms.to_string());
        let mut url = self.endpoint(&[
            "v2",
            "aggs",
            "ticker",
            ticker,
            "range",
            "1",
            granularity.timespan(),
            &from,
            &to,
        ])?;
        url.query_pairs_mut()
            .append_pair("sort", "asc")
            .append_pair("limit", &limit.to_string());

        let resp: AggsResponse = self.get_json(url).await.map_err(into_provider_error)?;
        debug!(
            "Fetched {} {} aggregates for {}",
            resp.results.len(),
            granularity.timespan(),
            ticker
        );
        Ok(resp.results.into_iter().map(AggregateBar::from).collect())
    }
}

fn check_ticker(ticker: &str) -> Result<()> {
    if is_valid_ticker(ticker) {
        Ok(())
    } else {
        Err(Error::Internal(format!("Invalid ticker {:?}", ticker)))
    }
}

/// An empty page ends pagination even when a cursor is present
fn should_follow_cursor(page_len: usize, collected: usize, limit: usize) -> bool {
    page_len > 0 && collected < limit
}

/// Every failure talking to the provider surfaces as `ProviderUnavailable`
fn into_provider_error(e: Error) -> Error {
    match e {
        Error::ProviderUnavailable(_) => e,
        other => Error::ProviderUnavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PolygonClient {
        PolygonClient::new(ProviderConfig {
            api_key: "k".into(),
            ..ProviderConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_parse_trades_page() {
        let json = r#"{
            "results": [
                {"price": 100.5, "size": 10, "sip_timestamp": 1700000000123456789, "exchange": 4},
                {"price": 100.6, "sip_timestamp": 1700000000223456789}
            ],
            "status": "OK",
            "next_url": "https://api.polygon.io/v3/trades/SPY?cursor=abc"
        }"#;
        let page: TradesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(page.next_url.as_deref(), Some("https://api.polygon.io/v3/trades/SPY?cursor=abc"));

        let ticks: Vec<TradeTick> = page.results.into_iter().map(TradeTick::from).collect();
        assert_eq!(ticks[0], TradeTick::new(1_700_000_000_123, 100.5, 10.0));
        assert_eq!(ticks[1].size, 0.0);
    }

    #[test]
    fn test_parse_aggs() {
        let json = r#"{
            "ticker": "SPY",
            "resultsCount": 2,
            "results": [
                {"o": 1, "h": 2, "l": 0.5, "c": 1.5, "v": 100, "t": 1700000000000},
                {"o": 1.5, "h": 2, "l": 1, "c": 1.75, "v": 50, "t": 1700000001000}
            ]
        }"#;
        let resp: AggsResponse = serde_json::from_str(json).unwrap();
        let bars: Vec<AggregateBar> = resp.results.into_iter().map(AggregateBar::from).collect();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 1.75);
        assert_eq!(bars[1].timestamp_ms, 1_700_000_001_000);
    }

    #[test]
    fn test_empty_results_default() {
        let resp: AggsResponse = serde_json::from_str(r#"{"status": "OK"}"#).unwrap();
        assert!(resp.results.is_empty());
    }

    #[test]
    fn test_api_key_appended_once() {
        let c = client();
        let url = c.with_key(Url::parse("https://api.polygon.io/v3/trades/SPY?cursor=x").unwrap());
        let url = c.with_key(url);
        let keys = url.query_pairs().filter(|(k, _)| k == "apiKey").count();
        assert_eq!(keys, 1);
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let c = PolygonClient::new(ProviderConfig {
            base_url: "https://example.com/".into(),
            ..ProviderConfig::default()
        })
        .unwrap();
        assert_eq!(
            c.endpoint(&["v2", "aggs"]).unwrap().as_str(),
            "https://example.com/v2/aggs"
        );
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = client()
            .endpoint(&["v3", "trades", "../../v1/reference/secret?x="])
            .unwrap();
        assert_eq!(url.path(), "/v3/trades/..%2F..%2Fv1%2Freference%2Fsecret%3Fx=");
        assert!(url.query().is_none());
    }

    #[test]
    fn test_invalid_ticker_rejected_before_request() {
        let window = TimeWindow {
            start_ms: 0,
            end_ms: 1_000,
        };
        let c = client();

        let trades = tokio_test::block_on(c.list_trades("../../v1/reference/secret?x=", window, 10));
        assert!(matches!(trades, Err(Error::Internal(_))));

        let aggs = tokio_test::block_on(c.get_aggs("SPY/..", Granularity::Second, window, 10));
        assert!(matches!(aggs, Err(Error::Internal(_))));
    }

    #[test]
    fn test_pagination_stops() {
        assert!(should_follow_cursor(1_000, 1_000, 2_000));
        // Empty page with a cursor
        assert!(!should_follow_cursor(0, 1_000, 2_000));
        assert!(!should_follow_cursor(1_000, 2_000, 2_000));
    }

    #[test]
    fn test_provider_error_mapping() {
        let e = into_provider_error(Error::Internal("HTTP 403".into()));
        assert!(matches!(e, Error::ProviderUnavailable(_)));
    }
}
