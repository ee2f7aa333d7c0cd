//! Market data provider abstraction

use async_trait::async_trait;

use super::types::{AggregateBar, Granularity, TimeWindow, TradeTick};
use crate::error::Result;

/// Source of trade ticks and aggregate bars for a ticker.
///
/// Implementations return data ordered ascending by timestamp and report
/// transport or API failures as `Error::ProviderUnavailable`.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Trades inside `window`, at most `limit` of them
    async fn list_trades(
        &self,
        ticker: &str,
        window: TimeWindow,
        limit: usize,
    ) -> Result<Vec<TradeTick>>;

    /// Aggregate bars of the given granularity inside `window`
    async fn get_aggs(
        &self,
        ticker: &str,
        granularity: Granularity,
        window: TimeWindow,
        limit: u32,
    ) -> Result<Vec<AggregateBar>>;
}
