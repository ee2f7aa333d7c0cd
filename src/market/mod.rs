//! Market data: value types, the provider abstraction, the Polygon REST
//! client and the trading-day locator.

pub mod locator;
pub mod polygon;
pub mod provider;
pub mod types;

pub use locator::{SessionClock, TradingDayLocator, WindowSpec};
pub use polygon::PolygonClient;
pub use provider::MarketDataProvider;
pub use types::{is_valid_ticker, AggregateBar, Granularity, TimeWindow, TradeTick};
