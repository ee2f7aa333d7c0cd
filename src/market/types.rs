//! Market data value types

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

/// Time-aggregated bar (only the fields the estimator consumes)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateBar {
    /// Bar start, epoch milliseconds
    pub timestamp_ms: i64,
    pub close: f64,
}

/// Single trade print
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    /// Epoch milliseconds
    pub timestamp_ms: i64,
    pub price: f64,
    pub size: f64,
}

impl TradeTick {
    pub fn new(timestamp_ms: i64, price: f64, size: f64) -> Self {
        Self {
            timestamp_ms,
            price,
            size,
        }
    }
}

/// Aggregate bar width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Second,
    Minute,
}

impl Granularity {
    pub fn timespan(&self) -> &'static str {
        match self {
            Granularity::Second => "second",
            Granularity::Minute => "minute",
        }
    }
}

/// Half-open query window `[start, end)` in epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeWindow {
    pub fn from_datetimes<Tz: TimeZone>(start: &DateTime<Tz>, end: &DateTime<Tz>) -> Self {
        Self {
            start_ms: start.timestamp_millis(),
            end_ms: end.timestamp_millis(),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    pub fn contains(&self, ts_ms: i64) -> bool {
        ts_ms >= self.start_ms && ts_ms < self.end_ms
    }

    /// RFC 3339 rendering of both bounds, UTC
    pub fn describe(&self) -> String {
        let fmt = |ms: i64| {
            chrono::DateTime::from_timestamp_millis(ms)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| ms.to_string())
        };
        format!("{} -> {}", fmt(self.start_ms), fmt(self.end_ms))
    }
}

/// Ticker symbols are letters, digits and `. : -` (e.g. `BRK.B`, `X:BTCUSD`),
/// with at least one alphanumeric character
pub fn is_valid_ticker(ticker: &str) -> bool {
    !ticker.is_empty()
        && ticker.len() <= 32
        && ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '-'))
        && ticker.chars().any(|c| c.is_ascii_alphanumeric())
}
