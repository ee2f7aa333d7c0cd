//! Trading-day locator
//!
//! Markets close on weekends and holidays, and thin days give degenerate
//! statistics, so the locator walks backward one calendar day at a time
//! until a window with enough data points turns up.

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use tracing::{debug, info};

use super::provider::MarketDataProvider;
use super::types::{Granularity, TimeWindow};
use crate::config::{MarketConfig, ProviderConfig};
use crate::error::{Error, Result};

/// Exchange session clock
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    pub tz: Tz,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl SessionClock {
    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        Ok(Self {
            tz: config.tz().map_err(|e| Error::Config(e.to_string()))?,
            open: config.open_time().map_err(|e| Error::Config(e.to_string()))?,
            close: config.close_time().map_err(|e| Error::Config(e.to_string()))?,
        })
    }

    /// Current time on the exchange clock
    pub fn now(&self) -> DateTime<Tz> {
        chrono::Utc::now().with_timezone(&self.tz)
    }

    /// Attach the exchange zone to a wall-clock time. Times skipped by a
    /// DST jump resolve to the instant after the gap.
    pub fn localize(&self, local: NaiveDateTime) -> Result<DateTime<Tz>> {
        self.tz
            .from_local_datetime(&local)
            .earliest()
            .or_else(|| {
                self.tz
                    .from_local_datetime(&(local + Duration::hours(1)))
                    .earliest()
            })
            .ok_or_else(|| Error::Internal(format!("{} does not exist in {}", local, self.tz)))
    }

    fn at(&self, day: NaiveDate, time: NaiveTime) -> Result<DateTime<Tz>> {
        self.localize(day.and_time(time))
    }

    pub fn session_open(&self, day: NaiveDate) -> Result<DateTime<Tz>> {
        self.at(day, self.open)
    }

    pub fn session_close(&self, day: NaiveDate) -> Result<DateTime<Tz>> {
        self.at(day, self.close)
    }
}

/// How the candidate window is carved out of a trading day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSpec {
    /// Last `minutes` before the session close, probed with trades
    EndOfSession { minutes: i64 },
    /// Trailing `minutes` ending at the delayed "now", clamped to the session,
    /// probed with second aggregates
    ClampedTrailing { minutes: i64, data_delay_minutes: i64 },
}

impl WindowSpec {
    /// Deterministic window for the candidate `days_back` calendar days
    /// before `now`. Day stepping happens on the exchange wall clock so a
    /// DST transition never shifts the session.
    pub fn window_for(
        &self,
        clock: &SessionClock,
        now: DateTime<Tz>,
        days_back: u32,
    ) -> Result<TimeWindow> {
        let local = now
            .naive_local()
            .checked_sub_days(Days::new(days_back as u64))
            .ok_or_else(|| Error::Internal(format!("{} days before {} is out of range", days_back, now)))?;

        match *self {
            WindowSpec::EndOfSession { minutes } => {
                let end = clock.session_close(local.date())?;
                let start = end - Duration::minutes(minutes);
                Ok(TimeWindow::from_datetimes(&start, &end))
            }
            WindowSpec::ClampedTrailing {
                minutes,
                data_delay_minutes,
            } => {
                let candidate = local - Duration::minutes(data_delay_minutes);
                let day = candidate.date();
                let open = day.and_time(clock.open);
                let close = day.and_time(clock.close);

                let end = candidate.max(open).min(close);
                let start = (end - Duration::minutes(minutes)).max(open);
                Ok(TimeWindow::from_datetimes(
                    &clock.localize(start)?,
                    &clock.localize(end)?,
                ))
            }
        }
    }
}

/// Finds the most recent day with enough intraday liquidity
pub struct TradingDayLocator {
    clock: SessionClock,
    max_back_days: u32,
    aggs_limit: u32,
}

impl TradingDayLocator {
    pub fn new(clock: SessionClock, max_back_days: u32, aggs_limit: u32) -> Self {
        Self {
            clock,
            max_back_days,
            aggs_limit,
        }
    }

    pub fn from_config(market: &MarketConfig, provider: &ProviderConfig) -> Result<Self> {
        Ok(Self::new(
            SessionClock::from_config(market)?,
            market.max_back_days,
            provider.aggs_limit,
        ))
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    /// Walk back from `now` until a window holds at least `min_points`
    pub async fn find_recent_liquid_window(
        &self,
        provider: &dyn MarketDataProvider,
        ticker: &str,
        spec: WindowSpec,
        now: DateTime<Tz>,
        min_points: usize,
    ) -> Result<TimeWindow> {
        for days_back in 0..self.max_back_days {
            let window = spec.window_for(&self.clock, now, days_back)?;
            if window.duration_ms() <= 0 {
                debug!("Day -{}: empty window, skipping", days_back);
                continue;
            }

            let points = self.probe(provider, ticker, spec, window, min_points).await?;
            if points >= min_points {
                info!(
                    "Liquid window for {} found {} day(s) back: {} ({} points)",
                    ticker,
                    days_back,
                    window.describe(),
                    points
                );
                return Ok(window);
            }
            debug!(
                "Day -{}: {} points < {} required, trying previous day",
                days_back, points, min_points
            );
        }

        Err(Error::NoLiquidWindowFound {
            ticker: ticker.to_string(),
            max_back_days: self.max_back_days,
        })
    }

    async fn probe(
        &self,
        provider: &dyn MarketDataProvider,
        ticker: &str,
        spec: WindowSpec,
        window: TimeWindow,
        min_points: usize,
    ) -> Result<usize> {
        match spec {
            WindowSpec::EndOfSession { .. } => Ok(provider
                .list_trades(ticker, window, min_points.max(1))
                .await?
                .len()),
            WindowSpec::ClampedTrailing { .. } => Ok(provider
                .get_aggs(ticker, Granularity::Second, window, self.aggs_limit)
                .await?
                .len()),
        }
    }
}
