//! Configuration loading and validation

use anyhow::{Context, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;

use crate::estimator::GbmParams;

/// Upper bound on `n_paths * n_steps` (f32 prices held in memory per request)
pub const MAX_GRID_CELLS: usize = 50_000_000;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub order_flow: OrderFlowConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Market data provider (Polygon-compatible REST API)
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_url")]
    pub base_url: String,
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Page size for trade listing
    #[serde(default = "default_trades_page_limit")]
    pub trades_page_limit: u32,
    /// Hard cap on trades collected for the order-flow window
    #[serde(default = "default_max_trades")]
    pub max_trades: usize,
    #[serde(default = "default_aggs_limit")]
    pub aggs_limit: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_url(),
            api_key: default_api_key(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            trades_page_limit: default_trades_page_limit(),
            max_trades: default_max_trades(),
            aggs_limit: default_aggs_limit(),
        }
    }
}

/// Exchange session and liquidity probing
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// IANA time zone of the exchange session clock
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Regular session open, "HH:MM" local time
    #[serde(default = "default_session_open")]
    pub session_open: String,
    /// Regular session close, "HH:MM" local time
    #[serde(default = "default_session_close")]
    pub session_close: String,
    #[serde(default = "default_max_back_days")]
    pub max_back_days: u32,
    /// Provider feed delay applied to "now" for the trailing window
    #[serde(default = "default_data_delay_minutes")]
    pub data_delay_minutes: i64,
    #[serde(default = "default_trailing_window_minutes")]
    pub trailing_window_minutes: i64,
    #[serde(default = "default_trade_window_minutes")]
    pub trade_window_minutes: i64,
    #[serde(default = "default_min_aggregate_points")]
    pub min_aggregate_points: usize,
    #[serde(default = "default_min_trade_points")]
    pub min_trade_points: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            session_open: default_session_open(),
            session_close: default_session_close(),
            max_back_days: default_max_back_days(),
            data_delay_minutes: default_data_delay_minutes(),
            trailing_window_minutes: default_trailing_window_minutes(),
            trade_window_minutes: default_trade_window_minutes(),
            min_aggregate_points: default_min_aggregate_points(),
            min_trade_points: default_min_trade_points(),
        }
    }
}

impl MarketConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone {}: {}", self.timezone, e))
    }

    pub fn open_time(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.session_open).context("Invalid session_open")
    }

    pub fn close_time(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.session_close).context("Invalid session_close")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EstimatorConfig {
    #[serde(default = "default_min_aggregates")]
    pub min_aggregates: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            min_aggregates: default_min_aggregates(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderFlowConfig {
    /// Multiplier applied to net flow before tanh squashing
    #[serde(default = "default_flow_scale")]
    pub flow_scale: f64,
    /// Drift shift cap, in multiples of sigma
    #[serde(default = "default_max_shift_sigmas")]
    pub max_shift_sigmas: f64,
}

impl Default for OrderFlowConfig {
    fn default() -> Self {
        Self {
            flow_scale: default_flow_scale(),
            max_shift_sigmas: default_max_shift_sigmas(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_n_paths")]
    pub n_paths: usize,
    #[serde(default = "default_n_steps")]
    pub n_steps: usize,
    /// Fixed RNG seed; entropy-seeded when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_paths: default_n_paths(),
            n_steps: default_n_steps(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,
    /// Inject [-2, 2] integer noise into the second histogram series,
    /// matching the legacy dashboard placeholder
    #[serde(default)]
    pub histogram_noise: bool,
    #[serde(default = "default_report_sample_size")]
    pub report_sample_size: usize,
    #[serde(default = "default_legacy_sample_size")]
    pub legacy_sample_size: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            histogram_bins: default_histogram_bins(),
            histogram_noise: false,
            report_sample_size: default_report_sample_size(),
            legacy_sample_size: default_legacy_sample_size(),
        }
    }
}

/// Parameters used when live acquisition fails
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_fallback_s0")]
    pub s0: f64,
    #[serde(default = "default_fallback_mu")]
    pub mu: f64,
    #[serde(default = "default_fallback_sigma")]
    pub sigma: f64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            s0: default_fallback_s0(),
            mu: default_fallback_mu(),
            sigma: default_fallback_sigma(),
        }
    }
}

impl FallbackConfig {
    pub fn params(&self) -> GbmParams {
        GbmParams {
            s0: self.s0,
            mu: self.mu,
            sigma: self.sigma,
        }
    }
}

fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").with_context(|| format!("Expected HH:MM, got {}", s))
}

// Default value functions
fn default_bind() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8000
}

fn default_provider_url() -> String {
    "https://api.polygon.io".into()
}

fn default_api_key() -> String {
    std::env::var("POLYGON_API_KEY").unwrap_or_default()
}

fn default_timeout_ms() -> u64 {
    10000
}

fn default_max_retries() -> u32 {
    3
}

fn default_trades_page_limit() -> u32 {
    1000
}

fn default_max_trades() -> usize {
    2000
}

fn default_aggs_limit() -> u32 {
    50000
}

fn default_timezone() -> String {
    "America/Chicago".into()
}

fn default_session_open() -> String {
    "08:30".into()
}

fn default_session_close() -> String {
    "15:00".into()
}

fn default_max_back_days() -> u32 {
    10
}

fn default_data_delay_minutes() -> i64 {
    15
}

fn default_trailing_window_minutes() -> i64 {
    60
}

fn default_trade_window_minutes() -> i64 {
    10
}

fn default_min_aggregate_points() -> usize {
    10
}

fn default_min_trade_points() -> usize {
    1
}

fn default_min_aggregates() -> usize {
    10
}

fn default_flow_scale() -> f64 {
    0.0001
}

fn default_max_shift_sigmas() -> f64 {
    0.5
}

fn default_n_paths() -> usize {
    100_000
}

fn default_n_steps() -> usize {
    60
}

fn default_histogram_bins() -> usize {
    24
}

fn default_report_sample_size() -> usize {
    35
}

fn default_legacy_sample_size() -> usize {
    100
}

fn default_fallback_s0() -> f64 {
    190.17
}

fn default_fallback_mu() -> f64 {
    0.520200
}

fn default_fallback_sigma() -> f64 {
    0.326202
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("server.bind", default_bind())?
            .set_default("server.port", default_port() as i64)?
            .set_default("provider.base_url", default_provider_url())?
            .set_default("provider.timeout_ms", default_timeout_ms() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix GBM_RISK_)
            .add_source(
                config::Environment::with_prefix("GBM_RISK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.market.tz()?;
        let open = self.market.open_time()?;
        let close = self.market.close_time()?;
        if open >= close {
            anyhow::bail!(
                "session_open ({}) must be before session_close ({})",
                self.market.session_open,
                self.market.session_close
            );
        }

        if self.market.max_back_days == 0 {
            anyhow::bail!("max_back_days must be at least 1");
        }

        if self.market.trailing_window_minutes <= 0 || self.market.trade_window_minutes <= 0 {
            anyhow::bail!("window lengths must be positive");
        }

        if self.estimator.min_aggregates < 2 {
            anyhow::bail!("min_aggregates must be at least 2 to form a return");
        }

        if self.order_flow.max_shift_sigmas < 0.0 {
            anyhow::bail!("max_shift_sigmas cannot be negative");
        }

        if self.simulation.n_paths == 0 || self.simulation.n_steps == 0 {
            anyhow::bail!("n_paths and n_steps must be positive");
        }

        let cells = self
            .simulation
            .n_paths
            .checked_mul(self.simulation.n_steps)
            .unwrap_or(usize::MAX);
        if cells > MAX_GRID_CELLS {
            anyhow::bail!(
                "n_paths x n_steps = {} x {} exceeds the limit of {} prices",
                self.simulation.n_paths,
                self.simulation.n_steps,
                MAX_GRID_CELLS
            );
        }

        if self.analytics.histogram_bins == 0 {
            anyhow::bail!("histogram_bins must be positive");
        }

        if self.fallback.s0 <= 0.0 {
            anyhow::bail!("fallback s0 must be positive");
        }

        if self.fallback.sigma < 0.0 {
            anyhow::bail!("fallback sigma cannot be negative");
        }

        if self.provider.api_key.is_empty() {
            tracing::warn!("No provider API key configured - every request will use fallback parameters");
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  Server:
    bind: {}:{}
  Provider:
    base_url: {}
    api_key: {}
    timeout: {}ms
    max_retries: {}
  Market:
    timezone: {}
    session: {} - {}
    max_back_days: {}
    data_delay: {}min
  Order flow:
    flow_scale: {}
    max_shift_sigmas: {}
  Simulation:
    paths: {}
    steps: {}
    seed: {}
  Analytics:
    histogram_bins: {}
    histogram_noise: {}
  Fallback:
    s0: {}
    mu: {}
    sigma: {}
"#,
            self.server.bind,
            self.server.port,
            mask_url(&self.provider.base_url),
            if self.provider.api_key.is_empty() {
                "(not set)"
            } else {
                "***"
            },
            self.provider.timeout_ms,
            self.provider.max_retries,
            self.market.timezone,
            self.market.session_open,
            self.market.session_close,
            self.market.max_back_days,
            self.market.data_delay_minutes,
            self.order_flow.flow_scale,
            self.order_flow.max_shift_sigmas,
            self.simulation.n_paths,
            self.simulation.n_steps,
            self.simulation
                .seed
                .map(|s| s.to_string())
                .unwrap_or_else(|| "(entropy)".to_string()),
            self.analytics.histogram_bins,
            self.analytics.histogram_noise,
            self.fallback.s0,
            self.fallback.mu,
            self.fallback.sigma,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            market: MarketConfig::default(),
            estimator: EstimatorConfig::default(),
            order_flow: OrderFlowConfig::default(),
            simulation: SimulationConfig::default(),
            analytics: AnalyticsConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.simulation.n_paths, 100_000);
        assert_eq!(config.simulation.n_steps, 60);
        assert_eq!(config.analytics.histogram_bins, 24);
        assert_eq!(config.fallback.s0, 190.17);
        assert!(!config.analytics.histogram_noise);
    }

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_session_times() {
        let market = MarketConfig::default();
        assert_eq!(market.open_time().unwrap(), NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(market.close_time().unwrap(), NaiveTime::from_hms_opt(15, 0, 0).unwrap());
        assert_eq!(market.tz().unwrap(), chrono_tz::America::Chicago);
    }

    #[test]
    fn test_validate_rejects_inverted_session() {
        let mut config = Config::default();
        config.market.session_open = "16:00".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_timezone() {
        let mut config = Config::default();
        config.market.timezone = "Mars/Olympus".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_grid_size() {
        let mut config = Config::default();
        config.simulation.n_paths = 1_000_000;
        config.simulation.n_steps = 60;
        assert!(config.validate().is_err());

        config.simulation.n_paths = usize::MAX;
        config.simulation.n_steps = 2;
        assert!(config.validate().is_err());

        config.simulation.n_paths = 500_000;
        config.simulation.n_steps = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_fallback() {
        let mut config = Config::default();
        config.fallback.s0 = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fallback.sigma = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[simulation]
n_paths = 500
n_steps = 30
seed = 7

[order_flow]
flow_scale = 0.001
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.simulation.n_paths, 500);
        assert_eq!(config.simulation.n_steps, 30);
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.order_flow.flow_scale, 0.001);
        assert_eq!(config.order_flow.max_shift_sigmas, 0.5);
        assert_eq!(config.market.timezone, "America/Chicago");
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("https://api.example.com?apiKey=secret"),
            "https://api.example.com?***"
        );
        assert_eq!(mask_url("https://api.example.com"), "https://api.example.com");
    }

    #[test]
    fn test_masked_display_hides_key() {
        let mut config = Config::default();
        config.provider.api_key = "supersecret".into();
        let shown = config.masked_display();
        assert!(!shown.contains("supersecret"));
        assert!(shown.contains("***"));
    }
}
