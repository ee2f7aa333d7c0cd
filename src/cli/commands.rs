//! CLI command implementations

use anyhow::{Context, Result};
use chrono::Duration;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::Config;
use crate::estimator::AcquiredParameters;
use crate::market::{Granularity, MarketDataProvider, PolygonClient, TimeWindow};
use crate::pipeline::RiskPipeline;
use crate::server;

fn build_provider(config: &Config) -> Result<Arc<dyn MarketDataProvider>> {
    let client = PolygonClient::new(config.provider.clone())
        .context("Failed to create market data client")?;
    Ok(Arc::new(client))
}

fn build_pipeline(config: &Config) -> Result<RiskPipeline> {
    let provider = build_provider(config)?;
    RiskPipeline::from_config(config, provider).context("Failed to build risk pipeline")
}

/// Start the HTTP server
pub async fn serve(config: &Config) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    info!(
        "Starting risk API: provider={}, engine={}, {} paths x {} steps",
        pipeline.provider_name(),
        pipeline.engine_name(),
        config.simulation.n_paths,
        config.simulation.n_steps
    );
    if config.analytics.histogram_noise {
        warn!("Histogram noise injection enabled - second histogram series is synthetic");
    }
    server::serve(config, pipeline).await
}

/// Compute one report and print it as JSON
pub async fn report(config: &Config, ticker: &str, sample_size: Option<usize>) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let sample_size = sample_size.unwrap_or(config.analytics.report_sample_size);

    let report = pipeline
        .run(ticker, sample_size)
        .await
        .with_context(|| format!("Failed to build report for {}", ticker))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Acquire and print GBM parameters without simulating
pub async fn params(config: &Config, ticker: &str) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let acquired = pipeline.parameters(ticker).await;
    let params = acquired.params();

    println!("\n=== GBM PARAMETERS: {} ===\n", ticker);
    println!("Source:          {:?}", acquired.source());
    println!("S0:              {:.4}", params.s0);
    println!("mu (per sec):    {:.6e}", params.mu);
    println!("sigma (per sec): {:.6e}", params.sigma);
    println!("1-minute std:    ${:.4}", params.implied_std(60.0));

    match &acquired {
        AcquiredParameters::Live(live) => {
            println!(
                "Aggregates:      {} in {}",
                live.aggregate_count,
                live.aggregate_window.describe()
            );
            println!(
                "Trades:          {} in {}",
                live.trade_count,
                live.trade_window.describe()
            );
            println!("Raw mu:          {:.6e}", live.unadjusted_mu);
            println!(
                "Order flow:      net={:.2} sentiment={:.4} delta_mu={:.6e}",
                live.order_flow.net_flow, live.order_flow.sentiment, live.order_flow.delta_mu
            );
        }
        AcquiredParameters::Fallback(fallback) => {
            println!("Fallback reason: {}", fallback.reason);
        }
    }
    println!();
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Check market data provider reachability
pub async fn health(config: &Config) -> Result<()> {
    println!("\n=== SYSTEM HEALTH CHECK ===\n");

    print!("Market data provider... ");
    match check_provider(config).await {
        Ok(latency) => println!("OK ({}ms)", latency),
        Err(e) => {
            println!("FAILED: {}", e);
            println!("\nRequests will be served with fallback parameters.");
            anyhow::bail!("Health check failed");
        }
    }

    println!("\nAll checks passed.");
    Ok(())
}

async fn check_provider(config: &Config) -> Result<u128> {
    if config.provider.api_key.is_empty() {
        anyhow::bail!("no API key configured");
    }
    let provider = build_provider(config)?;
    let end = chrono::Utc::now();
    let window = TimeWindow::from_datetimes(&(end - Duration::days(7)), &end);

    let started = Instant::now();
    provider
        .get_aggs("SPY", Granularity::Minute, window, 1)
        .await?;
    Ok(started.elapsed().as_millis())
}
