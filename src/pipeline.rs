//! Per-request risk pipeline: acquire parameters, simulate, analyze
//!
//! Nothing is cached between requests. The CPU-bound simulate and analyze
//! stage runs on the blocking pool.

use std::sync::Arc;
use std::time::Instant;

use chrono::DateTime;
use chrono_tz::Tz;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::analytics::{sample_paths, MonteCarloSample, RiskAnalytics, RiskAnalyzer, RiskReport};
use crate::config::{Config, SimulationConfig};
use crate::error::{Error, Result};
use crate::estimator::{AcquiredParameters, GbmParams, ParameterAcquirer};
use crate::market::MarketDataProvider;
use crate::simulation::{GbmSimulator, PathEnsemble, SimulationEngine};

pub struct RiskPipeline {
    provider: Arc<dyn MarketDataProvider>,
    engine: Arc<dyn SimulationEngine>,
    acquirer: ParameterAcquirer,
    analyzer: RiskAnalyzer,
    simulation: SimulationConfig,
}

impl RiskPipeline {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        engine: Arc<dyn SimulationEngine>,
        acquirer: ParameterAcquirer,
        analyzer: RiskAnalyzer,
        simulation: SimulationConfig,
    ) -> Self {
        Self {
            provider,
            engine,
            acquirer,
            analyzer,
            simulation,
        }
    }

    /// Pipeline with the bundled GBM engine
    pub fn from_config(config: &Config, provider: Arc<dyn MarketDataProvider>) -> Result<Self> {
        Ok(Self::new(
            provider,
            Arc::new(GbmSimulator::new(config.simulation.seed)),
            ParameterAcquirer::from_config(config)?,
            RiskAnalyzer::from_config(&config.analytics),
            config.simulation.clone(),
        ))
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Acquire parameters for `ticker` as of now
    pub async fn parameters(&self, ticker: &str) -> AcquiredParameters {
        self.acquirer
            .acquire(self.provider.as_ref(), ticker, self.acquirer.now())
            .await
    }

    /// Full dashboard report
    pub async fn run(&self, ticker: &str, sample_size: usize) -> Result<RiskReport> {
        self.run_at(ticker, sample_size, self.acquirer.now()).await
    }

    pub async fn run_at(
        &self,
        ticker: &str,
        sample_size: usize,
        now: DateTime<Tz>,
    ) -> Result<RiskReport> {
        let request_id = Uuid::new_v4();
        let span = info_span!("risk_report", %request_id, ticker);

        async move {
            let acquired = self
                .acquirer
                .acquire(self.provider.as_ref(), ticker, now)
                .await;
            let (cpu_time_ms, analytics) = self
                .simulate_and_analyze(acquired.params(), sample_size)
                .await?;

            info!(
                "Report ready: source={:?} VaR95={:.2} CVaR95={:.2} P(profit)={:.1}% sim={:.2}ms",
                acquired.source(),
                analytics.tail.value_at_risk_95,
                analytics.tail.conditional_value_at_risk_95,
                analytics.tail.probability_of_profit,
                cpu_time_ms
            );

            Ok(RiskReport::assemble(
                request_id,
                ticker,
                &acquired,
                cpu_time_ms,
                analytics,
            ))
        }
        .instrument(span)
        .await
    }

    /// Sample paths only, without statistics
    pub async fn sample(&self, ticker: &str, sample_size: usize) -> Result<MonteCarloSample> {
        self.sample_at(ticker, sample_size, self.acquirer.now()).await
    }

    pub async fn sample_at(
        &self,
        ticker: &str,
        sample_size: usize,
        now: DateTime<Tz>,
    ) -> Result<MonteCarloSample> {
        let acquired = self
            .acquirer
            .acquire(self.provider.as_ref(), ticker, now)
            .await;
        let params = acquired.params();
        let engine = Arc::clone(&self.engine);
        let simulation = self.simulation.clone();

        let paths = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f64>>> {
            let ensemble = simulate(engine.as_ref(), &simulation, params)?;
            let mut rng = analysis_rng(simulation.seed);
            Ok(sample_paths(&ensemble, sample_size, &mut rng))
        })
        .await
        .map_err(|e| Error::Internal(format!("Simulation task failed: {}", e)))??;

        Ok(MonteCarloSample { paths })
    }

    async fn simulate_and_analyze(
        &self,
        params: GbmParams,
        sample_size: usize,
    ) -> Result<(f64, RiskAnalytics)> {
        let engine = Arc::clone(&self.engine);
        let analyzer = self.analyzer.clone();
        let simulation = self.simulation.clone();

        tokio::task::spawn_blocking(move || -> Result<(f64, RiskAnalytics)> {
            let started = Instant::now();
            let ensemble = simulate(engine.as_ref(), &simulation, params)?;
            let cpu_time_ms = started.elapsed().as_secs_f64() * 1_000.0;

            let mut rng = analysis_rng(simulation.seed);
            let analytics = analyzer.analyze(&ensemble, params.s0, sample_size, &mut rng)?;
            Ok((cpu_time_ms, analytics))
        })
        .await
        .map_err(|e| Error::Internal(format!("Simulation task failed: {}", e)))?
    }
}

/// Run the engine and validate its output shape
fn simulate(
    engine: &dyn SimulationEngine,
    simulation: &SimulationConfig,
    params: GbmParams,
) -> Result<PathEnsemble> {
    debug!(
        "Running {} with {} paths x {} steps",
        engine.name(),
        simulation.n_paths,
        simulation.n_steps
    );
    let prices = engine.simulate(
        params.mu,
        params.sigma,
        params.s0,
        simulation.n_steps,
        simulation.n_paths,
    );
    PathEnsemble::from_flat(prices, simulation.n_paths, simulation.n_steps)
}

// Offset from the engine seed so sampling does not mirror the first draws
fn analysis_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    }
}
