use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::error::ApiError;
use super::AppState;
use crate::analytics::{MonteCarloSample, RiskReport};
use crate::market::is_valid_ticker;

// ── Query params ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SimulationQuery {
    #[serde(default = "default_ticker")]
    ticker: String,
    /// Falls back to the configured size for the endpoint
    #[serde(default)]
    sample_size: Option<usize>,
}

fn default_ticker() -> String {
    "SPY".to_string()
}

impl SimulationQuery {
    fn ticker(&self) -> Result<&str, ApiError> {
        let ticker = self.ticker.trim();
        if ticker.is_empty() {
            return Err(ApiError::BadRequest("ticker must not be empty".into()));
        }
        if !is_valid_ticker(ticker) {
            return Err(ApiError::BadRequest(format!(
                "ticker {:?} may only contain letters, digits, '.', ':' and '-'",
                ticker
            )));
        }
        Ok(ticker)
    }
}

// ── Route definitions ────────────────────────────────────────────────────

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/simulation-results", get(simulation_results))
        .route("/montecarlo-sample", get(montecarlo_sample))
        .route("/health", get(health))
}

async fn simulation_results(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SimulationQuery>,
) -> Result<Json<RiskReport>, ApiError> {
    let sample_size = q.sample_size.unwrap_or(state.report_sample_size);
    let report = state.pipeline.run(q.ticker()?, sample_size).await?;
    Ok(Json(report))
}

async fn montecarlo_sample(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SimulationQuery>,
) -> Result<Json<MonteCarloSample>, ApiError> {
    let sample_size = q.sample_size.unwrap_or(state.legacy_sample_size);
    let sample = state.pipeline.sample(q.ticker()?, sample_size).await?;
    Ok(Json(sample))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
