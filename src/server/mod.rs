//! HTTP surface for the dashboard
//!
//! `GET /simulation-results` serves the full report, `GET /montecarlo-sample`
//! the bare path sample, `GET /health` a liveness probe.

pub mod error;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::pipeline::RiskPipeline;

pub use error::ApiError;

/// Shared application state, passed to handlers via `axum::extract::State`.
/// Immutable after startup.
pub struct AppState {
    pub pipeline: RiskPipeline,
    pub report_sample_size: usize,
    pub legacy_sample_size: usize,
}

impl AppState {
    pub fn new(config: &Config, pipeline: RiskPipeline) -> Arc<Self> {
        Arc::new(Self {
            pipeline,
            report_sample_size: config.analytics.report_sample_size,
            legacy_sample_size: config.analytics.legacy_sample_size,
        })
    }
}

/// Assemble the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until Ctrl+C
pub async fn serve(config: &Config, pipeline: RiskPipeline) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.server.bind, config.server.port))?;

    let app = router(AppState::new(config, pipeline));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Risk dashboard API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        return;
    }
    info!("Shutdown signal received, stopping...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::RiskReport;
    use crate::market::provider::mock::MockProvider;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::Value;
    use tower::ServiceExt;

    fn offline_app() -> Router {
        let mut config = Config::default();
        config.simulation.n_paths = 500;
        config.simulation.n_steps = 30;
        config.simulation.seed = Some(3);
        let pipeline = RiskPipeline::from_config(&config, Arc::new(MockProvider::failing())).unwrap();
        router(AppState::new(&config, pipeline))
    }

    async fn get(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = get(offline_app(), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_simulation_results_defaults() {
        let response = get(offline_app(), "/simulation-results").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["ticker"], "SPY");
        assert_eq!(body["parameter_source"], "fallback");
        assert_eq!(body["sample_paths"].as_array().unwrap().len(), 35);
        assert!(body["fpga_time_ms"].is_null());
        assert!(body["speed_improvement_x"].is_null());

        let report: RiskReport = serde_json::from_value(body).unwrap();
        assert_eq!(report.n_paths, 500);
        assert_eq!(report.drawdown_counts.iter().sum::<usize>(), 500);
    }

    #[tokio::test]
    async fn test_simulation_results_with_query() {
        let response = get(offline_app(), "/simulation-results?ticker=QQQ&sample_size=3").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["ticker"], "QQQ");
        assert_eq!(body["sample_paths"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_montecarlo_sample_default_size() {
        let response = get(offline_app(), "/montecarlo-sample").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let paths = body["paths"].as_array().unwrap();
        assert_eq!(paths.len(), 100);
        assert_eq!(paths[0].as_array().unwrap().len(), 30);
    }

    #[tokio::test]
    async fn test_blank_ticker_rejected() {
        let response = get(offline_app(), "/simulation-results?ticker=%20").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"]
            .as_str()
            .unwrap()
            .contains("ticker"));
    }

    #[tokio::test]
    async fn test_path_like_ticker_rejected() {
        let response = get(
            offline_app(),
            "/simulation-results?ticker=..%2F..%2Fv1%2Freference%2Fsecret%3Fx%3D",
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = get(offline_app(), "/montecarlo-sample?ticker=SPY%2FQQQ").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_exchange_prefixed_ticker_accepted() {
        let response = get(offline_app(), "/simulation-results?ticker=X:BTCUSD&sample_size=1").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["ticker"], "X:BTCUSD");
    }

    #[tokio::test]
    async fn test_bad_sample_size_rejected() {
        let response = get(offline_app(), "/montecarlo-sample?sample_size=-4").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
