use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::Error;

/// Error type for HTTP responses
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// Simulation engine broke its output contract
    Simulation(String),
    Upstream(String),
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "bad_request: {msg}"),
            Self::Simulation(msg) => write!(f, "simulation_error: {msg}"),
            Self::Upstream(msg) => write!(f, "upstream_error: {msg}"),
            Self::Internal(msg) => write!(f, "internal_error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Simulation(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        };

        tracing::error!("Request failed: {self}");
        let body = json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        if e.is_contract_violation() {
            return Self::Simulation(e.to_string());
        }
        match e {
            Error::ProviderUnavailable(msg) => Self::Upstream(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}
