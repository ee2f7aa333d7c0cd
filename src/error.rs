//! Error types for the risk pipeline

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for parameter acquisition and risk analytics
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Market data errors
    #[error("Market data provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("No liquid window found for {ticker} in the last {max_back_days} days")]
    NoLiquidWindowFound { ticker: String, max_back_days: u32 },

    #[error("Insufficient data: need at least {required} aggregates, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    // Simulation contract errors
    #[error("Empty ensemble: {paths} paths x {steps} steps")]
    EmptyEnsemble { paths: usize, steps: usize },

    #[error("Malformed ensemble: expected {expected} prices, got {actual}")]
    MalformedEnsemble { expected: usize, actual: usize },

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ProviderUnavailable(_))
    }

    /// Check if this error comes from live parameter acquisition and may be
    /// replaced by fallback parameters
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            Error::ProviderUnavailable(_)
                | Error::NoLiquidWindowFound { .. }
                | Error::InsufficientData { .. }
        )
    }

    /// Check if this error is a simulation engine contract violation
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::EmptyEnsemble { .. } | Error::MalformedEnsemble { .. }
        )
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::ProviderUnavailable(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
