//! Error types for market pipeline operations

use phase_core::{BlackboardError, PhaseError};
use phase_llm::LLMError;
use phase_utils::ConfigError;
use thiserror::Error;

/// Market pipeline specific errors
#[derive(Debug, Error)]
pub enum MarketError {
    /// Alpha Vantage reported an error or returned an unusable payload
    #[error("Alpha Vantage error: {0}")]
    AlphaVantageError(String),

    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Language-model call failed
    #[error("Inference error: {0}")]
    InferenceError(#[from] LLMError),

    /// Input that no retry can fix (empty series, bad cluster count, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Prompt template error
    #[error("Template error: {0}")]
    TemplateError(String),

    /// Blackboard access error
    #[error(transparent)]
    Blackboard(#[from] BlackboardError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Plan or orchestrator construction failed
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] phase_core::Error),
}

/// Result type alias for market operations
pub type Result<T> = std::result::Result<T, MarketError>;

impl MarketError {
    /// Whether retrying the same call could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::AlphaVantageError(_)
                | Self::RateLimitExceeded { .. }
                | Self::NetworkError(_)
                | Self::JsonError(_)
                | Self::InferenceError(_)
        )
    }
}

impl From<ConfigError> for MarketError {
    fn from(err: ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<minijinja::Error> for MarketError {
    fn from(err: minijinja::Error) -> Self {
        Self::TemplateError(err.to_string())
    }
}

/// Convert MarketError to the phase boundary error
impl From<MarketError> for PhaseError {
    fn from(err: MarketError) -> Self {
        if err.is_transient() {
            PhaseError::External(err.to_string())
        } else {
            PhaseError::Structural(err.to_string())
        }
    }
}
