//! Error types for the filter.
//!
//! Each failure domain gets its own enum so callers can tell a retryable
//! endpoint failure from a configuration mistake. The binary folds
//! everything into `anyhow::Error` at the edge.

use shared_types::RetryPolicyError;
use thiserror::Error;

/// Failure of a single call to the Ollama endpoint.
///
/// Every variant is treated as transient by the classifier.
#[derive(Debug, Error)]
pub enum OllamaError {
    /// Timeout, refused connection or any other transport-level failure
    #[error("Failed to communicate with Ollama: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with something other than 200
    #[error("Ollama API returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// 200, but the body was not the JSON we expect
    #[error("Malformed Ollama response: {0}")]
    MalformedResponse(String),
}

impl OllamaError {
    /// True for the network-layer failures (as opposed to service errors)
    pub fn is_network(&self) -> bool {
        matches!(self, OllamaError::Transport(_))
    }
}

/// Failure of a whole classification, after retries
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Classification unavailable after {attempts} attempt(s): {last_error}")]
    Unavailable {
        attempts: u32,
        #[source]
        last_error: OllamaError,
    },
}

/// Invalid or unreadable configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a valid {expected} (got '{value}')")]
    InvalidNumber {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("LOG_LEVEL must be one of TRACE, DEBUG, INFO, WARNING, ERROR, CRITICAL or OFF (got '{0}')")]
    InvalidLogLevel(String),

    #[error("{0} not set. Please check your .env file.")]
    Missing(&'static str),

    #[error("Invalid retry settings: {0}")]
    Retry(#[from] RetryPolicyError),

    #[error("Failed to load env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}
