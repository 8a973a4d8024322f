//! Settings for a filter run.
//!
//! Read once from the environment (after `.env` is loaded) into an immutable
//! [`FilterConfig`] that is handed to every component by reference.

use crate::error::ConfigError;
use crate::logging;
use shared_types::RetryPolicy;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

/// OAuth scope needed to read messages and change their labels
pub const GMAIL_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Google OAuth client secret (installed application)
    pub credentials_file: PathBuf,
    /// Where the OAuth token cache is persisted
    pub token_file: PathBuf,
    /// Maximum inbox messages to examine per run
    pub max_emails: u32,
    /// Body characters included in the prompt
    pub body_preview_length: usize,
    /// Label applied to unnecessary messages
    pub label_name: String,
    /// Base API URL, e.g. `http://localhost:11434/api`
    pub ollama_api_url: String,
    pub ollama_model: String,
    /// Per-request timeout for the completion call
    pub ollama_timeout: Duration,
    pub retry: RetryPolicy,
    pub results_dir: PathBuf,
    pub log_level: LevelFilter,
    /// `None` disables file logging
    pub log_file: Option<PathBuf>,
}

impl FilterConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| {
            lookup(key).unwrap_or_else(|| default.to_string())
        };

        let ollama_api_url = string("OLLAMA_API_URL", "http://localhost:11434/api")
            .trim_end_matches('/')
            .to_string();
        if ollama_api_url.is_empty() {
            return Err(ConfigError::Missing("Ollama API URL (OLLAMA_API_URL)"));
        }

        let ollama_model = string("OLLAMA_MODEL", "llama3.2:latest");
        if ollama_model.trim().is_empty() {
            return Err(ConfigError::Missing("Ollama model (OLLAMA_MODEL)"));
        }

        let label_name = string("LABEL_NAME", "potential-unnecessary");
        if label_name.trim().is_empty() {
            return Err(ConfigError::Missing("Label name (LABEL_NAME)"));
        }

        let timeout_secs: u64 = parse_var(&lookup, "OLLAMA_TIMEOUT", 30, "number of seconds")?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidNumber {
                var: "OLLAMA_TIMEOUT",
                expected: "positive number of seconds",
                value: "0".to_string(),
            });
        }

        let retry_attempts: u32 = parse_var(&lookup, "RETRY_ATTEMPTS", 3, "attempt count")?;
        let retry_delay: f64 = parse_var(&lookup, "RETRY_DELAY", 2.0, "number of seconds")?;
        let retry = RetryPolicy::new(retry_attempts, retry_delay)?;

        let log_level = string("LOG_LEVEL", "INFO");
        let log_level =
            logging::parse_level(&log_level).ok_or(ConfigError::InvalidLogLevel(log_level))?;

        let log_file = string("LOG_FILE", "logs/gmail_filter.log");
        let log_file = if log_file.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(log_file))
        };

        Ok(Self {
            credentials_file: PathBuf::from(string("CREDENTIALS_FILE", "credentials.json")),
            token_file: PathBuf::from(string("TOKEN_FILE", "token.json")),
            max_emails: parse_var(&lookup, "MAX_EMAILS", 100, "message count")?,
            body_preview_length: parse_var(
                &lookup,
                "BODY_PREVIEW_LENGTH",
                1000,
                "character count",
            )?,
            label_name,
            ollama_api_url,
            ollama_model,
            ollama_timeout: Duration::from_secs(timeout_secs),
            retry,
            results_dir: PathBuf::from(string("RESULTS_DIR", "results")),
            log_level,
            log_file,
        })
    }
}

/// Load a dotenv file.
///
/// An explicit path must exist; the default `./.env` is optional.
pub fn load_env_file(path: Option<&Path>) -> Result<(), ConfigError> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    Ok(())
}

fn parse_var<T, F>(
    lookup: &F,
    var: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber {
                var,
                expected,
                value: raw,
            }),
    }
}
