//! Client for a local Ollama server.

use crate::config::FilterConfig;
use crate::error::OllamaError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Anything that can turn a prompt into a completion.
///
/// The classifier only depends on this trait, so tests can swap the HTTP
/// client for a scripted fake.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, OllamaError>;

    /// Human readable name for logs
    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaClient {
    client: reqwest::Client,
    api_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(api_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        tracing::debug!("Initialized Ollama client with model: {}", model);

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        Self::new(
            &config.ollama_api_url,
            &config.ollama_model,
            config.ollama_timeout,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate_url(&self) -> String {
        format!("{}/generate", self.api_url)
    }

    /// Server root, i.e. the API URL without its `/api` suffix
    fn base_url(&self) -> &str {
        self.api_url
            .strip_suffix("/api")
            .unwrap_or(&self.api_url)
    }

    /// Probe the server root; Ollama answers 200 when it is up
    pub async fn check_availability(&self) -> bool {
        let url = format!("{}/", self.base_url());

        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                tracing::info!("Ollama API is available");
                true
            }
            Ok(response) => {
                tracing::error!("Ollama API returned status code {}", response.status());
                false
            }
            Err(e) => {
                tracing::error!("Error connecting to Ollama API: {}", e);
                false
            }
        }
    }

    /// Send one prompt to the generate route and return the trimmed completion
    pub async fn generate(&self, prompt: &str) -> Result<String, OllamaError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature: 0.0 },
        };

        tracing::debug!("Sending request to Ollama API with model: {}", self.model);

        let response = self
            .client
            .post(self.generate_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(OllamaError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| OllamaError::MalformedResponse(e.to_string()))?;

        tracing::debug!("Successfully received response from Ollama");
        Ok(parsed.response.trim().to_string())
    }
}

#[async_trait]
impl CompletionBackend for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, OllamaError> {
        self.generate(prompt).await
    }

    fn name(&self) -> &str {
        "Ollama"
    }
}


#[cfg(test)]
mod tests {
    use super::test_server::serve;
    use super::*;

    fn client(url: &str) -> OllamaClient {
        OllamaClient::new(url, "llama3.2:latest", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_generate_returns_trimmed_completion() {
        let server = serve(vec![(
            200,
            r#"{"model":"llama3.2:latest","response":"  UNNECESSARY - newsletter\n","done":true}"#
                .to_string(),
        )])
        .await;

        let text = client(&server.url).generate("classify this").await.unwrap();
        assert_eq!(text, "UNNECESSARY - newsletter");

        let requests = server.requests.lock().unwrap();
        let body: serde_json::Value = serde_json::from_str(&requests[0]).unwrap();
        assert_eq!(body["model"], "llama3.2:latest");
        assert_eq!(body["prompt"], "classify this");
        assert_eq!(body["stream"], false);
    }

    #[tokio::test]
    async fn test_non_200_is_status_error() {
        let server = serve(vec![(500, r#"{"error":"model not loaded"}"#.to_string())]).await;

        let err = client(&server.url).generate("hi").await.unwrap_err();
        match err {
            OllamaError::Status { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("model not loaded"));
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_response_field_is_malformed() {
        let server = serve(vec![(200, r#"{"done":true}"#.to_string())]).await;

        let err = client(&server.url).generate("hi").await.unwrap_err();
        assert!(matches!(err, OllamaError::MalformedResponse(_)));
        assert!(!err.is_network());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nobody is listening on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{}/api", addr))
            .generate("hi")
            .await
            .unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_availability_probe() {
        let server = serve(vec![(200, "Ollama is running".to_string())]).await;
        assert!(client(&server.url).check_availability().await);

        let server = serve(vec![(404, String::new())]).await;
        assert!(!client(&server.url).check_availability().await);
    }

    #[tokio::test]
    async fn test_availability_probe_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(!client(&format!("http://{}/api", addr)).check_availability().await);
    }

    #[test]
    fn test_base_url_strips_api_suffix() {
        let c = client("http://localhost:11434/api/");
        assert_eq!(c.base_url(), "http://localhost:11434");
        assert_eq!(c.generate_url(), "http://localhost:11434/api/generate");

        let c = client("http://localhost:11434");
        assert_eq!(c.base_url(), "http://localhost:11434");
    }
}
