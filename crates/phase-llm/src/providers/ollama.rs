//! Ollama provider implementation
//!
//! Talks to the non-streaming `/api/generate` endpoint of an Ollama server
//! (local or tunnelled). The generated text is the `response` field of the
//! reply.
//!
//! ```no_run
//! use phase_llm::{InferenceOptions, InferenceService};
//! use phase_llm::providers::{OllamaConfig, OllamaProvider};
//!
//! # async fn example() -> phase_llm::Result<()> {
//! let provider = OllamaProvider::with_config(
//!     OllamaConfig::new("http://localhost:11434").with_timeout(300),
//! )?;
//!
//! let text = provider
//!     .complete("Summarize the clusters", &InferenceOptions::new("tinyllama"))
//!     .await?;
//! println!("{text}");
//! # Ok(())
//! # }
//! ```

use crate::{InferenceOptions, InferenceService, LLMError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Configuration for the Ollama provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaConfig {
    /// Server base URL, without the `/api/generate` suffix
    pub base_url: String,

    /// Request timeout in seconds (default: 300)
    pub timeout_secs: u64,
}

impl OllamaConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_BASE_URL)
    }
}

/// Ollama provider
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create a provider with custom configuration
    pub fn with_config(config: OllamaConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(LLMError::ConfigurationError(
                "Ollama base URL is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a provider for the given base URL with default settings
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_config(OllamaConfig::new(base_url))
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }
}

#[async_trait]
impl InferenceService for OllamaProvider {
    #[instrument(
        skip(self, prompt, options),
        fields(model = %options.model, base_url = %self.config.base_url)
    )]
    async fn complete(&self, prompt: &str, options: &InferenceOptions) -> Result<String> {
        let request = build_generate_request(prompt, options);
        debug!("Sending generate request ({} prompt chars)", prompt.len());

        let response = self
            .client
            .post(self.config.generate_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LLMError::from_status(status.as_u16(), body, &options.model));
        }

        parse_generate_response(&body)
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

// ============================================================================
// Ollama-specific request/response types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ModelOptions>,
}

#[derive(Debug, Serialize)]
struct ModelOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

fn build_generate_request<'a>(
    prompt: &'a str,
    options: &'a InferenceOptions,
) -> GenerateRequest<'a> {
    let model_options = (options.temperature.is_some() || options.max_tokens.is_some()).then(|| {
        ModelOptions {
            temperature: options.temperature,
            num_predict: options.max_tokens,
        }
    });

    GenerateRequest {
        model: &options.model,
        prompt,
        system: options.system.as_deref(),
        stream: false,
        options: model_options,
    }
}

fn parse_generate_response(body: &str) -> Result<String> {
    let parsed: GenerateResponse = serde_json::from_str(body).map_err(|e| {
        LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
    })?;

    if let Some(error) = parsed.error {
        return Err(LLMError::RequestFailed(error));
    }
    if !parsed.done {
        debug!("Generate response not marked done");
    }

    parsed
        .response
        .ok_or_else(|| LLMError::UnexpectedResponse("Missing 'response' field".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_creation() {
        let provider = OllamaProvider::new("http://gpu-box:11434/").unwrap();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(
            provider.config().generate_url(),
            "http://gpu-box:11434/api/generate"
        );
        assert_eq!(provider.config().timeout_secs, 300);
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let result = OllamaProvider::new("  ");
        assert!(matches!(result, Err(LLMError::ConfigurationError(_))));
    }

    #[test]
    fn test_request_is_non_streaming() {
        let options = InferenceOptions::new("tinyllama");
        let request = build_generate_request("What time?", &options);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            json!({"model": "tinyllama", "prompt": "What time?", "stream": false})
        );
    }

    #[test]
    fn test_request_with_options() {
        let options = InferenceOptions::new("tinyllama")
            .with_system("You are terse.")
            .with_max_tokens(64);
        let value = serde_json::to_value(build_generate_request("hi", &options)).unwrap();

        assert_eq!(value["system"], json!("You are terse."));
        assert_eq!(value["options"], json!({"num_predict": 64}));
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{"model":"tinyllama","created_at":"2024-05-01T10:00:00Z","response":"Between 10:00 and 11:00.","done":true}"#;
        assert_eq!(
            parse_generate_response(body).unwrap(),
            "Between 10:00 and 11:00."
        );
    }

    #[test]
    fn test_parse_error_body() {
        let body = r#"{"error":"model 'tinyllama' not found"}"#;
        assert!(matches!(
            parse_generate_response(body),
            Err(LLMError::RequestFailed(msg)) if msg.contains("not found")
        ));
    }

    #[test]
    fn test_parse_malformed_body() {
        assert!(matches!(
            parse_generate_response("<html>bad gateway</html>"),
            Err(LLMError::UnexpectedResponse(_))
        ));
        assert!(matches!(
            parse_generate_response(r#"{"done":true}"#),
            Err(LLMError::UnexpectedResponse(_))
        ));
    }
}
