//! OpenAI-compatible provider implementation
//!
//! This module implements the InferenceService trait on top of the
//! `/chat/completions` endpoint. Any server that speaks the same protocol
//! (vLLM, llama.cpp, LM Studio, Azure deployments) works through a custom
//! API base.
//!
//! # Example
//!
//! ```no_run
//! use phase_llm::{InferenceOptions, InferenceService};
//! use phase_llm::providers::{OpenAIConfig, OpenAIProvider};
//!
//! # async fn example() -> phase_llm::Result<()> {
//! let config = OpenAIConfig::new("sk-...")
//!     .with_api_base("http://localhost:8000/v1")
//!     .with_timeout(60);
//! let provider = OpenAIProvider::with_config(config)?;
//!
//! let text = provider
//!     .complete("Hello!", &InferenceOptions::new("gpt-4o-mini").with_max_tokens(100))
//!     .await?;
//! println!("{text}");
//! # Ok(())
//! # }
//! ```

use crate::{InferenceOptions, InferenceService, LLMError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for OpenAI provider
#[derive(Clone)]
pub struct OpenAIConfig {
    /// API key for authentication; optional for local deployments
    pub api_key: Option<String>,

    /// Base URL for the API (default: "https://api.openai.com/v1")
    pub api_base: String,

    /// Request timeout in seconds (default: 120)
    pub timeout_secs: u64,
}

impl OpenAIConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Config for an unauthenticated, OpenAI-compatible server
    pub fn anonymous(api_base: impl Into<String>) -> Self {
        Self {
            api_key: None,
            api_base: api_base.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// OpenAI provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with custom configuration
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a new OpenAI provider with API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(OpenAIConfig::new(api_key))
    }

    /// Get the current configuration
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }
}

#[async_trait]
impl InferenceService for OpenAIProvider {
    #[instrument(
        skip(self, prompt, options),
        fields(model = %options.model, api_base = %self.config.api_base)
    )]
    async fn complete(&self, prompt: &str, options: &InferenceOptions) -> Result<String> {
        debug!("Sending request to {}", self.config.api_base);

        let request = build_chat_request(prompt, options);
        let mut builder = self.client.post(self.config.completions_url()).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LLMError::from_status(status.as_u16(), body, &options.model));
        }

        parse_chat_response(&body)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// ============================================================================
// OpenAI-specific request/response types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

/// System prompt goes into the messages array ahead of the user prompt
fn build_chat_request<'a>(prompt: &'a str, options: &'a InferenceOptions) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = options.system.as_deref() {
        messages.push(ChatMessage {
            role: "system",
            content: system,
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: prompt,
    });

    ChatRequest {
        model: &options.model,
        messages,
        max_tokens: options.max_tokens,
        temperature: options.temperature,
    }
}

fn parse_chat_response(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
        LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
    })?;

    if let Some(usage) = &parsed.usage {
        debug!(
            "Received response - tokens: {}/{}",
            usage.prompt_tokens, usage.completion_tokens
        );
    }

    // Only the first choice is used
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LLMError::UnexpectedResponse("No choices in response".to_string()))?;

    choice.message.content.ok_or_else(|| {
        LLMError::UnexpectedResponse(format!(
            "Choice has no text content (finish_reason: {})",
            choice.finish_reason.as_deref().unwrap_or("unknown")
        ))
    })
}
