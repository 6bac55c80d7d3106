//! Inference service trait definition

use crate::{InferenceOptions, LLMError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trait for text-completion backends
///
/// Implementations make exactly one request per call and report transport,
/// status and decoding failures as [`LLMError`].
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Complete a prompt
    ///
    /// # Arguments
    ///
    /// * `prompt` - The user prompt
    /// * `options` - Model and sampling options
    ///
    /// # Returns
    ///
    /// The generated text
    async fn complete(&self, prompt: &str, options: &InferenceOptions) -> Result<String>;

    /// Get the provider name (e.g., "ollama", "openai")
    fn name(&self) -> &str;
}

/// Supported inference backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    OpenAi,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => f.write_str("ollama"),
            Self::OpenAi => f.write_str("openai"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => Err(LLMError::ConfigurationError(format!(
                "Unknown inference provider: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert_eq!(" OpenAI ".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert!("anthropic".parse::<ProviderKind>().is_err());
        assert_eq!(ProviderKind::OpenAi.to_string(), "openai");
    }

    #[test]
    fn test_provider_kind_serde() {
        let kind: ProviderKind = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(kind, ProviderKind::OpenAi);
    }
}
