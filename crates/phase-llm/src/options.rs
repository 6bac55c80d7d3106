//! Per-call inference options

use serde::{Deserialize, Serialize};

/// Options for a single completion call
///
/// # Example
///
/// ```
/// use phase_llm::InferenceOptions;
///
/// let options = InferenceOptions::new("tinyllama")
///     .with_system("You are a data analyst.")
///     .with_temperature(0.2)
///     .with_max_tokens(512);
///
/// assert_eq!(options.model, "tinyllama");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceOptions {
    /// Model identifier understood by the provider
    pub model: String,

    /// Optional system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Upper bound on generated tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

impl InferenceOptions {
    /// Options for the given model with provider defaults for everything else
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the system prompt
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the token limit
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}
