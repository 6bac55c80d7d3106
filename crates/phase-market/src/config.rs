//! Configuration for the market pipeline
//!
//! Endpoints and credentials are never compiled in: the Alpha Vantage key,
//! the inference endpoint and its key come from the environment or a JSON
//! config file. Layering is defaults, then file, then environment, then
//! whatever the caller sets explicitly (CLI flags).
//!
//! | Variable | Setting |
//! |---|---|
//! | `ALPHA_VANTAGE_API_KEY` | `market.api_key` |
//! | `ALPHA_VANTAGE_BASE_URL` | `market.base_url` |
//! | `PIPELINE_SYMBOL` | `market.symbol` |
//! | `PIPELINE_INTERVAL` | `market.interval` |
//! | `PIPELINE_LOOKBACK_DAYS` | `market.lookback_days` |
//! | `PIPELINE_CLUSTERS` | `clusters` |
//! | `INFERENCE_PROVIDER` | `inference.provider` (`ollama` or `openai`) |
//! | `INFERENCE_BASE_URL` | `inference.base_url` |
//! | `INFERENCE_MODEL` | `inference.model` |
//! | `INFERENCE_API_KEY` | `inference.api_key` |
//! | `INFERENCE_TIMEOUT_SECS` | `inference.timeout_secs` |
//! | `RETRY_MAX_ATTEMPTS` | `retry.max_attempts` |
//! | `RETRY_BASE_DELAY_MS` | `retry.base_delay_ms` |
//! | `PIPELINE_MAX_CONCURRENCY` | `orchestration.max_concurrency` |
//! | `PIPELINE_GROUP_DEADLINE_SECS` | `orchestration.group_deadline_secs` |
//! | `PIPELINE_RUN_DEADLINE_SECS` | `orchestration.run_deadline_secs` |

use crate::api::alpha_vantage::{DEFAULT_BASE_URL, DEFAULT_RATE_LIMIT, INTERVALS};
use crate::cluster::DEFAULT_CLUSTERS;
use crate::error::{MarketError, Result};
use phase_core::RetryPolicy;
use phase_llm::ProviderKind;
use phase_utils::{ConfigError, env_var, parse_value};
use phase_workflow::OrchestratorConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Market data settings
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Alpha Vantage query endpoint
    pub base_url: String,
    pub api_key: Option<String>,
    pub symbol: String,
    /// Bar interval: 1min, 5min, 15min, 30min or 60min
    pub interval: String,
    /// Days kept before the newest point
    pub lookback_days: u32,
    pub requests_per_minute: u32,
    pub timeout_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            symbol: String::new(),
            interval: "5min".to_string(),
            lookback_days: 15,
            requests_per_minute: DEFAULT_RATE_LIMIT,
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for MarketConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redacted(self.api_key.as_ref()))
            .field("symbol", &self.symbol)
            .field("interval", &self.interval)
            .field("lookback_days", &self.lookback_days)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Language-model settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub provider: ProviderKind,
    /// Provider endpoint; the provider's default when unset
    pub base_url: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            base_url: None,
            model: "tinyllama".to_string(),
            api_key: None,
            timeout_secs: 300,
            temperature: None,
        }
    }
}

impl fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &redacted(self.api_key.as_ref()))
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .finish()
    }
}

fn redacted(secret: Option<&String>) -> Option<&'static str> {
    secret.map(|_| "<redacted>")
}

/// Retry settings for every external call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: u64::try_from(policy.base_delay.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }
}

/// Scheduling settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    pub max_concurrency: usize,
    pub group_deadline_secs: Option<u64>,
    pub run_deadline_secs: Option<u64>,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        let defaults = OrchestratorConfig::default();
        Self {
            max_concurrency: defaults.max_concurrency,
            group_deadline_secs: defaults.group_deadline.map(|d| d.as_secs()),
            run_deadline_secs: defaults.run_deadline.map(|d| d.as_secs()),
        }
    }
}

impl OrchestrationConfig {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_concurrency: self.max_concurrency,
            group_deadline: self.group_deadline_secs.map(Duration::from_secs),
            run_deadline: self.run_deadline_secs.map(Duration::from_secs),
            ..OrchestratorConfig::default()
        }
    }
}

/// Configuration for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub market: MarketConfig,
    pub inference: InferenceConfig,
    /// Number of k-means clusters
    pub clusters: usize,
    pub retry: RetryConfig,
    pub orchestration: OrchestrationConfig,
}

impl PipelineConfig {
    /// Create a new configuration builder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Defaults overlaid with the environment
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env()
    }

    /// Load a JSON config file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_error = |reason: String| ConfigError::File {
            path: path.display().to_string(),
            reason,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
        let config = serde_json::from_str(&raw).map_err(|e| file_error(e.to_string()))?;
        Ok(config)
    }

    /// File (when given) or defaults, overlaid with the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.apply_env()
    }

    /// Overlay settings from environment variables
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(env_var)
    }

    /// Overlay settings from any variable lookup
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |name: &str| lookup(name);
        let parsed = |name: &str| -> std::result::Result<Option<u64>, ConfigError> {
            lookup(name).map(|raw| parse_value(name, &raw)).transpose()
        };

        if let Some(v) = text("ALPHA_VANTAGE_API_KEY") {
            self.market.api_key = Some(v);
        }
        if let Some(v) = text("ALPHA_VANTAGE_BASE_URL") {
            self.market.base_url = v;
        }
        if let Some(v) = text("PIPELINE_SYMBOL") {
            self.market.symbol = v;
        }
        if let Some(v) = text("PIPELINE_INTERVAL") {
            self.market.interval = v;
        }
        if let Some(v) = parsed("PIPELINE_LOOKBACK_DAYS")? {
            self.market.lookback_days = narrow("PIPELINE_LOOKBACK_DAYS", v)?;
        }
        if let Some(v) = parsed("PIPELINE_CLUSTERS")? {
            self.clusters = narrow("PIPELINE_CLUSTERS", v)?;
        }
        if let Some(v) = text("INFERENCE_PROVIDER") {
            self.inference.provider = parse_value("INFERENCE_PROVIDER", &v)?;
        }
        if let Some(v) = text("INFERENCE_BASE_URL") {
            self.inference.base_url = Some(v);
        }
        if let Some(v) = text("INFERENCE_MODEL") {
            self.inference.model = v;
        }
        if let Some(v) = text("INFERENCE_API_KEY") {
            self.inference.api_key = Some(v);
        }
        if let Some(v) = parsed("INFERENCE_TIMEOUT_SECS")? {
            self.inference.timeout_secs = v;
        }
        if let Some(v) = parsed("RETRY_MAX_ATTEMPTS")? {
            self.retry.max_attempts = narrow("RETRY_MAX_ATTEMPTS", v)?;
        }
        if let Some(v) = parsed("RETRY_BASE_DELAY_MS")? {
            self.retry.base_delay_ms = v;
        }
        if let Some(v) = parsed("PIPELINE_MAX_CONCURRENCY")? {
            self.orchestration.max_concurrency = narrow("PIPELINE_MAX_CONCURRENCY", v)?;
        }
        if let Some(v) = parsed("PIPELINE_GROUP_DEADLINE_SECS")? {
            self.orchestration.group_deadline_secs = Some(v);
        }
        if let Some(v) = parsed("PIPELINE_RUN_DEADLINE_SECS")? {
            self.orchestration.run_deadline_secs = Some(v);
        }

        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.market.symbol.trim().is_empty() {
            return Err(MarketError::ConfigError("symbol is required".to_string()));
        }

        if self.market.api_key.is_none() {
            return Err(MarketError::ConfigError(
                "Alpha Vantage API key required (set ALPHA_VANTAGE_API_KEY)".to_string(),
            ));
        }

        if !INTERVALS.contains(&self.market.interval.as_str()) {
            return Err(MarketError::ConfigError(format!(
                "interval must be one of {}, got '{}'",
                INTERVALS.join(", "),
                self.market.interval
            )));
        }

        if self.clusters == 0 {
            return Err(MarketError::ConfigError(
                "clusters must be greater than 0".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(MarketError::ConfigError(
                "max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.orchestration.max_concurrency == 0 {
            return Err(MarketError::ConfigError(
                "max_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.inference.provider == ProviderKind::OpenAi
            && self.inference.base_url.is_none()
            && self.inference.api_key.is_none()
        {
            return Err(MarketError::ConfigError(
                "OpenAI provider needs an API key or a custom base URL".to_string(),
            ));
        }

        Ok(())
    }
}

fn narrow<T: TryFrom<u64>>(name: &str, value: u64) -> std::result::Result<T, ConfigError> {
    T::try_from(value).map_err(|_| ConfigError::Invalid {
        name: name.to_string(),
        value: value.to_string(),
        reason: "out of range".to_string(),
    })
}

/// Builder for PipelineConfig
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Start from an existing configuration (e.g. one loaded from a file)
    pub fn from_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.config.market.symbol = symbol.into();
        self
    }

    pub fn interval(mut self, interval: impl Into<String>) -> Self {
        self.config.market.interval = interval.into();
        self
    }

    pub fn lookback_days(mut self, days: u32) -> Self {
        self.config.market.lookback_days = days;
        self
    }

    /// Set Alpha Vantage API key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.market.api_key = Some(key.into());
        self
    }

    pub fn market_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.market.base_url = url.into();
        self
    }

    pub fn clusters(mut self, clusters: usize) -> Self {
        self.config.clusters = clusters;
        self
    }

    pub fn provider(mut self, provider: ProviderKind) -> Self {
        self.config.inference.provider = provider;
        self
    }

    pub fn inference_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.inference.base_url = Some(url.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.inference.model = model.into();
        self
    }

    pub fn inference_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.inference.api_key = Some(key.into());
        self
    }

    /// Set the retry policy used for every external call
    pub fn retry(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.config.retry = RetryConfig {
            max_attempts,
            base_delay_ms: u64::try_from(base_delay.as_millis()).unwrap_or(u64::MAX),
        };
        self
    }

    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.config.orchestration.max_concurrency = max;
        self
    }

    pub fn group_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.config.orchestration.group_deadline_secs = deadline.map(|d| d.as_secs());
        self
    }

    pub fn run_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.config.orchestration.run_deadline_secs = deadline.map(|d| d.as_secs());
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            market: MarketConfig::default(),
            inference: InferenceConfig::default(),
            clusters: DEFAULT_CLUSTERS,
            retry: RetryConfig::default(),
            orchestration: OrchestrationConfig::default(),
        }
    }
}
