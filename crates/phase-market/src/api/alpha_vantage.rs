//! Alpha Vantage API client

use crate::error::{MarketError, Result};
use crate::source::{DataSource, SeriesPoint, SeriesSpec, apply_lookback};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";

/// Free tier allows 5 requests per minute
pub const DEFAULT_RATE_LIMIT: u32 = 5;

pub const INTERVALS: [&str; 5] = ["1min", "5min", "15min", "30min", "60min"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const PROVIDER: &str = "Alpha Vantage";

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Alpha Vantage API client
#[derive(Clone)]
pub struct AlphaVantageClient {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl fmt::Debug for AlphaVantageClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlphaVantageClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl AlphaVantageClient {
    /// Create a new Alpha Vantage client with API key and rate limit
    ///
    /// # Arguments
    /// * `api_key` - Alpha Vantage API key
    /// * `rate_limit` - Maximum requests per minute (0 falls back to 1)
    pub fn new(api_key: impl Into<String>, rate_limit: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limiter,
        }
    }

    /// Point the client at another endpoint (proxy, mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get intraday time series data, oldest point first
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn get_intraday(
        &self,
        symbol: &str,
        interval: &str, // 1min, 5min, 15min, 30min, 60min
    ) -> Result<Vec<SeriesPoint>> {
        // Wait for rate limiter
        self.rate_limiter.until_ready().await;

        let params = [
            ("function", "TIME_SERIES_INTRADAY"),
            ("symbol", symbol),
            ("interval", interval),
            ("outputsize", "full"),
            ("apikey", self.api_key.as_str()),
        ];

        let response = self.client.get(&self.base_url).query(&params).send().await?;

        if !response.status().is_success() {
            return Err(MarketError::AlphaVantageError(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let data: Value = response.json().await?;
        let points = parse_intraday(&data, interval)?;
        debug!("Parsed {} intraday points for {}", points.len(), symbol);
        Ok(points)
    }
}

#[async_trait]
impl DataSource for AlphaVantageClient {
    async fn fetch(&self, spec: &SeriesSpec) -> Result<Vec<SeriesPoint>> {
        let points = self.get_intraday(&spec.symbol, &spec.interval).await?;
        Ok(apply_lookback(points, spec.lookback_days))
    }

    fn name(&self) -> &'static str {
        "alpha_vantage"
    }
}

/// Parse a `TIME_SERIES_INTRADAY` response body
///
/// Error, rate-limit and informational bodies come back with HTTP 200, so
/// they are detected here.
pub fn parse_intraday(data: &Value, interval: &str) -> Result<Vec<SeriesPoint>> {
    // Check for API error messages
    if let Some(error) = data.get("Error Message") {
        return Err(MarketError::AlphaVantageError(text(error)));
    }

    if data.get("Note").is_some() || data.get("Information").is_some() {
        return Err(MarketError::RateLimitExceeded {
            provider: PROVIDER.to_string(),
        });
    }

    let series_key = format!("Time Series ({interval})");
    let series = data
        .get(&series_key)
        .and_then(Value::as_object)
        .ok_or_else(|| MarketError::AlphaVantageError(format!("No '{series_key}' in response")))?;

    let mut points = series
        .iter()
        .map(|(timestamp, values)| parse_point(timestamp, values))
        .collect::<Result<Vec<_>>>()?;
    points.sort_by_key(|p| p.timestamp);
    Ok(points)
}

fn parse_point(timestamp: &str, values: &Value) -> Result<SeriesPoint> {
    let timestamp = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).map_err(|e| {
        MarketError::AlphaVantageError(format!("Bad timestamp '{timestamp}': {e}"))
    })?;

    Ok(SeriesPoint {
        timestamp,
        value: field(values, "2. high")?,
        volume: field(values, "5. volume")?,
    })
}

/// Numeric fields arrive as strings
fn field<T>(values: &Value, name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    let raw = values[name]
        .as_str()
        .ok_or_else(|| MarketError::AlphaVantageError(format!("Missing field '{name}'")))?;
    raw.trim()
        .parse()
        .map_err(|e| MarketError::AlphaVantageError(format!("Bad value for '{name}': {raw} ({e})")))
}

fn text(value: &Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), ToString::to_string)
}
