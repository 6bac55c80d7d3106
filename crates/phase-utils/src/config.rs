//! Configuration helpers
//!
//! Typed access to environment variables. Secrets and endpoints are read
//! from the environment (or a config file) at startup rather than living in
//! source.

use std::str::FromStr;
use thiserror::Error;

/// Errors raised while loading configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed
    #[error("Invalid value for {name}: '{value}' ({reason})")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },

    /// A config file could not be read or parsed
    #[error("Failed to load config file {path}: {reason}")]
    File { path: String, reason: String },
}

/// Read a variable, treating unset and blank values as absent
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Read and parse a variable; unset yields `Ok(None)`
pub fn env_parse<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var(name).map(|raw| parse_value(name, &raw)).transpose()
}

/// Parse a raw string value for the named setting
pub fn parse_value<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::Invalid {
        name: name.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
