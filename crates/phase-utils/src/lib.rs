//! Shared utilities for phase pipelines
//!
//! This crate provides common functionality used across the workspace,
//! including logging setup, configuration helpers, and timing output.

pub mod config;
pub mod logging;
pub mod timing;

pub use config::{ConfigError, env_parse, env_var, parse_value};
pub use logging::{LOG_FORMAT_VAR, LogFormat, init_tracing, init_tracing_with};
pub use timing::format_elapsed;
