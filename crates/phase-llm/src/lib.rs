//! Language-model inference for phase pipelines
//!
//! This crate provides a provider-agnostic [`InferenceService`] trait and
//! concrete providers behind feature flags:
//!
//! - `ollama`: local `/api/generate` endpoint
//! - `openai`: any OpenAI-compatible `/chat/completions` endpoint
//!
//! Providers make a single request per call. Retrying is the caller's job
//! (phases wrap every call in a `RetryPolicy`).

pub mod error;
pub mod options;
pub mod service;

// Re-export main types
pub use error::{LLMError, Result};
pub use options::InferenceOptions;
pub use service::{InferenceService, ProviderKind};

// Provider implementations (feature-gated)
#[cfg(any(feature = "ollama", feature = "openai"))]
pub mod providers;
