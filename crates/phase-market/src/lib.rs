//! Intraday market clustering pipeline
//!
//! Fetches a symbol's intraday highs, groups them by price level and asks a
//! language model when each level is most likely to trade. Work is split into
//! five phases run by the `phase-workflow` orchestrator:
//!
//! - `fetch`: pull the intraday series from Alpha Vantage
//! - `cluster`: group highs with one-dimensional k-means
//! - `forecast`: one model call per cluster (research assistant persona)
//! - `profile`: one model call over all clusters (data analyst persona)
//! - `synthesis`: merge clusters, forecasts and profile into a report
//!
//! Phases exchange data through a shared blackboard; see [`keys`] for the
//! schema.
//!
//! # Example
//!
//! ```rust,no_run
//! use phase_market::{MarketPipeline, PipelineConfig, keys, report_value};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::load(None)?;
//!     let report = MarketPipeline::new(config)?.run().await?;
//!
//!     if let Some(synthesis) = report_value(&report, &keys::SYNTHESIS) {
//!         for entry in synthesis.entries {
//!             println!("Cluster {}: {:?}", entry.cluster, entry.prediction);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cluster;
pub mod config;
pub mod error;
pub mod factory;
pub mod keys;
pub mod phases;
pub mod pipeline;
pub mod prompts;
pub mod source;

#[cfg(test)]
mod testing;

pub use api::AlphaVantageClient;
pub use cluster::{ClusterGroup, Clusterer, KMeans};
pub use config::{InferenceConfig, MarketConfig, PipelineConfig, PipelineConfigBuilder};
pub use error::{MarketError, Result};
pub use factory::PhaseFactory;
pub use phases::{ClusterForecast, ClusterProfile, SynthesisEntry, SynthesisReport};
pub use pipeline::{MarketPipeline, report_value, standard_plan};
pub use source::{DataSource, SeriesPoint, SeriesSpec};
