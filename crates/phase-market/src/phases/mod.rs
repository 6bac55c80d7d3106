//! Concrete pipeline phases
//!
//! `fetch` retrieves the series, `cluster` groups it, `forecast` and
//! `profile` ask the model about the clusters concurrently, and `synthesis`
//! merges both answers.

mod cluster;
mod fetch;
mod forecast;
mod profile;
mod synthesis;

pub use cluster::ClusterPhase;
pub use fetch::FetchPhase;
pub use forecast::{ClusterForecast, ForecastPhase};
pub use profile::{ClusterProfile, ProfilePhase};
pub use synthesis::{SynthesisEntry, SynthesisPhase, SynthesisReport};

pub const FETCH: &str = "fetch";
pub const CLUSTER: &str = "cluster";
pub const FORECAST: &str = "forecast";
pub const PROFILE: &str = "profile";
pub const SYNTHESIS: &str = "synthesis";

/// Every phase identifier, in pipeline order
pub const ALL: [&str; 5] = [FETCH, CLUSTER, FORECAST, PROFILE, SYNTHESIS];
