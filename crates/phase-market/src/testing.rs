//! Test doubles shared by the crate's unit tests

use crate::cluster::{ClusterGroup, Clusterer, group_clusters};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::source::{DataSource, SeriesPoint, SeriesSpec};
use async_trait::async_trait;
use chrono::NaiveDate;
use mockall::mock;
use phase_llm::{InferenceOptions, InferenceService};
use std::time::Duration;

mock! {
    pub Source {}

    #[async_trait]
    impl DataSource for Source {
        async fn fetch(&self, spec: &SeriesSpec) -> Result<Vec<SeriesPoint>>;
        fn name(&self) -> &'static str;
    }
}

mock! {
    pub Inference {}

    #[async_trait]
    impl InferenceService for Inference {
        async fn complete(
            &self,
            prompt: &str,
            options: &InferenceOptions,
        ) -> phase_llm::Result<String>;
        fn name(&self) -> &'static str;
    }
}

mock! {
    pub Grouper {}

    impl Clusterer for Grouper {
        fn cluster(&self, values: &[f64], k: usize) -> Result<Vec<usize>>;
    }
}

/// A valid configuration with fast retries
pub fn test_config() -> PipelineConfig {
    PipelineConfig::builder()
        .symbol("INUV")
        .api_key("test-key")
        .clusters(2)
        .retry(3, Duration::from_millis(10))
        .build()
        .expect("test config is valid")
}

/// Two well separated price levels: mornings near 1.0, afternoons near 2.0
pub fn two_level_series() -> Vec<SeriesPoint> {
    let day = NaiveDate::from_ymd_opt(2024, 5, 3).expect("valid date");
    [(9, 1.00), (10, 1.02), (11, 0.98), (14, 2.00), (15, 2.04), (16, 1.96)]
        .into_iter()
        .map(|(hour, value)| SeriesPoint {
            timestamp: day.and_hms_opt(hour, 30, 0).expect("valid time"),
            value,
            volume: 1_000,
        })
        .collect()
}

/// `two_level_series` split into its morning and afternoon clusters
pub fn two_clusters() -> Vec<ClusterGroup> {
    group_clusters(&two_level_series(), &[0, 0, 0, 1, 1, 1]).expect("lengths match")
}
