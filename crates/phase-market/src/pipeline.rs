//! The market analysis pipeline
//!
//! ```text
//! fetch -> cluster -> forecast --+
//!                  \-> profile --+-> synthesis
//! ```

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::factory::PhaseFactory;
use crate::phases::{CLUSTER, FETCH, FORECAST, PROFILE, SYNTHESIS};
use phase_core::{Blackboard, BlackboardKey};
use phase_workflow::{ExecutionPlan, Orchestrator, RunReport};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::info;

/// The standard five-phase plan
pub fn standard_plan() -> phase_core::Result<ExecutionPlan> {
    ExecutionPlan::builder()
        .root(FETCH)
        .phase(CLUSTER, [FETCH])
        .phase(FORECAST, [CLUSTER])
        .phase(PROFILE, [CLUSTER])
        .phase(SYNTHESIS, [FORECAST, PROFILE])
        .build()
}

/// A configured pipeline, ready to run
pub struct MarketPipeline {
    factory: PhaseFactory,
    plan: ExecutionPlan,
}

impl MarketPipeline {
    /// Build the pipeline against the real services named in `config`
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_factory(PhaseFactory::new(config, Blackboard::shared())?)
    }

    /// Build the pipeline around an existing factory
    pub fn with_factory(factory: PhaseFactory) -> Result<Self> {
        Ok(Self {
            factory,
            plan: standard_plan()?,
        })
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn factory(&self) -> &PhaseFactory {
        &self.factory
    }

    /// A fresh orchestrator over newly created phase instances
    ///
    /// Every orchestrator gets its own empty blackboard, so nothing written
    /// by an earlier run is visible to (or reported by) a later one.
    pub fn orchestrator(&self) -> Result<Orchestrator> {
        let factory = self.factory.rebind(Blackboard::shared());
        let phases = factory.create_all(self.plan.ids())?;
        let orchestrator = Orchestrator::builder()
            .plan(self.plan.clone())
            .phases(phases)
            .blackboard(Arc::clone(factory.blackboard()))
            .config(factory.config().orchestration.orchestrator_config())
            .build()?;
        Ok(orchestrator)
    }

    /// Run every phase and return the report
    pub async fn run(&self) -> Result<RunReport> {
        let market = &self.factory.config().market;
        info!(
            "Running pipeline for {} ({} bars, {} day lookback)",
            market.symbol, market.interval, market.lookback_days
        );

        let mut orchestrator = self.orchestrator()?;
        Ok(orchestrator.run().await?)
    }
}

/// Read a typed value out of a report's blackboard snapshot
pub fn report_value<T: DeserializeOwned>(report: &RunReport, key: &BlackboardKey<T>) -> Option<T> {
    report
        .blackboard
        .get(key.name())
        .and_then(|value| serde_json::from_value(value.clone()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::KMeans;
    use crate::error::MarketError;
    use crate::keys;
    use crate::testing::{MockInference, MockSource, test_config, two_level_series};
    use phase_core::{FailureReason, PhaseStatus};
    use phase_llm::LLMError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn source_ok() -> MockSource {
        let mut source = MockSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(two_level_series()));
        source.expect_name().return_const("mock_source");
        source
    }

    fn pipeline(source: MockSource, inference: MockInference) -> MarketPipeline {
        let factory = PhaseFactory::with_services(
            test_config(),
            Blackboard::shared(),
            Arc::new(source),
            Arc::new(KMeans::default()),
            Arc::new(inference),
        )
        .unwrap();
        MarketPipeline::with_factory(factory).unwrap()
    }

    #[test]
    fn test_standard_plan_shape() {
        let plan = standard_plan().unwrap();
        assert_eq!(
            plan.waves(),
            vec![
                vec![FETCH.to_string()],
                vec![CLUSTER.to_string()],
                vec![FORECAST.to_string(), PROFILE.to_string()],
                vec![SYNTHESIS.to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn test_full_run() {
        let mut inference = MockInference::new();
        inference.expect_name().return_const("mock_llm");
        inference.expect_complete().returning(|prompt, options| {
            assert!(options.system.is_some());
            if prompt.starts_with("[Agent2|Data Analyst]") {
                Ok("Two clean levels split by lunch.".to_string())
            } else if prompt.contains("Cluster 1:") {
                Ok("Mornings, 09:00-12:00".to_string())
            } else {
                Ok("Afternoons, 14:00-17:00".to_string())
            }
        });

        let report = assert_ok!(pipeline(source_ok(), inference).run().await);
        assert!(report.is_success(), "{:?}", report.statuses());
        assert_eq!(report.groups.len(), 4);

        let clusters = report_value(&report, &keys::CLUSTERS).unwrap();
        assert_eq!(clusters.len(), 2);
        assert!((clusters[0].average - 1.0).abs() < 1e-9);

        let synthesis = report_value(&report, &keys::SYNTHESIS).unwrap();
        assert_eq!(synthesis.symbol, "INUV");
        assert_eq!(synthesis.profile, "Two clean levels split by lunch.");
        assert_eq!(synthesis.entries.len(), 2);
        assert_eq!(
            synthesis.entries[1].prediction.as_deref(),
            Some("Afternoons, 14:00-17:00")
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_everything_downstream() {
        let mut source = MockSource::new();
        source.expect_fetch().times(3).returning(|_| {
            Err(MarketError::RateLimitExceeded {
                provider: "Alpha Vantage".to_string(),
            })
        });
        let mut inference = MockInference::new();
        inference.expect_complete().never();

        let report = assert_ok!(pipeline(source, inference).run().await);

        assert!(matches!(
            report.failure(FETCH),
            Some(FailureReason::Error(msg)) if msg.contains("3 attempt")
        ));
        for id in [CLUSTER, FORECAST, PROFILE, SYNTHESIS] {
            assert_eq!(report.failure(id), Some(&FailureReason::DependencyNotSatisfied));
        }
        assert!(report.blackboard.is_empty());
    }

    #[tokio::test]
    async fn test_empty_series_is_not_retried() {
        let mut source = MockSource::new();
        source.expect_fetch().times(1).returning(|_| Ok(Vec::new()));

        let report = pipeline(source, MockInference::new()).run().await.unwrap();
        assert!(matches!(
            report.failure(FETCH),
            Some(FailureReason::Error(msg)) if msg.contains("Data not available for INUV")
        ));
    }

    #[tokio::test]
    async fn test_flaky_inference_recovers() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let mut inference = MockInference::new();
        inference.expect_name().return_const("mock_llm");
        inference.expect_complete().returning(move |_, _| {
            // Every third call succeeds
            if counter.fetch_add(1, Ordering::SeqCst) % 3 == 2 {
                Ok("ok".to_string())
            } else {
                Err(LLMError::Timeout("model loading".to_string()))
            }
        });

        let mut config = test_config();
        config.orchestration.max_concurrency = 1;
        let factory = PhaseFactory::with_services(
            config,
            Blackboard::shared(),
            Arc::new(source_ok()),
            Arc::new(KMeans::default()),
            Arc::new(inference),
        )
        .unwrap();

        let report = MarketPipeline::with_factory(factory)
            .unwrap()
            .run()
            .await
            .unwrap();

        assert!(report.is_success(), "{:?}", report.statuses());
        // Two forecast calls and one profile call, three attempts each
        assert_eq!(calls.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn test_profile_failure_gates_synthesis_only() {
        let mut inference = MockInference::new();
        inference.expect_name().return_const("mock_llm");
        inference.expect_complete().returning(|prompt, _| {
            if prompt.starts_with("[Agent2|Data Analyst]") {
                Err(LLMError::AuthenticationFailed)
            } else {
                Ok("Late morning".to_string())
            }
        });

        let report = pipeline(source_ok(), inference).run().await.unwrap();

        assert_eq!(report.status(FORECAST), Some(PhaseStatus::Succeeded));
        assert_eq!(report.status(PROFILE), Some(PhaseStatus::Failed));
        assert_eq!(
            report.failure(SYNTHESIS),
            Some(&FailureReason::DependencyNotSatisfied)
        );
        // Forecasts written before the gate are kept
        assert_eq!(report_value(&report, &keys::FORECASTS).map(|f| f.len()), Some(2));
        assert!(report_value(&report, &keys::SYNTHESIS).is_none());
    }

    #[tokio::test]
    async fn test_rerun_starts_from_empty_blackboard() {
        let mut source = MockSource::new();
        let mut fetches = 0;
        source.expect_fetch().times(2).returning(move |_| {
            fetches += 1;
            if fetches == 1 {
                Ok(two_level_series())
            } else {
                Err(MarketError::RateLimitExceeded {
                    provider: "Alpha Vantage".to_string(),
                })
            }
        });
        source.expect_name().return_const("mock_source");

        let mut inference = MockInference::new();
        inference.expect_name().return_const("mock_llm");
        inference
            .expect_complete()
            .returning(|_, _| Ok("ok".to_string()));

        let mut config = test_config();
        config.retry.max_attempts = 1;
        let factory = PhaseFactory::with_services(
            config,
            Blackboard::shared(),
            Arc::new(source),
            Arc::new(KMeans::default()),
            Arc::new(inference),
        )
        .unwrap();
        let pipeline = MarketPipeline::with_factory(factory).unwrap();

        let first = assert_ok!(pipeline.run().await);
        assert!(first.is_success());
        assert!(report_value(&first, &keys::SYNTHESIS).is_some());

        let second = assert_ok!(pipeline.run().await);
        assert_eq!(second.status(FETCH), Some(PhaseStatus::Failed));
        assert!(second.blackboard.is_empty(), "{:?}", second.blackboard.keys());
        assert!(report_value(&second, &keys::SYNTHESIS).is_none());
    }

    #[tokio::test]
    async fn test_orchestrator_is_single_use() {
        let mut inference = MockInference::new();
        inference.expect_name().return_const("mock_llm");
        inference
            .expect_complete()
            .returning(|_, _| Ok("ok".to_string()));

        let pipeline = pipeline(source_ok(), inference);
        let mut orchestrator = assert_ok!(pipeline.orchestrator());
        assert_ok!(orchestrator.run().await);

        let err = assert_err!(orchestrator.run().await);
        assert_eq!(err, phase_core::Error::AlreadyRun);
    }
}
