use crate::keys;
use crate::prompts::{PromptLibrary, RESEARCH_ASSISTANT};
use async_trait::async_trait;
use phase_core::{Blackboard, Phase, PhaseContext, PhaseResult, RetryPolicy};
use phase_llm::{InferenceOptions, InferenceService};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// The model's answer for one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterForecast {
    /// Zero-based cluster index
    pub cluster: usize,
    pub average: f64,
    pub prediction: String,
}

/// Asks the research assistant for the most probable period of each cluster
pub struct ForecastPhase {
    inference: Arc<dyn InferenceService>,
    prompts: Arc<PromptLibrary>,
    options: InferenceOptions,
    retry: RetryPolicy,
    blackboard: Arc<Blackboard>,
}

impl ForecastPhase {
    pub fn new(
        inference: Arc<dyn InferenceService>,
        prompts: Arc<PromptLibrary>,
        options: InferenceOptions,
        retry: RetryPolicy,
        blackboard: Arc<Blackboard>,
    ) -> Self {
        Self {
            inference,
            prompts,
            options: options.with_system(RESEARCH_ASSISTANT.system),
            retry,
            blackboard,
        }
    }
}

#[async_trait]
impl Phase for ForecastPhase {
    fn id(&self) -> &str {
        super::FORECAST
    }

    async fn execute(&self, ctx: &PhaseContext) -> PhaseResult<()> {
        let clusters = self.blackboard.get_typed(&keys::CLUSTERS)?;
        let mut forecasts = Vec::with_capacity(clusters.len());

        // One call per cluster, in cluster order
        for cluster in &clusters {
            let prompt = self.prompts.forecast(&RESEARCH_ASSISTANT, cluster)?;
            let answer = ctx
                .call_with_retry(&self.retry, "forecast_cluster", || {
                    self.inference.complete(&prompt, &self.options)
                })
                .await?;

            info!(
                "Cluster {} probability analysis from {}: {}",
                cluster.number(),
                self.inference.name(),
                answer.value.trim()
            );
            forecasts.push(ClusterForecast {
                cluster: cluster.index,
                average: cluster.average,
                prediction: answer.value.trim().to_string(),
            });
        }

        self.blackboard.put_typed(&keys::FORECASTS, &forecasts)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockInference, two_clusters};
    use phase_core::PhaseError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn phase(inference: Arc<dyn InferenceService>, blackboard: &Arc<Blackboard>) -> ForecastPhase {
        ForecastPhase::new(
            inference,
            Arc::new(PromptLibrary::new().unwrap()),
            InferenceOptions::new("tinyllama"),
            RetryPolicy::fast(),
            Arc::clone(blackboard),
        )
    }

    /// Answers the first call at once and never finishes later ones
    #[derive(Default)]
    struct StallingInference {
        calls: AtomicU32,
    }

    #[async_trait]
    impl InferenceService for StallingInference {
        async fn complete(
            &self,
            _prompt: &str,
            _options: &InferenceOptions,
        ) -> phase_llm::Result<String> {
            if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok("Mornings".to_string())
        }

        fn name(&self) -> &str {
            "stalling"
        }
    }

    #[tokio::test]
    async fn test_one_forecast_per_cluster() {
        let blackboard = Blackboard::shared();
        blackboard.put_typed(&keys::CLUSTERS, &two_clusters()).unwrap();

        let mut inference = MockInference::new();
        inference.expect_name().return_const("mock_llm");
        inference
            .expect_complete()
            .times(2)
            .returning(|prompt, options| {
                assert_eq!(options.system.as_deref(), Some(RESEARCH_ASSISTANT.system));
                if prompt.contains("Cluster 1:") {
                    Ok("  Mornings, 09:30-11:30\n".to_string())
                } else {
                    Ok("Afternoons".to_string())
                }
            });

        phase(Arc::new(inference), &blackboard)
            .execute(&PhaseContext::new("forecast"))
            .await
            .unwrap();

        let forecasts = blackboard.get_typed(&keys::FORECASTS).unwrap();
        assert_eq!(forecasts.len(), 2);
        assert_eq!(forecasts[0].cluster, 0);
        assert_eq!(forecasts[0].prediction, "Mornings, 09:30-11:30");
        assert_eq!(forecasts[1].prediction, "Afternoons");
    }

    #[tokio::test]
    async fn test_missing_clusters_is_structural() {
        let mut inference = MockInference::new();
        inference.expect_complete().never();

        let blackboard = Blackboard::shared();
        let err = phase(Arc::new(inference), &blackboard)
            .execute(&PhaseContext::new("forecast"))
            .await
            .unwrap_err();

        assert!(matches!(err, PhaseError::Structural(msg) if msg.contains("clusters")));
        assert!(blackboard.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_cluster_loop() {
        let blackboard = Blackboard::shared();
        blackboard.put_typed(&keys::CLUSTERS, &two_clusters()).unwrap();
        let inference = Arc::new(StallingInference::default());

        let started = Instant::now();
        let ctx = PhaseContext::new("forecast").with_deadline(started + Duration::from_secs(5));
        let err = phase(inference.clone(), &blackboard)
            .execute(&ctx)
            .await
            .unwrap_err();

        assert_eq!(err, PhaseError::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(6));
        assert_eq!(inference.calls.load(Ordering::SeqCst), 2);
        assert!(!blackboard.contains_key(keys::FORECASTS.name()));
    }
}
