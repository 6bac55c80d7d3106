use crate::keys;
use crate::prompts::{DATA_ANALYST, PromptLibrary};
use async_trait::async_trait;
use phase_core::{Blackboard, Phase, PhaseContext, PhaseResult, RetryPolicy};
use phase_llm::{InferenceOptions, InferenceService};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// The data analyst's view of the whole clustering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterProfile {
    pub summary: String,
    pub clusters: usize,
    pub points: usize,
}

/// Asks the data analyst to profile all clusters in a single call
pub struct ProfilePhase {
    inference: Arc<dyn InferenceService>,
    prompts: Arc<PromptLibrary>,
    options: InferenceOptions,
    symbol: String,
    interval: String,
    retry: RetryPolicy,
    blackboard: Arc<Blackboard>,
}

impl ProfilePhase {
    pub fn new(
        inference: Arc<dyn InferenceService>,
        prompts: Arc<PromptLibrary>,
        options: InferenceOptions,
        symbol: impl Into<String>,
        interval: impl Into<String>,
        retry: RetryPolicy,
        blackboard: Arc<Blackboard>,
    ) -> Self {
        Self {
            inference,
            prompts,
            options: options.with_system(DATA_ANALYST.system),
            symbol: symbol.into(),
            interval: interval.into(),
            retry,
            blackboard,
        }
    }
}

#[async_trait]
impl Phase for ProfilePhase {
    fn id(&self) -> &str {
        super::PROFILE
    }

    async fn execute(&self, ctx: &PhaseContext) -> PhaseResult<()> {
        let clusters = self.blackboard.get_typed(&keys::CLUSTERS)?;
        let prompt = self
            .prompts
            .profile(&DATA_ANALYST, &self.symbol, &self.interval, &clusters)?;

        let answer = ctx
            .call_with_retry(&self.retry, "profile_clusters", || {
                self.inference.complete(&prompt, &self.options)
            })
            .await?;

        let profile = ClusterProfile {
            summary: answer.value.trim().to_string(),
            clusters: clusters.len(),
            points: clusters.iter().map(|c| c.len()).sum(),
        };
        info!(
            "Profiled {} clusters ({} points) via {}",
            profile.clusters,
            profile.points,
            self.inference.name()
        );

        self.blackboard.put_typed(&keys::PROFILE, &profile)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockInference, two_clusters};
    use phase_core::PhaseError;

    fn phase(inference: MockInference, blackboard: &Arc<Blackboard>) -> ProfilePhase {
        ProfilePhase::new(
            Arc::new(inference),
            Arc::new(PromptLibrary::new().unwrap()),
            InferenceOptions::new("tinyllama"),
            "INUV",
            "5min",
            RetryPolicy::fast(),
            Arc::clone(blackboard),
        )
    }

    #[tokio::test]
    async fn test_writes_profile() {
        let blackboard = Blackboard::shared();
        blackboard.put_typed(&keys::CLUSTERS, &two_clusters()).unwrap();

        let mut inference = MockInference::new();
        inference.expect_name().return_const("mock_llm");
        inference
            .expect_complete()
            .times(1)
            .returning(|prompt, options| {
                assert_eq!(options.system.as_deref(), Some(DATA_ANALYST.system));
                assert!(prompt.contains("5min highs for INUV"));
                Ok("Two levels split by lunch.\n".to_string())
            });

        phase(inference, &blackboard)
            .execute(&PhaseContext::new("profile"))
            .await
            .unwrap();

        assert_eq!(
            blackboard.get_typed(&keys::PROFILE).unwrap(),
            ClusterProfile {
                summary: "Two levels split by lunch.".to_string(),
                clusters: 2,
                points: 6,
            }
        );
    }

    #[tokio::test]
    async fn test_missing_clusters_is_structural() {
        let mut inference = MockInference::new();
        inference.expect_complete().never();

        let blackboard = Blackboard::shared();
        let err = phase(inference, &blackboard)
            .execute(&PhaseContext::new("profile"))
            .await
            .unwrap_err();

        assert!(matches!(err, PhaseError::Structural(msg) if msg.contains("clusters")));
        assert!(!blackboard.contains_key(keys::PROFILE.name()));
    }
}
