//! Phase construction from configuration

use crate::api::AlphaVantageClient;
use crate::cluster::{Clusterer, KMeans};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::phases::{
    self, ClusterPhase, FetchPhase, ForecastPhase, ProfilePhase, SynthesisPhase,
};
use crate::prompts::PromptLibrary;
use crate::source::{DataSource, SeriesSpec};
use phase_core::{Blackboard, Error, Phase};
use phase_llm::providers::{OllamaConfig, OllamaProvider, OpenAIConfig, OpenAIProvider};
use phase_llm::{InferenceOptions, InferenceService, ProviderKind};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Builds configured phase instances by identifier
///
/// All phases created by one factory share its blackboard and collaborators.
pub struct PhaseFactory {
    config: PipelineConfig,
    blackboard: Arc<Blackboard>,
    source: Arc<dyn DataSource>,
    clusterer: Arc<dyn Clusterer>,
    inference: Arc<dyn InferenceService>,
    prompts: Arc<PromptLibrary>,
}

impl PhaseFactory {
    /// Create a factory wired to Alpha Vantage and the configured model
    pub fn new(config: PipelineConfig, blackboard: Arc<Blackboard>) -> Result<Self> {
        config.validate()?;
        let source = build_source(&config)?;
        let inference = build_inference(&config)?;
        Self::with_services(config, blackboard, source, Arc::new(KMeans::default()), inference)
    }

    /// Create a factory around caller-supplied collaborators
    pub fn with_services(
        config: PipelineConfig,
        blackboard: Arc<Blackboard>,
        source: Arc<dyn DataSource>,
        clusterer: Arc<dyn Clusterer>,
        inference: Arc<dyn InferenceService>,
    ) -> Result<Self> {
        Ok(Self {
            config,
            blackboard,
            source,
            clusterer,
            inference,
            prompts: Arc::new(PromptLibrary::new()?),
        })
    }

    /// Same configuration and collaborators, writing to another blackboard
    pub fn rebind(&self, blackboard: Arc<Blackboard>) -> Self {
        Self {
            config: self.config.clone(),
            blackboard,
            source: Arc::clone(&self.source),
            clusterer: Arc::clone(&self.clusterer),
            inference: Arc::clone(&self.inference),
            prompts: Arc::clone(&self.prompts),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn blackboard(&self) -> &Arc<Blackboard> {
        &self.blackboard
    }

    /// Create the phase with the given identifier
    ///
    /// Unknown identifiers are rejected with [`Error::UnknownPhase`].
    pub fn create(&self, id: &str) -> phase_core::Result<Arc<dyn Phase>> {
        let market = &self.config.market;
        let retry = self.config.retry.policy();
        let blackboard = Arc::clone(&self.blackboard);

        let phase: Arc<dyn Phase> = match id {
            phases::FETCH => Arc::new(FetchPhase::new(
                Arc::clone(&self.source),
                SeriesSpec {
                    symbol: market.symbol.clone(),
                    interval: market.interval.clone(),
                    lookback_days: market.lookback_days,
                },
                retry,
                blackboard,
            )),
            phases::CLUSTER => Arc::new(ClusterPhase::new(
                Arc::clone(&self.clusterer),
                self.config.clusters,
                blackboard,
            )),
            phases::FORECAST => Arc::new(ForecastPhase::new(
                Arc::clone(&self.inference),
                Arc::clone(&self.prompts),
                self.inference_options(),
                retry,
                blackboard,
            )),
            phases::PROFILE => Arc::new(ProfilePhase::new(
                Arc::clone(&self.inference),
                Arc::clone(&self.prompts),
                self.inference_options(),
                market.symbol.clone(),
                market.interval.clone(),
                retry,
                blackboard,
            )),
            phases::SYNTHESIS => Arc::new(SynthesisPhase::new(
                market.symbol.clone(),
                market.interval.clone(),
                blackboard,
            )),
            other => return Err(Error::UnknownPhase(other.to_string())),
        };

        debug!("Created phase '{}'", id);
        Ok(phase)
    }

    /// Create every phase in `ids`, stopping at the first unknown identifier
    pub fn create_all<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> phase_core::Result<Vec<Arc<dyn Phase>>> {
        ids.into_iter().map(|id| self.create(id)).collect()
    }

    fn inference_options(&self) -> InferenceOptions {
        let inference = &self.config.inference;
        let options = InferenceOptions::new(inference.model.clone());
        match inference.temperature {
            Some(temperature) => options.with_temperature(temperature),
            None => options,
        }
    }
}

fn build_source(config: &PipelineConfig) -> Result<Arc<dyn DataSource>> {
    let market = &config.market;
    let api_key = market.api_key.clone().unwrap_or_default();
    let client = AlphaVantageClient::new(api_key, market.requests_per_minute)
        .with_base_url(market.base_url.clone())
        .with_timeout(Duration::from_secs(market.timeout_secs))?;
    Ok(Arc::new(client))
}

fn build_inference(config: &PipelineConfig) -> Result<Arc<dyn InferenceService>> {
    let inference = &config.inference;
    let service: Arc<dyn InferenceService> = match inference.provider {
        ProviderKind::Ollama => {
            let mut ollama = OllamaConfig::default().with_timeout(inference.timeout_secs);
            if let Some(base_url) = &inference.base_url {
                ollama.base_url.clone_from(base_url);
            }
            Arc::new(OllamaProvider::with_config(ollama)?)
        }
        ProviderKind::OpenAi => {
            let mut openai = OpenAIConfig::default().with_timeout(inference.timeout_secs);
            openai.api_key.clone_from(&inference.api_key);
            if let Some(base_url) = &inference.base_url {
                openai.api_base.clone_from(base_url);
            }
            Arc::new(OpenAIProvider::with_config(openai)?)
        }
    };
    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockInference, MockSource, test_config};

    fn factory() -> PhaseFactory {
        PhaseFactory::with_services(
            test_config(),
            Blackboard::shared(),
            Arc::new(MockSource::new()),
            Arc::new(KMeans::default()),
            Arc::new(MockInference::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_create_known_phases() {
        let factory = factory();
        for id in phases::ALL {
            let phase = factory.create(id).unwrap();
            assert_eq!(phase.id(), id);
        }
    }

    #[test]
    fn test_unknown_phase() {
        let result = factory().create("PhaseFive");
        assert!(matches!(result, Err(Error::UnknownPhase(id)) if id == "PhaseFive"));
    }

    #[test]
    fn test_create_all_stops_on_unknown() {
        let result = factory().create_all(["fetch", "chart"]);
        assert!(matches!(result, Err(Error::UnknownPhase(id)) if id == "chart"));
    }

    #[test]
    fn test_rebind_switches_blackboard() {
        let factory = factory();
        let fresh = Blackboard::shared();
        let rebound = factory.rebind(Arc::clone(&fresh));

        assert!(Arc::ptr_eq(rebound.blackboard(), &fresh));
        assert!(!Arc::ptr_eq(factory.blackboard(), &fresh));
        assert_eq!(rebound.config(), factory.config());
    }

    #[test]
    fn test_new_validates_config() {
        let result = PhaseFactory::new(PipelineConfig::default(), Blackboard::shared());
        assert!(result.is_err());
    }

    #[test]
    fn test_new_with_real_services() {
        let factory = PhaseFactory::new(test_config(), Blackboard::shared()).unwrap();
        assert_eq!(factory.config().market.symbol, "INUV");
        assert_eq!(factory.inference.name(), "ollama");
        assert_eq!(factory.source.name(), "alpha_vantage");
    }
}
