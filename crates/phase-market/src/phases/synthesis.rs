use crate::keys;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use phase_core::{Blackboard, Phase, PhaseContext, PhaseResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// One cluster with its forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisEntry {
    /// One-based cluster label
    pub cluster: usize,
    pub average: f64,
    pub points: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
    pub prediction: Option<String>,
}

/// Final merged result of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisReport {
    pub symbol: String,
    pub interval: String,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<SynthesisEntry>,
    pub profile: String,
}

/// Merges forecasts and the profile into a `SynthesisReport`
///
/// Runs only after both inference phases succeeded; makes no external call.
pub struct SynthesisPhase {
    symbol: String,
    interval: String,
    blackboard: Arc<Blackboard>,
}

impl SynthesisPhase {
    pub fn new(
        symbol: impl Into<String>,
        interval: impl Into<String>,
        blackboard: Arc<Blackboard>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
            blackboard,
        }
    }
}

#[async_trait]
impl Phase for SynthesisPhase {
    fn id(&self) -> &str {
        super::SYNTHESIS
    }

    async fn execute(&self, _ctx: &PhaseContext) -> PhaseResult<()> {
        let clusters = self.blackboard.get_typed(&keys::CLUSTERS)?;
        let forecasts = self.blackboard.get_typed(&keys::FORECASTS)?;
        let profile = self.blackboard.get_typed(&keys::PROFILE)?;

        let entries: Vec<SynthesisEntry> = clusters
            .iter()
            .map(|cluster| SynthesisEntry {
                cluster: cluster.number(),
                average: cluster.average,
                points: cluster.len(),
                first: cluster.times.iter().min().copied(),
                last: cluster.times.iter().max().copied(),
                prediction: forecasts
                    .iter()
                    .find(|f| f.cluster == cluster.index)
                    .map(|f| f.prediction.clone()),
            })
            .collect();

        let report = SynthesisReport {
            symbol: self.symbol.clone(),
            interval: self.interval.clone(),
            generated_at: Utc::now(),
            entries,
            profile: profile.summary,
        };
        info!(
            "Synthesized {} cluster forecasts for {}",
            report.entries.len(),
            report.symbol
        );

        self.blackboard.put_typed(&keys::SYNTHESIS, &report)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::{ClusterForecast, ClusterProfile};
    use crate::testing::{two_clusters, two_level_series};
    use phase_core::PhaseError;

    fn seeded() -> Arc<Blackboard> {
        let blackboard = Blackboard::shared();
        blackboard.put_typed(&keys::CLUSTERS, &two_clusters()).unwrap();
        blackboard
            .put_typed(
                &keys::FORECASTS,
                &vec![ClusterForecast {
                    cluster: 1,
                    average: 2.0,
                    prediction: "Afternoons".to_string(),
                }],
            )
            .unwrap();
        blackboard
    }

    #[tokio::test]
    async fn test_merges_clusters_forecasts_and_profile() {
        let blackboard = seeded();
        blackboard
            .put_typed(
                &keys::PROFILE,
                &ClusterProfile {
                    summary: "Two levels.".to_string(),
                    clusters: 2,
                    points: 6,
                },
            )
            .unwrap();

        SynthesisPhase::new("INUV", "5min", Arc::clone(&blackboard))
            .execute(&PhaseContext::new("synthesis"))
            .await
            .unwrap();

        let report = blackboard.get_typed(&keys::SYNTHESIS).unwrap();
        let series = two_level_series();
        assert_eq!(report.symbol, "INUV");
        assert_eq!(report.profile, "Two levels.");
        assert_eq!(report.entries.len(), 2);

        assert_eq!(report.entries[0].cluster, 1);
        assert_eq!(report.entries[0].prediction, None);
        assert_eq!(report.entries[0].first, Some(series[0].timestamp));
        assert_eq!(report.entries[0].last, Some(series[2].timestamp));

        assert_eq!(report.entries[1].points, 3);
        assert_eq!(report.entries[1].prediction.as_deref(), Some("Afternoons"));
    }

    #[tokio::test]
    async fn test_missing_profile_is_structural() {
        let blackboard = seeded();

        let err = SynthesisPhase::new("INUV", "5min", Arc::clone(&blackboard))
            .execute(&PhaseContext::new("synthesis"))
            .await
            .unwrap_err();

        assert!(matches!(err, PhaseError::Structural(msg) if msg.contains("analysis.profile")));
        assert!(!blackboard.contains_key(keys::SYNTHESIS.name()));
    }
}
