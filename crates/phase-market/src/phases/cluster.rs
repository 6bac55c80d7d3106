use crate::cluster::{Clusterer, group_clusters};
use crate::keys;
use async_trait::async_trait;
use phase_core::{Blackboard, Phase, PhaseContext, PhaseError, PhaseResult};
use std::sync::Arc;
use tracing::{debug, info};

/// Clusters the fetched highs and publishes the groups under `clusters`
pub struct ClusterPhase {
    clusterer: Arc<dyn Clusterer>,
    k: usize,
    blackboard: Arc<Blackboard>,
}

impl ClusterPhase {
    pub fn new(clusterer: Arc<dyn Clusterer>, k: usize, blackboard: Arc<Blackboard>) -> Self {
        Self {
            clusterer,
            k,
            blackboard,
        }
    }
}

#[async_trait]
impl Phase for ClusterPhase {
    fn id(&self) -> &str {
        super::CLUSTER
    }

    async fn execute(&self, ctx: &PhaseContext) -> PhaseResult<()> {
        let series = self.blackboard.get_typed(&keys::SERIES)?;
        if ctx.is_cancelled() {
            return Err(PhaseError::Cancelled);
        }

        let values: Vec<f64> = series.iter().map(|p| p.value).collect();
        let assignments = self.clusterer.cluster(&values, self.k)?;
        let groups = group_clusters(&series, &assignments)?;

        for group in &groups {
            debug!(
                "Cluster {}: average high ${:.2} over {} points",
                group.number(),
                group.average,
                group.len()
            );
        }
        info!("Grouped {} points into {} clusters", series.len(), groups.len());

        self.blackboard.put_typed(&keys::CLUSTERS, &groups)?;
        Ok(())
    }
}
