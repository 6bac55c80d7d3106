//! Prompt templates for the inference phases
//!
//! Templates are organized into:
//! - `system`: agent personas and their system prompts
//! - `user`: user message templates rendered from cluster data
//!
//! Cluster data is pre-formatted before rendering: averages to two decimals,
//! times as `HH:MM:SS`.

mod system;
mod user;

pub use system::*;
pub use user::{FORECAST_CLUSTER, PROFILE_CLUSTERS};

use crate::cluster::ClusterGroup;
use crate::error::Result;
use minijinja::{Environment, context};
use serde::Serialize;

const TIME_FORMAT: &str = "%H:%M:%S";

/// Rendered view of a cluster
#[derive(Debug, Serialize)]
struct ClusterView {
    number: usize,
    average: String,
    count: usize,
    times: Vec<String>,
    first: String,
    last: String,
}

impl From<&ClusterGroup> for ClusterView {
    fn from(group: &ClusterGroup) -> Self {
        let times: Vec<String> = group
            .times
            .iter()
            .map(|t| t.format(TIME_FORMAT).to_string())
            .collect();
        Self {
            number: group.number(),
            average: format!("{:.2}", group.average),
            count: group.len(),
            first: times.first().cloned().unwrap_or_default(),
            last: times.last().cloned().unwrap_or_default(),
            times,
        }
    }
}

/// Compiled prompt templates
pub struct PromptLibrary {
    env: Environment<'static>,
}

impl PromptLibrary {
    /// Compile all templates
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(FORECAST_CLUSTER, user::FORECAST_CLUSTER_TEMPLATE)?;
        env.add_template(PROFILE_CLUSTERS, user::PROFILE_CLUSTERS_TEMPLATE)?;
        Ok(Self { env })
    }

    /// Prompt asking `persona` for the most probable period of one cluster
    pub fn forecast(&self, persona: &Persona, cluster: &ClusterGroup) -> Result<String> {
        let template = self.env.get_template(FORECAST_CLUSTER)?;
        Ok(template.render(context! {
            agent => persona.name,
            role => persona.role,
            cluster => ClusterView::from(cluster),
        })?)
    }

    /// Prompt asking `persona` to profile all clusters
    pub fn profile(
        &self,
        persona: &Persona,
        symbol: &str,
        interval: &str,
        clusters: &[ClusterGroup],
    ) -> Result<String> {
        let template = self.env.get_template(PROFILE_CLUSTERS)?;
        let clusters: Vec<ClusterView> = clusters.iter().map(ClusterView::from).collect();
        Ok(template.render(context! {
            agent => persona.name,
            role => persona.role,
            symbol => symbol,
            interval => interval,
            clusters => clusters,
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn cluster() -> ClusterGroup {
        let day = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        ClusterGroup {
            index: 1,
            average: 0.304_56,
            times: vec![
                day.and_hms_opt(9, 35, 0).unwrap(),
                day.and_hms_opt(14, 5, 0).unwrap(),
            ],
        }
    }

    #[test]
    fn test_forecast_prompt() {
        let prompts = PromptLibrary::new().unwrap();
        let prompt = prompts.forecast(&RESEARCH_ASSISTANT, &cluster()).unwrap();

        assert!(prompt.starts_with("[Agent1|Research Assistant]: Analyze"));
        assert!(prompt.contains("Cluster 2:"));
        assert!(prompt.contains("Average High: $0.30"));
        assert!(prompt.contains("Time Range: 09:35:00, 14:05:00"));
        assert!(prompt.ends_with("occur?"));
    }

    #[test]
    fn test_profile_prompt() {
        let prompts = PromptLibrary::new().unwrap();
        let prompt = prompts
            .profile(&DATA_ANALYST, "INUV", "5min", &[cluster()])
            .unwrap();

        assert!(prompt.starts_with("[Agent2|Data Analyst]"));
        assert!(prompt.contains("5min highs for INUV"));
        assert!(prompt.contains(
            "Cluster 2: average high $0.30, 2 points, first 09:35:00, last 14:05:00"
        ));
    }
}
