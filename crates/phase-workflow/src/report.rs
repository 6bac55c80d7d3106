//! Run report types

use phase_core::{FailureReason, PhaseStatus};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Final state of one phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseRecord {
    pub id: String,
    pub dependencies: Vec<String>,
    pub status: PhaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    /// 1-based index of the group the phase ran in; `None` if never dispatched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<usize>,
    #[serde(
        rename = "elapsed_ms",
        serialize_with = "duration_ms::serialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub elapsed: Option<Duration>,
}

impl PhaseRecord {
    pub fn succeeded(&self) -> bool {
        self.status == PhaseStatus::Succeeded
    }

    /// Failure reason as display text
    pub fn reason(&self) -> Option<String> {
        self.failure.as_ref().map(ToString::to_string)
    }
}

/// A set of phases dispatched together and joined before gating resumed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRecord {
    pub index: usize,
    pub phases: Vec<String>,
    #[serde(rename = "elapsed_ms", serialize_with = "duration_ms::serialize")]
    pub elapsed: Duration,
}

/// Everything a caller needs to present a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Per-phase outcome, in plan order
    pub phases: Vec<PhaseRecord>,
    /// Dispatch groups, in execution order
    pub groups: Vec<GroupRecord>,
    /// Blackboard contents at the end of the run
    pub blackboard: BTreeMap<String, Value>,
    #[serde(rename = "elapsed_ms", serialize_with = "duration_ms::serialize")]
    pub elapsed: Duration,
}

impl RunReport {
    /// Record for a phase
    pub fn record(&self, id: &str) -> Option<&PhaseRecord> {
        self.phases.iter().find(|record| record.id == id)
    }

    /// Status of a phase
    pub fn status(&self, id: &str) -> Option<PhaseStatus> {
        self.record(id).map(|record| record.status)
    }

    /// Failure reason of a phase, if it failed
    pub fn failure(&self, id: &str) -> Option<&FailureReason> {
        self.record(id).and_then(|record| record.failure.as_ref())
    }

    /// Final status map
    pub fn statuses(&self) -> BTreeMap<String, PhaseStatus> {
        self.phases
            .iter()
            .map(|record| (record.id.clone(), record.status))
            .collect()
    }

    /// Whether every phase succeeded
    pub fn is_success(&self) -> bool {
        self.phases.iter().all(PhaseRecord::succeeded)
    }

    /// Records of phases that ended Failed
    pub fn failed(&self) -> Vec<&PhaseRecord> {
        self.phases
            .iter()
            .filter(|record| record.status == PhaseStatus::Failed)
            .collect()
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    #[allow(clippy::ref_option)]
    pub fn serialize_opt<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serialize(duration, serializer),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RunReport {
        RunReport {
            phases: vec![
                PhaseRecord {
                    id: "fetch".into(),
                    dependencies: vec![],
                    status: PhaseStatus::Succeeded,
                    failure: None,
                    group: Some(1),
                    elapsed: Some(Duration::from_millis(120)),
                },
                PhaseRecord {
                    id: "cluster".into(),
                    dependencies: vec!["fetch".into()],
                    status: PhaseStatus::Failed,
                    failure: Some(FailureReason::DependencyNotSatisfied),
                    group: None,
                    elapsed: None,
                },
            ],
            groups: vec![GroupRecord {
                index: 1,
                phases: vec!["fetch".into()],
                elapsed: Duration::from_millis(125),
            }],
            blackboard: BTreeMap::from([("series".to_string(), json!([1, 2]))]),
            elapsed: Duration::from_millis(130),
        }
    }

    #[test]
    fn test_lookups() {
        let report = sample();
        assert_eq!(report.status("fetch"), Some(PhaseStatus::Succeeded));
        assert_eq!(
            report.record("cluster").and_then(PhaseRecord::reason),
            Some("dependency not satisfied".to_string())
        );
        assert!(!report.is_success());
        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.status("missing"), None);
    }

    #[test]
    fn test_json_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["elapsed_ms"], json!(130));
        assert_eq!(value["phases"][0]["status"], json!("succeeded"));
        assert_eq!(value["phases"][0]["elapsed_ms"], json!(120));
        assert!(value["phases"][1].get("elapsed_ms").is_none());
        assert_eq!(
            value["phases"][1]["failure"],
            json!({"kind": "dependency_not_satisfied"})
        );
        assert_eq!(value["groups"][0]["phases"], json!(["fetch"]));
    }
}
