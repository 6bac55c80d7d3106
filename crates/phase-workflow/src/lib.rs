//! Dependency-gated orchestration for phase pipelines
//!
//! This crate turns a set of phases and an [`ExecutionPlan`] into a run:
//! ready phases are dispatched in concurrent groups, joined with a
//! wait-for-all barrier, and the outcome is collected in a [`RunReport`].

pub mod orchestrator;
pub mod plan;
pub mod report;

// Re-export for convenience
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorConfig};
pub use plan::{ExecutionPlan, ExecutionPlanBuilder, PlanNode};
pub use report::{GroupRecord, PhaseRecord, RunReport};
