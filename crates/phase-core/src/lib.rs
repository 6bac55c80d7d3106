//! Core abstractions for phase pipelines
//!
//! This crate defines the pieces every pipeline is built from:
//!
//! - [`Phase`]: a unit of work with a tracked lifecycle ([`PhaseStatus`])
//! - [`Blackboard`]: the shared key/value store phases use to pass data forward
//! - [`RetryPolicy`]: bounded retries with linear backoff around unreliable calls
//! - [`PhaseContext`]: per-execution deadline handling

pub mod blackboard;
pub mod error;
pub mod phase;
pub mod retry;

pub use blackboard::{Blackboard, BlackboardEntry, BlackboardError, BlackboardKey};
pub use error::{Error, PhaseError, PhaseResult, Result};
pub use phase::{FailureReason, FnPhase, Phase, PhaseContext, PhaseState, PhaseStatus};
pub use retry::{Retried, RetryError, RetryPolicy};
