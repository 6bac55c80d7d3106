//! Error types for phase-core
//!
//! Two families live here:
//!
//! - [`Error`] covers structural problems with a pipeline itself (cycles,
//!   dangling dependencies, illegal state transitions). These are programming
//!   or configuration mistakes and stop a run before it starts.
//! - [`PhaseError`] is what a single phase reports from its execution
//!   boundary. The orchestrator turns it into a terminal status and a
//!   recorded reason; it never escapes a run.

use crate::blackboard::BlackboardError;
use crate::phase::PhaseStatus;
use crate::retry::RetryError;
use std::fmt::Display;
use thiserror::Error;

/// Result type alias for phase-core
pub type Result<T> = std::result::Result<T, Error>;

/// Result type returned from a phase's execution entry point
pub type PhaseResult<T> = std::result::Result<T, PhaseError>;

/// Error type for pipeline construction and scheduling
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The dependency graph contains a cycle
    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    /// A phase lists a dependency that is not part of the plan
    #[error("Phase '{phase}' depends on unknown phase '{dependency}'")]
    UnknownDependency { phase: String, dependency: String },

    /// Two phases share the same identifier
    #[error("Duplicate phase identifier: {0}")]
    DuplicatePhase(String),

    /// A plan entry has no phase instance, or a factory was asked for an unknown kind
    #[error("Unknown phase: {0}")]
    UnknownPhase(String),

    /// A status change the state machine does not allow
    #[error("Invalid transition for phase '{phase}': {from} -> {to}")]
    InvalidTransition {
        phase: String,
        from: PhaseStatus,
        to: PhaseStatus,
    },

    /// The orchestrator was asked to run a second time
    #[error("Pipeline has already been run")]
    AlreadyRun,

    /// Pipeline construction failed
    #[error("Pipeline initialization failed: {0}")]
    InitializationFailed(String),
}

/// Error reported by a phase
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhaseError {
    /// Transient failure of an external call: transport, non-2xx status or
    /// an undecodable payload
    #[error("External call failed: {0}")]
    External(String),

    /// A transient failure that persisted through every retry attempt
    #[error("Retries exhausted after {attempts} attempt(s): {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Required input is absent or malformed; never retried
    #[error("Structural error: {0}")]
    Structural(String),

    /// The phase's deadline expired before it finished
    #[error("cancelled")]
    Cancelled,
}

impl PhaseError {
    /// Create an external-call error
    pub fn external(msg: impl Into<String>) -> Self {
        Self::External(msg.into())
    }

    /// Create a structural error
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::Structural(msg.into())
    }

    /// Whether this error came from deadline expiry
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<BlackboardError> for PhaseError {
    fn from(err: BlackboardError) -> Self {
        PhaseError::Structural(err.to_string())
    }
}

impl<E: Display> From<RetryError<E>> for PhaseError {
    fn from(err: RetryError<E>) -> Self {
        PhaseError::RetriesExhausted {
            attempts: err.attempts,
            last_error: err.last_error.to_string(),
        }
    }
}
