//! Phase trait and lifecycle types
//!
//! A phase is one unit of pipeline work. Its lifecycle is
//! `Pending -> Running -> {Succeeded, Failed}`, plus the direct
//! `Pending -> Failed` skip used when a dependency did not succeed. Status is
//! owned by the orchestrator; a phase only does its work and writes to the
//! blackboard it was constructed with.

use crate::error::{Error, PhaseError, PhaseResult, Result};
use crate::retry::{Retried, RetryPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Debug, Display};
use std::future::Future;
use tokio::time::{Instant, timeout_at};

/// Lifecycle status of a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl PhaseStatus {
    /// Succeeded or Failed
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a phase ended Failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// At least one dependency did not succeed; the phase was never dispatched
    DependencyNotSatisfied,
    /// The deadline expired while the phase was running
    Cancelled,
    /// The phase task panicked
    Panicked(String),
    /// The phase returned an error
    Error(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DependencyNotSatisfied => f.write_str("dependency not satisfied"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Panicked(msg) => write!(f, "panicked: {msg}"),
            Self::Error(msg) => f.write_str(msg),
        }
    }
}

impl From<PhaseError> for FailureReason {
    fn from(err: PhaseError) -> Self {
        match err {
            PhaseError::Cancelled => Self::Cancelled,
            other => Self::Error(other.to_string()),
        }
    }
}

/// Status plus failure reason, with the legal transitions enforced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseState {
    status: PhaseStatus,
    failure: Option<FailureReason>,
}

impl Default for PhaseState {
    fn default() -> Self {
        Self {
            status: PhaseStatus::Pending,
            failure: None,
        }
    }
}

impl PhaseState {
    /// A fresh, pending state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> PhaseStatus {
        self.status
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }

    /// `Pending -> Running`. Dispatching a phase twice is rejected here.
    pub fn start(&mut self, phase: &str) -> Result<()> {
        self.transition(phase, PhaseStatus::Pending, PhaseStatus::Running)
    }

    /// `Running -> Succeeded`
    pub fn succeed(&mut self, phase: &str) -> Result<()> {
        self.transition(phase, PhaseStatus::Running, PhaseStatus::Succeeded)
    }

    /// `Running -> Failed`
    pub fn fail(&mut self, phase: &str, reason: FailureReason) -> Result<()> {
        self.transition(phase, PhaseStatus::Running, PhaseStatus::Failed)?;
        self.failure = Some(reason);
        Ok(())
    }

    /// `Pending -> Failed`, for phases that are never dispatched
    pub fn skip(&mut self, phase: &str, reason: FailureReason) -> Result<()> {
        self.transition(phase, PhaseStatus::Pending, PhaseStatus::Failed)?;
        self.failure = Some(reason);
        Ok(())
    }

    fn transition(&mut self, phase: &str, expected: PhaseStatus, to: PhaseStatus) -> Result<()> {
        if self.status != expected {
            return Err(Error::InvalidTransition {
                phase: phase.to_string(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Per-execution context handed to a phase by the orchestrator
///
/// Carries the phase's deadline. Phases run their external calls through
/// [`PhaseContext::guard`] (or [`PhaseContext::call_with_retry`]) so that an
/// expired deadline is observed at the next await point and turned into
/// [`PhaseError::Cancelled`].
#[derive(Debug, Clone)]
pub struct PhaseContext {
    phase_id: String,
    deadline: Option<Instant>,
}

impl PhaseContext {
    /// Context without a deadline
    pub fn new(phase_id: impl Into<String>) -> Self {
        Self {
            phase_id: phase_id.into(),
            deadline: None,
        }
    }

    /// Set the deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn phase_id(&self) -> &str {
        &self.phase_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the deadline has already passed
    pub fn is_cancelled(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Run a future, giving up with `Cancelled` once the deadline passes
    pub async fn guard<F: Future>(&self, fut: F) -> PhaseResult<F::Output> {
        match self.deadline {
            Some(deadline) => timeout_at(deadline, fut)
                .await
                .map_err(|_| PhaseError::Cancelled),
            None => Ok(fut.await),
        }
    }

    /// Run an external call under `policy`, observing the deadline both
    /// during attempts and during backoff sleeps
    pub async fn call_with_retry<F, Fut, T, E>(
        &self,
        policy: &RetryPolicy,
        operation_name: &str,
        operation: F,
    ) -> PhaseResult<Retried<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Display + Debug,
    {
        let outcome = self.guard(policy.execute(operation_name, operation)).await?;
        Ok(outcome?)
    }
}

/// Core trait that all phases must implement
///
/// `execute` is the phase's execution boundary: every failure, including
/// retry exhaustion and cancellation, comes back as a `PhaseError` value.
/// A phase is executed at most once per run.
#[async_trait]
pub trait Phase: Send + Sync {
    /// Unique identifier within a plan
    fn id(&self) -> &str;

    /// Do the phase's work
    async fn execute(&self, ctx: &PhaseContext) -> PhaseResult<()>;
}

/// A phase built from a closure
///
/// Handy for wiring small steps and for exercising schedules without any
/// business logic behind them.
pub struct FnPhase<F> {
    id: String,
    f: F,
}

impl<F> FnPhase<F> {
    pub fn new<Fut>(id: impl Into<String>, f: F) -> Self
    where
        F: Fn(PhaseContext) -> Fut + Send + Sync,
        Fut: Future<Output = PhaseResult<()>> + Send + 'static,
    {
        Self { id: id.into(), f }
    }
}

#[async_trait]
impl<F, Fut> Phase for FnPhase<F>
where
    F: Fn(PhaseContext) -> Fut + Send + Sync,
    Fut: Future<Output = PhaseResult<()>> + Send + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, ctx: &PhaseContext) -> PhaseResult<()> {
        (self.f)(ctx.clone()).await
    }
}
