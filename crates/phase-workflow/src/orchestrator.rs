//! Dependency-gated phase orchestrator
//!
//! The orchestrator runs an [`ExecutionPlan`] in groups:
//!
//! 1. Every pending phase whose dependencies all succeeded is dispatched;
//!    the whole group runs concurrently (bounded by `max_concurrency`).
//! 2. The group is joined with a wait-for-all barrier. A failing phase does
//!    not cancel its siblings.
//! 3. Pending phases with a failed dependency are marked Failed with
//!    "dependency not satisfied" and are never dispatched.
//! 4. Repeat until nothing is ready.
//!
//! Each phase runs in its own tokio task, so a panic is contained and
//! recorded like any other failure. Groups are bounded by a deadline that is
//! handed to phases through [`PhaseContext`]; a phase that does not observe
//! it is aborted once `cancel_grace` has also passed.

use crate::plan::ExecutionPlan;
use crate::report::{GroupRecord, PhaseRecord, RunReport};
use futures::future::join_all;
use phase_core::{
    Blackboard, Error, FailureReason, Phase, PhaseContext, PhaseResult, PhaseState, PhaseStatus,
    Result,
};
use phase_utils::format_elapsed;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, instrument, warn};

/// Configuration for pipeline execution
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum number of phases running at the same time within a group
    pub max_concurrency: usize,

    /// Deadline for each dispatched group, measured from its dispatch
    pub group_deadline: Option<Duration>,

    /// Deadline for the whole run, measured from the start of `run`
    pub run_deadline: Option<Duration>,

    /// How long past its deadline a phase task may keep running before it is
    /// aborted
    pub cancel_grace: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            group_deadline: Some(Duration::from_secs(300)),
            run_deadline: None,
            cancel_grace: Duration::from_secs(1),
        }
    }
}

struct PhaseSlot {
    phase: Arc<dyn Phase>,
    state: PhaseState,
    group: Option<usize>,
    elapsed: Option<Duration>,
}

struct PhaseOutcome {
    id: String,
    result: std::result::Result<(), FailureReason>,
    elapsed: Duration,
}

/// Runs the phases of an execution plan
///
/// # Example
///
/// ```no_run
/// use phase_core::{Blackboard, FnPhase, Phase};
/// use phase_workflow::{ExecutionPlan, Orchestrator};
/// use std::sync::Arc;
///
/// # async fn example() -> phase_core::Result<()> {
/// let plan = ExecutionPlan::builder()
///     .root("fetch")
///     .phase("report", ["fetch"])
///     .build()?;
///
/// let fetch: Arc<dyn Phase> = Arc::new(FnPhase::new("fetch", |_ctx| async { Ok(()) }));
/// let report: Arc<dyn Phase> = Arc::new(FnPhase::new("report", |_ctx| async { Ok(()) }));
///
/// let mut orchestrator = Orchestrator::builder()
///     .plan(plan)
///     .phases([fetch, report])
///     .blackboard(Blackboard::shared())
///     .build()?;
///
/// let report = orchestrator.run().await?;
/// assert!(report.is_success());
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator {
    plan: ExecutionPlan,
    slots: HashMap<String, PhaseSlot>,
    blackboard: Arc<Blackboard>,
    config: OrchestratorConfig,
    has_run: bool,
}

impl Orchestrator {
    /// Create a new orchestrator builder
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Create an orchestrator from a plan and one phase instance per plan node
    ///
    /// Fails if the plan is invalid, a node has no phase, or a phase is not
    /// part of the plan.
    pub fn new(
        plan: ExecutionPlan,
        phases: Vec<Arc<dyn Phase>>,
        blackboard: Arc<Blackboard>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        plan.validate()?;

        let mut slots = HashMap::new();
        for phase in phases {
            let id = phase.id().to_string();
            if !plan.contains(&id) {
                return Err(Error::UnknownPhase(id));
            }
            let slot = PhaseSlot {
                phase,
                state: PhaseState::new(),
                group: None,
                elapsed: None,
            };
            if slots.insert(id.clone(), slot).is_some() {
                return Err(Error::DuplicatePhase(id));
            }
        }

        if let Some(missing) = plan.ids().find(|id| !slots.contains_key(*id)) {
            return Err(Error::UnknownPhase(missing.to_string()));
        }

        Ok(Self {
            plan,
            slots,
            blackboard,
            config,
            has_run: false,
        })
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The blackboard shared with the phases
    pub fn blackboard(&self) -> &Arc<Blackboard> {
        &self.blackboard
    }

    /// Current status of a phase
    pub fn status(&self, id: &str) -> Option<PhaseStatus> {
        self.slots.get(id).map(|slot| slot.state.status())
    }

    /// Current state (status and failure reason) of a phase
    pub fn state(&self, id: &str) -> Option<&PhaseState> {
        self.slots.get(id).map(|slot| &slot.state)
    }

    /// Current status map
    pub fn statuses(&self) -> BTreeMap<String, PhaseStatus> {
        self.slots
            .iter()
            .map(|(id, slot)| (id.clone(), slot.state.status()))
            .collect()
    }

    /// Run the plan to completion
    ///
    /// Phase failures never make this fail; they are reported in the
    /// returned [`RunReport`]. An orchestrator runs once: a second call
    /// returns [`Error::AlreadyRun`].
    #[instrument(skip(self), fields(phases = self.plan.len()))]
    pub async fn run(&mut self) -> Result<RunReport> {
        if self.has_run {
            return Err(Error::AlreadyRun);
        }
        self.has_run = true;

        let run_started = Instant::now();
        let run_deadline = self.config.run_deadline.map(|limit| run_started + limit);
        let mut groups = Vec::new();

        info!("Starting pipeline with {} phase(s)", self.plan.len());

        loop {
            self.skip_unsatisfied()?;

            let ready = self.ready_phases();
            if ready.is_empty() {
                break;
            }

            let index = groups.len() + 1;
            let group = self.run_group(index, ready, run_deadline).await?;
            groups.push(group);
        }

        let elapsed = run_started.elapsed();
        info!("Total pipeline execution time: {}", format_elapsed(elapsed));
        debug!("Blackboard keys after run: {:?}", self.blackboard.keys());

        Ok(self.report(groups, elapsed))
    }

    /// Mark pending phases with a failed dependency as Failed, repeating
    /// until no more phases are affected
    fn skip_unsatisfied(&mut self) -> Result<()> {
        loop {
            let blocked: Vec<(String, String)> = self
                .plan
                .nodes()
                .iter()
                .filter(|node| self.status(&node.id) == Some(PhaseStatus::Pending))
                .filter_map(|node| {
                    node.dependencies
                        .iter()
                        .find(|dep| self.status(dep) == Some(PhaseStatus::Failed))
                        .map(|dep| (node.id.clone(), dep.clone()))
                })
                .collect();

            if blocked.is_empty() {
                return Ok(());
            }

            for (id, failed_dep) in blocked {
                warn!(
                    "Skipping phase '{}': dependency '{}' did not succeed",
                    id, failed_dep
                );
                self.slot_mut(&id)?
                    .state
                    .skip(&id, FailureReason::DependencyNotSatisfied)?;
            }
        }
    }

    /// Pending phases whose dependencies all succeeded, in plan order
    fn ready_phases(&self) -> Vec<String> {
        self.plan
            .nodes()
            .iter()
            .filter(|node| self.status(&node.id) == Some(PhaseStatus::Pending))
            .filter(|node| {
                node.dependencies
                    .iter()
                    .all(|dep| self.status(dep) == Some(PhaseStatus::Succeeded))
            })
            .map(|node| node.id.clone())
            .collect()
    }

    /// Dispatch one group and wait for every phase in it to finish
    async fn run_group(
        &mut self,
        index: usize,
        ids: Vec<String>,
        run_deadline: Option<Instant>,
    ) -> Result<GroupRecord> {
        let started = Instant::now();
        let deadline = earliest(
            self.config.group_deadline.map(|limit| started + limit),
            run_deadline,
        );
        let backstop = deadline.map(|at| at + self.config.cancel_grace);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));

        if ids.len() > 1 {
            info!("Dispatching group {} in parallel: {}", index, ids.join(", "));
        }

        let mut waits = Vec::with_capacity(ids.len());
        for id in &ids {
            let slot = self.slot_mut(id)?;
            slot.state.start(id)?;
            slot.group = Some(index);
            let phase = Arc::clone(&slot.phase);

            let mut ctx = PhaseContext::new(id.clone());
            if let Some(at) = deadline {
                ctx = ctx.with_deadline(at);
            }

            info!("Starting phase '{}'", id);
            let handle = spawn_phase(phase, ctx, Arc::clone(&semaphore));
            waits.push(await_phase(id.clone(), handle, started, backstop));
        }

        let outcomes = join_all(waits).await;

        for outcome in outcomes {
            let slot = self.slot_mut(&outcome.id)?;
            slot.elapsed = Some(outcome.elapsed);
            match outcome.result {
                Ok(()) => {
                    slot.state.succeed(&outcome.id)?;
                    info!(
                        "Phase '{}' succeeded in {}",
                        outcome.id,
                        format_elapsed(outcome.elapsed)
                    );
                }
                Err(reason) => {
                    warn!(
                        "Phase '{}' failed after {}: {}",
                        outcome.id,
                        format_elapsed(outcome.elapsed),
                        reason
                    );
                    slot.state.fail(&outcome.id, reason)?;
                }
            }
        }

        let elapsed = started.elapsed();
        info!("Group {} execution time: {}", index, format_elapsed(elapsed));

        Ok(GroupRecord {
            index,
            phases: ids,
            elapsed,
        })
    }

    fn slot_mut(&mut self, id: &str) -> Result<&mut PhaseSlot> {
        self.slots
            .get_mut(id)
            .ok_or_else(|| Error::UnknownPhase(id.to_string()))
    }

    fn report(&self, groups: Vec<GroupRecord>, elapsed: Duration) -> RunReport {
        let phases = self
            .plan
            .nodes()
            .iter()
            .filter_map(|node| {
                self.slots.get(&node.id).map(|slot| PhaseRecord {
                    id: node.id.clone(),
                    dependencies: node.dependencies.clone(),
                    status: slot.state.status(),
                    failure: slot.state.failure().cloned(),
                    group: slot.group,
                    elapsed: slot.elapsed,
                })
            })
            .collect();

        RunReport {
            phases,
            groups,
            blackboard: self.blackboard.snapshot(),
            elapsed,
        }
    }
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn spawn_phase(
    phase: Arc<dyn Phase>,
    ctx: PhaseContext,
    semaphore: Arc<Semaphore>,
) -> JoinHandle<PhaseResult<()>> {
    tokio::spawn(async move {
        // The semaphore is owned by this group and never closed
        let _permit = semaphore.acquire_owned().await;
        debug!("Phase '{}' acquired a dispatch slot", ctx.phase_id());
        phase.execute(&ctx).await
    })
}

/// Join one phase task, converting every way it can end into an outcome
async fn await_phase(
    id: String,
    mut handle: JoinHandle<PhaseResult<()>>,
    group_started: Instant,
    backstop: Option<Instant>,
) -> PhaseOutcome {
    let joined = match backstop {
        Some(at) => match timeout_at(at, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                warn!("Phase '{}' ignored its deadline and was aborted", id);
                return PhaseOutcome {
                    id,
                    result: Err(FailureReason::Cancelled),
                    elapsed: group_started.elapsed(),
                };
            }
        },
        None => handle.await,
    };

    let result = match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(FailureReason::from(e)),
        Err(e) if e.is_panic() => Err(FailureReason::Panicked(panic_message(e.into_panic()))),
        Err(_) => Err(FailureReason::Cancelled),
    };

    PhaseOutcome {
        id,
        result,
        elapsed: group_started.elapsed(),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builder for Orchestrator
pub struct OrchestratorBuilder {
    plan: Option<ExecutionPlan>,
    phases: Vec<Arc<dyn Phase>>,
    blackboard: Option<Arc<Blackboard>>,
    config: OrchestratorConfig,
}

impl OrchestratorBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            plan: None,
            phases: Vec::new(),
            blackboard: None,
            config: OrchestratorConfig::default(),
        }
    }

    /// Set the execution plan
    pub fn plan(mut self, plan: ExecutionPlan) -> Self {
        self.plan = Some(plan);
        self
    }

    /// Add a phase instance
    pub fn phase(mut self, phase: Arc<dyn Phase>) -> Self {
        self.phases.push(phase);
        self
    }

    /// Add several phase instances
    pub fn phases(mut self, phases: impl IntoIterator<Item = Arc<dyn Phase>>) -> Self {
        self.phases.extend(phases);
        self
    }

    /// Set the shared blackboard (a fresh one is created otherwise)
    pub fn blackboard(mut self, blackboard: Arc<Blackboard>) -> Self {
        self.blackboard = Some(blackboard);
        self
    }

    /// Set the full configuration
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the fan-out limit
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.config.max_concurrency = max;
        self
    }

    /// Set the per-group deadline
    pub fn group_deadline(mut self, deadline: Duration) -> Self {
        self.config.group_deadline = Some(deadline);
        self
    }

    /// Remove the per-group deadline
    pub fn no_group_deadline(mut self) -> Self {
        self.config.group_deadline = None;
        self
    }

    /// Set the whole-run deadline
    pub fn run_deadline(mut self, deadline: Duration) -> Self {
        self.config.run_deadline = Some(deadline);
        self
    }

    /// Set the grace period before unresponsive phases are aborted
    pub fn cancel_grace(mut self, grace: Duration) -> Self {
        self.config.cancel_grace = grace;
        self
    }

    /// Build the orchestrator
    pub fn build(self) -> Result<Orchestrator> {
        let plan = self
            .plan
            .ok_or_else(|| Error::InitializationFailed("Execution plan not set".to_string()))?;
        let blackboard = self.blackboard.unwrap_or_else(Blackboard::shared);

        Orchestrator::new(plan, self.phases, blackboard, self.config)
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
