//! Concurrency-control framework.
//!
//! The controller sequences protocol hooks and owns the per-job critical
//! section walk; the installed [`ConcurrencyControlProtocol`] owns every
//! piece of lock state (holders, waiters, inheritance, suspension).
//!
//! Guarantees made here rather than in protocols:
//! - first-execute fires at most once per job;
//! - a granted section is moved to the job's entered set by the controller,
//!   so the lock walk always makes progress;
//! - completion and deadline misses release every still-entered section
//!   before the protocol's own hook runs.

use serde::Serialize;
use tracing::{debug, trace};

use crate::dvfs::DynamicVoltageRegulator;
use crate::state::SimState;
use crate::types::{CoreId, JobId, ResourceId};

/// A resource-access protocol.
///
/// `check_job_lock` and `job_unlock` are the only required hooks. All others
/// default to no-ops (and `check_first_execute` to "pass").
pub trait ConcurrencyControlProtocol: Send {
    fn name(&self) -> &str;

    /// Once, before the run loop.
    fn pre_action(&mut self, _state: &mut SimState) {}

    fn job_arrives(&mut self, _job: JobId, _state: &mut SimState) {}

    /// Gate for a job's first execution.
    fn check_first_execute(&mut self, _job: JobId, _state: &mut SimState) -> bool {
        true
    }

    /// Request `resource` for `job`. `None` grants the lock; `Some(r)` means
    /// the job is blocked on `r`.
    fn check_job_lock(
        &mut self,
        job: JobId,
        resource: ResourceId,
        state: &mut SimState,
    ) -> Option<ResourceId>;

    fn job_blocked(&mut self, _job: JobId, _resource: ResourceId, _state: &mut SimState) {}

    fn job_first_execute(&mut self, _job: JobId, _state: &mut SimState) {}

    fn job_unlock(&mut self, job: JobId, resource: ResourceId, state: &mut SimState);

    fn job_completed(&mut self, _job: JobId, _state: &mut SimState) {}

    fn job_missed_deadline(&mut self, _job: JobId, _state: &mut SimState) {}

    fn job_preempted(&mut self, _preempted: JobId, _preemptor: JobId, _state: &mut SimState) {}
}

/// Hook invocation counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ControllerStats {
    pub arrivals: u64,
    pub locks: u64,
    pub unlocks: u64,
    pub blocks: u64,
    pub preemptions: u64,
    pub first_executes: u64,
    pub completions: u64,
    pub deadline_misses: u64,
}

/// Outcome of [`ConcurrencyController::check_job_lock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockCheck {
    /// Every due section was granted; the job may run.
    pub granted: bool,
    /// At least one section was entered.
    pub lock_changed: bool,
}

pub struct ConcurrencyController {
    protocol: Box<dyn ConcurrencyControlProtocol>,
    pub stats: ControllerStats,
}

impl ConcurrencyController {
    pub fn new(protocol: Box<dyn ConcurrencyControlProtocol>) -> Self {
        ConcurrencyController {
            protocol,
            stats: ControllerStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        self.protocol.name()
    }

    pub fn pre_action(&mut self, state: &mut SimState) {
        self.protocol.pre_action(state);
    }

    pub fn check_job_arrives(&mut self, job: JobId, state: &mut SimState) {
        self.stats.arrivals += 1;
        self.protocol.job_arrives(job, state);
    }

    /// Only consulted before the job's first unit of work.
    pub fn check_first_execute_action(&mut self, job: JobId, state: &mut SimState) -> bool {
        if state.jobs[job].progress() > 0.0 {
            return true;
        }
        self.protocol.check_first_execute(job, state)
    }

    /// Enter every section whose start offset has been reached.
    pub fn check_job_lock(
        &mut self,
        job: JobId,
        core: CoreId,
        state: &mut SimState,
        regulator: &mut DynamicVoltageRegulator,
    ) -> LockCheck {
        let mut lock_changed = false;
        while let Some(cs) = state.jobs[job].due_section().copied() {
            if let Some(blocking) = self.protocol.check_job_lock(job, cs.resource, state) {
                let j = &mut state.jobs[job];
                let first_block = j.blocking_resource != Some(blocking);
                j.blocking_resource = Some(blocking);
                if first_block {
                    debug!(job = job.0, core = core.0, resource = blocking.0, "blocked");
                }
                self.stats.blocks += 1;
                self.protocol.job_blocked(job, blocking, state);
                regulator.job_blocked(job, blocking, state);
                return LockCheck {
                    granted: false,
                    lock_changed,
                };
            }

            let j = &mut state.jobs[job];
            j.blocking_resource = None;
            j.enter_next_section();
            lock_changed = true;
            self.stats.locks += 1;
            trace!(job = job.0, core = core.0, resource = cs.resource.0, "lock");
            regulator.job_lock(job, cs.resource, state);
        }
        LockCheck {
            granted: true,
            lock_changed,
        }
    }

    /// Fire the first-execute hook. Returns true the one time it fires.
    pub fn job_first_execute_action(&mut self, job: JobId, state: &mut SimState) -> bool {
        if !state.jobs[job].mark_first_execute() {
            return false;
        }
        self.stats.first_executes += 1;
        self.protocol.job_first_execute(job, state);
        true
    }

    /// Leave every entered section whose end offset has been reached.
    /// Returns true if anything was unlocked.
    pub fn check_job_unlock(
        &mut self,
        job: JobId,
        state: &mut SimState,
        regulator: &mut DynamicVoltageRegulator,
    ) -> bool {
        let mut unlocked = false;
        while let Some(cs) = state.jobs[job].due_exit().copied() {
            regulator.job_unlock(job, cs.resource, state);
            state.jobs[job].exit_next_section();
            self.unlock(job, cs.resource, state);
            unlocked = true;
        }
        unlocked
    }

    fn unlock(&mut self, job: JobId, resource: ResourceId, state: &mut SimState) {
        self.stats.unlocks += 1;
        trace!(job = job.0, resource = resource.0, "unlock");
        self.protocol.job_unlock(job, resource, state);
    }

    fn force_unlock(
        &mut self,
        job: JobId,
        state: &mut SimState,
        regulator: &mut DynamicVoltageRegulator,
    ) {
        while let Some(cs) = state.jobs[job].exit_next_section() {
            regulator.job_unlock(job, cs.resource, state);
            self.unlock(job, cs.resource, state);
        }
        state.jobs[job].blocking_resource = None;
    }

    pub fn job_completed_action(
        &mut self,
        job: JobId,
        state: &mut SimState,
        regulator: &mut DynamicVoltageRegulator,
    ) {
        self.force_unlock(job, state, regulator);
        self.stats.completions += 1;
        self.protocol.job_completed(job, state);
    }

    pub fn check_job_deadline(
        &mut self,
        job: JobId,
        state: &mut SimState,
        regulator: &mut DynamicVoltageRegulator,
    ) {
        self.force_unlock(job, state, regulator);
        self.stats.deadline_misses += 1;
        self.protocol.job_missed_deadline(job, state);
    }

    pub fn job_preempted_action(
        &mut self,
        preempted: JobId,
        preemptor: JobId,
        state: &mut SimState,
    ) {
        self.stats.preemptions += 1;
        debug!(job = preempted.0, by = preemptor.0, "preempted");
        self.protocol.job_preempted(preempted, preemptor, state);
    }
}

impl std::fmt::Debug for ConcurrencyController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrencyController")
            .field("protocol", &self.name())
            .field("stats", &self.stats)
            .finish()
    }
}
