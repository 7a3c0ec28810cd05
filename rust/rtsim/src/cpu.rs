//! Simulated core and its per-tick execution steps.
//!
//! The processor drives every core through the same phases each tick:
//! `choose_execute_job` picks the job at the head of the local queue (or
//! inserts a switch cost), `ready_run` clears the lock and first-execution
//! gates, `run` advances the clock by one slice, and `last_check_cost`
//! retires finished costs at the end of the tick.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::controller::ConcurrencyController;
use crate::cost::{Cost, CostKind};
use crate::dvfs::DynamicVoltageRegulator;
use crate::error::Result;
use crate::job::JobStatus;
use crate::queue::JobQueue;
use crate::scenario::EngineConfig;
use crate::scheduler::{PriorityType, Scheduler, SchedulingType};
use crate::state::SimState;
use crate::trace::{CoreStatus, SchedulingInfo, Timeline};
use crate::types::{CoreId, CoreSetId, JobId, Time};

/// Borrowed processor context for one core step.
pub(crate) struct CoreEnv<'a> {
    pub state: &'a mut SimState,
    pub global_queue: &'a mut JobQueue,
    pub controller: &'a mut ConcurrencyController,
    pub regulator: &'a mut DynamicVoltageRegulator,
    pub config: &'a EngineConfig,
    pub scheduling: SchedulingType,
    /// False under global scheduling unless per-tick cost checks are on;
    /// every switch is then immediate.
    pub costs_enabled: bool,
}

#[derive(Debug)]
pub struct Core {
    pub id: CoreId,
    pub core_set: CoreSetId,
    pub local_queue: JobQueue,
    /// Local algorithm instance for dynamic priorities.
    pub(crate) scheduler: Option<Scheduler>,
    pub cost_queue: VecDeque<Cost>,
    pub working_job: Option<JobId>,
    pub status: CoreStatus,
    pub current_time: Time,
    pub energy: f64,
    /// Energy total when the open record started.
    energy_mark: f64,
    pub timeline: Timeline,
    /// A section was entered or left since the last record.
    pub lock_changed: bool,
}

impl Core {
    pub fn new(id: CoreId, core_set: CoreSetId, scheduler: Option<Scheduler>) -> Self {
        Core {
            id,
            core_set,
            local_queue: JobQueue::new(),
            scheduler,
            cost_queue: VecDeque::new(),
            working_job: None,
            status: CoreStatus::Idle,
            current_time: 0,
            energy: 0.0,
            energy_mark: 0.0,
            timeline: Timeline::new(id),
            lock_changed: false,
        }
    }

    pub fn has_pending_cost(&self) -> bool {
        !self.cost_queue.is_empty()
    }

    /// No job queued and no cost pending.
    pub fn is_idle(&self) -> bool {
        self.local_queue.is_empty() && self.cost_queue.is_empty()
    }

    /// Re-key the local queue after priorities changed in the job table.
    pub(crate) fn refresh_queue(&mut self, state: &SimState) {
        self.local_queue
            .refresh(|id| state.jobs[id].current_priority);
    }

    pub(crate) fn enqueue_local(&mut self, job: JobId, env: &mut CoreEnv<'_>) {
        let j = &mut env.state.jobs[job];
        j.current_core = Some(self.id);
        self.local_queue.insert(job, j.current_priority);
        trace!(job = job.0, core = self.id.0, "enqueue local");
        env.regulator.job_arrives_core(job, self.id, env.state);
    }

    pub(crate) fn choose_execute_job(&mut self, env: &mut CoreEnv<'_>) -> Result<()> {
        if !env.scheduling.is_global() {
            if let Some(scheduler) = &self.scheduler {
                if scheduler.priority_type() == PriorityType::Dynamic {
                    let now = env.state.time;
                    self.local_queue = scheduler.calculate_queue_priorities(
                        &self.local_queue,
                        &mut env.state.jobs,
                        &env.state.tasks,
                        now,
                    )?;
                }
            }
        }
        self.refresh_queue(env.state);

        if self.has_pending_cost() {
            return Ok(());
        }
        if !env.config.preemptive {
            if let Some(current) = self.working_job {
                let computing = env.state.jobs[current].status == JobStatus::Computing;
                if computing && self.local_queue.contains(current) {
                    return Ok(());
                }
            }
        }

        let head = self.local_queue.peek();
        let Some(head) = head else {
            self.set_working_job(None, env);
            return Ok(());
        };

        if Some(head) == self.working_job {
            // Resuming after another job ran here: still pay for the switch.
            let last_job = self.timeline.last().and_then(|r| r.job);
            let resuming = env.state.jobs[head].status == JobStatus::Computing;
            if resuming && last_job.is_some_and(|j| j != head) {
                self.request_resume(head, env);
            }
            return Ok(());
        }

        if env.state.jobs[head].status == JobStatus::Computing {
            self.request_resume(head, env);
            return Ok(());
        }
        match self.working_job {
            Some(current) if env.state.jobs[current].status == JobStatus::Computing => {
                debug!(job = head.0, current = current.0, core = self.id.0, "preempt");
                self.set_context_switch_cost(head, env);
            }
            _ => self.set_working_job(Some(head), env),
        }
        Ok(())
    }

    /// Switch to an already started job: a context switch, plus a migration
    /// when it last ran on another core.
    fn request_resume(&mut self, job: JobId, env: &mut CoreEnv<'_>) {
        match env.state.jobs[job].origin_core {
            Some(origin) if origin != self.id => self.set_migration_cost(job, origin, env),
            _ => self.set_context_switch_cost(job, env),
        }
    }

    pub(crate) fn set_context_switch_cost(&mut self, job: JobId, env: &mut CoreEnv<'_>) {
        let duration = env.config.context_switch_time;
        if !env.costs_enabled || duration == 0 {
            self.set_working_job(Some(job), env);
            return;
        }
        let origin = env.state.jobs[job].origin_core.unwrap_or(self.id);
        debug!(job = job.0, core = self.id.0, duration, "context switch");
        self.cost_queue.push_back(Cost::new(
            CostKind::ContextSwitch,
            origin,
            self.id,
            job,
            duration,
        ));
    }

    pub(crate) fn set_migration_cost(&mut self, job: JobId, origin: CoreId, env: &mut CoreEnv<'_>) {
        if !env.costs_enabled {
            self.set_working_job(Some(job), env);
            return;
        }
        let switch = (env.config.context_switch_time > 0).then(|| {
            Cost::new(
                CostKind::ContextSwitch,
                origin,
                self.id,
                job,
                env.config.context_switch_time,
            )
        });
        let migrate = (env.config.migration_time > 0).then(|| {
            Cost::new(
                CostKind::Migration,
                origin,
                self.id,
                job,
                env.config.migration_time,
            )
        });
        match Cost::chain(switch, migrate) {
            Some(cost) => {
                debug!(
                    job = job.0,
                    from = origin.0,
                    core = self.id.0,
                    links = cost.chain_len(),
                    "migration"
                );
                self.cost_queue.push_back(cost);
            }
            None => self.set_working_job(Some(job), env),
        }
    }

    pub(crate) fn set_working_job(&mut self, job: Option<JobId>, env: &mut CoreEnv<'_>) {
        if self.working_job == job {
            return;
        }
        if let (Some(old), Some(new)) = (self.working_job, job) {
            if env.state.jobs[old].status == JobStatus::Computing {
                env.controller.job_preempted_action(old, new, env.state);
            }
        }
        self.working_job = job;
    }

    /// Mirror the head cost in the core status.
    pub fn check_cost(&mut self) {
        if let Some(cost) = self.cost_queue.front() {
            self.status = cost.kind.into();
        }
    }

    /// Run the lock and first-execution gates for `job`. On success the core
    /// is in EXECUTION; otherwise it WAITs on the job.
    fn try_start(&mut self, job: JobId, env: &mut CoreEnv<'_>) -> bool {
        let ready = env.controller.check_first_execute_action(job, env.state) && {
            let check = env
                .controller
                .check_job_lock(job, self.id, env.state, env.regulator);
            self.lock_changed |= check.lock_changed;
            check.granted
        };
        if !ready {
            self.status = CoreStatus::Wait;
            return false;
        }

        self.status = CoreStatus::Execution;
        if env.state.jobs[job].progress() == 0.0
            && env.controller.job_first_execute_action(job, env.state)
        {
            env.regulator.job_first_execute(job, env.state);
        }
        env.regulator.job_every_execute(job, env.state);
        true
    }

    pub(crate) fn ready_run(&mut self, env: &mut CoreEnv<'_>) -> Result<()> {
        let global_job = |env: &CoreEnv<'_>, job: JobId| {
            env.scheduling.is_global()
                && env.state.tasks.get(env.state.jobs[job].task).local_core.is_none()
        };
        let waiting_on = (self.status == CoreStatus::Wait)
            .then_some(self.working_job)
            .flatten();
        let mut tried: Vec<JobId> = Vec::new();
        // Each queued job may be chosen at most once per tick.
        let mut attempts = self.local_queue.len() + 1;

        loop {
            if self.has_pending_cost() {
                return Ok(());
            }
            let Some(job) = self.working_job else {
                self.status = CoreStatus::Idle;
                return Ok(());
            };
            if self.try_start(job, env) {
                return Ok(());
            }

            if global_job(env, job) {
                tried.push(job);
                let prio = env.state.jobs[job].current_priority;
                let candidate = env
                    .global_queue
                    .iter()
                    .find(|c| !tried.contains(c));
                let Some(candidate) = candidate else {
                    return Ok(());
                };
                let candidate_prio = env.state.jobs[candidate].current_priority;
                if waiting_on == Some(job) && tried.len() == 1 && !candidate_prio.is_higher(prio) {
                    // Already waiting and nothing more urgent is queued.
                    return Ok(());
                }
                self.swap_global(job, candidate, env);
                self.choose_execute_job(env)?;
            } else {
                // A protocol may have suspended the job or boosted a holder.
                self.refresh_queue(env.state);
                if self.local_queue.peek() == Some(job) || attempts == 0 {
                    return Ok(());
                }
                attempts -= 1;
                self.choose_execute_job(env)?;
            }
        }
    }

    /// Return a blocked job to the global queue and pull `next` in its place.
    fn swap_global(&mut self, blocked: JobId, next: JobId, env: &mut CoreEnv<'_>) {
        debug!(job = blocked.0, next = next.0, core = self.id.0, "blocked, requeue global");
        self.local_queue.remove(blocked);
        self.working_job = None;
        let j = &mut env.state.jobs[blocked];
        j.current_core = None;
        env.global_queue.insert(blocked, j.current_priority);
        env.global_queue.remove(next);
        self.enqueue_local(next, env);
    }

    /// Advance this core by one slice.
    pub(crate) fn run(&mut self, tick: Time, env: &mut CoreEnv<'_>) {
        self.record(env.state);

        let core_set = &env.state.core_sets[self.core_set.index()];
        let speed = core_set.current_speed();
        let active_power = core_set.current_power();
        let idle_power = core_set.idle_power;

        match self.status {
            CoreStatus::Execution => {
                if let Some(job) = self.working_job {
                    let j = &mut env.state.jobs[job];
                    let amount = tick as f64 * speed / j.max_processing_speed;
                    j.execute(amount);
                    j.status = JobStatus::Computing;
                    j.origin_core = Some(self.id);
                    if env.controller.check_job_unlock(job, env.state, env.regulator) {
                        self.lock_changed = true;
                    }
                }
                self.energy += active_power * tick as f64;
            }
            CoreStatus::Idle | CoreStatus::Wait => {
                self.energy += idle_power * tick as f64;
            }
            CoreStatus::ContextSwitch | CoreStatus::Migration => {
                if let Some(cost) = self.cost_queue.front_mut() {
                    cost.execution(tick);
                }
                self.energy += idle_power * tick as f64;
            }
        }
        self.current_time += tick;
    }

    /// Open a new timeline record if anything observable changed.
    pub(crate) fn record(&mut self, state: &SimState) {
        let job = match self.status {
            CoreStatus::Execution | CoreStatus::Wait => self.working_job,
            CoreStatus::ContextSwitch | CoreStatus::Migration => {
                self.cost_queue.front().map(|c| c.job)
            }
            CoreStatus::Idle => None,
        };
        // DVFS methods may set the level directly, so compare against the
        // live speed rather than a flag.
        let speed = state.core_sets[self.core_set.index()].current_speed();
        let changed = match self.timeline.last() {
            None => true,
            Some(last) => {
                last.status != self.status
                    || last.job != job
                    || last.speed != speed
                    || self.lock_changed
            }
        };
        self.lock_changed = false;
        if !changed {
            return;
        }

        self.timeline
            .close(self.current_time, self.energy - self.energy_mark);
        self.energy_mark = self.energy;
        self.timeline.open(SchedulingInfo {
            core: self.id,
            job,
            task: job.map(|j| state.jobs[j].task),
            status: self.status,
            start: self.current_time,
            end: None,
            speed,
            energy: 0.0,
        });
    }

    /// Close the open record at the end of the run.
    pub(crate) fn finalize(&mut self) {
        self.timeline
            .close(self.current_time, self.energy - self.energy_mark);
        self.energy_mark = self.energy;
    }

    /// Complete the working job if it reached its target. Returns the job
    /// so the processor can purge it from other queues.
    pub(crate) fn check_job_completed(&mut self, env: &mut CoreEnv<'_>) -> Option<JobId> {
        let job = self.working_job?;
        let j = &mut env.state.jobs[job];
        if !j.is_done() || j.status.is_finished() {
            return None;
        }
        j.status = JobStatus::Completed;
        j.finished_at = Some(env.state.time);
        debug!(
            job = job.0,
            task = j.task.0,
            core = self.id.0,
            response = env.state.time - j.release_time,
            "completed"
        );
        env.controller
            .job_completed_action(job, env.state, env.regulator);
        env.regulator.job_completed(job, env.state);
        self.local_queue.remove(job);
        Some(job)
    }

    /// Charge one tick of blocking to every queued job that is blocked on a
    /// resource or waits behind a lower base-priority job running here.
    pub fn account_blocking(&mut self, tick: Time, state: &mut SimState) {
        let running = match (self.status, self.working_job) {
            (CoreStatus::Execution, Some(job)) => Some((job, state.jobs[job].original_priority)),
            _ => None,
        };
        for id in self.local_queue.iter() {
            let j = &mut state.jobs[id];
            let inverted = running
                .is_some_and(|(job, prio)| job != id && j.current_priority.is_higher(prio));
            if j.blocking_resource.is_some() || inverted {
                j.blocking_time += tick;
            }
        }
    }

    /// Retire costs at the end of the tick.
    ///
    /// Costs whose job already finished are dropped. A completed cost either
    /// queues its chained successor or hands the core to its job.
    pub(crate) fn last_check_cost(&mut self, env: &mut CoreEnv<'_>) {
        if self.cost_queue.is_empty() {
            return;
        }
        let mut pending = VecDeque::with_capacity(self.cost_queue.len());
        while let Some(mut cost) = self.cost_queue.pop_front() {
            if env.state.jobs[cost.job].status.is_finished() {
                trace!(job = cost.job.0, core = self.id.0, "drop cost");
                continue;
            }
            if !cost.is_completed() {
                pending.push_back(cost);
                continue;
            }
            if let Some(next) = cost.take_next() {
                pending.push_back(next);
            } else if self.local_queue.contains(cost.job) {
                self.set_working_job(Some(cost.job), env);
            }
        }
        self.cost_queue = pending;
        self.status = match self.cost_queue.front() {
            Some(cost) => cost.kind.into(),
            None => CoreStatus::Idle,
        };
    }
}
