//! Processor: owns the cores, the global ready queue and the strategy
//! frameworks, and drives one tick at a time.
//!
//! Phases run over the cores in core-id order. The order matters: the
//! global queue, the resource protocol and the deadline sweep are shared
//! state visited once per tick.

use std::collections::BTreeSet;

use tracing::{debug, info, trace};

use crate::controller::ConcurrencyController;
use crate::coreset::CoreSet;
use crate::cpu::{Core, CoreEnv};
use crate::dvfs::DynamicVoltageRegulator;
use crate::error::Result;
use crate::fmt::{set_sim_clock, set_sim_core};
use crate::job::{Job, JobStatus, JobTable};
use crate::partition::PartitionAlgorithm;
use crate::queue::JobQueue;
use crate::scenario::{EngineConfig, Scenario};
use crate::scheduler::{PriorityType, Scheduler, SchedulingType};
use crate::state::SimState;
use crate::task::{SharedResourceSet, TaskSet};
use crate::trace::MissDeadlineInfo;
use crate::types::{CoreId, CoreSetId, JobId, Priority};

pub struct Processor {
    pub cores: Vec<Core>,
    pub global_queue: JobQueue,
    pub state: SimState,
    pub scheduler: Scheduler,
    pub controller: ConcurrencyController,
    pub regulator: DynamicVoltageRegulator,
    partitioner: Box<dyn PartitionAlgorithm>,
    pub config: EngineConfig,
    pub misses: Vec<MissDeadlineInfo>,
}

impl Processor {
    pub fn new(
        scenario: &Scenario,
        scheduler: Scheduler,
        controller: ConcurrencyController,
        regulator: DynamicVoltageRegulator,
        partitioner: Box<dyn PartitionAlgorithm>,
    ) -> Self {
        let tasks = TaskSet::from_defs(&scenario.tasks);
        let resources = SharedResourceSet::new(&scenario.resources, &tasks);
        let core_sets: Vec<CoreSet> = scenario
            .resolved_core_sets()
            .iter()
            .enumerate()
            .map(|(i, def)| CoreSet::new(CoreSetId(i as u32), def))
            .collect();

        let local_dynamic = !scheduler.scheduling_type().is_global()
            && scheduler.priority_type() == PriorityType::Dynamic;
        let cores = (0..scenario.nr_cores)
            .map(|i| {
                let id = CoreId(i);
                let set = core_sets
                    .iter()
                    .find(|cs| cs.contains(id))
                    .map_or(CoreSetId(0), |cs| cs.id);
                let local = local_dynamic.then(|| scheduler.local_instance());
                Core::new(id, set, local)
            })
            .collect();

        Processor {
            cores,
            global_queue: JobQueue::new(),
            state: SimState {
                time: 0,
                tick: scenario.config.tick,
                tasks,
                resources,
                jobs: JobTable::new(),
                core_sets,
            },
            scheduler,
            controller,
            regulator,
            partitioner,
            config: scenario.config.clone(),
            misses: Vec::new(),
        }
    }

    pub fn scheduling_type(&self) -> SchedulingType {
        self.scheduler.scheduling_type()
    }

    fn costs_enabled(&self) -> bool {
        !self.scheduling_type().is_global() || self.config.global_cost_checks
    }

    /// Split borrow: one core plus the context it needs.
    fn core_env(&mut self, idx: usize) -> (&mut Core, CoreEnv<'_>) {
        let scheduling = self.scheduler.scheduling_type();
        let costs_enabled = self.costs_enabled();
        let Processor {
            cores,
            global_queue,
            state,
            controller,
            regulator,
            config,
            ..
        } = self;
        set_sim_core(Some(cores[idx].id));
        (
            &mut cores[idx],
            CoreEnv {
                state,
                global_queue,
                controller,
                regulator,
                config,
                scheduling,
                costs_enabled,
            },
        )
    }

    /// Partition tasks, assign static priorities and let the protocol and
    /// DVFS method initialise.
    pub fn prepare(&mut self) -> Result<()> {
        let scheduling = self.scheduling_type();
        if scheduling.needs_partition() {
            let cores: Vec<CoreId> = match scheduling {
                SchedulingType::SingleCore => vec![CoreId(0)],
                _ => self.cores.iter().map(|c| c.id).collect(),
            };
            self.partitioner.task_to_core(&cores, &mut self.state.tasks);
        } else if scheduling == SchedulingType::Global {
            for task in self.state.tasks.iter_mut() {
                task.local_core = None;
            }
        }
        for task in self.state.tasks.iter() {
            debug!(task = task.id.0, name = task.name.as_str(), core = ?task.local_core, "placed");
        }

        if self.scheduler.priority_type() == PriorityType::Fixed {
            self.scheduler
                .calculate_task_priorities(&mut self.state.tasks)?;
        }
        self.controller.pre_action(&mut self.state);
        self.regulator.defined_speed(&mut self.state);
        Ok(())
    }

    /// Release the jobs due at the current time.
    pub fn check_arrivals(&mut self) -> Result<()> {
        let now = self.state.time;
        let max_speed = self.state.max_speed();
        let global = self.scheduling_type().is_global();
        let hybrid = self.scheduling_type() == SchedulingType::Hybrid;

        let due: Vec<_> = self
            .state
            .tasks
            .iter()
            .filter(|t| t.releases_at(now))
            .map(|t| t.id)
            .collect();
        for task_id in due {
            let id = self.state.jobs.next_id();
            let task = self.state.tasks.get(task_id);
            let mut job = Job::new(id, task, now, max_speed);
            let priority = self
                .scheduler
                .initial_priority(&job, &self.state.tasks, now)?;
            job.set_base_priority(priority);
            let local_core = task.local_core;
            self.state.jobs.push(job);
            debug!(job = id.0, task = task_id.0, prio = %priority, "arrival");

            self.controller.check_job_arrives(id, &mut self.state);
            self.regulator.job_arrives_processor(id, &mut self.state);

            match local_core {
                Some(core) if !global || hybrid => {
                    let (core, mut env) = self.core_env(core.index());
                    core.enqueue_local(id, &mut env);
                }
                _ if global => {
                    self.global_queue
                        .insert(id, self.state.jobs[id].current_priority);
                }
                _ => {
                    // Left unassigned by the partitioner.
                    let (core, mut env) = self.core_env(0);
                    core.enqueue_local(id, &mut env);
                }
            }
        }
        set_sim_core(None);
        Ok(())
    }

    /// One tick.
    pub fn execute(&mut self) -> Result<()> {
        set_sim_clock(self.state.time);
        if self.scheduling_type().is_global() {
            return self.global_execute();
        }

        self.check_arrivals()?;
        for i in 0..self.cores.len() {
            let (core, mut env) = self.core_env(i);
            core.choose_execute_job(&mut env)?;
        }
        self.check_costs();
        for i in 0..self.cores.len() {
            let (core, mut env) = self.core_env(i);
            core.ready_run(&mut env)?;
        }
        self.check_costs();
        self.update_speeds();
        self.run_cores();
        self.finish_tick(true);
        Ok(())
    }

    /// One tick under global or hybrid scheduling.
    pub fn global_execute(&mut self) -> Result<()> {
        self.check_arrivals()?;
        self.recompute_global_priorities()?;
        self.dispatch_global();

        let cost_checks = self.config.global_cost_checks;
        for i in 0..self.cores.len() {
            let (core, mut env) = self.core_env(i);
            core.choose_execute_job(&mut env)?;
        }
        if cost_checks {
            self.check_costs();
        }
        for i in 0..self.cores.len() {
            let (core, mut env) = self.core_env(i);
            core.ready_run(&mut env)?;
        }
        if cost_checks {
            self.check_costs();
            self.update_speeds();
        }
        self.run_cores();
        self.finish_tick(cost_checks);
        Ok(())
    }

    fn check_costs(&mut self) {
        for core in &mut self.cores {
            core.check_cost();
        }
    }

    /// DVFS per-tick hook, then apply pending speed requests.
    fn update_speeds(&mut self) {
        self.regulator
            .check_cores_execute(&self.cores, &mut self.state);
        for cs in &mut self.state.core_sets {
            if cs.update_speed() {
                trace!(core_set = cs.id.0, speed = cs.current_speed(), "speed change");
            }
        }
    }

    fn run_cores(&mut self) {
        let tick = self.state.tick;
        for i in 0..self.cores.len() {
            let (core, mut env) = self.core_env(i);
            core.run(tick, &mut env);
        }
        set_sim_core(None);
        self.state.time += tick;
        set_sim_clock(self.state.time);
    }

    /// Blocking accounting, completions, deadline sweep, cost cleanup.
    fn finish_tick(&mut self, dvfs_checks: bool) {
        let tick = self.state.tick;
        for core in &mut self.cores {
            core.account_blocking(tick, &mut self.state);
        }
        for i in 0..self.cores.len() {
            let (core, mut env) = self.core_env(i);
            if let Some(job) = core.check_job_completed(&mut env) {
                self.purge_job(job);
            }
        }
        set_sim_core(None);
        self.check_deadlines();
        for i in 0..self.cores.len() {
            let (core, mut env) = self.core_env(i);
            core.last_check_cost(&mut env);
        }
        set_sim_core(None);
        if dvfs_checks {
            self.regulator
                .check_end_system_time(self.state.time, &mut self.state);
        }
    }

    fn recompute_global_priorities(&mut self) -> Result<()> {
        if self.scheduler.priority_type() == PriorityType::Dynamic {
            let now = self.state.time;
            self.global_queue = self.scheduler.calculate_queue_priorities(
                &self.global_queue,
                &mut self.state.jobs,
                &self.state.tasks,
                now,
            )?;
            for core in &mut self.cores {
                core.local_queue = self.scheduler.calculate_queue_priorities(
                    &core.local_queue,
                    &mut self.state.jobs,
                    &self.state.tasks,
                    now,
                )?;
            }
        }
        let jobs = &self.state.jobs;
        self.global_queue.refresh(|id| jobs[id].current_priority);
        for core in &mut self.cores {
            core.refresh_queue(&self.state);
        }
        Ok(())
    }

    /// Move global-queue heads onto the cores with the lowest-priority (or
    /// no) work until nothing more qualifies.
    fn dispatch_global(&mut self) {
        while let Some(head) = self.global_queue.peek() {
            let prio = self.state.jobs[head].current_priority;
            let Some(idx) = self.get_lower_priority_core(prio) else {
                break;
            };
            self.global_queue.poll();

            let tasks = &self.state.tasks;
            let jobs = &self.state.jobs;
            let displaced = self.cores[idx]
                .local_queue
                .split_off_where(|id| tasks.get(jobs[id].task).local_core.is_none());
            for id in displaced {
                let j = &mut self.state.jobs[id];
                j.current_core = None;
                self.global_queue.insert(id, j.current_priority);
                debug!(job = id.0, core = idx, "displaced");
            }

            debug!(job = head.0, core = idx, prio = %prio, "dispatch");
            let (core, mut env) = self.core_env(idx);
            core.enqueue_local(head, &mut env);
        }
        set_sim_core(None);
    }

    /// Core to dispatch a job of priority `prio` to: the first idle core,
    /// else the preemptible core with the lowest-priority head, provided
    /// `prio` is strictly higher.
    pub fn get_lower_priority_core(&self, prio: Priority) -> Option<usize> {
        if let Some(idx) = self.cores.iter().position(Core::is_idle) {
            return Some(idx);
        }
        let jobs = &self.state.jobs;
        let mut lowest: Option<(usize, Priority)> = None;
        for (idx, core) in self.cores.iter().enumerate() {
            if core.has_pending_cost() {
                continue;
            }
            if !self.config.preemptive
                && core
                    .working_job
                    .is_some_and(|j| jobs[j].status == JobStatus::Computing)
            {
                continue;
            }
            let Some(head) = core.local_queue.peek() else {
                continue;
            };
            let head_prio = jobs[head].current_priority;
            if lowest.map_or(true, |(_, p)| p.is_higher(head_prio)) {
                lowest = Some((idx, head_prio));
            }
        }
        lowest
            .filter(|(_, p)| prio.is_higher(*p))
            .map(|(idx, _)| idx)
    }

    /// Move every job whose deadline passed to MISSDEADLINE.
    ///
    /// Each queue is split into expired and remaining jobs and the
    /// remaining ones are swapped back in. A job found in two queues is
    /// handled once.
    pub fn check_deadlines(&mut self) {
        let now = self.state.time;
        let jobs = &self.state.jobs;
        let expired =
            |id: JobId| jobs[id].absolute_deadline <= now && jobs[id].status != JobStatus::Completed;

        let mut missed: Vec<(JobId, Option<CoreId>)> = self
            .global_queue
            .split_off_where(expired)
            .into_iter()
            .map(|id| (id, None))
            .collect();
        for core in &mut self.cores {
            let id = core.id;
            missed.extend(
                core.local_queue
                    .split_off_where(expired)
                    .into_iter()
                    .map(|job| (job, Some(id))),
            );
        }

        let mut seen = BTreeSet::new();
        for (job, core) in missed {
            if !seen.insert(job) || self.state.jobs[job].status == JobStatus::MissDeadline {
                continue;
            }
            self.miss_deadline(job, core);
        }
    }

    fn miss_deadline(&mut self, job: JobId, core: Option<CoreId>) {
        let now = self.state.time;
        let j = &mut self.state.jobs[job];
        j.status = JobStatus::MissDeadline;
        j.finished_at = Some(now);
        let task = j.task;
        info!(job = job.0, task = task.0, deadline = j.absolute_deadline, "deadline miss");

        self.controller
            .check_job_deadline(job, &mut self.state, &mut self.regulator);
        self.regulator.job_missed_deadline(job, &mut self.state);
        self.purge_job(job);
        self.misses.push(MissDeadlineInfo {
            time: now,
            task,
            job,
            core,
        });
    }

    /// Drop a finished job from every queue it may still sit in.
    pub fn purge_job(&mut self, job: JobId) {
        self.global_queue.remove(job);
        for core in &mut self.cores {
            core.local_queue.remove(job);
        }
        self.state.jobs[job].current_core = None;
    }

    /// Close every core's open timeline record.
    pub fn finish(&mut self) {
        for core in &mut self.cores {
            core.finalize();
        }
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("time", &self.state.time)
            .field("cores", &self.cores.len())
            .field("scheduler", &self.scheduler)
            .field("controller", &self.controller)
            .field("regulator", &self.regulator)
            .finish()
    }
}
