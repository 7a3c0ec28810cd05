//! Job model: one periodic release of a task.
//!
//! A job walks `NonCompute -> Computing -> {Completed | MissDeadline}`.
//! Besides progress it tracks its priority stack (algorithm priority,
//! inherited priority, suspension) and two critical-section structures:
//! sections not yet entered, ordered by start offset, and entered sections,
//! ordered by end offset. Together they always partition the task's
//! critical sections.

use std::collections::{BTreeMap, VecDeque};
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::task::{CriticalSection, Task};
use crate::types::{CoreId, JobId, Priority, ResourceId, TaskId, Time};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Released but never executed.
    NonCompute,
    /// Executed at least one tick.
    Computing,
    Completed,
    MissDeadline,
}

impl JobStatus {
    /// Completed or missed: the job left every queue for good.
    pub fn is_finished(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::MissDeadline)
    }
}

/// A runtime job.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub task: TaskId,
    pub release_time: Time,
    pub absolute_deadline: Time,
    /// Work to complete, in progress units.
    pub target: f64,
    progress: f64,
    pub status: JobStatus,
    /// Priority computed by the scheduling algorithm.
    pub original_priority: Priority,
    /// Priority used for every scheduling decision.
    pub current_priority: Priority,
    inherited: Option<Priority>,
    suspended: bool,
    /// Resource the job is currently blocked on.
    pub blocking_resource: Option<ResourceId>,
    /// Core the job last executed on.
    pub origin_core: Option<CoreId>,
    /// Core whose local queue holds the job.
    pub current_core: Option<CoreId>,
    /// Speed at which one tick of execution yields one unit of progress.
    pub max_processing_speed: f64,
    pending_sections: VecDeque<CriticalSection>,
    /// Keyed by (end offset, entry order).
    entered_sections: BTreeMap<(Time, u64), CriticalSection>,
    entry_counter: u64,
    first_executed: bool,
    /// Ticks spent blocked on a resource or waiting behind a lower-priority
    /// job.
    pub blocking_time: Time,
    /// Time of completion or of the deadline miss.
    pub finished_at: Option<Time>,
}

impl Job {
    pub fn new(id: JobId, task: &Task, release_time: Time, max_processing_speed: f64) -> Self {
        let mut sections = task.critical_sections.clone();
        // Stable: equal starts keep declaration order, outer section first.
        sections.sort_by_key(|cs| cs.start);
        Job {
            id,
            task: task.id,
            release_time,
            absolute_deadline: release_time + task.deadline,
            target: task.computation as f64,
            progress: 0.0,
            status: JobStatus::NonCompute,
            original_priority: task.priority,
            current_priority: task.priority,
            inherited: None,
            suspended: false,
            blocking_resource: None,
            origin_core: None,
            current_core: None,
            max_processing_speed,
            pending_sections: sections.into(),
            entered_sections: BTreeMap::new(),
            entry_counter: 0,
            first_executed: false,
            blocking_time: 0,
            finished_at: None,
        }
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Whole units of work done so far; critical-section offsets compare
    /// against this.
    pub fn executed_units(&self) -> Time {
        self.progress.floor() as Time
    }

    pub fn remaining(&self) -> f64 {
        self.target - self.progress
    }

    pub fn is_done(&self) -> bool {
        self.progress >= self.target
    }

    /// Advance progress by `amount`, never past the target. The last slice
    /// lands exactly on the target.
    pub fn execute(&mut self, amount: f64) {
        debug_assert!(amount >= 0.0, "negative execution amount {amount}");
        if self.progress + amount >= self.target {
            self.progress = self.target;
        } else {
            self.progress += amount;
        }
    }

    /// Response time of a completed job.
    pub fn response_time(&self) -> Option<Time> {
        match self.status {
            JobStatus::Completed => self.finished_at.map(|t| t - self.release_time),
            _ => None,
        }
    }

    /// Next section to enter.
    pub fn next_section(&self) -> Option<&CriticalSection> {
        self.pending_sections.front()
    }

    /// Next section whose start offset has been reached.
    pub fn due_section(&self) -> Option<&CriticalSection> {
        self.next_section()
            .filter(|cs| cs.start <= self.executed_units())
    }

    /// Move the next section from the not-entered to the entered structure.
    pub fn enter_next_section(&mut self) -> Option<CriticalSection> {
        let cs = self.pending_sections.pop_front()?;
        let order = self.entry_counter;
        self.entry_counter += 1;
        self.entered_sections.insert((cs.end, order), cs);
        Some(cs)
    }

    /// Entered section that ends first.
    pub fn next_exit(&self) -> Option<&CriticalSection> {
        self.entered_sections.values().next()
    }

    /// Entered section whose end offset has been reached.
    pub fn due_exit(&self) -> Option<&CriticalSection> {
        self.next_exit()
            .filter(|cs| cs.end <= self.executed_units())
    }

    pub fn exit_next_section(&mut self) -> Option<CriticalSection> {
        let (&key, _) = self.entered_sections.iter().next()?;
        self.entered_sections.remove(&key)
    }

    pub fn entered_sections(&self) -> impl Iterator<Item = &CriticalSection> {
        self.entered_sections.values()
    }

    pub fn pending_sections(&self) -> impl Iterator<Item = &CriticalSection> {
        self.pending_sections.iter()
    }

    pub fn holds(&self, resource: ResourceId) -> bool {
        self.entered_sections.values().any(|cs| cs.resource == resource)
    }

    /// Replace the algorithm priority and re-apply overrides.
    pub fn set_base_priority(&mut self, priority: Priority) {
        self.original_priority = priority;
        self.refresh_priority();
    }

    pub fn inherit(&mut self, priority: Priority) {
        self.inherited = Some(priority);
        self.refresh_priority();
    }

    pub fn clear_inheritance(&mut self) {
        self.inherited = None;
        self.refresh_priority();
    }

    pub fn inherited_priority(&self) -> Option<Priority> {
        self.inherited
    }

    pub fn is_inherited(&self) -> bool {
        self.inherited.is_some()
    }

    pub fn suspend(&mut self) {
        self.suspended = true;
        self.refresh_priority();
    }

    pub fn resume(&mut self) {
        self.suspended = false;
        self.refresh_priority();
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// original, then inherited if inheriting, then lowest if suspended.
    fn refresh_priority(&mut self) {
        let mut priority = self.original_priority;
        if let Some(inherited) = self.inherited {
            priority = inherited;
        }
        if self.suspended {
            priority = Priority::LOWEST;
        }
        self.current_priority = priority;
    }

    /// Returns true exactly once, on the job's first execution.
    pub(crate) fn mark_first_execute(&mut self) -> bool {
        !std::mem::replace(&mut self.first_executed, true)
    }
}

/// Arena of all jobs released during a run, indexed by [`JobId`].
#[derive(Debug, Clone, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next pushed job will get.
    pub fn next_id(&self) -> JobId {
        JobId(self.jobs.len() as u32)
    }

    pub fn push(&mut self, job: Job) -> JobId {
        debug_assert_eq!(job.id, self.next_id(), "job ids must follow release order");
        let id = job.id;
        self.jobs.push(job);
        id
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Jobs of one task in release order.
    pub fn of_task(&self, task: TaskId) -> impl Iterator<Item = &Job> {
        self.jobs.iter().filter(move |j| j.task == task)
    }
}

impl Index<JobId> for JobTable {
    type Output = Job;

    fn index(&self, id: JobId) -> &Job {
        &self.jobs[id.index()]
    }
}

impl IndexMut<JobId> for JobTable {
    fn index_mut(&mut self, id: JobId) -> &mut Job {
        &mut self.jobs[id.index()]
    }
}
