//! Scheduling-algorithm framework.
//!
//! An algorithm declares whether it assigns fixed task-level priorities or
//! recomputes job-level priorities every tick, and at which granularity jobs
//! are dispatched. [`Scheduler`] checks the declared capability before every
//! call, so a misuse surfaces as [`SimError::UnsupportedOperation`].

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::job::{Job, JobTable};
use crate::queue::JobQueue;
use crate::task::TaskSet;
use crate::types::{Priority, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriorityType {
    /// Task-level priorities assigned once before the run.
    Fixed,
    /// Job-level priorities recomputed every tick.
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingType {
    SingleCore,
    Partition,
    Global,
    /// Pinned tasks use their core's local queue, the rest share the global
    /// queue.
    Hybrid,
}

impl SchedulingType {
    /// Whether the global ready queue is in use.
    pub fn is_global(self) -> bool {
        matches!(self, SchedulingType::Global | SchedulingType::Hybrid)
    }

    /// Whether tasks are assigned to cores before the run.
    pub fn needs_partition(self) -> bool {
        matches!(self, SchedulingType::SingleCore | SchedulingType::Partition)
    }
}

/// A priority-driven scheduling algorithm.
///
/// Implement [`task_priorities`](Self::task_priorities) for
/// [`PriorityType::Fixed`] algorithms and
/// [`job_priority`](Self::job_priority) for [`PriorityType::Dynamic`] ones.
pub trait SchedulingAlgorithm: Send {
    fn name(&self) -> &str;

    fn priority_type(&self) -> PriorityType;

    fn scheduling_type(&self) -> SchedulingType;

    /// Assign `Task::priority` for every task.
    fn task_priorities(&self, _tasks: &mut TaskSet) -> Result<()> {
        Err(SimError::UnsupportedOperation {
            algorithm: self.name().to_string(),
            operation: "task-level priorities",
        })
    }

    /// Priority of one job at `now`.
    fn job_priority(&self, _job: &Job, _tasks: &TaskSet, _now: Time) -> Result<Priority> {
        Err(SimError::UnsupportedOperation {
            algorithm: self.name().to_string(),
            operation: "job-level priorities",
        })
    }

    fn clone_box(&self) -> Box<dyn SchedulingAlgorithm>;
}

/// Facade over the installed algorithm.
pub struct Scheduler {
    algorithm: Box<dyn SchedulingAlgorithm>,
}

impl Scheduler {
    pub fn new(algorithm: Box<dyn SchedulingAlgorithm>) -> Self {
        Scheduler { algorithm }
    }

    pub fn name(&self) -> &str {
        self.algorithm.name()
    }

    pub fn priority_type(&self) -> PriorityType {
        self.algorithm.priority_type()
    }

    pub fn scheduling_type(&self) -> SchedulingType {
        self.algorithm.scheduling_type()
    }

    /// Separate instance for a core's local queue.
    pub fn local_instance(&self) -> Scheduler {
        Scheduler::new(self.algorithm.clone_box())
    }

    fn require(&self, wanted: PriorityType, operation: &'static str) -> Result<()> {
        if self.priority_type() == wanted {
            Ok(())
        } else {
            Err(SimError::UnsupportedOperation {
                algorithm: self.name().to_string(),
                operation,
            })
        }
    }

    /// Assign static task priorities. Only valid for fixed algorithms.
    pub fn calculate_task_priorities(&self, tasks: &mut TaskSet) -> Result<()> {
        self.require(PriorityType::Fixed, "task-level priorities")?;
        self.algorithm.task_priorities(tasks)
    }

    /// Priority for a freshly released job.
    pub fn initial_priority(&self, job: &Job, tasks: &TaskSet, now: Time) -> Result<Priority> {
        match self.priority_type() {
            PriorityType::Fixed => Ok(tasks.get(job.task).priority),
            PriorityType::Dynamic => self.algorithm.job_priority(job, tasks, now),
        }
    }

    /// Recompute the priority of every job in `queue` and return the queue
    /// re-ordered accordingly. Inheritance and suspension overrides stay in
    /// force. Only valid for dynamic algorithms.
    pub fn calculate_queue_priorities(
        &self,
        queue: &JobQueue,
        jobs: &mut JobTable,
        tasks: &TaskSet,
        now: Time,
    ) -> Result<JobQueue> {
        self.require(PriorityType::Dynamic, "job-level priorities")?;
        for id in queue.iter() {
            let priority = self.algorithm.job_priority(&jobs[id], tasks, now)?;
            jobs[id].set_base_priority(priority);
        }
        let mut recomputed = queue.clone();
        recomputed.refresh(|id| jobs[id].current_priority);
        Ok(recomputed)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("algorithm", &self.name())
            .finish()
    }
}
