//! Static task model: periodic tasks, their critical sections and the
//! shared resources they lock.

use serde::{Deserialize, Serialize};

use crate::types::{CoreId, Priority, ResourceId, TaskId, Time};

/// A region of a job's execution during which it holds a shared resource.
///
/// Offsets are in job-progress units: the section is entered once the job
/// has completed `start` units of work and left once it has completed `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalSection {
    pub resource: ResourceId,
    pub start: Time,
    pub end: Time,
}

/// Definition of a periodic task for scenario creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDef {
    pub name: String,
    pub period: Time,
    /// Relative deadline. Defaults to the period when built via
    /// [`TaskDef::periodic`].
    pub deadline: Time,
    /// Worst-case execution time at the processor's highest speed.
    pub computation: Time,
    /// Time of the first release.
    #[serde(default)]
    pub enter_time: Time,
    #[serde(default)]
    pub critical_sections: Vec<CriticalSection>,
    /// Pin the task to a core. Partitioners leave pinned tasks alone, and
    /// under hybrid scheduling pinned jobs never visit the global queue.
    #[serde(default)]
    pub local_core: Option<CoreId>,
    /// Mixed-criticality level; higher is more critical. Fixed-priority
    /// algorithms use it to break ties.
    #[serde(default)]
    pub criticality: u8,
}

impl TaskDef {
    /// Implicit-deadline periodic task released at time zero.
    pub fn periodic(name: &str, period: Time, computation: Time) -> Self {
        TaskDef {
            name: name.to_string(),
            period,
            deadline: period,
            computation,
            enter_time: 0,
            critical_sections: Vec::new(),
            local_core: None,
            criticality: 0,
        }
    }

    pub fn deadline(mut self, deadline: Time) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn enter_time(mut self, enter_time: Time) -> Self {
        self.enter_time = enter_time;
        self
    }

    pub fn critical_section(mut self, resource: ResourceId, start: Time, end: Time) -> Self {
        self.critical_sections.push(CriticalSection {
            resource,
            start,
            end,
        });
        self
    }

    pub fn on_core(mut self, core: CoreId) -> Self {
        self.local_core = Some(core);
        self
    }

    pub fn criticality(mut self, level: u8) -> Self {
        self.criticality = level;
        self
    }
}

/// A periodic task at runtime.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub period: Time,
    pub deadline: Time,
    pub computation: Time,
    pub enter_time: Time,
    pub criticality: u8,
    /// Fixed priority, assigned once by a task-level algorithm.
    pub priority: Priority,
    pub critical_sections: Vec<CriticalSection>,
    /// Assigned core for single-core and partitioned scheduling.
    pub local_core: Option<CoreId>,
}

impl Task {
    pub fn new(id: TaskId, def: &TaskDef) -> Self {
        Task {
            id,
            name: def.name.clone(),
            period: def.period,
            deadline: def.deadline,
            computation: def.computation,
            enter_time: def.enter_time,
            criticality: def.criticality,
            priority: Priority::LOWEST,
            critical_sections: def.critical_sections.clone(),
            local_core: def.local_core,
        }
    }

    pub fn utilization(&self) -> f64 {
        self.computation as f64 / self.period as f64
    }

    /// Whether a job of this task is released at `now`.
    pub fn releases_at(&self, now: Time) -> bool {
        now >= self.enter_time && (now - self.enter_time) % self.period == 0
    }

    pub fn uses(&self, resource: ResourceId) -> bool {
        self.critical_sections
            .iter()
            .any(|cs| cs.resource == resource)
    }
}

/// All tasks of a scenario, indexed by [`TaskId`].
#[derive(Debug, Clone, Default)]
pub struct TaskSet {
    tasks: Vec<Task>,
}

impl TaskSet {
    pub fn from_defs(defs: &[TaskDef]) -> Self {
        let tasks = defs
            .iter()
            .enumerate()
            .map(|(i, def)| Task::new(TaskId(i as u32), def))
            .collect();
        TaskSet { tasks }
    }

    pub fn get(&self, id: TaskId) -> &Task {
        &self.tasks[id.index()]
    }

    pub fn get_mut(&mut self, id: TaskId) -> &mut Task {
        &mut self.tasks[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.tasks.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn total_utilization(&self) -> f64 {
        self.tasks.iter().map(Task::utilization).sum()
    }

    /// Utilisation of the tasks assigned to `core`.
    pub fn core_utilization(&self, core: CoreId) -> f64 {
        self.tasks
            .iter()
            .filter(|t| t.local_core == Some(core))
            .map(Task::utilization)
            .sum()
    }
}

/// A named resource with a fixed number of instances.
///
/// Who holds which instance is tracked by the concurrency-control protocol,
/// not here.
#[derive(Debug, Clone)]
pub struct SharedResource {
    pub id: ResourceId,
    pub name: String,
    pub quantity: u32,
    /// Tasks with at least one critical section on this resource.
    pub accessed_by: Vec<TaskId>,
}

/// Definition of a shared resource for scenario creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDef {
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, Default)]
pub struct SharedResourceSet {
    resources: Vec<SharedResource>,
}

impl SharedResourceSet {
    pub fn new(defs: &[ResourceDef], tasks: &TaskSet) -> Self {
        let resources = defs
            .iter()
            .enumerate()
            .map(|(i, def)| {
                let id = ResourceId(i as u32);
                SharedResource {
                    id,
                    name: def.name.clone(),
                    quantity: def.quantity,
                    accessed_by: tasks.iter().filter(|t| t.uses(id)).map(|t| t.id).collect(),
                }
            })
            .collect();
        SharedResourceSet { resources }
    }

    pub fn get(&self, id: ResourceId) -> &SharedResource {
        &self.resources[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &SharedResource> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
