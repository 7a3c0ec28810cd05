//! Resource-access protocols: no control, plain mutual exclusion, and
//! priority inheritance.
//!
//! Under mutual exclusion a resource grants up to `quantity` holders; a
//! job re-requesting a resource it already holds is granted. A blocked job
//! is suspended so the rest of its queue can run, and resumed once the
//! resource it waits on is released. With inheritance enabled, every holder
//! runs at the highest priority among the jobs waiting on its resources.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::controller::ConcurrencyControlProtocol;
use crate::state::SimState;
use crate::types::{JobId, Priority, ResourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockingMode {
    /// Every request is granted; contention is ignored.
    Unchecked,
    Mutex,
    Inheritance,
}

#[derive(Debug)]
pub struct LockingProtocol {
    name: String,
    mode: LockingMode,
    holders: BTreeMap<ResourceId, Vec<JobId>>,
    waiters: BTreeMap<ResourceId, Vec<JobId>>,
    inheriting: BTreeSet<JobId>,
}

impl LockingProtocol {
    pub fn new(name: &str, mode: LockingMode) -> Self {
        LockingProtocol {
            name: name.to_string(),
            mode,
            holders: BTreeMap::new(),
            waiters: BTreeMap::new(),
            inheriting: BTreeSet::new(),
        }
    }

    pub fn holders(&self, resource: ResourceId) -> &[JobId] {
        self.holders.get(&resource).map_or(&[], Vec::as_slice)
    }

    pub fn waiters(&self, resource: ResourceId) -> &[JobId] {
        self.waiters.get(&resource).map_or(&[], Vec::as_slice)
    }

    fn forget_waiter(&mut self, job: JobId) {
        for waiting in self.waiters.values_mut() {
            waiting.retain(|&j| j != job);
        }
    }

    /// Resume every job waiting on `resource`; they retry on their next
    /// attempt to run.
    fn wake_waiters(&mut self, resource: ResourceId, state: &mut SimState) {
        if let Some(waiting) = self.waiters.remove(&resource) {
            for job in waiting {
                state.jobs[job].resume();
                trace!(job = job.0, resource = resource.0, "wake");
            }
        }
    }

    /// Recompute inherited priorities of all holders.
    fn update_inheritance(&mut self, state: &mut SimState) {
        if self.mode != LockingMode::Inheritance {
            return;
        }
        let mut inherited: BTreeMap<JobId, Priority> = BTreeMap::new();
        for (resource, holders) in &self.holders {
            let Some(best) = self
                .waiters
                .get(resource)
                .into_iter()
                .flatten()
                .map(|&w| state.jobs[w].original_priority)
                .max()
            else {
                continue;
            };
            for &holder in holders {
                let entry = inherited.entry(holder).or_insert(best);
                *entry = (*entry).max(best);
            }
        }

        for job in std::mem::take(&mut self.inheriting) {
            if !inherited.contains_key(&job) {
                state.jobs[job].clear_inheritance();
            }
        }
        for (job, priority) in inherited {
            let j = &mut state.jobs[job];
            if priority.is_higher(j.original_priority) {
                j.inherit(priority);
                self.inheriting.insert(job);
            } else if j.is_inherited() {
                j.clear_inheritance();
            }
        }
    }

    fn release_job(&mut self, job: JobId, state: &mut SimState) {
        self.forget_waiter(job);
        let held: Vec<ResourceId> = self
            .holders
            .iter()
            .filter(|(_, h)| h.contains(&job))
            .map(|(&r, _)| r)
            .collect();
        for resource in held {
            if let Some(h) = self.holders.get_mut(&resource) {
                h.retain(|&j| j != job);
            }
            self.wake_waiters(resource, state);
        }
        let j = &mut state.jobs[job];
        j.resume();
        if j.is_inherited() {
            j.clear_inheritance();
        }
        self.inheriting.remove(&job);
        self.update_inheritance(state);
    }
}

impl ConcurrencyControlProtocol for LockingProtocol {
    fn name(&self) -> &str {
        &self.name
    }

    fn pre_action(&mut self, state: &mut SimState) {
        self.holders = state.resources.iter().map(|r| (r.id, Vec::new())).collect();
        self.waiters.clear();
        self.inheriting.clear();
    }

    fn check_job_lock(
        &mut self,
        job: JobId,
        resource: ResourceId,
        state: &mut SimState,
    ) -> Option<ResourceId> {
        if self.mode == LockingMode::Unchecked {
            return None;
        }
        let quantity = state.resources.get(resource).quantity as usize;
        let holders = self.holders.entry(resource).or_default();
        if holders.contains(&job) || holders.len() < quantity {
            holders.push(job);
            self.forget_waiter(job);
            state.jobs[job].resume();
            self.update_inheritance(state);
            None
        } else {
            Some(resource)
        }
    }

    fn job_blocked(&mut self, job: JobId, resource: ResourceId, state: &mut SimState) {
        let waiting = self.waiters.entry(resource).or_default();
        if !waiting.contains(&job) {
            waiting.push(job);
        }
        state.jobs[job].suspend();
        self.update_inheritance(state);
    }

    fn job_unlock(&mut self, job: JobId, resource: ResourceId, state: &mut SimState) {
        if self.mode == LockingMode::Unchecked {
            return;
        }
        if let Some(holders) = self.holders.get_mut(&resource) {
            if let Some(pos) = holders.iter().position(|&j| j == job) {
                holders.remove(pos);
            }
        }
        self.wake_waiters(resource, state);
        self.update_inheritance(state);
    }

    fn job_completed(&mut self, job: JobId, state: &mut SimState) {
        self.release_job(job, state);
    }

    fn job_missed_deadline(&mut self, job: JobId, state: &mut SimState) {
        self.release_job(job, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, JobTable};
    use crate::task::{ResourceDef, SharedResourceSet, TaskDef, TaskSet};
    use crate::types::TaskId;

    fn state(priorities: &[i64]) -> SimState {
        let defs: Vec<TaskDef> = priorities
            .iter()
            .enumerate()
            .map(|(i, _)| {
                TaskDef::periodic(&format!("t{i}"), 100, 10).critical_section(
                    ResourceId(0),
                    1,
                    5,
                )
            })
            .collect();
        let tasks = TaskSet::from_defs(&defs);
        let resources = SharedResourceSet::new(
            &[ResourceDef {
                name: "r".into(),
                quantity: 1,
            }],
            &tasks,
        );
        let mut jobs = JobTable::new();
        for (i, &p) in priorities.iter().enumerate() {
            let mut job = Job::new(jobs.next_id(), tasks.get(TaskId(i as u32)), 0, 1.0);
            job.set_base_priority(Priority(p));
            jobs.push(job);
        }
        SimState {
            time: 0,
            tick: 1,
            tasks,
            resources,
            jobs,
            core_sets: Vec::new(),
        }
    }

    #[test]
    fn mutex_blocks_second_holder_and_wakes_on_unlock() {
        let mut st = state(&[5, 1]);
        let mut p = LockingProtocol::new("mutex", LockingMode::Mutex);
        p.pre_action(&mut st);
        let r = ResourceId(0);

        assert_eq!(p.check_job_lock(JobId(0), r, &mut st), None);
        assert_eq!(p.check_job_lock(JobId(1), r, &mut st), Some(r));
        p.job_blocked(JobId(1), r, &mut st);
        assert!(st.jobs[JobId(1)].is_suspended());
        assert_eq!(st.jobs[JobId(1)].current_priority, Priority::LOWEST);
        assert!(!st.jobs[JobId(0)].is_inherited(), "mutex never inherits");

        p.job_unlock(JobId(0), r, &mut st);
        assert!(!st.jobs[JobId(1)].is_suspended());
        assert_eq!(p.check_job_lock(JobId(1), r, &mut st), None);
        assert_eq!(p.holders(r), &[JobId(1)]);
        assert!(p.waiters(r).is_empty());
    }

    #[test]
    fn holder_inherits_highest_waiter_priority() {
        let mut st = state(&[9, 4, 1]);
        let mut p = LockingProtocol::new("pip", LockingMode::Inheritance);
        p.pre_action(&mut st);
        let r = ResourceId(0);

        assert_eq!(p.check_job_lock(JobId(0), r, &mut st), None);
        for waiter in [JobId(1), JobId(2)] {
            assert_eq!(p.check_job_lock(waiter, r, &mut st), Some(r));
            p.job_blocked(waiter, r, &mut st);
        }
        assert_eq!(st.jobs[JobId(0)].current_priority, Priority(1));
        assert_eq!(st.jobs[JobId(0)].original_priority, Priority(9));

        p.job_unlock(JobId(0), r, &mut st);
        assert_eq!(st.jobs[JobId(0)].current_priority, Priority(9));
        assert!(!st.jobs[JobId(0)].is_inherited());
    }

    #[test]
    fn unchecked_grants_everything() {
        let mut st = state(&[1, 2]);
        let mut p = LockingProtocol::new("none", LockingMode::Unchecked);
        p.pre_action(&mut st);
        assert_eq!(p.check_job_lock(JobId(0), ResourceId(0), &mut st), None);
        assert_eq!(p.check_job_lock(JobId(1), ResourceId(0), &mut st), None);
    }

    #[test]
    fn completion_releases_everything() {
        let mut st = state(&[5, 1]);
        let mut p = LockingProtocol::new("pip", LockingMode::Inheritance);
        p.pre_action(&mut st);
        let r = ResourceId(0);
        p.check_job_lock(JobId(0), r, &mut st);
        p.check_job_lock(JobId(1), r, &mut st);
        p.job_blocked(JobId(1), r, &mut st);

        p.job_missed_deadline(JobId(0), &mut st);
        assert!(p.holders(r).is_empty());
        assert!(!st.jobs[JobId(1)].is_suspended());
        assert!(!st.jobs[JobId(0)].is_inherited());
    }
}
