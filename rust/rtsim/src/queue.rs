//! Priority-ordered ready queue.
//!
//! Jobs are keyed by `(priority, insertion order)`, so equal priorities
//! dequeue FIFO. Priorities live in the job table and may change under the
//! queue (inheritance, suspension, per-tick recomputation); [`JobQueue::refresh`]
//! re-keys the entries and must run before the head is trusted again.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::types::{JobId, Priority};

type Key = (Reverse<Priority>, u64);

#[derive(Debug, Clone, Default)]
pub struct JobQueue {
    entries: BTreeMap<Key, JobId>,
    /// Monotonic counter for insertion ordering.
    insertion_counter: u64,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, job: JobId, priority: Priority) {
        debug_assert!(!self.contains(job), "job {job} queued twice");
        let order = self.insertion_counter;
        self.insertion_counter += 1;
        self.entries.insert((Reverse(priority), order), job);
    }

    /// Highest-priority job without removing it.
    pub fn peek(&self) -> Option<JobId> {
        self.entries.values().next().copied()
    }

    /// Remove and return the highest-priority job.
    pub fn poll(&mut self) -> Option<JobId> {
        let (&key, &job) = self.entries.iter().next()?;
        self.entries.remove(&key);
        Some(job)
    }

    /// Remove a specific job. Returns true if found.
    pub fn remove(&mut self, job: JobId) -> bool {
        match self
            .entries
            .iter()
            .find_map(|(k, &v)| (v == job).then_some(*k))
        {
            Some(key) => {
                self.entries.remove(&key);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, job: JobId) -> bool {
        self.entries.values().any(|&j| j == job)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Jobs in priority order.
    pub fn iter(&self) -> impl Iterator<Item = JobId> + '_ {
        self.entries.values().copied()
    }

    pub fn ordered_ids(&self) -> Vec<JobId> {
        self.iter().collect()
    }

    /// Re-key every entry with its current priority, keeping the relative
    /// insertion order among equal priorities.
    pub fn refresh(&mut self, priority_of: impl Fn(JobId) -> Priority) {
        let entries = std::mem::take(&mut self.entries);
        self.entries = entries
            .into_iter()
            .map(|((_, order), job)| ((Reverse(priority_of(job)), order), job))
            .collect();
    }

    /// Remove every job matching `pred`, returned in priority order.
    ///
    /// Two passes: partition into removed and kept, then swap the kept
    /// entries in as the new queue. Kept jobs preserve their order.
    pub fn split_off_where(&mut self, mut pred: impl FnMut(JobId) -> bool) -> Vec<JobId> {
        let mut removed = Vec::new();
        let mut kept = BTreeMap::new();
        for (key, job) in std::mem::take(&mut self.entries) {
            if pred(job) {
                removed.push(job);
            } else {
                kept.insert(key, job);
            }
        }
        self.entries = kept;
        removed
    }
}
