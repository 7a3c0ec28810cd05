//! Shared simulation state handed to strategies.

use crate::coreset::CoreSet;
use crate::job::JobTable;
use crate::task::{SharedResourceSet, TaskSet};
use crate::types::Time;

/// Everything a strategy may read or mutate during a hook: the clock, the
/// task and resource sets, every released job, and the core sets.
///
/// Queues and cores are not part of it; they stay owned by the processor
/// and are only changed through engine calls.
#[derive(Debug)]
pub struct SimState {
    pub time: Time,
    pub tick: Time,
    pub tasks: TaskSet,
    pub resources: SharedResourceSet,
    pub jobs: JobTable,
    pub core_sets: Vec<CoreSet>,
}

impl SimState {
    /// Highest speed available anywhere; one tick at this speed yields one
    /// unit of progress.
    pub fn max_speed(&self) -> f64 {
        self.core_sets
            .iter()
            .map(CoreSet::max_speed)
            .fold(0.0, f64::max)
    }
}
