//! Task-to-core assignment for single-core and partitioned scheduling.

use crate::task::TaskSet;
use crate::types::CoreId;

/// Assigns `Task::local_core` for every task that is not already pinned.
pub trait PartitionAlgorithm: Send {
    fn name(&self) -> &str;

    fn task_to_core(&self, cores: &[CoreId], tasks: &mut TaskSet);
}

/// Utilisation already placed on each of `cores` by pinned tasks.
pub fn core_loads(cores: &[CoreId], tasks: &TaskSet) -> Vec<f64> {
    cores
        .iter()
        .map(|&core| tasks.core_utilization(core))
        .collect()
}
