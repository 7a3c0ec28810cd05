//! Utilisation-based bin-packing partitioners.

use crate::partition::{core_loads, PartitionAlgorithm};
use crate::task::TaskSet;
use crate::types::CoreId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitRule {
    /// First core with room.
    FirstFit,
    /// Least-loaded core.
    WorstFit,
}

/// Places tasks in declaration order. A task that fits nowhere goes to the
/// least-loaded core.
#[derive(Debug, Clone)]
pub struct FitPartitioner {
    name: String,
    rule: FitRule,
}

impl FitPartitioner {
    pub fn new(name: &str, rule: FitRule) -> Self {
        FitPartitioner {
            name: name.to_string(),
            rule,
        }
    }
}

fn least_loaded(loads: &[f64]) -> usize {
    loads
        .iter()
        .enumerate()
        .fold(0, |best, (i, &l)| if l < loads[best] { i } else { best })
}

impl PartitionAlgorithm for FitPartitioner {
    fn name(&self) -> &str {
        &self.name
    }

    fn task_to_core(&self, cores: &[CoreId], tasks: &mut TaskSet) {
        if cores.is_empty() {
            return;
        }
        let mut loads = core_loads(cores, tasks);
        for task in tasks.iter_mut() {
            if task.local_core.is_some_and(|c| cores.contains(&c)) {
                continue;
            }
            let u = task.utilization();
            let slot = match self.rule {
                FitRule::FirstFit => loads
                    .iter()
                    .position(|&l| l + u <= 1.0)
                    .unwrap_or_else(|| least_loaded(&loads)),
                FitRule::WorstFit => least_loaded(&loads),
            };
            loads[slot] += u;
            task.local_core = Some(cores[slot]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskDef;
    use crate::types::TaskId;

    fn tasks() -> TaskSet {
        TaskSet::from_defs(&[
            TaskDef::periodic("a", 10, 6),
            TaskDef::periodic("b", 10, 3),
            TaskDef::periodic("c", 10, 5),
            TaskDef::periodic("pinned", 10, 2).on_core(CoreId(1)),
        ])
    }

    fn placement(tasks: &TaskSet) -> Vec<Option<u32>> {
        (0..tasks.len() as u32)
            .map(|i| tasks.get(TaskId(i)).local_core.map(|c| c.0))
            .collect()
    }

    #[test]
    fn first_fit_fills_in_order() {
        let mut ts = tasks();
        FitPartitioner::new("first-fit", FitRule::FirstFit)
            .task_to_core(&[CoreId(0), CoreId(1)], &mut ts);
        assert_eq!(placement(&ts), vec![Some(0), Some(0), Some(1), Some(1)]);
    }

    #[test]
    fn worst_fit_balances() {
        let mut ts = tasks();
        FitPartitioner::new("worst-fit", FitRule::WorstFit)
            .task_to_core(&[CoreId(0), CoreId(1)], &mut ts);
        // Core 1 starts at 0.2 from the pinned task.
        assert_eq!(placement(&ts), vec![Some(0), Some(1), Some(1), Some(1)]);
    }

    #[test]
    fn single_core_takes_everything() {
        let mut ts = tasks();
        FitPartitioner::new("first-fit", FitRule::FirstFit).task_to_core(&[CoreId(0)], &mut ts);
        assert!(placement(&ts).iter().all(|c| *c == Some(0)));
    }
}
