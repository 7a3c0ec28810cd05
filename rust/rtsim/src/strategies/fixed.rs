//! Fixed-priority algorithms: rate monotonic and deadline monotonic.

use crate::error::Result;
use crate::scheduler::{PriorityType, SchedulingAlgorithm, SchedulingType};
use crate::task::TaskSet;
use crate::types::{Priority, TaskId, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedOrder {
    /// Shorter period first.
    RateMonotonic,
    /// Shorter relative deadline first.
    DeadlineMonotonic,
}

/// Ranks tasks once; rank 0 is the highest priority. Ties go to the more
/// critical task, then to declaration order.
#[derive(Debug, Clone)]
pub struct FixedPriority {
    name: String,
    order: FixedOrder,
    scheduling: SchedulingType,
}

impl FixedPriority {
    pub fn new(name: &str, order: FixedOrder, scheduling: SchedulingType) -> Self {
        FixedPriority {
            name: name.to_string(),
            order,
            scheduling,
        }
    }

    fn key(&self, period: Time, deadline: Time) -> Time {
        match self.order {
            FixedOrder::RateMonotonic => period,
            FixedOrder::DeadlineMonotonic => deadline,
        }
    }
}

impl SchedulingAlgorithm for FixedPriority {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority_type(&self) -> PriorityType {
        PriorityType::Fixed
    }

    fn scheduling_type(&self) -> SchedulingType {
        self.scheduling
    }

    fn task_priorities(&self, tasks: &mut TaskSet) -> Result<()> {
        let mut ranked: Vec<(Time, std::cmp::Reverse<u8>, TaskId)> = tasks
            .iter()
            .map(|t| {
                (
                    self.key(t.period, t.deadline),
                    std::cmp::Reverse(t.criticality),
                    t.id,
                )
            })
            .collect();
        ranked.sort();
        for (rank, (_, _, id)) in ranked.into_iter().enumerate() {
            tasks.get_mut(id).priority = Priority(rank as i64);
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn SchedulingAlgorithm> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskDef;

    #[test]
    fn rate_monotonic_ranks_by_period() {
        let mut tasks = TaskSet::from_defs(&[
            TaskDef::periodic("slow", 50, 5),
            TaskDef::periodic("fast", 10, 2),
            TaskDef::periodic("mid", 20, 2).criticality(1),
            TaskDef::periodic("mid-lo", 20, 2),
        ]);
        let rms = FixedPriority::new("rms", FixedOrder::RateMonotonic, SchedulingType::Partition);
        rms.task_priorities(&mut tasks).unwrap();
        let prio = |i: u32| tasks.get(TaskId(i)).priority;
        assert_eq!(prio(1), Priority(0));
        assert_eq!(prio(2), Priority(1), "criticality breaks the tie");
        assert_eq!(prio(3), Priority(2));
        assert_eq!(prio(0), Priority(3));
    }

    #[test]
    fn deadline_monotonic_ranks_by_deadline() {
        let mut tasks = TaskSet::from_defs(&[
            TaskDef::periodic("a", 10, 2).deadline(9),
            TaskDef::periodic("b", 20, 2).deadline(5),
        ]);
        let dm = FixedPriority::new("dm", FixedOrder::DeadlineMonotonic, SchedulingType::Global);
        dm.task_priorities(&mut tasks).unwrap();
        assert!(tasks
            .get(TaskId(1))
            .priority
            .is_higher(tasks.get(TaskId(0)).priority));
    }
}
