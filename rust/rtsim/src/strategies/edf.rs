//! Earliest deadline first.

use crate::error::Result;
use crate::job::Job;
use crate::scheduler::{PriorityType, SchedulingAlgorithm, SchedulingType};
use crate::task::TaskSet;
use crate::types::{Priority, Time};

#[derive(Debug, Clone)]
pub struct EarliestDeadlineFirst {
    name: String,
    scheduling: SchedulingType,
}

impl EarliestDeadlineFirst {
    pub fn new(name: &str, scheduling: SchedulingType) -> Self {
        EarliestDeadlineFirst {
            name: name.to_string(),
            scheduling,
        }
    }
}

impl SchedulingAlgorithm for EarliestDeadlineFirst {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority_type(&self) -> PriorityType {
        PriorityType::Dynamic
    }

    fn scheduling_type(&self) -> SchedulingType {
        self.scheduling
    }

    fn job_priority(&self, job: &Job, _tasks: &TaskSet, _now: Time) -> Result<Priority> {
        Ok(Priority(job.absolute_deadline as i64))
    }

    fn clone_box(&self) -> Box<dyn SchedulingAlgorithm> {
        Box::new(self.clone())
    }
}
