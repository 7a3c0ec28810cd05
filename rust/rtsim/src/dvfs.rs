//! DVFS framework.
//!
//! [`DynamicVoltageRegulator`] forwards engine events to the installed
//! [`DvfsMethod`] without any bookkeeping of its own. Methods change speeds
//! by calling back into the core sets held by [`SimState`].

use serde::{Deserialize, Serialize};

use crate::cpu::Core;
use crate::state::SimState;
use crate::types::{CoreId, JobId, ResourceId, Time};

/// Granularity of speed control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DvfsType {
    /// One speed for the whole chip.
    #[default]
    FullChip,
    PerCore,
    /// Explicitly configured groups of cores.
    VoltageIsland,
}

/// A DVFS policy. Every hook defaults to a no-op.
pub trait DvfsMethod: Send {
    fn name(&self) -> &str;

    /// Called once before the run to set up each core set's speed table and
    /// initial level.
    fn defined_speed(&mut self, _dvfs_type: DvfsType, _state: &mut SimState) {}

    fn job_arrives_processor(&mut self, _job: JobId, _state: &mut SimState) {}

    fn job_arrives_core(&mut self, _job: JobId, _core: CoreId, _state: &mut SimState) {}

    fn job_first_execute(&mut self, _job: JobId, _state: &mut SimState) {}

    fn job_every_execute(&mut self, _job: JobId, _state: &mut SimState) {}

    fn job_lock(&mut self, _job: JobId, _resource: ResourceId, _state: &mut SimState) {}

    fn job_unlock(&mut self, _job: JobId, _resource: ResourceId, _state: &mut SimState) {}

    fn job_blocked(&mut self, _job: JobId, _resource: ResourceId, _state: &mut SimState) {}

    fn job_completed(&mut self, _job: JobId, _state: &mut SimState) {}

    fn job_missed_deadline(&mut self, _job: JobId, _state: &mut SimState) {}

    /// Every tick, after all cores picked their status and before speeds
    /// are updated.
    fn cores_execute(&mut self, _cores: &[Core], _state: &mut SimState) {}

    /// Every tick, last.
    fn end_system_time(&mut self, _now: Time, _state: &mut SimState) {}
}

pub struct DynamicVoltageRegulator {
    method: Box<dyn DvfsMethod>,
    dvfs_type: DvfsType,
}

impl DynamicVoltageRegulator {
    pub fn new(method: Box<dyn DvfsMethod>, dvfs_type: DvfsType) -> Self {
        DynamicVoltageRegulator { method, dvfs_type }
    }

    pub fn name(&self) -> &str {
        self.method.name()
    }

    pub fn dvfs_type(&self) -> DvfsType {
        self.dvfs_type
    }

    pub fn defined_speed(&mut self, state: &mut SimState) {
        self.method.defined_speed(self.dvfs_type, state);
    }

    pub fn job_arrives_processor(&mut self, job: JobId, state: &mut SimState) {
        self.method.job_arrives_processor(job, state);
    }

    pub fn job_arrives_core(&mut self, job: JobId, core: CoreId, state: &mut SimState) {
        self.method.job_arrives_core(job, core, state);
    }

    pub fn job_first_execute(&mut self, job: JobId, state: &mut SimState) {
        self.method.job_first_execute(job, state);
    }

    pub fn job_every_execute(&mut self, job: JobId, state: &mut SimState) {
        self.method.job_every_execute(job, state);
    }

    pub fn job_lock(&mut self, job: JobId, resource: ResourceId, state: &mut SimState) {
        self.method.job_lock(job, resource, state);
    }

    pub fn job_unlock(&mut self, job: JobId, resource: ResourceId, state: &mut SimState) {
        self.method.job_unlock(job, resource, state);
    }

    pub fn job_blocked(&mut self, job: JobId, resource: ResourceId, state: &mut SimState) {
        self.method.job_blocked(job, resource, state);
    }

    pub fn job_completed(&mut self, job: JobId, state: &mut SimState) {
        self.method.job_completed(job, state);
    }

    pub fn job_missed_deadline(&mut self, job: JobId, state: &mut SimState) {
        self.method.job_missed_deadline(job, state);
    }

    pub fn check_cores_execute(&mut self, cores: &[Core], state: &mut SimState) {
        self.method.cores_execute(cores, state);
    }

    pub fn check_end_system_time(&mut self, now: Time, state: &mut SimState) {
        self.method.end_system_time(now, state);
    }
}

impl std::fmt::Debug for DynamicVoltageRegulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicVoltageRegulator")
            .field("method", &self.name())
            .field("dvfs_type", &self.dvfs_type)
            .finish()
    }
}
