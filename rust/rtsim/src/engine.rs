//! Simulation driver.
//!
//! [`Simulator::run`] builds a [`Processor`] from a scenario, lets it
//! partition tasks and initialise its strategies, steps it tick by tick up
//! to the horizon and collects the timelines and deadline misses.

use rayon::prelude::*;
use tracing::info;

use crate::controller::{ConcurrencyControlProtocol, ConcurrencyController, ControllerStats};
use crate::dvfs::{DvfsMethod, DynamicVoltageRegulator};
use crate::error::Result;
use crate::fmt::{set_sim_clock, set_sim_core};
use crate::job::{Job, JobTable};
use crate::partition::PartitionAlgorithm;
use crate::processor::Processor;
use crate::registry;
use crate::scenario::Scenario;
use crate::scheduler::{Scheduler, SchedulingAlgorithm};
use crate::stats::Summary;
use crate::task::TaskSet;
use crate::trace::{MissDeadlineInfo, Timeline};
use crate::types::{CoreId, JobId, TaskId, Time};

/// The four pluggable strategies of a run.
pub struct Strategies {
    pub scheduler: Box<dyn SchedulingAlgorithm>,
    pub protocol: Box<dyn ConcurrencyControlProtocol>,
    pub dvfs: Box<dyn DvfsMethod>,
    pub partitioner: Box<dyn PartitionAlgorithm>,
}

impl Strategies {
    /// Look every strategy up in the registry.
    pub fn by_name(scheduler: &str, protocol: &str, dvfs: &str, partitioner: &str) -> Result<Self> {
        Ok(Strategies {
            scheduler: registry::scheduler(scheduler)?,
            protocol: registry::protocol(protocol)?,
            dvfs: registry::dvfs(dvfs)?,
            partitioner: registry::partitioner(partitioner)?,
        })
    }

    /// `scheduler` with no resource control, full speed and first-fit
    /// placement.
    pub fn with_scheduler(scheduler: &str) -> Result<Self> {
        Self::by_name(scheduler, "none", "none", "first-fit")
    }

    pub fn protocol(mut self, protocol: Box<dyn ConcurrencyControlProtocol>) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn dvfs(mut self, dvfs: Box<dyn DvfsMethod>) -> Self {
        self.dvfs = dvfs;
        self
    }

    pub fn partitioner(mut self, partitioner: Box<dyn PartitionAlgorithm>) -> Self {
        self.partitioner = partitioner;
        self
    }
}

/// One simulation run. Consumed by [`Simulator::run`].
pub struct Simulator {
    strategies: Strategies,
}

impl Simulator {
    pub fn new(strategies: Strategies) -> Self {
        Simulator { strategies }
    }

    /// Run a scenario to its horizon.
    pub fn run(self, scenario: &Scenario) -> Result<SimulationResult> {
        scenario.validate()?;
        let Strategies {
            scheduler,
            protocol,
            dvfs,
            partitioner,
        } = self.strategies;

        let mut processor = Processor::new(
            scenario,
            Scheduler::new(scheduler),
            ConcurrencyController::new(protocol),
            DynamicVoltageRegulator::new(dvfs, scenario.dvfs_type),
            partitioner,
        );
        set_sim_clock(0);
        set_sim_core(None);
        info!(
            scheduler = processor.scheduler.name(),
            protocol = processor.controller.name(),
            dvfs = processor.regulator.name(),
            cores = scenario.nr_cores,
            tasks = scenario.tasks.len(),
            utilization = processor.state.tasks.total_utilization(),
            horizon = scenario.config.horizon,
            "start"
        );

        processor.prepare()?;
        let horizon = scenario.config.horizon;
        while processor.state.time < horizon {
            processor.execute()?;
        }
        processor.finish();

        info!(
            jobs = processor.state.jobs.len(),
            misses = processor.misses.len(),
            "finish"
        );

        Ok(SimulationResult {
            horizon: processor.state.time,
            timelines: processor.cores.into_iter().map(|c| c.timeline).collect(),
            misses: processor.misses,
            stats: processor.controller.stats,
            tasks: processor.state.tasks,
            jobs: processor.state.jobs,
        })
    }
}

/// Run independent simulations in parallel. Results keep the input order.
pub fn run_batch(runs: Vec<(Simulator, Scenario)>) -> Vec<Result<SimulationResult>> {
    runs.into_par_iter()
        .map(|(sim, scenario)| sim.run(&scenario))
        .collect()
}

/// Everything observable about a finished run.
#[derive(Debug)]
pub struct SimulationResult {
    /// Time the run stopped at.
    pub horizon: Time,
    /// One per core, in core-id order.
    pub timelines: Vec<Timeline>,
    pub misses: Vec<MissDeadlineInfo>,
    pub stats: ControllerStats,
    pub tasks: TaskSet,
    pub jobs: JobTable,
}

impl SimulationResult {
    pub fn timeline(&self, core: CoreId) -> &Timeline {
        &self.timelines[core.index()]
    }

    pub fn job(&self, id: JobId) -> &Job {
        &self.jobs[id]
    }

    pub fn jobs_of(&self, task: TaskId) -> Vec<&Job> {
        self.jobs.of_task(task).collect()
    }

    pub fn total_energy(&self) -> f64 {
        self.timelines.iter().map(Timeline::total_energy).sum()
    }

    /// Ticks `job` executed, summed over every core.
    pub fn executed_time(&self, job: JobId) -> Time {
        self.timelines.iter().map(|t| t.job_time(job)).sum()
    }

    pub fn summary(&self) -> Summary {
        Summary::from_result(self)
    }

    /// Pretty-print every timeline for debugging.
    pub fn dump(&self) {
        for timeline in &self.timelines {
            timeline.dump();
        }
        for miss in &self.misses {
            eprintln!(
                "miss  t={} task={} job={} core={:?}",
                miss.time, miss.task, miss.job, miss.core
            );
        }
    }
}
