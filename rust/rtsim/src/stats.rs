//! Post-run analysis of a [`SimulationResult`].
//!
//! # Metrics
//!
//! - **Per core**: busy, idle, waiting and switching time, utilisation,
//!   energy.
//! - **Per task**: released, completed and missed jobs, response-time
//!   distribution, blocking ratio (blocking time over response time).
//! - **Totals**: energy, deadline misses, controller hook counts.

use std::fmt;

use serde::Serialize;

use crate::controller::ControllerStats;
use crate::engine::SimulationResult;
use crate::job::JobStatus;
use crate::trace::CoreStatus;
use crate::types::{CoreId, TaskId, Time};

/// Summary statistics for a distribution of values.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DistributionStats {
    pub count: usize,
    /// Minimum value (or 0 if empty).
    pub min: Time,
    /// Maximum value (or 0 if empty).
    pub max: Time,
    pub sum: Time,
}

impl DistributionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: Time) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    /// Mean value (or 0 if empty).
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoreStats {
    pub core: CoreId,
    pub busy: Time,
    pub idle: Time,
    pub wait: Time,
    /// Context switches and migrations.
    pub switching: Time,
    pub utilization: f64,
    pub energy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskStats {
    pub task: TaskId,
    pub name: String,
    pub released: usize,
    pub completed: usize,
    pub missed: usize,
    pub response_time: DistributionStats,
    pub blocking_time: Time,
    /// Blocking time over response time of completed jobs.
    pub blocking_ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub horizon: Time,
    pub cores: Vec<CoreStats>,
    pub tasks: Vec<TaskStats>,
    pub total_energy: f64,
    pub deadline_misses: usize,
    pub controller: ControllerStats,
}

impl Summary {
    pub fn from_result(result: &SimulationResult) -> Self {
        let horizon = result.horizon;
        let cores = result
            .timelines
            .iter()
            .map(|tl| {
                let busy = tl.busy_time();
                CoreStats {
                    core: tl.core,
                    busy,
                    idle: tl.status_time(CoreStatus::Idle),
                    wait: tl.status_time(CoreStatus::Wait),
                    switching: tl.status_time(CoreStatus::ContextSwitch)
                        + tl.status_time(CoreStatus::Migration),
                    utilization: if horizon == 0 {
                        0.0
                    } else {
                        busy as f64 / horizon as f64
                    },
                    energy: tl.total_energy(),
                }
            })
            .collect();

        let tasks = result
            .tasks
            .iter()
            .map(|task| {
                let mut stats = TaskStats {
                    task: task.id,
                    name: task.name.clone(),
                    released: 0,
                    completed: 0,
                    missed: 0,
                    response_time: DistributionStats::new(),
                    blocking_time: 0,
                    blocking_ratio: 0.0,
                };
                let mut completed_blocking: Time = 0;
                for job in result.jobs.of_task(task.id) {
                    stats.released += 1;
                    stats.blocking_time += job.blocking_time;
                    match job.status {
                        JobStatus::Completed => {
                            stats.completed += 1;
                            completed_blocking += job.blocking_time;
                            if let Some(rt) = job.response_time() {
                                stats.response_time.add(rt);
                            }
                        }
                        JobStatus::MissDeadline => stats.missed += 1,
                        JobStatus::NonCompute | JobStatus::Computing => {}
                    }
                }
                if stats.response_time.sum > 0 {
                    stats.blocking_ratio =
                        completed_blocking as f64 / stats.response_time.sum as f64;
                }
                stats
            })
            .collect();

        Summary {
            horizon,
            cores,
            tasks,
            total_energy: result.total_energy(),
            deadline_misses: result.misses.len(),
            controller: result.stats,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Simulation Summary (horizon {}):", self.horizon)?;
        for c in &self.cores {
            writeln!(
                f,
                "  core {:<3} busy={:<6} idle={:<6} wait={:<6} switch={:<6} util={:.3} energy={:.3}",
                c.core.0, c.busy, c.idle, c.wait, c.switching, c.utilization, c.energy
            )?;
        }
        for t in &self.tasks {
            writeln!(
                f,
                "  task {:<12} released={:<4} completed={:<4} missed={:<4} rt(mean={:.2} max={}) blocking={:.3}",
                t.name,
                t.released,
                t.completed,
                t.missed,
                t.response_time.mean(),
                t.response_time.max,
                t.blocking_ratio
            )?;
        }
        let c = &self.controller;
        writeln!(
            f,
            "  locks={} unlocks={} blocks={} preemptions={}",
            c.locks, c.unlocks, c.blocks, c.preemptions
        )?;
        writeln!(f, "  deadline_misses: {}", self.deadline_misses)?;
        write!(f, "  total_energy:    {:.3}", self.total_energy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distribution_tracks_extremes_and_mean() {
        let mut d = DistributionStats::new();
        assert_eq!(d.mean(), 0.0);
        for v in [4, 10, 7] {
            d.add(v);
        }
        assert_eq!(d.count, 3);
        assert_eq!(d.min, 4);
        assert_eq!(d.max, 10);
        assert_eq!(d.mean(), 7.0);
    }
}
