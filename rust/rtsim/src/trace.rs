//! Per-core timeline records.
//!
//! Each core keeps an ordered list of [`SchedulingInfo`] records. A record
//! opens whenever the core's status, its associated job, the lock state or
//! the speed changes, and closes when the next one opens (or at the horizon).
//! Consecutive records therefore tile the core's time axis with no gaps.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cost::CostKind;
use crate::fmt::fmt_grouped;
use crate::types::{CoreId, JobId, TaskId, Time};

/// What a core is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoreStatus {
    Execution,
    Idle,
    /// The working job is blocked on a resource.
    Wait,
    ContextSwitch,
    Migration,
}

impl CoreStatus {
    /// Statuses that consume the head of the core's cost queue.
    pub fn is_cost(self) -> bool {
        matches!(self, CoreStatus::ContextSwitch | CoreStatus::Migration)
    }
}

impl From<CostKind> for CoreStatus {
    fn from(kind: CostKind) -> Self {
        match kind {
            CostKind::ContextSwitch => CoreStatus::ContextSwitch,
            CostKind::Migration => CoreStatus::Migration,
        }
    }
}

impl fmt::Display for CoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CoreStatus::Execution => "EXEC",
            CoreStatus::Idle => "IDLE",
            CoreStatus::Wait => "WAIT",
            CoreStatus::ContextSwitch => "SWITCH",
            CoreStatus::Migration => "MIGRATE",
        };
        f.pad(s)
    }
}

/// One timeline record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingInfo {
    pub core: CoreId,
    pub job: Option<JobId>,
    pub task: Option<TaskId>,
    pub status: CoreStatus,
    pub start: Time,
    /// Set when the record is superseded or the run ends.
    pub end: Option<Time>,
    pub speed: f64,
    /// Energy consumed by the core while this record was open.
    pub energy: f64,
}

impl SchedulingInfo {
    pub fn duration(&self) -> Option<Time> {
        self.end.map(|end| end - self.start)
    }
}

/// A deadline miss: data, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissDeadlineInfo {
    pub time: Time,
    pub task: TaskId,
    pub job: JobId,
    /// Core whose queue held the job, or `None` for the global queue.
    pub core: Option<CoreId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    pub core: CoreId,
    records: Vec<SchedulingInfo>,
}

impl Timeline {
    pub fn new(core: CoreId) -> Self {
        Timeline {
            core,
            records: Vec::new(),
        }
    }

    pub(crate) fn open(&mut self, info: SchedulingInfo) {
        debug_assert!(
            self.records.last().map_or(true, |r| r.end == Some(info.start)),
            "record opened before the previous one was closed"
        );
        self.records.push(info);
    }

    /// Close the open record, if any.
    pub(crate) fn close(&mut self, end: Time, energy: f64) {
        if let Some(last) = self.records.last_mut() {
            if last.end.is_none() {
                last.end = Some(end);
                last.energy = energy;
            }
        }
    }

    pub fn records(&self) -> &[SchedulingInfo] {
        &self.records
    }

    pub fn last(&self) -> Option<&SchedulingInfo> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record covering `time`.
    pub fn record_at(&self, time: Time) -> Option<&SchedulingInfo> {
        self.records
            .iter()
            .find(|r| r.start <= time && r.end.map_or(true, |end| time < end))
    }

    /// Total ticks spent in `status`. Open records are not counted.
    pub fn status_time(&self, status: CoreStatus) -> Time {
        self.records
            .iter()
            .filter(|r| r.status == status)
            .filter_map(SchedulingInfo::duration)
            .sum()
    }

    pub fn busy_time(&self) -> Time {
        self.status_time(CoreStatus::Execution)
    }

    /// Ticks this core spent executing `job`.
    pub fn job_time(&self, job: JobId) -> Time {
        self.records
            .iter()
            .filter(|r| r.status == CoreStatus::Execution && r.job == Some(job))
            .filter_map(SchedulingInfo::duration)
            .sum()
    }

    pub fn total_energy(&self) -> f64 {
        self.records.iter().map(|r| r.energy).sum()
    }

    /// Whether every record is closed and each starts where the previous
    /// one ended.
    pub fn is_continuous(&self) -> bool {
        self.records.iter().all(|r| r.end.is_some())
            && self
                .records
                .windows(2)
                .all(|w| w[0].end == Some(w[1].start))
    }

    /// Pretty-print the timeline for debugging.
    pub fn dump(&self) {
        for r in &self.records {
            let end = r.end.map_or_else(|| "open".to_string(), fmt_grouped);
            let job = match (r.job, r.task) {
                (Some(job), Some(task)) => format!("job={job} task={task}"),
                (Some(job), None) => format!("job={job}"),
                _ => String::new(),
            };
            eprintln!(
                "core={:<3} [{:>9} .. {:>9}] {:<7} speed={:.2} energy={:.3} {}",
                self.core.0,
                fmt_grouped(r.start),
                end,
                r.status,
                r.speed,
                r.energy,
                job
            );
        }
    }
}
