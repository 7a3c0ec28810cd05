//! Single-core behaviour: the basic timeline, energy, preemption costs,
//! non-preemptive mode and deadline handling.

mod common;

use common::shape;
use rtsim::CoreStatus::{ContextSwitch, Execution, Idle};
use rtsim::*;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_single_task_alternates_exec_and_idle() {
    common::setup_test();
    let scenario = Scenario::builder()
        .cores(1)
        .power_model(PowerModel {
            alpha: 2.0,
            beta: 3.0,
            gamma: 0.0,
        })
        .idle_power(0.5)
        .task(TaskDef::periodic("t0", 10, 4))
        .horizon(20)
        .context_switch(0)
        .migration(0)
        .build()
        .unwrap();

    let result = common::run(&scenario, "rms", "none", "none");
    let tl = result.timeline(CoreId(0));

    assert_eq!(
        shape(tl),
        vec![
            (Execution, Some(0), 0, 4),
            (Idle, None, 4, 10),
            (Execution, Some(1), 10, 14),
            (Idle, None, 14, 20),
        ]
    );
    assert!(tl.is_continuous());
    assert!(tl.records().iter().all(|r| r.speed == 1.0));
    assert!(close(tl.records()[0].energy, 8.0), "{:?}", tl.records()[0]);
    assert!(close(tl.records()[1].energy, 3.0), "{:?}", tl.records()[1]);
    assert!(close(result.total_energy(), 2.0 * 4.0 * 2.0 + 2.0 * 6.0 * 0.5));
    assert!(result.misses.is_empty());

    for job in result.jobs.iter() {
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.response_time(), Some(4));
        assert_eq!(result.executed_time(job.id), 4);
    }

    let summary = result.summary();
    assert_eq!(summary.cores[0].busy, 8);
    assert_eq!(summary.cores[0].idle, 12);
    assert!(close(summary.cores[0].utilization, 0.4));
    assert_eq!(summary.tasks[0].completed, 2);
    assert_eq!(summary.tasks[0].response_time.max, 4);
}

#[test]
fn test_preemption_pays_context_switch_both_ways() {
    common::setup_test();
    let scenario = Scenario::builder()
        .cores(1)
        .task(TaskDef::periodic("low", 20, 5))
        .task(TaskDef::periodic("high", 10, 2).enter_time(2))
        .horizon(20)
        .context_switch(1)
        .migration(0)
        .build()
        .unwrap();

    let result = common::run(&scenario, "rms", "none", "none");
    let tl = result.timeline(CoreId(0));

    // Job 0 is "low", jobs 1 and 2 are the two releases of "high".
    assert_eq!(
        shape(tl),
        vec![
            (Execution, Some(0), 0, 2),
            (ContextSwitch, Some(1), 2, 3),
            (Execution, Some(1), 3, 5),
            (ContextSwitch, Some(0), 5, 6),
            (Execution, Some(0), 6, 9),
            (Idle, None, 9, 12),
            (Execution, Some(2), 12, 14),
            (Idle, None, 14, 20),
        ]
    );
    assert_eq!(result.stats.preemptions, 1);
    assert_eq!(result.job(JobId(0)).finished_at, Some(9));
    assert_eq!(result.job(JobId(1)).finished_at, Some(5));
}

#[test]
fn test_zero_costs_switch_immediately() {
    common::setup_test();
    let scenario = Scenario::builder()
        .cores(1)
        .task(TaskDef::periodic("low", 20, 5))
        .task(TaskDef::periodic("high", 10, 2).enter_time(2))
        .horizon(20)
        .context_switch(0)
        .migration(0)
        .build()
        .unwrap();

    let result = common::run(&scenario, "rms", "none", "none");
    let tl = result.timeline(CoreId(0));
    assert!(
        tl.records().iter().all(|r| !r.status.is_cost()),
        "no cost records expected"
    );
    assert_eq!(tl.record_at(2).and_then(|r| r.job), Some(JobId(1)));
    assert_eq!(result.job(JobId(0)).finished_at, Some(7));
}

#[test]
fn test_non_preemptive_keeps_running_job() {
    common::setup_test();
    let scenario = Scenario::builder()
        .cores(1)
        .task(TaskDef::periodic("low", 20, 5))
        .task(TaskDef::periodic("high", 10, 2).enter_time(2))
        .horizon(20)
        .context_switch(0)
        .migration(0)
        .preemptive(false)
        .build()
        .unwrap();

    let result = common::run(&scenario, "rms", "none", "none");
    assert_eq!(
        shape(result.timeline(CoreId(0))),
        vec![
            (Execution, Some(0), 0, 5),
            (Execution, Some(1), 5, 7),
            (Idle, None, 7, 12),
            (Execution, Some(2), 12, 14),
            (Idle, None, 14, 20),
        ]
    );
    assert_eq!(result.stats.preemptions, 0);
    assert!(result.misses.is_empty());
}

#[test]
fn test_deadline_miss_reported_once() {
    common::setup_test();
    let scenario = Scenario::builder()
        .cores(1)
        .task(TaskDef::periodic("overrun", 10, 12))
        .horizon(15)
        .context_switch(0)
        .migration(0)
        .build()
        .unwrap();

    let result = common::run(&scenario, "edf", "none", "none");

    assert_eq!(result.misses.len(), 1, "{:?}", result.misses);
    let miss = &result.misses[0];
    assert_eq!(miss.job, JobId(0));
    assert_eq!(miss.time, 10);
    assert_eq!(miss.core, Some(CoreId(0)));

    let job = result.job(JobId(0));
    assert_eq!(job.status, JobStatus::MissDeadline);
    assert_eq!(job.finished_at, Some(10));
    assert_eq!(result.executed_time(JobId(0)), 10);

    // The next release takes over without a preemption.
    assert_eq!(result.job(JobId(1)).status, JobStatus::Computing);
    assert_eq!(result.stats.preemptions, 0);
    assert_eq!(result.stats.deadline_misses, 1);
    assert_eq!(result.summary().tasks[0].missed, 1);
}

#[test]
fn test_completion_at_deadline_is_not_a_miss() {
    common::setup_test();
    let scenario = Scenario::builder()
        .cores(1)
        .task(TaskDef::periodic("full", 10, 10))
        .horizon(20)
        .build()
        .unwrap();

    let result = common::run(&scenario, "rms", "none", "none");
    assert!(result.misses.is_empty(), "{:?}", result.misses);
    assert_eq!(
        shape(result.timeline(CoreId(0))),
        vec![(Execution, Some(0), 0, 10), (Execution, Some(1), 10, 20)]
    );
    assert!(result.jobs.iter().all(|j| j.status == JobStatus::Completed));
}

#[test]
fn test_progress_is_monotone_and_bounded() {
    common::setup_test();
    let scenario = Scenario::builder()
        .cores(2)
        .task(TaskDef::periodic("a", 7, 3))
        .task(TaskDef::periodic("b", 5, 2))
        .task(TaskDef::periodic("c", 11, 4))
        .task(TaskDef::periodic("d", 13, 9))
        .horizon(100)
        .context_switch(1)
        .build()
        .unwrap();

    let mut p = common::processor(&scenario, "edf", "none");
    let mut last: Vec<f64> = Vec::new();
    while p.state.time < scenario.config.horizon {
        p.execute().unwrap();
        common::assert_queues_disjoint(&p);
        for job in p.state.jobs.iter() {
            let i = job.id.index();
            let prev = last.get(i).copied().unwrap_or(0.0);
            assert!(job.progress() >= prev, "job {} went backwards", job.id);
            assert!(job.progress() <= job.target, "job {} overran", job.id);
            if i < last.len() {
                last[i] = job.progress();
            } else {
                last.push(job.progress());
            }
        }
    }
    p.finish();
    for core in &p.cores {
        assert!(core.timeline.is_continuous());
        assert_eq!(core.timeline.records()[0].start, 0);
        assert_eq!(core.timeline.last().and_then(|r| r.end), Some(100));
    }
}
