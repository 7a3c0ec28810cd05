//! Resource contention under the reference protocols.

mod common;

use common::shape;
use rtsim::CoreStatus::{Execution, Idle, Wait};
use rtsim::*;

const R: ResourceId = ResourceId(0);

fn contended_pair() -> Scenario {
    Scenario::builder()
        .cores(2)
        .resource("bus", 1)
        .task(
            TaskDef::periodic("a", 20, 6)
                .critical_section(R, 0, 4)
                .on_core(CoreId(0)),
        )
        .task(
            TaskDef::periodic("b", 20, 6)
                .critical_section(R, 0, 4)
                .on_core(CoreId(1)),
        )
        .horizon(20)
        .context_switch(0)
        .migration(0)
        .build()
        .unwrap()
}

#[test]
fn test_mutex_makes_second_core_wait() {
    common::setup_test();
    let result = common::run(&contended_pair(), "rms", "mutex", "none");

    assert_eq!(
        shape(result.timeline(CoreId(0))),
        vec![
            (Execution, Some(0), 0, 4),
            // Leaving the section starts a new record.
            (Execution, Some(0), 4, 6),
            (Idle, None, 6, 20),
        ]
    );
    assert_eq!(
        shape(result.timeline(CoreId(1))),
        vec![
            (Wait, Some(1), 0, 4),
            (Execution, Some(1), 4, 8),
            (Execution, Some(1), 8, 10),
            (Idle, None, 10, 20),
        ]
    );

    let b = result.job(JobId(1));
    assert_eq!(b.blocking_time, 4);
    assert_eq!(b.blocking_resource, None);
    assert_eq!(result.job(JobId(0)).blocking_time, 0);

    let stats = result.stats;
    assert_eq!(stats.locks, 2);
    assert_eq!(stats.unlocks, 2);
    // One refused entry per tick that b spent waiting.
    assert_eq!(stats.blocks, 4, "{stats:?}");
    assert_eq!(stats.completions, 2);
    assert!(result.summary().tasks[1].blocking_ratio > 0.0);
}

#[test]
fn test_unchecked_protocol_ignores_contention() {
    common::setup_test();
    let result = common::run(&contended_pair(), "rms", "none", "none");
    for core in [CoreId(0), CoreId(1)] {
        let tl = result.timeline(core);
        assert_eq!(tl.status_time(Wait), 0, "core {core} waited");
        assert_eq!(tl.busy_time(), 6);
    }
    assert_eq!(result.stats.blocks, 0);
}

/// `low` holds the resource when `high` asks for it; `mid` arrives while
/// `high` is blocked.
fn inversion() -> Scenario {
    Scenario::builder()
        .cores(1)
        .resource("r", 1)
        .task(TaskDef::periodic("low", 40, 6).critical_section(R, 1, 5))
        .task(TaskDef::periodic("mid", 20, 4).enter_time(3))
        .task(TaskDef::periodic("high", 10, 2).enter_time(2).critical_section(R, 0, 1))
        .horizon(12)
        .context_switch(0)
        .migration(0)
        .build()
        .unwrap()
}

// Jobs in release order: 0 = low, 1 = high, 2 = mid.

#[test]
fn test_inheritance_bounds_priority_inversion() {
    common::setup_test();
    let result = common::run(&inversion(), "single-rms", "pip", "none");

    let high = result.job(JobId(1));
    assert_eq!(high.task, TaskId(2));
    assert_eq!(high.finished_at, Some(7), "high should finish right after low unlocks");
    assert_eq!(high.blocking_time, 3);

    let mid = result.job(JobId(2));
    assert_eq!(mid.finished_at, Some(11));
    assert_eq!(mid.blocking_time, 2);

    let low = result.job(JobId(0));
    assert_eq!(low.finished_at, Some(12));
    assert!(!low.is_inherited());
    assert_eq!(low.current_priority, low.original_priority);

    assert_eq!(result.stats.preemptions, 2);
    assert!(result.misses.is_empty());
}

#[test]
fn test_plain_mutex_lets_mid_priority_job_delay_holder() {
    common::setup_test();
    let result = common::run(&inversion(), "single-rms", "mutex", "none");

    assert_eq!(result.job(JobId(2)).finished_at, Some(7));
    assert_eq!(result.job(JobId(1)).finished_at, Some(11));
    assert_eq!(result.job(JobId(0)).finished_at, Some(12));
    assert!(result.misses.is_empty());
}

#[test]
fn test_deadline_miss_releases_held_resource() {
    common::setup_test();
    // "hog" misses at 5 while holding the resource for its whole body.
    let scenario = Scenario::builder()
        .cores(2)
        .resource("r", 1)
        .task(
            TaskDef::periodic("hog", 50, 10)
                .deadline(5)
                .critical_section(R, 0, 10)
                .on_core(CoreId(0)),
        )
        .task(
            TaskDef::periodic("waiter", 50, 3)
                .critical_section(R, 0, 3)
                .on_core(CoreId(1)),
        )
        .horizon(12)
        .build()
        .unwrap();

    let result = common::run(&scenario, "rms", "mutex", "none");
    assert_eq!(result.misses.len(), 1);
    assert_eq!(result.misses[0].job, JobId(0));
    assert_eq!(result.stats.unlocks, 2);

    let waiter = result.job(JobId(1));
    assert_eq!(waiter.status, JobStatus::Completed);
    assert_eq!(waiter.finished_at, Some(8));
    assert_eq!(result.timeline(CoreId(1)).status_time(Wait), 5);
}

#[test]
fn test_holder_inherits_blocked_priority_until_unlock() {
    common::setup_test();
    let mut p = common::processor(&inversion(), "single-rms", "pip");
    for _ in 0..3 {
        p.execute().unwrap();
    }

    // t=2: high asked for the resource low holds.
    let high_prio = p.state.jobs[JobId(1)].original_priority;
    let low = &p.state.jobs[JobId(0)];
    assert!(low.holds(R));
    assert_eq!(low.inherited_priority(), Some(high_prio));
    assert_eq!(low.current_priority, high_prio);
    let high = &p.state.jobs[JobId(1)];
    assert!(high.is_suspended());
    assert_eq!(high.blocking_resource, Some(R));
    assert_eq!(p.cores[0].working_job, Some(JobId(0)));

    for _ in 0..2 {
        p.execute().unwrap();
    }

    // t=4: low left its section.
    let low = &p.state.jobs[JobId(0)];
    assert!(!low.holds(R));
    assert_eq!(low.inherited_priority(), None);
    assert!(!p.state.jobs[JobId(1)].is_suspended());
}
