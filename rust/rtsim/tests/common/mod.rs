#![allow(dead_code)]

use rtsim::*;

/// Initialize tracing from `RUST_LOG`.
///
/// `try_init()` is idempotent: first call in the process succeeds,
/// subsequent calls are silently ignored. The simulated clock is
/// thread-local, so tests need no lock of their own.
pub fn setup_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .event_format(SimFormat)
        .try_init();
}

/// Run `scenario` with strategies looked up by name.
pub fn run(
    scenario: &Scenario,
    scheduler: &str,
    protocol: &str,
    dvfs: &str,
) -> SimulationResult {
    let strategies = Strategies::by_name(scheduler, protocol, dvfs, "first-fit")
        .expect("registered strategies");
    let result = Simulator::new(strategies)
        .run(scenario)
        .expect("simulation should run");
    result.dump();
    result
}

/// A processor ready to be stepped tick by tick.
pub fn processor(scenario: &Scenario, scheduler: &str, protocol: &str) -> Processor {
    let mut p = Processor::new(
        scenario,
        Scheduler::new(registry::scheduler(scheduler).unwrap()),
        ConcurrencyController::new(registry::protocol(protocol).unwrap()),
        DynamicVoltageRegulator::new(registry::dvfs("none").unwrap(), scenario.dvfs_type),
        registry::partitioner("first-fit").unwrap(),
    );
    p.prepare().expect("prepare");
    p
}

/// `(status, job, start, end)` of every record, for compact assertions.
pub fn shape(timeline: &Timeline) -> Vec<(CoreStatus, Option<u32>, Time, Time)> {
    timeline
        .records()
        .iter()
        .map(|r| (r.status, r.job.map(|j| j.0), r.start, r.end.unwrap_or(Time::MAX)))
        .collect()
}

/// Assert that no job sits in two ready queues at once.
pub fn assert_queues_disjoint(p: &Processor) {
    let mut seen = std::collections::BTreeSet::new();
    for id in p.global_queue.iter() {
        assert!(seen.insert(id), "job {id} twice in the global queue");
    }
    for core in &p.cores {
        for id in core.local_queue.iter() {
            assert!(
                seen.insert(id),
                "job {id} on core {} is also queued elsewhere",
                core.id
            );
        }
    }
}
