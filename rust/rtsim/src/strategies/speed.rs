//! Reference DVFS methods.

use tracing::debug;

use crate::dvfs::{DvfsMethod, DvfsType};
use crate::state::SimState;

/// Every core set runs at its highest speed for the whole run.
#[derive(Debug, Default)]
pub struct MaxSpeed;

impl DvfsMethod for MaxSpeed {
    fn name(&self) -> &str {
        "none"
    }

    fn defined_speed(&mut self, _dvfs_type: DvfsType, state: &mut SimState) {
        for cs in &mut state.core_sets {
            let top = cs.levels().len().saturating_sub(1);
            cs.set_active_level(top);
        }
    }
}

/// Picks, once per core set, the lowest speed whose capacity covers the
/// load of its busiest core.
///
/// The load of a core is the utilisation of the tasks assigned to it plus
/// an even share of the unassigned (globally scheduled) tasks. Capacity is
/// the speed relative to the fastest speed on the chip.
#[derive(Debug, Default)]
pub struct StaticSpeed;

const CAPACITY_EPSILON: f64 = 1e-9;

impl DvfsMethod for StaticSpeed {
    fn name(&self) -> &str {
        "static"
    }

    fn defined_speed(&mut self, dvfs_type: DvfsType, state: &mut SimState) {
        let max_speed = state.max_speed();
        let nr_cores: usize = state.core_sets.iter().map(|cs| cs.cores.len()).sum();
        let unassigned: f64 = state
            .tasks
            .iter()
            .filter(|t| t.local_core.is_none())
            .map(|t| t.utilization())
            .sum();
        let shared = if nr_cores == 0 {
            0.0
        } else {
            unassigned / nr_cores as f64
        };

        for cs in &mut state.core_sets {
            let load = cs
                .cores
                .iter()
                .map(|&core| state.tasks.core_utilization(core) + shared)
                .fold(0.0, f64::max);
            let level = cs.level_for_speed(load * max_speed - CAPACITY_EPSILON);
            cs.set_active_level(level);
            debug!(
                core_set = cs.id.0,
                ?dvfs_type,
                load,
                speed = cs.current_speed(),
                "static speed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coreset::{CoreSet, CoreSetDef};
    use crate::job::JobTable;
    use crate::task::{SharedResourceSet, TaskDef, TaskSet};
    use crate::types::{CoreId, CoreSetId};

    #[test]
    fn static_speed_covers_busiest_core() {
        let tasks = TaskSet::from_defs(&[
            TaskDef::periodic("a", 10, 3).on_core(CoreId(0)),
            TaskDef::periodic("b", 10, 6).on_core(CoreId(1)),
        ]);
        let resources = SharedResourceSet::new(&[], &tasks);
        let speeds = [0.25, 0.5, 0.75, 1.0];
        let mut state = SimState {
            time: 0,
            tick: 1,
            tasks,
            resources,
            jobs: JobTable::new(),
            core_sets: vec![
                CoreSet::new(CoreSetId(0), &CoreSetDef::new(vec![CoreId(0)], &speeds)),
                CoreSet::new(CoreSetId(1), &CoreSetDef::new(vec![CoreId(1)], &speeds)),
            ],
        };
        StaticSpeed.defined_speed(DvfsType::PerCore, &mut state);
        assert_eq!(state.core_sets[0].current_speed(), 0.5);
        assert_eq!(state.core_sets[1].current_speed(), 0.75);
    }
}
