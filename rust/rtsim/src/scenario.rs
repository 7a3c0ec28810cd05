//! Scenario definition and builder API.
//!
//! A [`Scenario`] is the fully populated input graph: cores grouped into
//! speed-scalable core sets, tasks, shared resources and the scalar engine
//! configuration. Everything derives serde so external loaders can produce
//! it; the engine itself parses nothing.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::coreset::{CoreSetDef, PowerModel};
use crate::dvfs::DvfsType;
use crate::error::{Result, SimError};
use crate::task::{ResourceDef, TaskDef};
use crate::types::{CoreId, Time};

/// Scalar engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Simulated ticks to run.
    pub horizon: Time,
    /// Length of one simulation step.
    pub tick: Time,
    pub context_switch_time: Time,
    pub migration_time: Time,
    /// With `false`, a started job keeps its core until it completes or
    /// misses its deadline.
    pub preemptive: bool,
    /// Run the per-tick cost and DVFS steps under global scheduling too.
    /// When off, global switches are immediate and DVFS methods only see
    /// job events.
    pub global_cost_checks: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            horizon: 1000,
            tick: 1,
            context_switch_time: 0,
            migration_time: 0,
            preemptive: true,
            global_cost_checks: false,
        }
    }
}

fn env_time(var: &str) -> Option<Time> {
    let raw = std::env::var(var).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var, value = raw.as_str(), "ignoring malformed value");
            None
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `RTSIM_HORIZON`, `RTSIM_CONTEXT_SWITCH` and
    /// `RTSIM_MIGRATION`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_time("RTSIM_HORIZON") {
            config.horizon = v;
        }
        if let Some(v) = env_time("RTSIM_CONTEXT_SWITCH") {
            config.context_switch_time = v;
        }
        if let Some(v) = env_time("RTSIM_MIGRATION") {
            config.migration_time = v;
        }
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub nr_cores: u32,
    /// Explicit core sets. When empty, sets are derived from `dvfs_type`
    /// using `default_speeds`.
    #[serde(default)]
    pub core_sets: Vec<CoreSetDef>,
    #[serde(default = "default_speeds")]
    pub default_speeds: Vec<f64>,
    #[serde(default)]
    pub power_model: PowerModel,
    #[serde(default)]
    pub idle_power: f64,
    #[serde(default)]
    pub dvfs_type: DvfsType,
    pub tasks: Vec<TaskDef>,
    #[serde(default)]
    pub resources: Vec<ResourceDef>,
    #[serde(default)]
    pub config: EngineConfig,
}

fn default_speeds() -> Vec<f64> {
    vec![1.0]
}

impl Scenario {
    pub fn builder() -> ScenarioBuilder {
        ScenarioBuilder {
            scenario: Scenario {
                nr_cores: 1,
                core_sets: Vec::new(),
                default_speeds: default_speeds(),
                power_model: PowerModel::default(),
                idle_power: 0.0,
                dvfs_type: DvfsType::FullChip,
                tasks: Vec::new(),
                resources: Vec::new(),
                config: EngineConfig::from_env(),
            },
        }
    }

    /// Core sets in effect: the explicit ones, or one per core
    /// ([`DvfsType::PerCore`]) or a single chip-wide set otherwise.
    pub fn resolved_core_sets(&self) -> Vec<CoreSetDef> {
        if !self.core_sets.is_empty() {
            return self.core_sets.clone();
        }
        let def = |cores: Vec<CoreId>| {
            CoreSetDef::new(cores, &self.default_speeds)
                .power_model(self.power_model)
                .idle_power(self.idle_power)
        };
        match self.dvfs_type {
            DvfsType::PerCore => (0..self.nr_cores).map(|i| def(vec![CoreId(i)])).collect(),
            DvfsType::FullChip | DvfsType::VoltageIsland => {
                vec![def((0..self.nr_cores).map(CoreId).collect())]
            }
        }
    }

    /// Reject obviously malformed graphs. Everything else is assumed to be
    /// well formed.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SimError::InvalidScenario(msg));

        if self.nr_cores == 0 {
            return invalid("scenario must have at least one core".into());
        }
        if self.config.tick == 0 {
            return invalid("tick must be positive".into());
        }

        let mut owner = vec![false; self.nr_cores as usize];
        for (i, cs) in self.resolved_core_sets().iter().enumerate() {
            if cs.speeds.is_empty() || cs.speeds.iter().any(|s| !(*s > 0.0)) {
                return invalid(format!("core set {i} needs positive speeds"));
            }
            for core in &cs.cores {
                match owner.get_mut(core.index()) {
                    None => return invalid(format!("core set {i} references unknown core {core}")),
                    Some(true) => return invalid(format!("core {core} is in two core sets")),
                    Some(slot) => *slot = true,
                }
            }
        }
        if let Some(core) = owner.iter().position(|&owned| !owned) {
            return invalid(format!("core {core} belongs to no core set"));
        }

        for task in &self.tasks {
            if task.period == 0 {
                return invalid(format!("task {:?} has a zero period", task.name));
            }
            if task.deadline == 0 {
                return invalid(format!("task {:?} has a zero deadline", task.name));
            }
            if let Some(core) = task.local_core {
                if core.0 >= self.nr_cores {
                    return invalid(format!("task {:?} pinned to unknown core {core}", task.name));
                }
            }
            for cs in &task.critical_sections {
                if cs.resource.index() >= self.resources.len() {
                    return invalid(format!(
                        "task {:?} locks unknown resource {}",
                        task.name, cs.resource
                    ));
                }
                if cs.start >= cs.end || cs.end > task.computation {
                    return invalid(format!(
                        "task {:?} has critical section [{}, {}) outside [0, {}]",
                        task.name, cs.start, cs.end, task.computation
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Fluent builder for [`Scenario`]. Engine settings start from
/// [`EngineConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    scenario: Scenario,
}

impl ScenarioBuilder {
    pub fn cores(mut self, n: u32) -> Self {
        self.scenario.nr_cores = n;
        self
    }

    /// Speed table for derived core sets.
    pub fn speeds(mut self, speeds: &[f64]) -> Self {
        self.scenario.default_speeds = speeds.to_vec();
        self
    }

    pub fn power_model(mut self, model: PowerModel) -> Self {
        self.scenario.power_model = model;
        self
    }

    pub fn idle_power(mut self, power: f64) -> Self {
        self.scenario.idle_power = power;
        self
    }

    pub fn dvfs(mut self, dvfs_type: DvfsType) -> Self {
        self.scenario.dvfs_type = dvfs_type;
        self
    }

    /// One core set per core.
    pub fn per_core_sets(self) -> Self {
        self.dvfs(DvfsType::PerCore)
    }

    /// Add an explicit core set; implies voltage islands.
    pub fn core_set(mut self, def: CoreSetDef) -> Self {
        self.scenario.core_sets.push(def);
        self.scenario.dvfs_type = DvfsType::VoltageIsland;
        self
    }

    pub fn task(mut self, def: TaskDef) -> Self {
        self.scenario.tasks.push(def);
        self
    }

    pub fn resource(mut self, name: &str, quantity: u32) -> Self {
        self.scenario.resources.push(ResourceDef {
            name: name.to_string(),
            quantity,
        });
        self
    }

    pub fn horizon(mut self, ticks: Time) -> Self {
        self.scenario.config.horizon = ticks;
        self
    }

    pub fn tick(mut self, tick: Time) -> Self {
        self.scenario.config.tick = tick;
        self
    }

    pub fn context_switch(mut self, ticks: Time) -> Self {
        self.scenario.config.context_switch_time = ticks;
        self
    }

    pub fn migration(mut self, ticks: Time) -> Self {
        self.scenario.config.migration_time = ticks;
        self
    }

    pub fn preemptive(mut self, enabled: bool) -> Self {
        self.scenario.config.preemptive = enabled;
        self
    }

    pub fn global_cost_checks(mut self, enabled: bool) -> Self {
        self.scenario.config.global_cost_checks = enabled;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.scenario.config = config;
        self
    }

    pub fn build(self) -> Result<Scenario> {
        self.scenario.validate()?;
        Ok(self.scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceId;

    #[test]
    fn derives_core_sets_from_dvfs_type() {
        let chip = Scenario::builder().cores(3).build().unwrap();
        let sets = chip.resolved_core_sets();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].cores.len(), 3);

        let per_core = Scenario::builder().cores(3).per_core_sets().build().unwrap();
        assert_eq!(per_core.resolved_core_sets().len(), 3);
    }

    #[test]
    fn rejects_malformed_graphs() {
        let err = Scenario::builder().cores(0).build().unwrap_err();
        assert!(matches!(err, SimError::InvalidScenario(_)));

        let err = Scenario::builder()
            .task(TaskDef::periodic("t", 0, 1))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("zero period"), "{err}");

        let err = Scenario::builder()
            .task(TaskDef::periodic("t", 10, 4).critical_section(ResourceId(0), 1, 2))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown resource"), "{err}");

        let err = Scenario::builder()
            .resource("r", 1)
            .task(TaskDef::periodic("t", 10, 4).critical_section(ResourceId(0), 2, 5))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("outside"), "{err}");

        let err = Scenario::builder()
            .cores(2)
            .core_set(CoreSetDef::new(vec![CoreId(0)], &[1.0]))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("no core set"), "{err}");
    }

    #[test]
    fn config_round_trips_through_json_with_defaults() {
        let json = r#"{ "nr_cores": 2, "tasks": [
            { "name": "a", "period": 10, "deadline": 10, "computation": 3 }
        ] }"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();
        scenario.validate().unwrap();
        assert_eq!(scenario.config, EngineConfig::default());
        assert_eq!(scenario.default_speeds, vec![1.0]);
        assert_eq!(scenario.tasks[0].enter_time, 0);
    }
}
