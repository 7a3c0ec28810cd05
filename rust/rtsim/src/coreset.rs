//! Speed-scalable groups of cores.
//!
//! All cores of a set run at the set's active speed. DVFS methods pick the
//! speed, either immediately through [`CoreSet::set_active_level`] or by
//! requesting a level that takes effect at the next per-tick update.

use serde::{Deserialize, Serialize};

use crate::types::{CoreId, CoreSetId};

/// Power drawn at a given speed: `alpha * speed^beta + gamma`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerModel {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl PowerModel {
    pub fn power(&self, speed: f64) -> f64 {
        self.alpha * speed.powf(self.beta) + self.gamma
    }
}

impl Default for PowerModel {
    fn default() -> Self {
        PowerModel {
            alpha: 1.0,
            beta: 3.0,
            gamma: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedLevel {
    pub speed: f64,
    pub power: f64,
}

/// Definition of a core set for scenario creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreSetDef {
    pub cores: Vec<CoreId>,
    /// Available speeds, in any order.
    pub speeds: Vec<f64>,
    #[serde(default)]
    pub power_model: PowerModel,
    /// Power drawn per tick by an idle, waiting or switching core.
    #[serde(default)]
    pub idle_power: f64,
}

impl CoreSetDef {
    pub fn new(cores: Vec<CoreId>, speeds: &[f64]) -> Self {
        CoreSetDef {
            cores,
            speeds: speeds.to_vec(),
            power_model: PowerModel::default(),
            idle_power: 0.0,
        }
    }

    pub fn power_model(mut self, model: PowerModel) -> Self {
        self.power_model = model;
        self
    }

    pub fn idle_power(mut self, power: f64) -> Self {
        self.idle_power = power;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CoreSet {
    pub id: CoreSetId,
    pub cores: Vec<CoreId>,
    /// Sorted by ascending speed.
    levels: Vec<SpeedLevel>,
    active: usize,
    requested: Option<usize>,
    pub power_model: PowerModel,
    pub idle_power: f64,
}

impl CoreSet {
    /// Starts at the highest speed.
    pub fn new(id: CoreSetId, def: &CoreSetDef) -> Self {
        let mut speeds = def.speeds.clone();
        speeds.sort_by(f64::total_cmp);
        speeds.dedup();
        let levels: Vec<SpeedLevel> = speeds
            .into_iter()
            .map(|speed| SpeedLevel {
                speed,
                power: def.power_model.power(speed),
            })
            .collect();
        CoreSet {
            id,
            cores: def.cores.clone(),
            active: levels.len().saturating_sub(1),
            levels,
            requested: None,
            power_model: def.power_model,
            idle_power: def.idle_power,
        }
    }

    pub fn levels(&self) -> &[SpeedLevel] {
        &self.levels
    }

    pub fn active_level(&self) -> usize {
        self.active
    }

    pub fn set_active_level(&mut self, level: usize) {
        self.active = level.min(self.levels.len().saturating_sub(1));
    }

    /// Ask for `level` at the next [`CoreSet::update_speed`].
    pub fn request_level(&mut self, level: usize) {
        self.requested = Some(level.min(self.levels.len().saturating_sub(1)));
    }

    /// Lowest level that runs at least `speed`, or the highest level.
    pub fn level_for_speed(&self, speed: f64) -> usize {
        self.levels
            .iter()
            .position(|l| l.speed >= speed)
            .unwrap_or(self.levels.len().saturating_sub(1))
    }

    /// Apply a pending request. Returns true if the speed changed.
    pub fn update_speed(&mut self) -> bool {
        match self.requested.take() {
            Some(level) if level != self.active => {
                self.active = level;
                true
            }
            _ => false,
        }
    }

    pub fn current_speed(&self) -> f64 {
        self.levels.get(self.active).map_or(0.0, |l| l.speed)
    }

    pub fn current_power(&self) -> f64 {
        self.levels.get(self.active).map_or(0.0, |l| l.power)
    }

    pub fn max_speed(&self) -> f64 {
        self.levels.last().map_or(0.0, |l| l.speed)
    }

    pub fn contains(&self, core: CoreId) -> bool {
        self.cores.contains(&core)
    }
}
