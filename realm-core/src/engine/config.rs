use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::{ATTACK_RANGE, AOI_RADIUS};

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tick_rate: u32,
    pub aoi_radius: f32,
    pub attack_range: f32,
    pub map_name: String,
    pub seed: u64,
    /// Upper bound on inbound commands applied in one tick.
    pub max_commands_per_tick: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            aoi_radius: AOI_RADIUS,
            attack_range: ATTACK_RANGE,
            map_name: "Starting_Area".into(),
            seed: 42,
            max_commands_per_tick: 256,
        }
    }
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }
}
