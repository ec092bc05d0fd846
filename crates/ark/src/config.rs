use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{vec2, Vector};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    pub ticks_per_second: u32,
    /// Layer given to freshly spawned entities.
    pub default_layer: i32,
    /// Layer a button falls back to when it is dropped on nothing.
    pub baseline_layer: i32,
    /// Layer used while an entity is held by the hand.
    pub held_layer: i32,
    pub xerox_offset: Vector,
    pub initial_scale_percent: f64,
    pub zoom_step_percent: f64,
    pub min_scale_percent: f64,
    pub max_scale_percent: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 40,
            default_layer: 1,
            baseline_layer: 0,
            held_layer: 10_000,
            xerox_offset: vec2(10.0, 10.0),
            initial_scale_percent: 100.0,
            zoom_step_percent: 10.0,
            min_scale_percent: 10.0,
            max_scale_percent: 1_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("ticks_per_second must be at least 1")]
    ZeroTickRate,
    #[error("{field} must be a finite positive percentage, got {value}")]
    InvalidPercent { field: &'static str, value: f64 },
    #[error("min_scale_percent ({min}) exceeds max_scale_percent ({max})")]
    InvertedScaleBounds { min: f64, max: f64 },
    #[error("initial_scale_percent ({value}) is outside [{min}, {max}]")]
    InitialScaleOutOfBounds { value: f64, min: f64, max: f64 },
}

impl WorldConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticks_per_second == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        for (field, value) in [
            ("initial_scale_percent", self.initial_scale_percent),
            ("zoom_step_percent", self.zoom_step_percent),
            ("min_scale_percent", self.min_scale_percent),
            ("max_scale_percent", self.max_scale_percent),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidPercent { field, value });
            }
        }
        if self.min_scale_percent > self.max_scale_percent {
            return Err(ConfigError::InvertedScaleBounds {
                min: self.min_scale_percent,
                max: self.max_scale_percent,
            });
        }
        if self.initial_scale_percent < self.min_scale_percent
            || self.initial_scale_percent > self.max_scale_percent
        {
            return Err(ConfigError::InitialScaleOutOfBounds {
                value: self.initial_scale_percent,
                min: self.min_scale_percent,
                max: self.max_scale_percent,
            });
        }
        Ok(())
    }
}
