//! Engine configuration
//!
//! Time and physics constants read by the frame driver. Stored as JSON;
//! missing fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Engine-wide time and physics settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Multiplier applied to every frame delta (1.0 = real time)
    pub time_scale: f32,
    /// Fixed physics step in seconds
    pub fixed_time_step: f32,
    /// Vertical acceleration, m/s²
    pub gravity: f32,
    /// Cap the frame rate at `fps_limit`
    pub fps_limit_enabled: bool,
    pub fps_limit: u32,
    /// Maximum fixed steps per frame to prevent spiral of death
    pub max_substeps: u32,
    /// Longest frame delta accepted, in seconds
    pub max_frame_delta: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            fixed_time_step: 1.0 / 50.0,
            gravity: -9.81,
            fps_limit_enabled: true,
            fps_limit: 200,
            max_substeps: 8,
            max_frame_delta: 0.1,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(json).map(Self::sanitized)
    }

    /// Replace time values the frame driver cannot use with their defaults.
    /// `time_scale` may be zero; the step and frame delta must be positive.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.time_scale.is_finite() && self.time_scale >= 0.0) {
            log::warn!("time_scale {} is invalid, using {}", self.time_scale, defaults.time_scale);
            self.time_scale = defaults.time_scale;
        }
        if !(self.fixed_time_step.is_finite() && self.fixed_time_step > 0.0) {
            log::warn!(
                "fixed_time_step {} is invalid, using {}",
                self.fixed_time_step,
                defaults.fixed_time_step
            );
            self.fixed_time_step = defaults.fixed_time_step;
        }
        if !(self.max_frame_delta.is_finite() && self.max_frame_delta > 0.0) {
            log::warn!(
                "max_frame_delta {} is invalid, using {}",
                self.max_frame_delta,
                defaults.max_frame_delta
            );
            self.max_frame_delta = defaults.max_frame_delta;
        }
        self
    }

    /// Load from a JSON file, falling back to defaults if it is missing or
    /// malformed
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Could not read {}: {}, using defaults", path.display(), e);
                return Self::default();
            }
        };
        match Self::from_json(&json) {
            Ok(config) => {
                log::info!("Loaded engine config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Invalid engine config {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Target seconds per frame, if the frame rate is capped
    pub fn target_frame_time(&self) -> Option<f32> {
        (self.fps_limit_enabled && self.fps_limit > 0).then(|| 1.0 / self.fps_limit as f32)
    }
}
