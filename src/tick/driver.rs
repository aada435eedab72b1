//! Host frame loop adapter
//!
//! Turns one variable-length host frame into the dispatcher's phase ticks:
//! zero or more fixed physics steps, then one pass each of `Update`,
//! `LateUpdate` and `PreRender`.

use super::dispatcher::{TickPhase, UpdateDispatcher};
use crate::config::EngineConfig;

/// What one call to [`FrameDriver::advance`] did
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameReport {
    /// Fixed steps run this frame
    pub substeps: u32,
    /// Frame delta after clamping and time scaling
    pub scaled_dt: f32,
}

/// Fixed-step accumulator driving an [`UpdateDispatcher`]
#[derive(Debug)]
pub struct FrameDriver {
    dispatcher: UpdateDispatcher,
    config: EngineConfig,
    accumulator: f32,
    frames: u64,
}

impl FrameDriver {
    pub fn new(dispatcher: UpdateDispatcher, config: EngineConfig) -> Self {
        Self {
            dispatcher,
            config: config.sanitized(),
            accumulator: 0.0,
            frames: 0,
        }
    }

    /// Run one host frame of `frame_dt` real seconds
    pub fn advance(&mut self, frame_dt: f32) -> FrameReport {
        let frame_dt = if frame_dt.is_finite() { frame_dt } else { 0.0 };
        let dt = frame_dt.max(0.0).min(self.config.max_frame_delta) * self.config.time_scale;
        self.accumulator += dt;

        let step = self.config.fixed_time_step;
        let mut substeps = 0;
        if step > 0.0 {
            while self.accumulator >= step && substeps < self.config.max_substeps {
                self.dispatcher.tick(TickPhase::FixedUpdate, step);
                self.accumulator -= step;
                substeps += 1;
            }
        }
        if substeps == self.config.max_substeps && self.accumulator >= step {
            log::debug!(
                "frame {}: substep cap hit, {:.3}s carried over",
                self.frames,
                self.accumulator
            );
        }

        self.dispatcher.tick(TickPhase::Update, dt);
        self.dispatcher.tick(TickPhase::LateUpdate, dt);
        self.dispatcher.tick(TickPhase::PreRender, dt);
        self.frames += 1;

        FrameReport {
            substeps,
            scaled_dt: dt,
        }
    }

    /// Fraction of a fixed step left in the accumulator, for interpolating
    /// between the last two physics states
    pub fn alpha(&self) -> f32 {
        if self.config.fixed_time_step > 0.0 {
            (self.accumulator / self.config.fixed_time_step).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Drop any accumulated time, e.g. after a pause
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &UpdateDispatcher {
        &self.dispatcher
    }
}
