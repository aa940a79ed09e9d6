//! Runtime configuration.

use std::f32::consts::FRAC_PI_3;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::geometry::check_particle_count;
use crate::input::WindKeys;
use crate::vertex::{DriftParams, BILLBOARD_SIZE, TICKS_PER_SECOND, WIND_SCALE};
use crate::wind::{WIND_STEP, WIND_TICK_INTERVAL};

/// Everything needed to start the effect.
#[derive(Debug, Clone, PartialEq)]
pub struct SnowConfig {
    pub particle_count: u32,
    /// Seed for particle generation; `None` draws from entropy.
    pub seed: Option<u64>,
    /// Snowflake image; `None` uses the procedural flake.
    pub texture: Option<PathBuf>,
    pub window_size: (u32, u32),
    pub clear_color: [f64; 4],
    /// Simulated time the clock starts at, in seconds.
    pub initial_time: f32,
    pub wind_step: f32,
    pub wind_interval: Duration,
    pub wind_keys: WindKeys,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    pub billboard_size: f32,
    pub wind_scale: f32,
}

impl Default for SnowConfig {
    fn default() -> Self {
        Self {
            particle_count: 300,
            seed: None,
            texture: None,
            window_size: (600, 600),
            clear_color: [0.3, 0.65, 0.97, 1.0],
            initial_time: 3.0,
            wind_step: WIND_STEP,
            wind_interval: WIND_TICK_INTERVAL,
            wind_keys: WindKeys::default(),
            fov_y: FRAC_PI_3,
            near: 0.01,
            far: 1000.0,
            billboard_size: BILLBOARD_SIZE,
            wind_scale: WIND_SCALE,
        }
    }
}

impl SnowConfig {
    /// Reject values that would fail later on the GPU or misbehave silently.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_particle_count(self.particle_count)?;
        if self.wind_interval.is_zero() {
            return Err(ConfigError::ZeroWindInterval);
        }
        if !(self.billboard_size > 0.0) {
            return Err(ConfigError::BillboardSize(self.billboard_size));
        }
        if !(self.near > 0.0 && self.far > self.near) {
            return Err(ConfigError::ClipPlanes {
                near: self.near,
                far: self.far,
            });
        }
        if !(self.fov_y > 0.0 && self.fov_y < std::f32::consts::PI) {
            return Err(ConfigError::FieldOfView(self.fov_y));
        }
        if self.window_size.0 == 0 || self.window_size.1 == 0 {
            return Err(ConfigError::WindowSize(self.window_size.0, self.window_size.1));
        }
        Ok(())
    }

    /// Per-frame constants of the vertex stage.
    pub fn drift(&self) -> DriftParams {
        DriftParams {
            billboard_size: self.billboard_size,
            wind_scale: self.wind_scale,
            ticks_per_second: 1.0 / self.wind_interval.as_secs_f32(),
        }
    }
}
