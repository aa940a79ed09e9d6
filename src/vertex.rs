//! CPU evaluation of the snow vertex stage.
//!
//! Mirrors `vs_main` in [`crate::shader::SNOW_VERTEX_WGSL`] line for line so
//! drift can be inspected and tested without a GPU. Keep the two in sync.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::wind::WIND_HISTORY_LEN;

/// Half-extent of a flake quad in world units.
pub const BILLBOARD_SIZE: f32 = 0.015;

/// Scale applied to each accumulated wind sample.
pub const WIND_SCALE: f32 = 1.0 / 800.0;

/// Wind history samples per simulated second (one per 10 ms tick).
pub const TICKS_PER_SECOND: f32 = 100.0;

/// Attributes of a single vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexInput {
    pub lifetime: f32,
    pub tex_coord: Vec2,
    pub tri_corner: Vec2,
    pub center_offset: Vec3,
    pub velocity: f32,
}

/// Constants the vertex stage reads from the frame uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftParams {
    pub billboard_size: f32,
    pub wind_scale: f32,
    pub ticks_per_second: f32,
}

impl Default for DriftParams {
    fn default() -> Self {
        Self {
            billboard_size: BILLBOARD_SIZE,
            wind_scale: WIND_SCALE,
            ticks_per_second: TICKS_PER_SECOND,
        }
    }
}

/// Seconds into the particle's current cycle.
#[inline]
pub fn cycle_time(time: f32, lifetime: f32) -> f32 {
    time % lifetime
}

/// Index of the newest wind tick a particle `t` seconds into its cycle has seen.
#[inline]
pub fn tick_index(t: f32, ticks_per_second: f32) -> usize {
    ((t * ticks_per_second).floor().max(0.0) as usize).min(WIND_HISTORY_LEN - 1)
}

/// Sum of wind samples `1..=tick`, i.e. the push accumulated since the
/// particle's cycle began.
pub fn wind_drift(wind: &[f32], tick: usize) -> f32 {
    let last = tick.min(wind.len().saturating_sub(1));
    (1..=last).rev().map(|j| wind[j]).sum()
}

/// World-space position of a vertex, billboard expansion included.
pub fn world_position(
    input: &VertexInput,
    time: f32,
    wind: &[f32],
    view: &Mat4,
    params: &DriftParams,
) -> Vec3 {
    let t = cycle_time(time, input.lifetime);
    let tick = tick_index(t, params.ticks_per_second);

    let mut position = input.center_offset + Vec3::new(0.0, t * input.velocity, 0.0);
    position.x += wind_drift(wind, tick) * params.wind_scale;

    let camera_right = view.row(0).truncate();
    let camera_up = view.row(1).truncate();
    position += (camera_right * input.tri_corner.x + camera_up * input.tri_corner.y)
        * params.billboard_size;

    position
}

/// Clip-space output of the vertex stage.
pub fn clip_position(
    input: &VertexInput,
    time: f32,
    wind: &[f32],
    view: &Mat4,
    projection: &Mat4,
    params: &DriftParams,
) -> Vec4 {
    let world = world_position(input, time, wind, view, params);
    *projection * *view * world.extend(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flake() -> VertexInput {
        VertexInput {
            lifetime: 5.0,
            tex_coord: Vec2::ZERO,
            tri_corner: Vec2::new(-1.0, -1.0),
            center_offset: Vec3::new(0.0, 0.5, 0.0),
            velocity: -0.1,
        }
    }

    #[test]
    fn test_tick_index_clamped() {
        assert_eq!(tick_index(0.0, TICKS_PER_SECOND), 0);
        assert_eq!(tick_index(0.019, TICKS_PER_SECOND), 1);
        assert_eq!(tick_index(9.5, TICKS_PER_SECOND), WIND_HISTORY_LEN - 1);
    }

    #[test]
    fn test_wind_drift_skips_newest_sample() {
        let mut wind = vec![0.0; WIND_HISTORY_LEN];
        wind[0] = 100.0;
        wind[1] = 1.0;
        wind[2] = 2.0;
        wind[3] = 4.0;
        assert_eq!(wind_drift(&wind, 0), 0.0);
        assert_eq!(wind_drift(&wind, 2), 3.0);
        assert_eq!(wind_drift(&wind, 3), 7.0);
    }

    #[test]
    fn test_fall_follows_velocity() {
        let wind = vec![0.0; WIND_HISTORY_LEN];
        let mut input = flake();
        input.tri_corner = Vec2::ZERO;
        let p = world_position(&input, 2.0, &wind, &Mat4::IDENTITY, &DriftParams::default());
        assert!((p.y - 0.3).abs() < 1e-6);
        assert_eq!(p.x, 0.0);
    }

    #[test]
    fn test_wind_pushes_along_x() {
        let wind = vec![0.8; WIND_HISTORY_LEN];
        let mut input = flake();
        input.tri_corner = Vec2::ZERO;
        // 1.0s into the cycle: ticks 1..=100 each contribute 0.8 / 800.
        let p = world_position(&input, 1.0, &wind, &Mat4::IDENTITY, &DriftParams::default());
        assert!((p.x - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_billboard_uses_camera_axes() {
        let wind = vec![0.0; WIND_HISTORY_LEN];
        let mut input = flake();
        input.tri_corner = Vec2::new(1.0, 1.0);
        let p = world_position(&input, 0.0, &wind, &Mat4::IDENTITY, &DriftParams::default());
        assert!((p.x - BILLBOARD_SIZE).abs() < 1e-7);
        assert!((p.y - (0.5 + BILLBOARD_SIZE)).abs() < 1e-7);
    }
}
