//! # Snowfall
//!
//! A GPU snowfall effect: a few hundred camera-facing snowflake quads fall
//! through a small volume, pushed sideways by a wind whose recent history
//! is replayed per particle, viewed through a drag-to-orbit camera.
//!
//! ## Quick Start
//!
//! ```ignore
//! use snowfall::prelude::*;
//!
//! fn main() -> Result<(), SnowfallError> {
//!     Snowfall::new()
//!         .with_particle_count(300)
//!         .with_texture("snowflake.png")
//!         .run()
//! }
//! ```
//!
//! ## How It Works
//!
//! All particle motion happens in the vertex shader. Each particle is four
//! vertices carrying its lifetime, spawn offset and fall speed; the geometry
//! is uploaded once and never changes. Per frame only two uniforms move:
//!
//! - the simulated time, which every particle wraps by its own lifetime
//! - the wind history, the last 800 wind samples, newest first
//!
//! A particle that has been falling for `t` seconds sums the wind samples
//! covering those `t` seconds, so a gust sweeps through the snow from the
//! youngest flakes to the oldest.
//!
//! The CPU side of the shader math lives in [`vertex`], which makes the
//! motion testable without a GPU.
//!
//! ## Controls
//!
//! - Left-drag: orbit the camera
//! - `A` / `D`: push the wind left / right

pub mod camera;
pub mod config;
pub mod error;
pub mod geometry;
mod gpu;
pub mod input;
pub mod render_loop;
pub mod shader;
mod snowfall;
pub mod textures;
pub mod time;
pub mod vertex;
pub mod wind;

pub use bytemuck;
pub use camera::{CameraController, Projection};
pub use config::SnowConfig;
pub use error::SnowfallError;
pub use geometry::{GeometryBuilder, ParticleGeometry, ParticleParams};
pub use glam::{Mat4, Vec2, Vec3};
pub use render_loop::{Frame, FrameSink, LoopState, RenderLoop, TickOutcome};
pub use shader::ShaderProgram;
pub use snowfall::{SnowEvent, Snowfall};
pub use textures::SnowflakeImage;
pub use wind::{Wind, WindDirection, WindHistory};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use snowfall::prelude::*;
/// ```
pub mod prelude {
    pub use crate::camera::CameraController;
    pub use crate::config::SnowConfig;
    pub use crate::error::SnowfallError;
    pub use crate::input::WindKeys;
    pub use crate::snowfall::Snowfall;
    pub use crate::wind::WindDirection;
    pub use glam::{Vec2, Vec3};
}
