//! Orbit camera driven by pointer drags.

use glam::{Mat4, Vec3};

/// Pixels of drag per radian of rotation.
pub const DRAG_PIXELS_PER_RADIAN: f32 = 60.0;

/// Distance from the camera to the origin it orbits.
pub const CAMERA_DISTANCE: f32 = 0.5;

/// Accumulated orbit angles. Unclamped: any rotation is valid.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraController {
    /// Rotation about the camera's local X axis, in radians.
    pub pitch: f32,
    /// Rotation about the world Y axis, in radians.
    pub yaw: f32,
}

impl CameraController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a drag delta (in pixels) into the angles.
    pub fn apply_drag(&mut self, dx: f32, dy: f32) {
        self.pitch += dy / DRAG_PIXELS_PER_RADIAN;
        self.yaw -= dx / DRAG_PIXELS_PER_RADIAN;
    }

    /// Camera frame before the look-at: pushed out along +Z, then pitched
    /// and yawed about the origin.
    fn frame(&self) -> Mat4 {
        Mat4::from_rotation_y(self.yaw)
            * Mat4::from_rotation_x(-self.pitch)
            * Mat4::from_translation(Vec3::new(0.0, 0.0, CAMERA_DISTANCE))
    }

    /// Calculate the camera's world position.
    pub fn position(&self) -> Vec3 {
        self.frame().w_axis.truncate()
    }

    /// Calculate the view matrix for rendering.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), Vec3::ZERO, Vec3::Y)
    }
}

/// Perspective parameters. The matrix is rebuilt only when the aspect changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Projection {
    pub fn new(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y,
            aspect,
            near,
            far,
        }
    }

    /// Update the aspect ratio from a surface size. Zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }
}
