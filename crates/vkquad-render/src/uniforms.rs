//! Per-frame model/view/projection transforms.

use glam::{Mat4, Vec3};
use std::time::Instant;

/// Rotation speed of the quad about +Z.
pub const DEGREES_PER_SECOND: f32 = 90.0;

const FOV_Y_DEGREES: f32 = 45.0;
const NEAR: f32 = 0.1;
const FAR: f32 = 10.0;

/// Uniform buffer contents, laid out as three column-major 4x4 matrices.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct UniformBufferObject {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
}

impl UniformBufferObject {
    /// Size in bytes as seen by the shader.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Transforms `seconds` after the clock started, for a target with the
    /// given aspect ratio.
    pub fn at(seconds: f32, aspect: f32) -> Self {
        Self {
            model: model_matrix(seconds).to_cols_array_2d(),
            view: view_matrix().to_cols_array_2d(),
            proj: projection_matrix(aspect).to_cols_array_2d(),
        }
    }
}

pub fn model_matrix(seconds: f32) -> Mat4 {
    Mat4::from_rotation_z(seconds * DEGREES_PER_SECOND.to_radians())
}

/// Camera at (2,2,2) looking at the origin, +Z up.
pub fn view_matrix() -> Mat4 {
    Mat4::look_at_rh(Vec3::splat(2.0), Vec3::ZERO, Vec3::Z)
}

/// 45° perspective with Y flipped for Vulkan clip space.
pub fn projection_matrix(aspect: f32) -> Mat4 {
    let mut proj = Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), aspect, NEAR, FAR);
    proj.y_axis.y *= -1.0;
    proj
}

/// Monotonic clock that starts at the first reading.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformClock {
    start: Option<Instant>,
}

impl UniformClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds since the first call.
    pub fn elapsed(&mut self) -> f32 {
        self.elapsed_at(Instant::now())
    }

    /// Seconds between the first reading and `now`.
    pub fn elapsed_at(&mut self, now: Instant) -> f32 {
        let start = *self.start.get_or_insert(now);
        now.saturating_duration_since(start).as_secs_f32()
    }
}
