//! Rendering error types.

use ash::vk;
use thiserror::Error;
use vkquad_gpu::GpuError;

/// Errors raised while building or driving the quad renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Error from the Vulkan layer.
    #[error(transparent)]
    Gpu(#[from] GpuError),

    /// Vulkan error from a call made directly by the renderer.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// A frame slot index outside the configured frames in flight.
    #[error("Frame slot {index} out of range (frames in flight: {frames_in_flight})")]
    InvalidFrameSlot {
        index: usize,
        frames_in_flight: usize,
    },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, RenderError>;
