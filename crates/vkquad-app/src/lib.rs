//! Application layer for vkquad.
//!
//! This crate provides:
//! - Window creation and event pumping through winit
//! - The frame loop state machine with swapchain recreation
//! - A Vulkan backend for the frame loop that draws the quad
//! - The runner: logging setup, main loop, frame pacing and teardown
//!
//! # Example
//!
//! ```no_run
//! use vkquad_app::{run, AppConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     run(AppConfig::new("vkquad").with_shader_dir("shaders"))
//! }
//! ```

mod config;
mod frame_loop;
mod renderer;
mod runner;
mod window;

pub use config::{AppConfig, FRAGMENT_SHADER_FILE, VERTEX_SHADER_FILE};
pub use frame_loop::{
    wait_for_drawable_size, FrameBackend, FrameLoop, FrameOutcome, RecreateOutcome, SlotState,
    MAX_FRAMES_IN_FLIGHT,
};
pub use renderer::VulkanRenderer;
pub use runner::{init_tracing, run, FrameStats};
pub use window::{AppWindow, WindowEvents};

// Re-export commonly used types for convenience
pub use vkquad_gpu::{GpuContext, GpuContextBuilder};
