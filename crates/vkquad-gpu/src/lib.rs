//! Vulkan abstraction layer for vkquad.
//!
//! This crate provides:
//! - Vulkan instance creation with optional validation and debug messenger
//! - Surface, physical device and queue family selection
//! - Memory allocation via gpu-allocator
//! - Command buffer and frame synchronization management
//! - Swapchain handling with explicit out-of-date/suboptimal outcomes
//! - Render-pass graphics pipelines and SPIR-V loading

pub mod capabilities;
pub mod command;
pub mod context;
pub mod debug;
pub mod descriptors;
pub mod error;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use capabilities::{GpuCapabilities, GpuVendor, QueueFamilyIndices};
pub use command::CommandPool;
pub use context::{GpuContext, GpuContextBuilder};
pub use descriptors::{write_uniform_buffer, DescriptorPool, DescriptorSetLayoutBuilder};
pub use error::{GpuError, Result};
pub use instance::{default_device_extensions, default_validation_layers};
pub use memory::{GpuAllocator, GpuBuffer};
pub use pipeline::{load_spirv, GraphicsPipeline, GraphicsPipelineConfig};
pub use surface::{SurfaceContext, SurfaceSupport};
pub use swapchain::{AcquireOutcome, PresentOutcome, Swapchain};
pub use sync::{FrameSync, FrameSyncSet};
