//! Rendering for vkquad: a colored quad spinning about +Z.
//!
//! This crate provides:
//! - Vertex layout and quad geometry
//! - Time-driven model/view/projection uniforms
//! - Render pass and graphics pipeline setup
//! - Vertex, index and per-frame uniform buffers with descriptor sets

pub mod error;
pub mod quad;
pub mod render_pass;
pub mod uniforms;
pub mod vertex;

pub use error::{RenderError, Result};
pub use quad::{QuadRenderer, QuadShaders};
pub use uniforms::{UniformBufferObject, UniformClock};
pub use vertex::{Vertex, QUAD_INDICES, QUAD_VERTICES};
