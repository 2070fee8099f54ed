//! Application configuration.

use std::ffi::CStr;
use std::path::{Path, PathBuf};
use vkquad_gpu::{default_device_extensions, default_validation_layers};

/// File name of the compiled quad vertex shader.
pub const VERTEX_SHADER_FILE: &str = "quad.vert.spv";
/// File name of the compiled quad fragment shader.
pub const FRAGMENT_SHADER_FILE: &str = "quad.frag.spv";

/// Application configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Window title, also used as the Vulkan application name.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Target frames per second (None for unlimited).
    pub target_fps: Option<u32>,
    /// Force FIFO presentation.
    pub vsync: bool,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Compiled vertex shader.
    pub vertex_shader: PathBuf,
    /// Compiled fragment shader.
    pub fragment_shader: PathBuf,
    /// Layers enabled when `validation` is set.
    pub validation_layers: Vec<&'static CStr>,
    /// Extensions every candidate device must support.
    pub device_extensions: Vec<&'static CStr>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "vkquad".to_string(),
            width: 800,
            height: 600,
            target_fps: None,
            vsync: false,
            validation: cfg!(debug_assertions),
            vertex_shader: PathBuf::from("shaders").join(VERTEX_SHADER_FILE),
            fragment_shader: PathBuf::from("shaders").join(FRAGMENT_SHADER_FILE),
            validation_layers: default_validation_layers(),
            device_extensions: default_device_extensions(),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the target FPS.
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    /// Enable or disable vsync.
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Look for both compiled shaders in `dir`.
    pub fn with_shader_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.vertex_shader = dir.join(VERTEX_SHADER_FILE);
        self.fragment_shader = dir.join(FRAGMENT_SHADER_FILE);
        self
    }

    /// Replace the validation layer list.
    pub fn with_validation_layers(mut self, layers: Vec<&'static CStr>) -> Self {
        self.validation_layers = layers;
        self
    }

    /// Replace the required device extension list.
    pub fn with_device_extensions(mut self, extensions: Vec<&'static CStr>) -> Self {
        self.device_extensions = extensions;
        self
    }
}
