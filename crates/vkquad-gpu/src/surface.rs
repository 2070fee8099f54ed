//! Surface management for windowed rendering.
//!
//! Hides the raw-window-handle plumbing behind a small surface context and
//! exposes the per-device support query used by swapchain creation.

use crate::error::{GpuError, Result};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// The Vulkan surface for a window together with its extension loader.
pub struct SurfaceContext {
    /// The Vulkan surface handle.
    pub surface: vk::SurfaceKHR,
    /// Surface extension loader.
    pub surface_loader: ash::khr::surface::Instance,
}

impl SurfaceContext {
    /// Create a new surface for `window`.
    ///
    /// # Safety
    /// The instance must be valid, have the window's surface extensions
    /// enabled, and outlive the returned surface.
    pub unsafe fn from_window<W>(
        entry: &ash::Entry,
        instance: &ash::Instance,
        window: &W,
    ) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get window handle: {e}")))?;

        let surface = ash_window::create_surface(
            entry,
            instance,
            display.as_raw(),
            window_handle.as_raw(),
            None,
        )
        .map_err(|e| GpuError::SurfaceCreation(e.to_string()))?;

        let surface_loader = ash::khr::surface::Instance::new(entry, instance);

        Ok(Self {
            surface,
            surface_loader,
        })
    }

    /// Query what `physical_device` supports on this surface.
    ///
    /// # Safety
    /// The physical device must belong to the instance that created the surface.
    pub unsafe fn support(&self, physical_device: vk::PhysicalDevice) -> Result<SurfaceSupport> {
        SurfaceSupport::query(&self.surface_loader, physical_device, self.surface)
    }

    /// Destroy the surface.
    ///
    /// # Safety
    /// The surface must not be in use and no swapchain may reference it.
    pub unsafe fn destroy(&self) {
        self.surface_loader.destroy_surface(self.surface, None);
    }
}

/// Surface support query result.
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    /// Raw surface capabilities.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// Query surface capabilities, formats and present modes.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn query(
        surface_loader: &ash::khr::surface::Instance,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self> {
        let capabilities =
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?;
        let formats = surface_loader.get_physical_device_surface_formats(physical_device, surface)?;
        let present_modes =
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?;

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// At least one format and one present mode are available.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }

    /// Fail unless the surface can back a swapchain.
    pub fn ensure_adequate(&self) -> Result<()> {
        if self.formats.is_empty() {
            return Err(GpuError::InadequateSurface("no surface formats".to_string()));
        }
        if self.present_modes.is_empty() {
            return Err(GpuError::InadequateSurface("no present modes".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn support(formats: usize, modes: usize) -> SurfaceSupport {
        SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default(); formats],
            present_modes: vec![vk::PresentModeKHR::FIFO; modes],
        }
    }

    #[test]
    fn adequate_needs_formats_and_present_modes() {
        assert!(support(1, 1).is_adequate());
        assert!(support(1, 1).ensure_adequate().is_ok());
        assert!(!support(0, 1).is_adequate());
        assert!(!support(1, 0).is_adequate());
    }

    #[test]
    fn inadequate_surface_is_an_error() {
        let err = support(0, 2).ensure_adequate().unwrap_err();
        assert!(matches!(err, GpuError::InadequateSurface(ref msg) if msg.contains("formats")));

        let err = support(3, 0).ensure_adequate().unwrap_err();
        assert!(matches!(err, GpuError::InadequateSurface(ref msg) if msg.contains("present")));
    }
}
