//! GPU capability detection.

use crate::error::Result;
use ash::vk;
use std::collections::HashSet;
use std::ffi::CStr;

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// Queue family indices used for rendering and presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Pick graphics and present families.
    ///
    /// A single family that does both wins; otherwise the first graphics
    /// family and the first presenting family are paired. Returns `None` when
    /// either role has no candidate.
    pub fn find<F>(families: &[vk::QueueFamilyProperties], mut supports_present: F) -> Result<Option<Self>>
    where
        F: FnMut(u32) -> Result<bool>,
    {
        let mut graphics = None;
        let mut present = None;

        for (i, family) in families.iter().enumerate() {
            let i = i as u32;
            let has_graphics =
                family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
            let has_present = supports_present(i)?;

            if has_graphics && has_present {
                return Ok(Some(Self {
                    graphics: i,
                    present: i,
                }));
            }
            if has_graphics && graphics.is_none() {
                graphics = Some(i);
            }
            if has_present && present.is_none() {
                present = Some(i);
            }
        }

        Ok(graphics
            .zip(present)
            .map(|(graphics, present)| Self { graphics, present }))
    }

    /// Whether graphics and presentation share a family.
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Detected GPU capabilities.
#[derive(Debug, Clone)]
pub struct GpuCapabilities {
    /// GPU vendor
    pub vendor: GpuVendor,
    /// Device name
    pub device_name: String,
    /// Device type (discrete, integrated, ...)
    pub device_type: vk::PhysicalDeviceType,
    /// Vulkan API version
    pub api_version: u32,
    /// Driver version
    pub driver_version: u32,
    /// Graphics/present queue families, if the device has both.
    pub queue_families: Option<QueueFamilyIndices>,
    // Available extensions
    pub available_extensions: HashSet<String>,
}

impl GpuCapabilities {
    /// Query capabilities from a physical device against a surface.
    ///
    /// # Safety
    /// The instance, surface and physical device must be valid.
    pub unsafe fn query(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let properties = instance.get_physical_device_properties(physical_device);

        let extensions = instance.enumerate_device_extension_properties(physical_device)?;
        let available_extensions: HashSet<String> = extensions
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();

        let families = instance.get_physical_device_queue_family_properties(physical_device);
        let queue_families = QueueFamilyIndices::find(&families, |index| {
            Ok(surface_loader.get_physical_device_surface_support(physical_device, index, surface)?)
        })?;

        let device_name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unnamed device>".to_string());

        Ok(Self {
            vendor: GpuVendor::from_vendor_id(properties.vendor_id),
            device_name,
            device_type: properties.device_type,
            api_version: properties.api_version,
            driver_version: properties.driver_version,
            queue_families,
            available_extensions,
        })
    }

    /// Required extensions this device lacks.
    pub fn missing_extensions<'a>(&self, required: &[&'a CStr]) -> Vec<&'a CStr> {
        required
            .iter()
            .filter(|name| {
                !self
                    .available_extensions
                    .contains(name.to_string_lossy().as_ref())
            })
            .copied()
            .collect()
    }

    /// Get a human-readable summary of capabilities.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}, {:?}) - Vulkan {}.{}.{}",
            self.device_name,
            self.vendor,
            self.device_type,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
        )
    }
}
