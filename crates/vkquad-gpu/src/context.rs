//! GPU context management.

use crate::capabilities::{GpuCapabilities, QueueFamilyIndices};
use crate::debug::DebugMessenger;
use crate::error::{GpuError, Result};
use crate::instance::{
    create_instance, default_device_extensions, default_validation_layers, select_physical_device,
};
use crate::memory::GpuAllocator;
use crate::surface::{SurfaceContext, SurfaceSupport};
use ash::vk;
use parking_lot::Mutex;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{c_char, CStr};
use std::sync::Arc;

/// Main GPU context holding the instance, surface, device and queues.
///
/// Dropping the context tears everything down in reverse creation order:
/// allocator, device, surface, debug messenger, instance.
pub struct GpuContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) debug_messenger: Option<DebugMessenger>,
    pub(crate) surface: SurfaceContext,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: Arc<ash::Device>,
    pub(crate) swapchain_loader: ash::khr::swapchain::Device,
    pub(crate) capabilities: GpuCapabilities,
    pub(crate) allocator: Mutex<GpuAllocator>,

    // Queue families and queues
    pub(crate) queue_families: QueueFamilyIndices,
    pub(crate) graphics_queue: vk::Queue,
    pub(crate) present_queue: vk::Queue,
}

impl GpuContext {
    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the window surface.
    pub fn surface(&self) -> &SurfaceContext {
        &self.surface
    }

    /// Get the swapchain extension loader.
    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    /// Get GPU capabilities.
    pub fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the present queue.
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Get the graphics and present queue family indices.
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    /// Get the graphics queue family index.
    pub fn graphics_queue_family(&self) -> u32 {
        self.queue_families.graphics
    }

    /// Get access to the GPU allocator.
    pub fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    /// Query current surface support for the selected device.
    pub fn surface_support(&self) -> Result<SurfaceSupport> {
        unsafe { self.surface.support(self.physical_device) }
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // Shutdown allocator BEFORE destroying device
            // This frees all VkDeviceMemory allocations
            self.allocator.lock().shutdown();

            self.device.destroy_device(None);
            self.surface.destroy();
            if let Some(messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Builder for creating a GPU context.
///
/// Layer and extension lists are plain configuration, handed to the setup
/// stages in order: instance, debug messenger, surface, device.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
    validation_layers: Vec<&'static CStr>,
    device_extensions: Vec<&'static CStr>,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "vkquad".to_string(),
            enable_validation: cfg!(debug_assertions),
            validation_layers: default_validation_layers(),
            device_extensions: default_device_extensions(),
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Replace the validation layer list.
    pub fn validation_layers(mut self, layers: Vec<&'static CStr>) -> Self {
        self.validation_layers = layers;
        self
    }

    /// Replace the required device extension list.
    pub fn device_extensions(mut self, extensions: Vec<&'static CStr>) -> Self {
        self.device_extensions = extensions;
        self
    }

    /// Layers handed to the instance; empty when validation is off.
    fn active_layers(&self) -> &[&'static CStr] {
        if self.enable_validation {
            &self.validation_layers
        } else {
            &[]
        }
    }

    /// `VK_EXT_debug_utils` is only enabled alongside layers, so the
    /// messenger follows the same condition.
    fn uses_debug_messenger(&self) -> bool {
        !self.active_layers().is_empty()
    }

    /// Build the GPU context for `window`.
    ///
    /// A failing stage destroys whatever the earlier stages created.
    pub fn build<W>(self, window: &W) -> Result<GpuContext>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        // Load Vulkan entry point
        let entry = unsafe { ash::Entry::load() }.map_err(|e| GpuError::Loading(e.to_string()))?;

        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?
            .as_raw();

        if self.enable_validation && !self.uses_debug_messenger() {
            tracing::warn!("Validation requested with no layers; debug messenger disabled");
        }

        // Create Vulkan instance
        let instance =
            unsafe { create_instance(&entry, &self.app_name, display, self.active_layers()) }?;

        let debug_messenger = if self.uses_debug_messenger() {
            match unsafe { DebugMessenger::new(&entry, &instance) } {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { destroy_partial(&instance, None, None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        let surface = match unsafe { SurfaceContext::from_window(&entry, &instance, window) } {
            Ok(surface) => surface,
            Err(e) => {
                unsafe { destroy_partial(&instance, debug_messenger.as_ref(), None) };
                return Err(e);
            }
        };

        let parts = match unsafe { open_device(&instance, &surface, &self.device_extensions) } {
            Ok(parts) => parts,
            Err(e) => {
                unsafe { destroy_partial(&instance, debug_messenger.as_ref(), Some(&surface)) };
                return Err(e);
            }
        };

        Ok(GpuContext {
            entry,
            instance,
            debug_messenger,
            surface,
            physical_device: parts.physical_device,
            device: parts.device,
            swapchain_loader: parts.swapchain_loader,
            capabilities: parts.capabilities,
            allocator: Mutex::new(parts.allocator),
            queue_families: parts.queue_families,
            graphics_queue: parts.graphics_queue,
            present_queue: parts.present_queue,
        })
    }
}

/// Everything created on top of the instance and surface.
struct DeviceParts {
    physical_device: vk::PhysicalDevice,
    capabilities: GpuCapabilities,
    queue_families: QueueFamilyIndices,
    device: Arc<ash::Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    allocator: GpuAllocator,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

/// Select a device for `surface`, create it, and set up its allocator.
///
/// # Safety
/// The instance and surface must be valid.
unsafe fn open_device(
    instance: &ash::Instance,
    surface: &SurfaceContext,
    extensions: &[&CStr],
) -> Result<DeviceParts> {
    // Select the first device that can render to this surface
    let (physical_device, capabilities) = select_physical_device(
        instance,
        &surface.surface_loader,
        surface.surface,
        extensions,
    )?;

    tracing::info!("Selected GPU: {}", capabilities.summary());

    let queue_families = capabilities
        .queue_families
        .ok_or(GpuError::NoSuitableDevice)?;

    // Create logical device
    let (device, graphics_queue, present_queue) =
        create_device(instance, physical_device, &queue_families, extensions)?;

    let device = Arc::new(device);
    let swapchain_loader = ash::khr::swapchain::Device::new(instance, &device);

    // Create GPU allocator
    let allocator = match GpuAllocator::new(instance, device.clone(), physical_device) {
        Ok(allocator) => allocator,
        Err(e) => {
            device.destroy_device(None);
            return Err(e);
        }
    };

    Ok(DeviceParts {
        physical_device,
        capabilities,
        queue_families,
        device,
        swapchain_loader,
        allocator,
        graphics_queue,
        present_queue,
    })
}

/// Tear down a partially built context in reverse creation order.
///
/// # Safety
/// No device may still exist on `instance`.
unsafe fn destroy_partial(
    instance: &ash::Instance,
    debug_messenger: Option<&DebugMessenger>,
    surface: Option<&SurfaceContext>,
) {
    if let Some(surface) = surface {
        surface.destroy();
    }
    if let Some(messenger) = debug_messenger {
        messenger.destroy();
    }
    instance.destroy_instance(None);
}

/// Create the logical device and retrieve queues.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_families: &QueueFamilyIndices,
    extensions: &[&CStr],
) -> Result<(ash::Device, vk::Queue, vk::Queue)> {
    // One queue per unique family
    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    let extension_names: Vec<*const c_char> = extensions.iter().map(|ext| ext.as_ptr()).collect();

    let features = vk::PhysicalDeviceFeatures::default();

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    let device = instance
        .create_device(physical_device, &device_create_info, None)
        .map_err(GpuError::from)?;

    let graphics_queue = device.get_device_queue(queue_families.graphics, 0);
    let present_queue = device.get_device_queue(queue_families.present, 0);

    Ok((device, graphics_queue, present_queue))
}
