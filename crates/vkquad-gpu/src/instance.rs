//! Vulkan instance creation and physical device selection.

use crate::capabilities::GpuCapabilities;
use crate::debug::debug_messenger_create_info;
use crate::error::{GpuError, Result};
use crate::surface::SurfaceSupport;
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, CStr, CString};

/// Validation layers enabled when validation is requested.
pub fn default_validation_layers() -> Vec<&'static CStr> {
    vec![c"VK_LAYER_KHRONOS_validation"]
}

/// Device extensions every presenting device must support.
pub fn default_device_extensions() -> Vec<&'static CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// Return the requested names that are not present in `available`.
pub fn missing_names<'a>(available: &[&CStr], requested: &[&'a CStr]) -> Vec<&'a CStr> {
    requested
        .iter()
        .filter(|name| !available.contains(name))
        .copied()
        .collect()
}

/// Create a Vulkan instance.
///
/// Surface extensions are derived from `display`. When `validation_layers`
/// is non-empty, every listed layer must be installed, `VK_EXT_debug_utils`
/// is enabled, and a debug messenger create info is chained so that instance
/// creation itself is covered by the validation callback.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    display: RawDisplayHandle,
    validation_layers: &[&CStr],
) -> Result<ash::Instance> {
    let app_name = CString::new(app_name)
        .map_err(|e| GpuError::InvalidState(format!("Invalid application name: {e}")))?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(c"No Engine")
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_0);

    let available_extensions = entry.enumerate_instance_extension_properties(None)?;
    tracing::debug!("{} instance extensions supported", available_extensions.len());
    for ext in &available_extensions {
        if let Ok(name) = ext.extension_name_as_c_str() {
            tracing::debug!(" -- {}", name.to_string_lossy());
        }
    }

    let enable_validation = !validation_layers.is_empty();
    if enable_validation {
        check_layer_support(entry, validation_layers)?;
    }

    let mut extension_names: Vec<*const c_char> =
        ash_window::enumerate_required_extensions(display)?.to_vec();
    if enable_validation {
        extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    #[cfg(target_os = "macos")]
    {
        extension_names.push(ash::khr::portability_enumeration::NAME.as_ptr());
    }

    let layer_names: Vec<*const c_char> = validation_layers.iter().map(|l| l.as_ptr()).collect();

    // Required for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    let mut debug_info = debug_messenger_create_info();

    let mut create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .flags(create_flags);

    if enable_validation {
        create_info = create_info.push_next(&mut debug_info);
    }

    let instance = entry.create_instance(&create_info, None)?;

    Ok(instance)
}

/// Verify that every requested layer is installed.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
unsafe fn check_layer_support(entry: &ash::Entry, requested: &[&CStr]) -> Result<()> {
    let available_layers = entry.enumerate_instance_layer_properties()?;

    tracing::debug!("{} instance layers supported", available_layers.len());
    let available: Vec<&CStr> = available_layers
        .iter()
        .filter_map(|props| props.layer_name_as_c_str().ok())
        .collect();
    for name in &available {
        tracing::debug!(" -- {}", name.to_string_lossy());
    }

    match missing_names(&available, requested).first() {
        Some(missing) => Err(GpuError::LayerNotAvailable(
            missing.to_string_lossy().into_owned(),
        )),
        None => Ok(()),
    }
}

/// Select the first physical device able to render to and present on `surface`.
///
/// # Safety
/// The instance and surface must be valid.
pub unsafe fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    device_extensions: &[&CStr],
) -> Result<(vk::PhysicalDevice, GpuCapabilities)> {
    let devices = instance.enumerate_physical_devices()?;

    if devices.is_empty() {
        return Err(GpuError::NoSuitableDevice);
    }

    for device in devices {
        let capabilities =
            GpuCapabilities::query(instance, surface_loader, surface, device)?;

        let missing = capabilities.missing_extensions(device_extensions);
        if !missing.is_empty() {
            tracing::debug!(
                "Skipping {}: missing extensions {:?}",
                capabilities.device_name,
                missing
            );
            continue;
        }

        if capabilities.queue_families.is_none() {
            tracing::debug!(
                "Skipping {}: no graphics or present queue family",
                capabilities.device_name
            );
            continue;
        }

        let support = SurfaceSupport::query(surface_loader, device, surface)?;
        if !support.is_adequate() {
            tracing::debug!(
                "Skipping {}: surface offers no formats or present modes",
                capabilities.device_name
            );
            continue;
        }

        return Ok((device, capabilities));
    }

    Err(GpuError::NoSuitableDevice)
}
