//! Validation layer message forwarding.

use crate::error::Result;
use ash::vk;
use std::borrow::Cow;
use std::ffi::{c_void, CStr};

/// Debug messenger create info shared by instance creation and the
/// persistent messenger.
pub fn debug_messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
}

/// Persistent debug messenger, alive between instance creation and
/// destruction.
pub struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    /// Create the messenger.
    ///
    /// # Safety
    /// The instance must have been created with `VK_EXT_debug_utils` enabled.
    pub unsafe fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let messenger = loader.create_debug_utils_messenger(&debug_messenger_create_info(), None)?;
        Ok(Self { loader, messenger })
    }

    /// Destroy the messenger.
    ///
    /// # Safety
    /// Must be called before the owning instance is destroyed.
    pub unsafe fn destroy(&self) {
        self.loader
            .destroy_debug_utils_messenger(self.messenger, None);
    }
}

/// Severity label used in forwarded messages.
pub fn severity_label(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> &'static str {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        "error"
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        "warning"
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        "info"
    } else {
        "verbose"
    }
}

/// Forward driver diagnostics to `tracing`. Never asks the driver to abort
/// the triggering call.
unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let message = if data.is_null() || (*data).p_message.is_null() {
        Cow::Borrowed("<no message>")
    } else {
        CStr::from_ptr((*data).p_message).to_string_lossy()
    };

    let label = severity_label(severity);
    match label {
        "error" => tracing::error!("[vulkan][{label}][{message_type:?}] {message}"),
        "warning" => tracing::warn!("[vulkan][{label}][{message_type:?}] {message}"),
        "info" => tracing::debug!("[vulkan][{label}][{message_type:?}] {message}"),
        _ => tracing::trace!("[vulkan][{label}][{message_type:?}] {message}"),
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_labels_pick_the_most_severe_bit() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as S;
        assert_eq!(severity_label(S::ERROR), "error");
        assert_eq!(severity_label(S::WARNING | S::ERROR), "error");
        assert_eq!(severity_label(S::WARNING), "warning");
        assert_eq!(severity_label(S::INFO), "info");
        assert_eq!(severity_label(S::VERBOSE), "verbose");
    }

    #[test]
    fn create_info_registers_callback_for_validation_messages() {
        let info = debug_messenger_create_info();
        assert!(info.pfn_user_callback.is_some());
        assert!(info
            .message_type
            .contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION));
        assert!(info
            .message_severity
            .contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR));
        assert!(!info
            .message_severity
            .contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO));
    }

    #[test]
    fn callback_never_aborts_and_tolerates_null_data() {
        let result = unsafe {
            debug_callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
                std::ptr::null(),
                std::ptr::null_mut(),
            )
        };
        assert_eq!(result, vk::FALSE);
    }
}
