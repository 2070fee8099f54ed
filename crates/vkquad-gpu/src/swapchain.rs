//! Swapchain management.

use crate::capabilities::QueueFamilyIndices;
use crate::error::{GpuError, Result};
use crate::surface::SurfaceSupport;
use ash::vk;

/// Result of acquiring a swapchain image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired; `suboptimal` images are still rendered.
    Acquired { image_index: u32, suboptimal: bool },
    /// No image was acquired; the swapchain must be recreated.
    OutOfDate,
}

/// Result of presenting a swapchain image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Optimal,
    Suboptimal,
    OutOfDate,
}

impl PresentOutcome {
    /// Whether the swapchain should be rebuilt after this present.
    pub fn needs_recreate(self) -> bool {
        !matches!(self, Self::Optimal)
    }
}

/// Swapchain wrapper.
///
/// Owns the images' views and, once [`Swapchain::create_framebuffers`] has
/// run, one framebuffer per image.
pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub framebuffers: Vec<vk::Framebuffer>,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a new swapchain sized for a `desired` framebuffer extent.
    ///
    /// # Safety
    /// All handles must be valid. `old_swapchain`, if any, must not be
    /// destroyed before this call returns.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn new(
        device: &ash::Device,
        swapchain_loader: &ash::khr::swapchain::Device,
        surface: vk::SurfaceKHR,
        support: &SurfaceSupport,
        queue_families: QueueFamilyIndices,
        desired: vk::Extent2D,
        vsync: bool,
        old_swapchain: Option<vk::SwapchainKHR>,
    ) -> Result<Self> {
        support.ensure_adequate()?;

        let surface_format = select_surface_format(&support.formats);
        let present_mode = select_present_mode(&support.present_modes, vsync);
        let extent = calculate_extent(&support.capabilities, desired.width, desired.height);
        ensure_nonzero_extent(extent)?;
        let image_count = choose_image_count(&support.capabilities);

        tracing::debug!(
            "Swapchain parameters: {:?}/{:?}, {:?}, {}x{}, {} images",
            surface_format.format,
            surface_format.color_space,
            present_mode,
            extent.width,
            extent.height,
            image_count
        );

        let family_indices = [queue_families.graphics, queue_families.present];
        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain.unwrap_or(vk::SwapchainKHR::null()));

        // Images are shared when graphics and presentation use different families
        create_info = if queue_families.is_shared() {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        } else {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        };

        let swapchain = swapchain_loader
            .create_swapchain(&create_info, None)
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;

        // Get swapchain images
        let images = match swapchain_loader.get_swapchain_images(swapchain) {
            Ok(images) => images,
            Err(e) => {
                swapchain_loader.destroy_swapchain(swapchain, None);
                return Err(e.into());
            }
        };

        // Create image views
        let image_views = create_each(
            &images,
            |&image| {
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(surface_format.format)
                    .components(vk::ComponentMapping::default())
                    .subresource_range(
                        vk::ImageSubresourceRange::default()
                            .aspect_mask(vk::ImageAspectFlags::COLOR)
                            .base_mip_level(0)
                            .level_count(1)
                            .base_array_layer(0)
                            .layer_count(1),
                    );

                device.create_image_view(&view_info, None)
            },
            |view| device.destroy_image_view(view, None),
        );
        let image_views = match image_views {
            Ok(views) => views,
            Err(e) => {
                swapchain_loader.destroy_swapchain(swapchain, None);
                return Err(e.into());
            }
        };

        tracing::info!(
            "Swapchain created: {}x{}, {} images",
            extent.width,
            extent.height,
            images.len()
        );

        Ok(Self {
            swapchain,
            images,
            image_views,
            framebuffers: Vec::new(),
            format: surface_format.format,
            color_space: surface_format.color_space,
            present_mode,
            extent,
        })
    }

    /// Create one framebuffer per image view for `render_pass`.
    ///
    /// # Safety
    /// The device and render pass must be valid, and the render pass must be
    /// compatible with this swapchain's format.
    pub unsafe fn create_framebuffers(
        &mut self,
        device: &ash::Device,
        render_pass: vk::RenderPass,
    ) -> Result<()> {
        self.destroy_framebuffers(device);

        for &view in &self.image_views {
            let attachments = [view];
            let info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(self.extent.width)
                .height(self.extent.height)
                .layers(1);

            let framebuffer = device.create_framebuffer(&info, None)?;
            self.framebuffers.push(framebuffer);
        }

        Ok(())
    }

    /// Framebuffer for an acquired image.
    pub fn framebuffer(&self, image_index: u32) -> Result<vk::Framebuffer> {
        self.framebuffers
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| {
                GpuError::InvalidState(format!("No framebuffer for swapchain image {image_index}"))
            })
    }

    /// Aspect ratio of the current extent.
    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height.max(1) as f32
    }

    /// Acquire the next image, signaling `semaphore` when it is ready.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn acquire_next_image(
        &self,
        swapchain_loader: &ash::khr::swapchain::Device,
        semaphore: vk::Semaphore,
        timeout_ns: u64,
    ) -> Result<AcquireOutcome> {
        let result = swapchain_loader.acquire_next_image(
            self.swapchain,
            timeout_ns,
            semaphore,
            vk::Fence::null(),
        );

        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            }),
            // OUT_OF_DATE means no image was acquired; caller must recreate the swapchain.
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(GpuError::from(e)),
        }
    }

    /// Present an image.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn present(
        &self,
        swapchain_loader: &ash::khr::swapchain::Device,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<PresentOutcome> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match swapchain_loader.queue_present(queue, &present_info) {
            Ok(false) => Ok(PresentOutcome::Optimal),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(GpuError::from(e)),
        }
    }

    unsafe fn destroy_framebuffers(&mut self, device: &ash::Device) {
        for framebuffer in self.framebuffers.drain(..) {
            device.destroy_framebuffer(framebuffer, None);
        }
    }

    /// Destroy framebuffers, image views and the swapchain.
    ///
    /// # Safety
    /// All handles must be valid and swapchain must not be in use.
    pub unsafe fn destroy(
        &mut self,
        device: &ash::Device,
        swapchain_loader: &ash::khr::swapchain::Device,
    ) {
        self.destroy_framebuffers(device);
        for view in self.image_views.drain(..) {
            device.destroy_image_view(view, None);
        }
        swapchain_loader.destroy_swapchain(self.swapchain, None);
        self.swapchain = vk::SwapchainKHR::null();
        self.images.clear();
    }
}

/// Select the best surface format.
///
/// # Panics
/// Panics if `available` is empty; callers check surface adequacy first.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    // Prefer SRGB
    for format in available {
        if format.format == vk::Format::B8G8R8A8_SRGB
            && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        {
            return *format;
        }
    }

    // Fall back to first available
    available[0]
}

/// Select the best present mode.
pub fn select_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }

    // Mailbox when offered, otherwise FIFO (always supported)
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Calculate swapchain extent.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired_width: u32,
    desired_height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: desired_width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: desired_height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// Reject extents with no area; a zero-sized swapchain is invalid.
pub fn ensure_nonzero_extent(extent: vk::Extent2D) -> Result<()> {
    if extent.width == 0 || extent.height == 0 {
        return Err(GpuError::SwapchainCreation(format!(
            "Surface extent {}x{} has no area",
            extent.width, extent.height
        )));
    }
    Ok(())
}

/// Create one handle per item. If any creation fails, the handles made so
/// far are destroyed in reverse order before the error is returned.
fn create_each<T, H, E>(
    items: &[T],
    mut create: impl FnMut(&T) -> std::result::Result<H, E>,
    mut destroy: impl FnMut(H),
) -> std::result::Result<Vec<H>, E> {
    let mut created = Vec::with_capacity(items.len());
    for item in items {
        match create(item) {
            Ok(handle) => created.push(handle),
            Err(e) => {
                while let Some(handle) = created.pop() {
                    destroy(handle);
                }
                return Err(e);
            }
        }
    }
    Ok(created)
}

/// One image more than the minimum, capped by the maximum (0 = unbounded).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && image_count > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        image_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        }
    }

    #[test]
    fn prefers_bgra_srgb() {
        let available = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(select_surface_format(&available), available[1]);
    }

    #[test]
    fn falls_back_to_first_format() {
        let available = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            // Right format, wrong color space
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ];
        assert_eq!(select_surface_format(&available), available[0]);
    }

    #[test]
    fn present_mode_prefers_mailbox_then_fifo() {
        use vk::PresentModeKHR as P;
        assert_eq!(select_present_mode(&[P::FIFO, P::MAILBOX], false), P::MAILBOX);
        assert_eq!(select_present_mode(&[P::IMMEDIATE, P::FIFO], false), P::FIFO);
        assert_eq!(select_present_mode(&[P::FIFO, P::MAILBOX], true), P::FIFO);
    }

    #[test]
    fn extent_uses_current_extent_when_defined() {
        let mut c = caps(2, 3);
        c.current_extent = vk::Extent2D {
            width: 640,
            height: 480,
        };
        let extent = calculate_extent(&c, 800, 600);
        assert_eq!((extent.width, extent.height), (640, 480));
    }

    #[test]
    fn extent_is_clamped_when_undefined() {
        let c = caps(2, 3);
        let extent = calculate_extent(&c, 800, 600);
        assert_eq!((extent.width, extent.height), (800, 600));

        let extent = calculate_extent(&c, 4000, 0);
        assert_eq!((extent.width, extent.height), (1920, 1));
    }

    #[test]
    fn image_count_respects_bounds() {
        assert_eq!(choose_image_count(&caps(2, 0)), 3);
        assert_eq!(choose_image_count(&caps(2, 8)), 3);
        assert_eq!(choose_image_count(&caps(3, 3)), 3);
        assert_eq!(choose_image_count(&caps(1, 2)), 2);
    }

    #[test]
    fn only_optimal_present_skips_recreate() {
        assert!(!PresentOutcome::Optimal.needs_recreate());
        assert!(PresentOutcome::Suboptimal.needs_recreate());
        assert!(PresentOutcome::OutOfDate.needs_recreate());
    }

    #[test]
    fn zero_area_extent_is_rejected() {
        assert!(ensure_nonzero_extent(vk::Extent2D { width: 800, height: 600 }).is_ok());
        for (width, height) in [(0, 0), (0, 600), (800, 0)] {
            let err = ensure_nonzero_extent(vk::Extent2D { width, height }).unwrap_err();
            assert!(matches!(err, GpuError::SwapchainCreation(ref msg) if msg.contains("no area")));
        }

        // A defined but empty current extent (minimized window) is passed through
        let mut c = vk::SurfaceCapabilitiesKHR::default();
        c.current_extent = vk::Extent2D { width: 0, height: 0 };
        assert!(ensure_nonzero_extent(calculate_extent(&c, 800, 600)).is_err());
    }

    #[test]
    fn partial_creation_destroys_what_was_made() {
        let mut destroyed = Vec::new();
        let result = create_each(
            &[1, 2, 3, 4],
            |&n| if n == 3 { Err("view 3 failed") } else { Ok(n * 10) },
            |handle| destroyed.push(handle),
        );

        assert_eq!(result, Err("view 3 failed"));
        assert_eq!(destroyed, vec![20, 10]);
    }

    #[test]
    fn full_creation_destroys_nothing() {
        let mut destroyed = Vec::new();
        let result = create_each(&[1, 2], |&n| Ok::<_, ()>(n), |h| destroyed.push(h));

        assert_eq!(result, Ok(vec![1, 2]));
        assert!(destroyed.is_empty());
    }
}
