//! Vulkan implementation of the frame backend.

use anyhow::{bail, Context};
use ash::vk;
use tracing::{error, info};
use vkquad_gpu::command::{begin_command_buffer, end_command_buffer, submit_command_buffers};
use vkquad_gpu::{
    AcquireOutcome, CommandPool, FrameSyncSet, GpuContext, GpuContextBuilder, PresentOutcome,
    Swapchain,
};
use vkquad_render::{QuadRenderer, QuadShaders, UniformBufferObject, UniformClock};
use winit::window::Window;

use crate::config::AppConfig;
use crate::frame_loop::{FrameBackend, MAX_FRAMES_IN_FLIGHT};

/// Owns every Vulkan object used to draw the quad.
///
/// Dropping the renderer waits for the device and destroys sync objects,
/// the command pool, quad resources (buffers, descriptors, pipeline, render
/// pass) and the swapchain, then the GPU context tears down the device,
/// surface, debug messenger and instance.
pub struct VulkanRenderer {
    swapchain: Swapchain,
    command_pool: CommandPool,
    frames: FrameSyncSet,
    quad: QuadRenderer,
    clock: UniformClock,
    vsync: bool,
    // Dropped last
    gpu: GpuContext,
}

impl VulkanRenderer {
    /// Build the GPU context and all rendering resources for `window`.
    pub fn new(window: &Window, config: &AppConfig) -> anyhow::Result<Self> {
        let shaders = QuadShaders::load(&config.vertex_shader, &config.fragment_shader)
            .context("Failed to load quad shaders")?;

        let gpu = GpuContextBuilder::new()
            .app_name(&config.title)
            .validation(config.validation)
            .validation_layers(config.validation_layers.clone())
            .device_extensions(config.device_extensions.clone())
            .build(window)?;

        let size = window.inner_size();
        let desired = vk::Extent2D {
            width: size.width.max(1),
            height: size.height.max(1),
        };

        let device = gpu.device();
        let support = gpu.surface_support()?;

        // SAFETY: all handles come from the freshly built context
        let mut swapchain = unsafe {
            Swapchain::new(
                device,
                gpu.swapchain_loader(),
                gpu.surface().surface,
                &support,
                gpu.queue_families(),
                desired,
                config.vsync,
                None,
            )?
        };

        let command_pool = unsafe { CommandPool::new(device, gpu.graphics_queue_family())? };

        let quad = unsafe {
            QuadRenderer::new(
                device,
                &mut gpu.allocator().lock(),
                &command_pool,
                gpu.graphics_queue(),
                swapchain.format,
                &shaders,
                MAX_FRAMES_IN_FLIGHT,
            )?
        };

        unsafe {
            swapchain.create_framebuffers(device, quad.render_pass())?;
        }

        let frames = unsafe { FrameSyncSet::new(device, &command_pool, MAX_FRAMES_IN_FLIGHT)? };

        info!("Renderer ready with {MAX_FRAMES_IN_FLIGHT} frames in flight");

        Ok(Self {
            swapchain,
            command_pool,
            frames,
            quad,
            clock: UniformClock::new(),
            vsync: config.vsync,
            gpu,
        })
    }

    /// The GPU context.
    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    /// Current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }
}

impl FrameBackend for VulkanRenderer {
    fn wait_for_slot(&mut self, slot: usize) -> anyhow::Result<()> {
        let frame = self.frames.get(slot)?;
        unsafe { frame.wait(self.gpu.device())? };
        Ok(())
    }

    fn acquire_image(&mut self, slot: usize) -> anyhow::Result<AcquireOutcome> {
        let frame = self.frames.get(slot)?;
        let outcome = unsafe {
            self.swapchain.acquire_next_image(
                self.gpu.swapchain_loader(),
                frame.image_available,
                u64::MAX,
            )?
        };
        Ok(outcome)
    }

    fn reset_slot(&mut self, slot: usize) -> anyhow::Result<()> {
        let frame = self.frames.get(slot)?;
        unsafe { frame.reset(self.gpu.device())? };
        Ok(())
    }

    fn update_uniforms(&mut self, slot: usize) -> anyhow::Result<()> {
        let seconds = self.clock.elapsed();
        let ubo = UniformBufferObject::at(seconds, self.swapchain.aspect_ratio());
        self.quad.update_uniforms(slot, &ubo)?;
        Ok(())
    }

    fn record(&mut self, slot: usize, image_index: u32) -> anyhow::Result<()> {
        let device = self.gpu.device();
        let cmd = self.frames.get(slot)?.command_buffer;
        let framebuffer = self.swapchain.framebuffer(image_index)?;

        unsafe {
            begin_command_buffer(device, cmd, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
            self.quad
                .record(device, cmd, framebuffer, self.swapchain.extent, slot)?;
            end_command_buffer(device, cmd)?;
        }
        Ok(())
    }

    fn submit(&mut self, slot: usize) -> anyhow::Result<()> {
        let frame = self.frames.get(slot)?;

        let wait_semaphores = [frame.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [frame.render_finished];
        let command_buffers = [frame.command_buffer];

        unsafe {
            submit_command_buffers(
                self.gpu.device(),
                self.gpu.graphics_queue(),
                &command_buffers,
                &wait_semaphores,
                &wait_stages,
                &signal_semaphores,
                frame.in_flight,
            )?;
        }
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> anyhow::Result<PresentOutcome> {
        let frame = self.frames.get(slot)?;
        let outcome = unsafe {
            self.swapchain.present(
                self.gpu.swapchain_loader(),
                self.gpu.present_queue(),
                image_index,
                &[frame.render_finished],
            )?
        };
        Ok(outcome)
    }

    fn wait_idle(&mut self) -> anyhow::Result<()> {
        self.gpu.wait_idle()?;
        Ok(())
    }

    fn rebuild_swapchain(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        let device = self.gpu.device();
        let support = self.gpu.surface_support()?;

        unsafe {
            self.swapchain.destroy(device, self.gpu.swapchain_loader());

            self.swapchain = Swapchain::new(
                device,
                self.gpu.swapchain_loader(),
                self.gpu.surface().surface,
                &support,
                self.gpu.queue_families(),
                vk::Extent2D { width, height },
                self.vsync,
                None,
            )?;
        }

        if self.swapchain.format != self.quad.format() {
            bail!(
                "Swapchain format changed to {:?}; render pass expects {:?}",
                self.swapchain.format,
                self.quad.format()
            );
        }

        unsafe {
            self.swapchain
                .create_framebuffers(device, self.quad.render_pass())?;
        }
        Ok(())
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        let device = self.gpu.device();
        unsafe {
            if let Err(e) = self.gpu.wait_idle() {
                error!("Failed to wait idle: {e}");
            }

            self.frames.destroy(device);
            self.command_pool.destroy(device);

            if let Err(e) = self.quad.destroy(device, &mut self.gpu.allocator().lock()) {
                error!("Failed to destroy quad resources: {e}");
            }

            self.swapchain.destroy(device, self.gpu.swapchain_loader());
        }
        info!("Renderer destroyed");
    }
}
