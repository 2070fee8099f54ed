//! Synchronization primitives and per-frame slots.

use crate::command::CommandPool;
use crate::error::{GpuError, Result};
use ash::vk;

/// Create a semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    let semaphore = device.create_semaphore(&create_info, None)?;
    Ok(semaphore)
}

/// Create a fence.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    let fence = device.create_fence(&create_info, None)?;
    Ok(fence)
}

/// Wait for a fence to be signaled.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn wait_for_fence(
    device: &ash::Device,
    fence: vk::Fence,
    timeout_ns: u64,
) -> Result<()> {
    device.wait_for_fences(&[fence], true, timeout_ns)?;
    Ok(())
}

/// Reset a fence to unsignaled state.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn reset_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    device.reset_fences(&[fence])?;
    Ok(())
}

/// Everything one frame in flight needs: two semaphores, a fence and the
/// command buffer recorded for that frame.
pub struct FrameSync {
    /// Semaphore signaled when image is available
    pub image_available: vk::Semaphore,
    /// Semaphore signaled when rendering is complete
    pub render_finished: vk::Semaphore,
    /// Fence to wait for frame completion. Created signaled so the first
    /// wait returns immediately.
    pub in_flight: vk::Fence,
    /// Primary command buffer re-recorded every time the slot comes round
    pub command_buffer: vk::CommandBuffer,
}

impl FrameSync {
    /// Create frame synchronization resources.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device, command_buffer: vk::CommandBuffer) -> Result<Self> {
        Ok(Self {
            image_available: create_semaphore(device)?,
            render_finished: create_semaphore(device)?,
            in_flight: create_fence(device, true)?,
            command_buffer,
        })
    }

    /// Wait for this frame to be available.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn wait(&self, device: &ash::Device) -> Result<()> {
        wait_for_fence(device, self.in_flight, u64::MAX)
    }

    /// Reset the fence for the next frame.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn reset(&self, device: &ash::Device) -> Result<()> {
        reset_fence(device, self.in_flight)
    }

    /// Destroy synchronization resources. The command buffer is released
    /// with its pool.
    ///
    /// # Safety
    /// The device must be valid and resources must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_semaphore(self.image_available, None);
        device.destroy_semaphore(self.render_finished, None);
        device.destroy_fence(self.in_flight, None);
    }
}

/// Fixed set of frame slots, indexed by the frame loop's current frame.
pub struct FrameSyncSet {
    frame_syncs: Vec<FrameSync>,
}

impl FrameSyncSet {
    /// Create `frames_in_flight` slots, allocating one command buffer each
    /// from `pool`.
    ///
    /// # Safety
    /// The device must be valid and `pool` must belong to it.
    pub unsafe fn new(
        device: &ash::Device,
        pool: &CommandPool,
        frames_in_flight: usize,
    ) -> Result<Self> {
        let command_buffers = pool.allocate_command_buffers(
            device,
            vk::CommandBufferLevel::PRIMARY,
            frames_in_flight as u32,
        )?;

        let mut frame_syncs = Vec::with_capacity(frames_in_flight);
        for command_buffer in command_buffers {
            frame_syncs.push(FrameSync::new(device, command_buffer)?);
        }

        Ok(Self { frame_syncs })
    }

    /// Get the resources for frame slot `index`.
    pub fn get(&self, index: usize) -> Result<&FrameSync> {
        self.frame_syncs
            .get(index)
            .ok_or_else(|| GpuError::InvalidState(format!("No frame slot {index}")))
    }

    /// Number of frame slots.
    pub fn len(&self) -> usize {
        self.frame_syncs.len()
    }

    /// Whether there are no slots.
    pub fn is_empty(&self) -> bool {
        self.frame_syncs.is_empty()
    }

    /// Destroy all resources.
    ///
    /// # Safety
    /// The device must be valid and all resources must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        for sync in &self.frame_syncs {
            sync.destroy(device);
        }
    }
}
