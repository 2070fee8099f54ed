//! The rotating quad: pipeline, geometry buffers and per-frame uniforms.

use crate::error::{RenderError, Result};
use crate::render_pass::{create_render_pass, CLEAR_COLOR};
use crate::uniforms::UniformBufferObject;
use crate::vertex::{Vertex, QUAD_INDICES, QUAD_VERTICES};
use ash::vk;
use gpu_allocator::MemoryLocation;
use std::path::Path;
use vkquad_gpu::descriptors::{write_uniform_buffer, DescriptorPool, DescriptorSetLayoutBuilder};
use vkquad_gpu::memory::{GpuAllocator, GpuBuffer};
use vkquad_gpu::pipeline::{load_spirv, GraphicsPipeline, GraphicsPipelineConfig};
use vkquad_gpu::CommandPool;

/// SPIR-V for the quad's vertex and fragment stages.
#[derive(Debug, Clone)]
pub struct QuadShaders {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

impl QuadShaders {
    /// Read both stages from disk.
    pub fn load(vertex: impl AsRef<Path>, fragment: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            vertex: load_spirv(vertex)?,
            fragment: load_spirv(fragment)?,
        })
    }
}

/// GPU resources for drawing the quad.
///
/// Created once; only the uniform buffers change after construction.
pub struct QuadRenderer {
    format: vk::Format,
    render_pass: vk::RenderPass,
    descriptor_set_layout: vk::DescriptorSetLayout,
    pipeline: GraphicsPipeline,
    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    uniform_buffers: Vec<GpuBuffer>,
    descriptor_pool: DescriptorPool,
    descriptor_sets: Vec<vk::DescriptorSet>,
}

impl QuadRenderer {
    /// Build the render pass, pipeline, buffers and descriptor sets.
    ///
    /// Geometry is uploaded through `pool` on `queue`; one uniform buffer and
    /// descriptor set is created per frame in flight.
    ///
    /// # Safety
    /// The device must be valid and `pool` must belong to a family of `queue`.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn new(
        device: &ash::Device,
        allocator: &mut GpuAllocator,
        pool: &CommandPool,
        queue: vk::Queue,
        format: vk::Format,
        shaders: &QuadShaders,
        frames_in_flight: usize,
    ) -> Result<Self> {
        let render_pass = create_render_pass(device, format)?;

        let layout_builder =
            DescriptorSetLayoutBuilder::new().uniform_buffer(0, vk::ShaderStageFlags::VERTEX);
        let descriptor_set_layout = layout_builder.build(device)?;

        let config = GraphicsPipelineConfig {
            vertex_shader: shaders.vertex.clone(),
            fragment_shader: shaders.fragment.clone(),
            vertex_bindings: vec![Vertex::binding_description()],
            vertex_attributes: Vertex::attribute_descriptions().to_vec(),
            ..Default::default()
        };
        let pipeline = GraphicsPipeline::new(device, render_pass, &config, &[descriptor_set_layout])?;
        tracing::info!("Graphics pipeline created");

        let vertex_buffer = allocator.create_buffer_with_data(
            pool,
            queue,
            &QUAD_VERTICES,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            "quad_vertices",
        )?;
        let index_buffer = allocator.create_buffer_with_data(
            pool,
            queue,
            &QUAD_INDICES,
            vk::BufferUsageFlags::INDEX_BUFFER,
            "quad_indices",
        )?;

        let mut uniform_buffers = Vec::with_capacity(frames_in_flight);
        for i in 0..frames_in_flight {
            let buffer = allocator.create_buffer(
                UniformBufferObject::SIZE,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                MemoryLocation::CpuToGpu,
                &format!("quad_uniforms_{i}"),
            )?;
            uniform_buffers.push(buffer);
        }

        let pool_sizes = layout_builder.pool_sizes(frames_in_flight as u32);
        let descriptor_pool = DescriptorPool::new(device, frames_in_flight as u32, &pool_sizes)?;

        let layouts = vec![descriptor_set_layout; frames_in_flight];
        let descriptor_sets = descriptor_pool.allocate(device, &layouts)?;

        // Each slot's set points at that slot's uniform buffer
        for (set, buffer) in descriptor_sets.iter().zip(&uniform_buffers) {
            write_uniform_buffer(
                device,
                *set,
                0,
                buffer.buffer,
                0,
                UniformBufferObject::SIZE,
            );
        }

        Ok(Self {
            format,
            render_pass,
            descriptor_set_layout,
            pipeline,
            vertex_buffer,
            index_buffer,
            uniform_buffers,
            descriptor_pool,
            descriptor_sets,
        })
    }

    /// Render pass the swapchain framebuffers must be created against.
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Color format the render pass was created for.
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Number of frame slots this renderer was built for.
    pub fn frames_in_flight(&self) -> usize {
        self.uniform_buffers.len()
    }

    fn check_slot(&self, index: usize) -> Result<()> {
        if index < self.frames_in_flight() {
            Ok(())
        } else {
            Err(RenderError::InvalidFrameSlot {
                index,
                frames_in_flight: self.frames_in_flight(),
            })
        }
    }

    /// Write `ubo` into the slot's mapped uniform buffer.
    ///
    /// The caller must have waited on the slot's fence.
    pub fn update_uniforms(&self, slot: usize, ubo: &UniformBufferObject) -> Result<()> {
        self.check_slot(slot)?;
        self.uniform_buffers[slot].write(std::slice::from_ref(ubo))?;
        Ok(())
    }

    /// Record the quad draw into `cmd`, which must be in the recording state.
    ///
    /// # Safety
    /// All handles must be valid and `framebuffer` must have been created
    /// against [`Self::render_pass`] with `extent`.
    pub unsafe fn record(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        slot: usize,
    ) -> Result<()> {
        self.check_slot(slot)?;

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: CLEAR_COLOR,
            },
        }];
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(&clear_values);

        device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        device.cmd_set_viewport(cmd, 0, &[viewport]);
        device.cmd_set_scissor(cmd, 0, &[render_area]);

        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.pipeline);
        device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.buffer], &[0]);
        device.cmd_bind_index_buffer(cmd, self.index_buffer.buffer, 0, vk::IndexType::UINT16);
        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            self.pipeline.layout,
            0,
            &[self.descriptor_sets[slot]],
            &[],
        );
        device.cmd_draw_indexed(cmd, QUAD_INDICES.len() as u32, 1, 0, 0, 0);

        device.cmd_end_render_pass(cmd);
        Ok(())
    }

    /// Destroy buffers, descriptors, pipeline and render pass, in that order.
    ///
    /// # Safety
    /// The device must be idle with respect to these resources.
    pub unsafe fn destroy(&mut self, device: &ash::Device, allocator: &mut GpuAllocator) -> Result<()> {
        for buffer in &mut self.uniform_buffers {
            allocator.free_buffer(buffer)?;
        }
        self.uniform_buffers.clear();
        allocator.free_buffer(&mut self.vertex_buffer)?;
        allocator.free_buffer(&mut self.index_buffer)?;

        self.descriptor_pool.destroy(device);
        device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);

        self.pipeline.destroy(device);
        device.destroy_render_pass(self.render_pass, None);
        Ok(())
    }
}
