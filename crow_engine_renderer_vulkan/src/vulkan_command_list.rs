/// Vulkan command list implementation
///
/// Each list owns its own command pool, so lists can be recorded and
/// reset independently of each other. Recording is one-time-submit;
/// the frame ring re-records the list on every reuse cycle.

use ash::vk;
use crow_engine::crow::{Error, Result};
use crow_engine::engine_error;
use crow_engine::gpu::{CommandList, DescriptorSet, GpuBuffer, Pipeline};
use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::vulkan_context::GpuContext;
use crate::vulkan_resources::{VulkanBuffer, VulkanDescriptorSet, VulkanPipeline};
use crate::vulkan_swapchain::SurfaceState;

const LOG_SOURCE: &str = "crow::vulkan";

pub struct VulkanCommandList {
    ctx: Arc<GpuContext>,
    surface: Arc<Mutex<SurfaceState>>,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
}

impl VulkanCommandList {
    pub(crate) fn new(ctx: Arc<GpuContext>, surface: Arc<Mutex<SurfaceState>>) -> Result<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
                .queue_family_index(ctx.graphics_queue_family);

            let command_pool = ctx.device.create_command_pool(&pool_info, None).map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to create command pool: {:?}", e);
                Error::InitializationFailed(format!("Failed to create command pool: {:?}", e))
            })?;

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = ctx
                .device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to allocate command buffer: {:?}", e);
                    Error::InitializationFailed(format!(
                        "Failed to allocate command buffer: {:?}",
                        e
                    ))
                })?[0];

            Ok(Self {
                ctx,
                surface,
                command_pool,
                command_buffer,
            })
        }
    }

    pub(crate) fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }
}

impl CommandList for VulkanCommandList {
    fn begin(&mut self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to reset command buffer: {:?}", e);
                    Error::BackendError(format!("Failed to reset command buffer: {:?}", e))
                })?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            self.ctx
                .device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to begin command buffer: {:?}", e);
                    Error::BackendError(format!("Failed to begin command buffer: {:?}", e))
                })
        }
    }

    fn end(&mut self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to end command buffer: {:?}", e);
                    Error::BackendError(format!("Failed to end command buffer: {:?}", e))
                })
        }
    }

    fn begin_render_pass(&mut self, image_index: u32, clear_color: [f32; 4]) -> Result<()> {
        let surface = self
            .surface
            .lock()
            .map_err(|_| Error::BackendError("Surface state lock poisoned".to_string()))?;

        let framebuffer = surface.framebuffer(image_index).ok_or_else(|| {
            engine_error!(
                LOG_SOURCE,
                "Image index {} out of range (count: {})",
                image_index,
                surface.image_count()
            );
            Error::InvalidResource(format!("No framebuffer for image index {}", image_index))
        })?;
        let extent = surface.extent();

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let render_pass_begin = vk::RenderPassBeginInfo::default()
            .render_pass(surface.render_pass())
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        unsafe {
            self.ctx.device.cmd_begin_render_pass(
                self.command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );

            // Pipelines are built with dynamic viewport and scissor
            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            self.ctx
                .device
                .cmd_set_viewport(self.command_buffer, 0, &[viewport]);

            let scissor = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            };
            self.ctx
                .device
                .cmd_set_scissor(self.command_buffer, 0, &[scissor]);
        }

        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        unsafe {
            self.ctx.device.cmd_end_render_pass(self.command_buffer);
        }
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        let pipeline = downcast_pipeline(pipeline)?;
        unsafe {
            self.ctx.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.pipeline,
            );
        }
        Ok(())
    }

    fn bind_descriptor_set(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        set: &Arc<dyn DescriptorSet>,
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        let pipeline = downcast_pipeline(pipeline)?;
        let set = set
            .as_any()
            .downcast_ref::<VulkanDescriptorSet>()
            .ok_or_else(|| {
                Error::InvalidResource("Descriptor set was not created by this backend".to_string())
            })?;

        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.layout,
                set_index,
                &[set.set],
                dynamic_offsets,
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn GpuBuffer>) -> Result<()> {
        let buffer = buffer
            .as_any()
            .downcast_ref::<VulkanBuffer>()
            .ok_or_else(|| {
                Error::InvalidResource("Buffer was not created by this backend".to_string())
            })?;

        unsafe {
            self.ctx
                .device
                .cmd_bind_vertex_buffers(self.command_buffer, 0, &[buffer.buffer], &[0]);
        }
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32, first_instance: u32) -> Result<()> {
        unsafe {
            self.ctx.device.cmd_draw(
                self.command_buffer,
                vertex_count,
                1,
                first_vertex,
                first_instance,
            );
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanCommandList {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees its command buffer
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

fn downcast_pipeline(pipeline: &Arc<dyn Pipeline>) -> Result<&VulkanPipeline> {
    pipeline
        .as_any()
        .downcast_ref::<VulkanPipeline>()
        .ok_or_else(|| {
            Error::InvalidResource("Pipeline was not created by this backend".to_string())
        })
}
