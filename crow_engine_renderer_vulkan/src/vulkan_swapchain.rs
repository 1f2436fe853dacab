/// Surface-size-dependent Vulkan state
///
/// Everything here is rebuilt together when the window resizes: the
/// swapchain and its image views, the depth buffer, and the
/// framebuffers. The render pass survives a resize since its attachment
/// formats do not change. Shared behind a mutex with command lists so
/// `begin_render_pass` can resolve the framebuffer for an image index.

use ash::vk;
use crow_engine::crow::{Error, Result};
use crow_engine::engine_error;
use crow_engine::gpu::SurfaceStatus;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

const LOG_SOURCE: &str = "crow::vulkan";

const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

pub(crate) struct SurfaceState {
    ctx: Arc<GpuContext>,
    physical_device: vk::PhysicalDevice,

    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,

    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    extent: vk::Extent2D,

    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,

    depth_image: vk::Image,
    depth_view: vk::ImageView,
    depth_allocation: Option<Allocation>,
}

impl SurfaceState {
    pub fn new(
        ctx: Arc<GpuContext>,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        swapchain_loader: ash::khr::swapchain::Device,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        unsafe {
            let surface_capabilities = surface_loader
                .get_physical_device_surface_capabilities(physical_device, surface)
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to get surface capabilities: {:?}", e);
                    Error::InitializationFailed(format!(
                        "Failed to get surface capabilities: {:?}",
                        e
                    ))
                })?;

            let surface_formats = surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to query surface formats: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
                })?;

            let surface_format = choose_surface_format(&surface_formats);
            let format = surface_format.format;
            let color_space = surface_format.color_space;

            let extent = choose_extent(&surface_capabilities, width, height);

            let (swapchain, images, image_views) = create_swapchain(
                &ctx,
                &swapchain_loader,
                surface,
                &surface_capabilities,
                format,
                color_space,
                extent,
                vk::SwapchainKHR::null(),
            )?;

            let render_pass = create_render_pass(&ctx, format)?;
            let (depth_image, depth_view, depth_allocation) = create_depth_target(&ctx, extent)?;
            let framebuffers = create_framebuffers(
                &ctx,
                render_pass,
                &image_views,
                depth_view,
                extent,
            )?;

            Ok(Self {
                ctx,
                physical_device,
                surface,
                surface_loader,
                swapchain,
                swapchain_loader,
                images,
                image_views,
                format,
                color_space,
                extent,
                render_pass,
                framebuffers,
                depth_image,
                depth_view,
                depth_allocation: Some(depth_allocation),
            })
        }
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Request the next presentable image
    ///
    /// An out-of-date swapchain is a recoverable status, not an error;
    /// the caller rebuilds and retries.
    pub fn acquire_next_image(&self, acquired: vk::Semaphore) -> Result<SurfaceStatus> {
        unsafe {
            match self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                acquired,
                vk::Fence::null(),
            ) {
                Ok((image_index, _is_suboptimal)) => Ok(SurfaceStatus::Ready(image_index)),
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SurfaceStatus::OutOfDate),
                Err(e) => {
                    engine_error!(LOG_SOURCE, "Failed to acquire swapchain image: {:?}", e);
                    Err(Error::BackendError(format!(
                        "Failed to acquire swapchain image: {:?}",
                        e
                    )))
                }
            }
        }
    }

    pub fn present(&self, image_index: u32, wait: vk::Semaphore) -> Result<SurfaceStatus> {
        unsafe {
            let swapchains = [self.swapchain];
            let image_indices = [image_index];
            let wait_semaphores = [wait];

            let present_info = vk::PresentInfoKHR::default()
                .wait_semaphores(&wait_semaphores)
                .swapchains(&swapchains)
                .image_indices(&image_indices);

            match self
                .swapchain_loader
                .queue_present(self.ctx.graphics_queue, &present_info)
            {
                // Suboptimal still presented; treat as ready
                Ok(_) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(SurfaceStatus::Ready(image_index)),
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SurfaceStatus::OutOfDate),
                Err(e) => {
                    engine_error!(LOG_SOURCE, "Failed to present swapchain image: {:?}", e);
                    Err(Error::BackendError(format!(
                        "Failed to present swapchain image: {:?}",
                        e
                    )))
                }
            }
        }
    }

    /// Rebuild the swapchain and everything sized to it
    ///
    /// The caller must have waited for the device to go idle.
    pub fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        unsafe {
            self.destroy_sized_resources();

            let surface_capabilities = self
                .surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, self.surface)
                .map_err(|e| {
                    engine_error!(
                        LOG_SOURCE,
                        "Failed to get surface capabilities during recreate: {:?}",
                        e
                    );
                    Error::InitializationFailed(format!(
                        "Failed to get surface capabilities: {:?}",
                        e
                    ))
                })?;

            let extent = choose_extent(&surface_capabilities, width, height);

            let old_swapchain = self.swapchain;
            let (swapchain, images, image_views) = create_swapchain(
                &self.ctx,
                &self.swapchain_loader,
                self.surface,
                &surface_capabilities,
                self.format,
                self.color_space,
                extent,
                old_swapchain,
            )?;
            self.swapchain_loader.destroy_swapchain(old_swapchain, None);

            self.swapchain = swapchain;
            self.images = images;
            self.image_views = image_views;
            self.extent = extent;

            let (depth_image, depth_view, depth_allocation) =
                create_depth_target(&self.ctx, extent)?;
            self.depth_image = depth_image;
            self.depth_view = depth_view;
            self.depth_allocation = Some(depth_allocation);

            self.framebuffers = create_framebuffers(
                &self.ctx,
                self.render_pass,
                &self.image_views,
                self.depth_view,
                extent,
            )?;

            Ok(())
        }
    }

    /// Destroy framebuffers, depth target, and image views (not the
    /// swapchain itself; recreate hands the old one to Vulkan)
    unsafe fn destroy_sized_resources(&mut self) {
        for &framebuffer in &self.framebuffers {
            self.ctx.device.destroy_framebuffer(framebuffer, None);
        }
        self.framebuffers.clear();

        self.ctx.device.destroy_image_view(self.depth_view, None);
        self.ctx.device.destroy_image(self.depth_image, None);
        if let Some(allocation) = self.depth_allocation.take() {
            if let Ok(mut allocator) = self.ctx.allocator.lock() {
                allocator.free(allocation).ok();
            }
        }

        for &image_view in &self.image_views {
            self.ctx.device.destroy_image_view(image_view, None);
        }
        self.image_views.clear();
    }
}

impl Drop for SurfaceState {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();

            self.destroy_sized_resources();
            self.ctx.device.destroy_render_pass(self.render_pass, None);
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

// ===== CREATION HELPERS =====

/// Pick an sRGB swapchain format when available, first reported otherwise
///
/// The chosen format and color space are kept for the lifetime of the
/// surface; a resize recreates the swapchain with the same pair.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB || f.format == vk::Format::R8G8B8A8_SRGB
        })
        .copied()
        .unwrap_or(formats[0])
}

fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

#[allow(clippy::too_many_arguments)]
unsafe fn create_swapchain(
    ctx: &GpuContext,
    swapchain_loader: &ash::khr::swapchain::Device,
    surface: vk::SurfaceKHR,
    capabilities: &vk::SurfaceCapabilitiesKHR,
    format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    extent: vk::Extent2D,
    old_swapchain: vk::SwapchainKHR,
) -> Result<(vk::SwapchainKHR, Vec<vk::Image>, Vec<vk::ImageView>)> {
    let image_count = capabilities.min_image_count + 1;
    let image_count = if capabilities.max_image_count > 0 {
        image_count.min(capabilities.max_image_count)
    } else {
        image_count
    };

    let swapchain_create_info = vk::SwapchainCreateInfoKHR::default()
        .surface(surface)
        .min_image_count(image_count)
        .image_format(format)
        .image_color_space(color_space)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        .pre_transform(capabilities.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(vk::PresentModeKHR::FIFO)
        .clipped(true)
        .old_swapchain(old_swapchain);

    let swapchain = swapchain_loader
        .create_swapchain(&swapchain_create_info, None)
        .map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to create swapchain: {:?}", e);
            Error::InitializationFailed(format!("Failed to create swapchain: {:?}", e))
        })?;

    let images = swapchain_loader.get_swapchain_images(swapchain).map_err(|e| {
        engine_error!(LOG_SOURCE, "Failed to get swapchain images: {:?}", e);
        Error::InitializationFailed(format!("Failed to get swapchain images: {:?}", e))
    })?;

    let image_views: Vec<vk::ImageView> = images
        .iter()
        .map(|&image| {
            let create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            ctx.device.create_image_view(&create_info, None)
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to create swapchain image views: {:?}", e);
            Error::InitializationFailed(format!("Failed to create image views: {:?}", e))
        })?;

    Ok((swapchain, images, image_views))
}

unsafe fn create_render_pass(ctx: &GpuContext, format: vk::Format) -> Result<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription::default()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
        vk::AttachmentDescription::default()
            .format(DEPTH_FORMAT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
    ];

    let color_refs = [vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];
    let depth_ref = vk::AttachmentReference::default()
        .attachment(1)
        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .depth_stencil_attachment(&depth_ref)];

    let dependencies = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )];

    let render_pass_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    ctx.device
        .create_render_pass(&render_pass_info, None)
        .map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to create render pass: {:?}", e);
            Error::InitializationFailed(format!("Failed to create render pass: {:?}", e))
        })
}

unsafe fn create_depth_target(
    ctx: &GpuContext,
    extent: vk::Extent2D,
) -> Result<(vk::Image, vk::ImageView, Allocation)> {
    let image_info = vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .format(DEPTH_FORMAT)
        .extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED);

    let image = ctx.device.create_image(&image_info, None).map_err(|e| {
        engine_error!(LOG_SOURCE, "Failed to create depth image: {:?}", e);
        Error::InitializationFailed(format!("Failed to create depth image: {:?}", e))
    })?;

    let requirements = ctx.device.get_image_memory_requirements(image);
    let allocation = {
        let mut allocator = ctx.allocator.lock().map_err(|_| {
            Error::BackendError("GPU allocator lock poisoned".to_string())
        })?;
        allocator
            .allocate(&AllocationCreateDesc {
                name: "depth_target",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to allocate depth memory: {:?}", e);
                Error::OutOfMemory
            })?
    };

    ctx.device
        .bind_image_memory(image, allocation.memory(), allocation.offset())
        .map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to bind depth memory: {:?}", e);
            Error::InitializationFailed(format!("Failed to bind depth memory: {:?}", e))
        })?;

    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(DEPTH_FORMAT)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::DEPTH,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    let view = ctx.device.create_image_view(&view_info, None).map_err(|e| {
        engine_error!(LOG_SOURCE, "Failed to create depth image view: {:?}", e);
        Error::InitializationFailed(format!("Failed to create depth image view: {:?}", e))
    })?;

    Ok((image, view, allocation))
}

unsafe fn create_framebuffers(
    ctx: &GpuContext,
    render_pass: vk::RenderPass,
    image_views: &[vk::ImageView],
    depth_view: vk::ImageView,
    extent: vk::Extent2D,
) -> Result<Vec<vk::Framebuffer>> {
    image_views
        .iter()
        .map(|&view| {
            let attachments = [view, depth_view];
            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            ctx.device
                .create_framebuffer(&framebuffer_info, None)
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to create framebuffer: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create framebuffer: {:?}", e))
                })
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
