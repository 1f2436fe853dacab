/// Vulkan implementation of the engine's `GraphicsDevice` seam

use ash::vk;
use crow_engine::crow::{Error, Result};
use crow_engine::engine_error;
use crow_engine::engine_info;
use crow_engine::gpu::{
    BufferDesc, CommandList, DescriptorKind, DescriptorPool, DescriptorSet, DescriptorSetLayout,
    DescriptorWrite, DeviceLimits, Fence, GpuBuffer, GraphicsDevice, LayoutBinding, Pipeline,
    Semaphore, SurfaceStatus, TextureDesc, TextureView, WriteResource,
};
use gpu_allocator::vulkan::{
    AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::MemoryLocation;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CString;
use std::sync::{Arc, Mutex};

use crate::vulkan_command_list::VulkanCommandList;
use crate::vulkan_context::GpuContext;
use crate::vulkan_pipeline::{build_pipeline, PipelineDesc};
use crate::vulkan_resources::{
    buffer_usage_to_vk, descriptor_kind_to_vk, shader_stages_to_vk, texture_filter_to_vk,
    VulkanBuffer, VulkanDescriptorPool, VulkanDescriptorSet, VulkanDescriptorSetLayout,
    VulkanFence, VulkanSemaphore, VulkanTextureView,
};
use crate::vulkan_swapchain::SurfaceState;

const LOG_SOURCE: &str = "crow::vulkan";

/// Device creation configuration
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Application name reported to the driver
    pub app_name: String,

    /// Initial surface size, in pixels
    pub width: u32,
    pub height: u32,

    /// Enable the Khronos validation layer
    pub enable_validation: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            app_name: "Crow Application".to_string(),
            width: 1280,
            height: 720,
            enable_validation: false,
        }
    }
}

/// Vulkan graphics device
///
/// Central object for creating resources and submitting commands.
/// Surface-size-dependent state lives in [`SurfaceState`], shared with
/// command lists so render passes can resolve framebuffers.
pub struct VulkanDevice {
    _entry: ash::Entry,
    limits: DeviceLimits,

    surface: Arc<Mutex<SurfaceState>>,

    /// Shared context; owns device, instance, and allocator teardown
    ctx: Arc<GpuContext>,
}

impl VulkanDevice {
    /// Create a new Vulkan device targeting `window`
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(
        window: &W,
        config: DeviceConfig,
    ) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let app_name = CString::new(config.app_name.as_str()).map_err(|_| {
                Error::InitializationFailed("Application name contains a NUL byte".to_string())
            })?;

            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Crow")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = window.display_handle().map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to get display handle: {}", e);
                Error::InitializationFailed(format!("Failed to get display handle: {}", e))
            })?;
            let extension_names =
                ash_window::enumerate_required_extensions(display_handle.as_raw())
                    .map_err(|e| {
                        engine_error!(LOG_SOURCE, "Failed to get required extensions: {}", e);
                        Error::InitializationFailed(format!(
                            "Failed to get required extensions: {}",
                            e
                        ))
                    })?
                    .to_vec();

            let layer_names = if config.enable_validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry.create_instance(&create_info, None).map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to create Vulkan instance: {:?}", e);
                Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
            })?;

            let window_handle = window.window_handle().map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to get window handle: {}", e);
                Error::InitializationFailed(format!("Failed to get window handle: {}", e))
            })?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to create surface: {:?}", e);
                Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
            })?;

            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            // Pick the first GPU whose graphics queue can also present
            let physical_devices = instance.enumerate_physical_devices().map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to enumerate physical devices: {:?}", e);
                Error::InitializationFailed(format!(
                    "Failed to enumerate physical devices: {:?}",
                    e
                ))
            })?;

            let (physical_device, graphics_family_index) = physical_devices
                .into_iter()
                .find_map(|pd| {
                    let queue_families =
                        instance.get_physical_device_queue_family_properties(pd);
                    queue_families
                        .iter()
                        .enumerate()
                        .find(|(i, qf)| {
                            qf.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                                && surface_loader
                                    .get_physical_device_surface_support(pd, *i as u32, surface)
                                    .unwrap_or(false)
                        })
                        .map(|(i, _)| (pd, i as u32))
                })
                .ok_or_else(|| {
                    engine_error!(LOG_SOURCE, "No Vulkan-capable GPU with present support found");
                    Error::InitializationFailed(
                        "No Vulkan-capable GPU with present support found".to_string(),
                    )
                })?;

            let properties = instance.get_physical_device_properties(physical_device);
            let limits = DeviceLimits {
                min_uniform_buffer_offset_alignment: properties
                    .limits
                    .min_uniform_buffer_offset_alignment,
            };

            let device_name = properties
                .device_name_as_c_str()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string());
            engine_info!(LOG_SOURCE, "Selected GPU: {}", device_name);

            let queue_priorities = [1.0];
            let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(graphics_family_index)
                .queue_priorities(&queue_priorities)];

            let device_extension_names = vec![ash::khr::swapchain::NAME.as_ptr()];
            let device_features = vk::PhysicalDeviceFeatures::default();

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&device_features);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let graphics_queue = device.get_device_queue(graphics_family_index, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create GPU allocator: {:?}", e))
            })?;

            let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

            let ctx = Arc::new(GpuContext::new(
                device,
                instance,
                allocator,
                graphics_queue,
                graphics_family_index,
            ));

            let surface_state = SurfaceState::new(
                Arc::clone(&ctx),
                physical_device,
                surface,
                surface_loader,
                swapchain_loader,
                config.width,
                config.height,
            )?;

            engine_info!(
                LOG_SOURCE,
                "Vulkan device initialized ({}x{}, validation: {})",
                config.width,
                config.height,
                config.enable_validation
            );

            Ok(Self {
                _entry: entry,
                limits,
                surface: Arc::new(Mutex::new(surface_state)),
                ctx,
            })
        }
    }

    /// Build a graphics pipeline against the surface's render pass
    pub fn create_pipeline(&self, desc: &PipelineDesc<'_>) -> Result<Arc<dyn Pipeline>> {
        let render_pass = self.lock_surface()?.render_pass();
        let pipeline = build_pipeline(&self.ctx, render_pass, desc)?;
        Ok(pipeline as Arc<dyn Pipeline>)
    }

    fn lock_surface(&self) -> Result<std::sync::MutexGuard<'_, SurfaceState>> {
        self.surface
            .lock()
            .map_err(|_| Error::BackendError("Surface state lock poisoned".to_string()))
    }

    /// Record commands on a transient pool, submit, and wait for them
    unsafe fn one_time_submit<F: FnOnce(vk::CommandBuffer)>(&self, record: F) -> Result<()> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(self.ctx.graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let pool = self
            .ctx
            .device
            .create_command_pool(&pool_info, None)
            .map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to create transient command pool: {:?}", e);
                Error::BackendError(format!("Failed to create transient command pool: {:?}", e))
            })?;

        let result = (|| {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let buffers = self
                .ctx
                .device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| {
                    Error::BackendError(format!("Failed to allocate command buffer: {:?}", e))
                })?;
            let cmd = buffers[0];

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.ctx
                .device
                .begin_command_buffer(cmd, &begin_info)
                .map_err(|e| {
                    Error::BackendError(format!("Failed to begin command buffer: {:?}", e))
                })?;

            record(cmd);

            self.ctx.device.end_command_buffer(cmd).map_err(|e| {
                Error::BackendError(format!("Failed to end command buffer: {:?}", e))
            })?;

            let command_buffers = [cmd];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            self.ctx
                .device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], vk::Fence::null())
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to submit one-time commands: {:?}", e);
                    Error::BackendError(format!("Failed to submit one-time commands: {:?}", e))
                })?;
            self.ctx
                .device
                .queue_wait_idle(self.ctx.graphics_queue)
                .map_err(|e| {
                    Error::BackendError(format!("Failed to wait for one-time commands: {:?}", e))
                })
        })();

        self.ctx.device.destroy_command_pool(pool, None);
        result
    }

    /// Copy `pixels` into `image` through a staging buffer, leaving the
    /// image shader-readable
    unsafe fn upload_texture_pixels(
        &self,
        image: vk::Image,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<()> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(pixels.len() as u64)
            .usage(vk::BufferUsageFlags::TRANSFER_SRC)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let staging = self
            .ctx
            .device
            .create_buffer(&buffer_info, None)
            .map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to create staging buffer: {:?}", e);
                Error::BackendError(format!("Failed to create staging buffer: {:?}", e))
            })?;

        let requirements = self.ctx.device.get_buffer_memory_requirements(staging);
        let staging_allocation = {
            let mut allocator = self.ctx.allocator.lock().map_err(|_| {
                Error::BackendError("GPU allocator lock poisoned".to_string())
            })?;
            allocator
                .allocate(&AllocationCreateDesc {
                    name: "texture_staging",
                    requirements,
                    location: MemoryLocation::CpuToGpu,
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|e| {
                    self.ctx.device.destroy_buffer(staging, None);
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!(
                        LOG_SOURCE,
                        "Out of GPU memory for texture staging buffer ({:.2} MB): {:?}",
                        size_mb,
                        e
                    );
                    Error::OutOfMemory
                })?
        };

        let result = (|| {
            self.ctx
                .device
                .bind_buffer_memory(
                    staging,
                    staging_allocation.memory(),
                    staging_allocation.offset(),
                )
                .map_err(|e| {
                    Error::BackendError(format!("Failed to bind staging memory: {:?}", e))
                })?;

            let mapped_ptr = staging_allocation
                .mapped_ptr()
                .ok_or_else(|| Error::BackendError("Staging buffer is not mapped".to_string()))?
                .as_ptr() as *mut u8;
            std::ptr::copy_nonoverlapping(pixels.as_ptr(), mapped_ptr, pixels.len());

            self.one_time_submit(|cmd| {
                let range = color_subresource_range();

                let to_transfer = vk::ImageMemoryBarrier::default()
                    .old_layout(vk::ImageLayout::UNDEFINED)
                    .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(image)
                    .subresource_range(range)
                    .src_access_mask(vk::AccessFlags::empty())
                    .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);
                self.ctx.device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_transfer],
                );

                let region = vk::BufferImageCopy::default()
                    .buffer_offset(0)
                    .buffer_row_length(0)
                    .buffer_image_height(0)
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        mip_level: 0,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                    .image_extent(vk::Extent3D {
                        width,
                        height,
                        depth: 1,
                    });
                self.ctx.device.cmd_copy_buffer_to_image(
                    cmd,
                    staging,
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );

                let to_shader = vk::ImageMemoryBarrier::default()
                    .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(image)
                    .subresource_range(range)
                    .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                    .dst_access_mask(vk::AccessFlags::SHADER_READ);
                self.ctx.device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_shader],
                );
            })
        })();

        self.ctx.device.destroy_buffer(staging, None);
        if let Ok(mut allocator) = self.ctx.allocator.lock() {
            allocator.free(staging_allocation).ok();
        }
        result
    }

    /// Move an image with no uploaded data straight to the
    /// shader-readable layout
    unsafe fn transition_to_shader_read(&self, image: vk::Image) -> Result<()> {
        self.one_time_submit(|cmd| {
            let barrier = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(color_subresource_range())
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::SHADER_READ);
            self.ctx.device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        })
    }
}

impl GraphicsDevice for VulkanDevice {
    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn GpuBuffer>> {
        unsafe {
            let buffer_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = self.ctx.device.create_buffer(&buffer_info, None).map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to create buffer: {:?}", e);
                Error::BackendError(format!("Failed to create buffer: {:?}", e))
            })?;

            let requirements = self.ctx.device.get_buffer_memory_requirements(buffer);

            let allocation = {
                let mut allocator = self.ctx.allocator.lock().map_err(|_| {
                    Error::BackendError("GPU allocator lock poisoned".to_string())
                })?;
                allocator
                    .allocate(&AllocationCreateDesc {
                        name: "engine_buffer",
                        requirements,
                        location: MemoryLocation::CpuToGpu,
                        linear: true,
                        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|e| {
                        self.ctx.device.destroy_buffer(buffer, None);
                        let size_mb = desc.size as f64 / (1024.0 * 1024.0);
                        engine_error!(
                            LOG_SOURCE,
                            "Out of GPU memory for buffer (required: {:.2} MB): {:?}",
                            size_mb,
                            e
                        );
                        Error::OutOfMemory
                    })?
            };

            self.ctx
                .device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to bind buffer memory: {:?}", e);
                    Error::BackendError(format!("Failed to bind buffer memory: {:?}", e))
                })?;

            Ok(Arc::new(VulkanBuffer::new(
                Arc::clone(&self.ctx),
                buffer,
                allocation,
                desc.size,
            )))
        }
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn TextureView>> {
        if let Some(pixels) = &desc.pixels {
            let expected = desc.width as usize * desc.height as usize * 4;
            if pixels.len() != expected {
                engine_error!(
                    LOG_SOURCE,
                    "Texture data is {} bytes, expected {} for {}x{} RGBA8",
                    pixels.len(),
                    expected,
                    desc.width,
                    desc.height
                );
                return Err(Error::InvalidResource(
                    "Texture data does not match its dimensions".to_string(),
                ));
            }
        }

        unsafe {
            let format = vk::Format::R8G8B8A8_SRGB;
            let image_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D {
                    width: desc.width,
                    height: desc.height,
                    depth: 1,
                })
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = self.ctx.device.create_image(&image_info, None).map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to create texture image: {:?}", e);
                Error::BackendError(format!("Failed to create texture image: {:?}", e))
            })?;

            let requirements = self.ctx.device.get_image_memory_requirements(image);
            let allocation = {
                let mut allocator = self.ctx.allocator.lock().map_err(|_| {
                    Error::BackendError("GPU allocator lock poisoned".to_string())
                })?;
                allocator
                    .allocate(&AllocationCreateDesc {
                        name: "texture",
                        requirements,
                        location: MemoryLocation::GpuOnly,
                        linear: false,
                        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|e| {
                        self.ctx.device.destroy_image(image, None);
                        let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                        engine_error!(
                            LOG_SOURCE,
                            "Out of GPU memory for {}x{} texture ({:.2} MB): {:?}",
                            desc.width,
                            desc.height,
                            size_mb,
                            e
                        );
                        Error::OutOfMemory
                    })?
            };

            self.ctx
                .device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to bind texture memory: {:?}", e);
                    Error::BackendError(format!("Failed to bind texture memory: {:?}", e))
                })?;

            match &desc.pixels {
                Some(pixels) => {
                    self.upload_texture_pixels(image, desc.width, desc.height, pixels)?
                }
                None => self.transition_to_shader_read(image)?,
            }

            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(color_subresource_range());
            let view = self.ctx.device.create_image_view(&view_info, None).map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to create texture view: {:?}", e);
                Error::BackendError(format!("Failed to create texture view: {:?}", e))
            })?;

            let filter = texture_filter_to_vk(desc.filter);
            let sampler_info = vk::SamplerCreateInfo::default()
                .mag_filter(filter)
                .min_filter(filter)
                .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
                .address_mode_u(vk::SamplerAddressMode::REPEAT)
                .address_mode_v(vk::SamplerAddressMode::REPEAT)
                .address_mode_w(vk::SamplerAddressMode::REPEAT)
                .anisotropy_enable(false)
                .max_anisotropy(1.0)
                .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
                .unnormalized_coordinates(false);
            let sampler = self
                .ctx
                .device
                .create_sampler(&sampler_info, None)
                .map_err(|e| {
                    self.ctx.device.destroy_image_view(view, None);
                    engine_error!(LOG_SOURCE, "Failed to create sampler: {:?}", e);
                    Error::BackendError(format!("Failed to create sampler: {:?}", e))
                })?;

            Ok(Arc::new(VulkanTextureView::new(
                Arc::clone(&self.ctx),
                image,
                view,
                sampler,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                allocation,
            )))
        }
    }

    fn create_descriptor_pool(
        &self,
        sizes: &[(DescriptorKind, u32)],
        max_sets: u32,
    ) -> Result<Arc<dyn DescriptorPool>> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = sizes
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|&(kind, count)| vk::DescriptorPoolSize {
                ty: descriptor_kind_to_vk(kind),
                descriptor_count: count,
            })
            .collect();

        let info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(&pool_sizes)
            .max_sets(max_sets);

        unsafe {
            let pool = self
                .ctx
                .device
                .create_descriptor_pool(&info, None)
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to create descriptor pool: {:?}", e);
                    Error::BackendError(format!("Failed to create descriptor pool: {:?}", e))
                })?;

            Ok(Arc::new(VulkanDescriptorPool::new(
                Arc::clone(&self.ctx),
                pool,
            )))
        }
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[LayoutBinding],
    ) -> Result<Arc<dyn DescriptorSetLayout>> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding.binding)
                    .descriptor_type(descriptor_kind_to_vk(binding.kind))
                    .descriptor_count(binding.count)
                    .stage_flags(shader_stages_to_vk(binding.stages))
            })
            .collect();

        let layout_create = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);

        unsafe {
            let layout = self
                .ctx
                .device
                .create_descriptor_set_layout(&layout_create, None)
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to create descriptor set layout: {:?}", e);
                    Error::BackendError(format!(
                        "Failed to create descriptor set layout: {:?}",
                        e
                    ))
                })?;

            Ok(Arc::new(VulkanDescriptorSetLayout::new(
                Arc::clone(&self.ctx),
                layout,
            )))
        }
    }

    fn update_descriptor_set(
        &self,
        set: &Arc<dyn DescriptorSet>,
        writes: &[DescriptorWrite],
    ) -> Result<()> {
        let set = set
            .as_any()
            .downcast_ref::<VulkanDescriptorSet>()
            .ok_or_else(|| {
                Error::InvalidResource("Descriptor set was not created by this backend".to_string())
            })?;

        // Info structs must outlive the write structs referencing them,
        // so both vectors are filled completely before the second pass.
        let mut buffer_infos: Vec<vk::DescriptorBufferInfo> = Vec::new();
        let mut image_infos: Vec<vk::DescriptorImageInfo> = Vec::new();
        let mut slots: Vec<(usize, bool)> = Vec::with_capacity(writes.len());

        for write in writes {
            match &write.resource {
                WriteResource::Buffer(info) => {
                    let buffer = info
                        .buffer
                        .as_any()
                        .downcast_ref::<VulkanBuffer>()
                        .ok_or_else(|| {
                            Error::InvalidResource(
                                "Buffer was not created by this backend".to_string(),
                            )
                        })?;
                    slots.push((buffer_infos.len(), true));
                    buffer_infos.push(
                        vk::DescriptorBufferInfo::default()
                            .buffer(buffer.buffer)
                            .offset(info.offset)
                            .range(info.range),
                    );
                }
                WriteResource::Image(info) => {
                    let view = info
                        .view
                        .as_any()
                        .downcast_ref::<VulkanTextureView>()
                        .ok_or_else(|| {
                            Error::InvalidResource(
                                "Texture view was not created by this backend".to_string(),
                            )
                        })?;
                    slots.push((image_infos.len(), false));
                    image_infos.push(
                        vk::DescriptorImageInfo::default()
                            .sampler(view.sampler)
                            .image_view(view.view)
                            .image_layout(view.layout),
                    );
                }
            }
        }

        let vk_writes: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .zip(&slots)
            .map(|(write, &(slot, is_buffer))| {
                let base = vk::WriteDescriptorSet::default()
                    .dst_set(set.set)
                    .dst_binding(write.binding)
                    .descriptor_type(descriptor_kind_to_vk(write.kind));
                if is_buffer {
                    base.buffer_info(std::slice::from_ref(&buffer_infos[slot]))
                } else {
                    base.image_info(std::slice::from_ref(&image_infos[slot]))
                }
            })
            .collect();

        unsafe {
            self.ctx.device.update_descriptor_sets(&vk_writes, &[]);
        }
        Ok(())
    }

    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let fence_info = vk::FenceCreateInfo::default().flags(flags);

        unsafe {
            let fence = self.ctx.device.create_fence(&fence_info, None).map_err(|e| {
                engine_error!(LOG_SOURCE, "Failed to create fence: {:?}", e);
                Error::BackendError(format!("Failed to create fence: {:?}", e))
            })?;
            Ok(Arc::new(VulkanFence::new(Arc::clone(&self.ctx), fence)))
        }
    }

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>> {
        let semaphore_info = vk::SemaphoreCreateInfo::default();

        unsafe {
            let semaphore = self
                .ctx
                .device
                .create_semaphore(&semaphore_info, None)
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to create semaphore: {:?}", e);
                    Error::BackendError(format!("Failed to create semaphore: {:?}", e))
                })?;
            Ok(Arc::new(VulkanSemaphore::new(
                Arc::clone(&self.ctx),
                semaphore,
            )))
        }
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        let list = VulkanCommandList::new(Arc::clone(&self.ctx), Arc::clone(&self.surface))?;
        Ok(Box::new(list))
    }

    fn wait_for_fence(&self, fence: &Arc<dyn Fence>, timeout_ns: u64) -> Result<()> {
        let fence = downcast_fence(fence)?;
        unsafe {
            self.ctx
                .device
                .wait_for_fences(&[fence.fence], true, timeout_ns)
                .map_err(|e| match e {
                    // A fence that never signals within the timeout means
                    // the GPU is not making progress
                    vk::Result::TIMEOUT => {
                        engine_error!(LOG_SOURCE, "Fence wait timed out after {} ns", timeout_ns);
                        Error::DeviceLost(format!("Fence wait timed out after {} ns", timeout_ns))
                    }
                    _ => Error::BackendError(format!("Failed to wait for fence: {:?}", e)),
                })
        }
    }

    fn reset_fence(&self, fence: &Arc<dyn Fence>) -> Result<()> {
        let fence = downcast_fence(fence)?;
        unsafe {
            self.ctx
                .device
                .reset_fences(&[fence.fence])
                .map_err(|e| Error::BackendError(format!("Failed to reset fence: {:?}", e)))
        }
    }

    fn acquire_next_image(&self, acquired: &Arc<dyn Semaphore>) -> Result<SurfaceStatus> {
        let acquired = downcast_semaphore(acquired)?;
        self.lock_surface()?.acquire_next_image(acquired.semaphore)
    }

    fn submit(
        &self,
        cmds: &dyn CommandList,
        wait: &Arc<dyn Semaphore>,
        signal: &Arc<dyn Semaphore>,
        fence: &Arc<dyn Fence>,
    ) -> Result<()> {
        let cmds = cmds
            .as_any()
            .downcast_ref::<VulkanCommandList>()
            .ok_or_else(|| {
                Error::InvalidResource("Command list was not created by this backend".to_string())
            })?;
        let wait = downcast_semaphore(wait)?;
        let signal = downcast_semaphore(signal)?;
        let fence = downcast_fence(fence)?;

        unsafe {
            let command_buffers = [cmds.command_buffer()];
            let wait_semaphores = [wait.semaphore];
            let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
            let signal_semaphores = [signal.semaphore];

            let submit_info = vk::SubmitInfo::default()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages)
                .command_buffers(&command_buffers)
                .signal_semaphores(&signal_semaphores);

            self.ctx
                .device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], fence.fence)
                .map_err(|e| {
                    engine_error!(LOG_SOURCE, "Failed to submit commands: {:?}", e);
                    Error::BackendError(format!("Failed to submit commands: {:?}", e))
                })
        }
    }

    fn present(&self, image_index: u32, wait: &Arc<dyn Semaphore>) -> Result<SurfaceStatus> {
        let wait = downcast_semaphore(wait)?;
        self.lock_surface()?.present(image_index, wait.semaphore)
    }

    fn rebuild_surface(&self, width: u32, height: u32) -> Result<()> {
        engine_info!(LOG_SOURCE, "Rebuilding surface ({}x{})", width, height);
        self.lock_surface()?.recreate(width, height)
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .device_wait_idle()
                .map_err(|e| Error::BackendError(format!("Failed to wait for idle: {:?}", e)))
        }
    }
}

fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn downcast_fence(fence: &Arc<dyn Fence>) -> Result<&VulkanFence> {
    fence.as_any().downcast_ref::<VulkanFence>().ok_or_else(|| {
        Error::InvalidResource("Fence was not created by this backend".to_string())
    })
}

fn downcast_semaphore(semaphore: &Arc<dyn Semaphore>) -> Result<&VulkanSemaphore> {
    semaphore
        .as_any()
        .downcast_ref::<VulkanSemaphore>()
        .ok_or_else(|| {
            Error::InvalidResource("Semaphore was not created by this backend".to_string())
        })
}
