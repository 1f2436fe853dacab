/// Vulkan implementations of the engine's GPU resource traits

use ash::vk;
use crow_engine::crow::{Error, Result};
use crow_engine::engine_error;
use crow_engine::gpu::{
    BufferUsage, DescriptorKind, DescriptorPool, DescriptorSet, DescriptorSetLayout, Fence,
    GpuBuffer, PoolAllocError, Pipeline, Semaphore, ShaderStages, TextureFilter, TextureView,
};
use gpu_allocator::vulkan::Allocation;
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

// ===== TYPE CONVERSIONS =====

/// Convert an engine descriptor kind to the Vulkan descriptor type
pub(crate) fn descriptor_kind_to_vk(kind: DescriptorKind) -> vk::DescriptorType {
    match kind {
        DescriptorKind::Sampler => vk::DescriptorType::SAMPLER,
        DescriptorKind::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        DescriptorKind::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorKind::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorKind::UniformTexelBuffer => vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
        DescriptorKind::StorageTexelBuffer => vk::DescriptorType::STORAGE_TEXEL_BUFFER,
        DescriptorKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorKind::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorKind::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        DescriptorKind::StorageBufferDynamic => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
        DescriptorKind::InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
    }
}

/// Convert engine shader stages to Vulkan stage flags
pub(crate) fn shader_stages_to_vk(stages: ShaderStages) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStages::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStages::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    if stages.contains(ShaderStages::COMPUTE) {
        flags |= vk::ShaderStageFlags::COMPUTE;
    }
    flags
}

/// Convert engine buffer usage to Vulkan usage flags
pub(crate) fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsage::UNIFORM) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::STORAGE) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(BufferUsage::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::TRANSFER_SRC) {
        flags |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsage::TRANSFER_DST) {
        flags |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    flags
}

/// Convert an engine texture filter to the Vulkan filter
pub(crate) fn texture_filter_to_vk(filter: TextureFilter) -> vk::Filter {
    match filter {
        TextureFilter::Linear => vk::Filter::LINEAR,
        TextureFilter::Nearest => vk::Filter::NEAREST,
    }
}

// ===== BUFFER =====

/// Persistently mapped Vulkan buffer
pub struct VulkanBuffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
}

impl VulkanBuffer {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        buffer: vk::Buffer,
        allocation: Allocation,
        size: u64,
    ) -> Self {
        Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size,
        }
    }
}

impl GpuBuffer for VulkanBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let allocation = self.allocation.as_ref().ok_or_else(|| {
            Error::BackendError("Buffer has no allocation".to_string())
        })?;
        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| Error::BackendError("Buffer is not CPU-accessible".to_string()))?
            .as_ptr() as *mut u8;

        if offset + data.len() as u64 > self.size {
            engine_error!(
                "crow::vulkan",
                "Buffer write of {} bytes at offset {} exceeds size {}",
                data.len(),
                offset,
                self.size
            );
            return Err(Error::InvalidResource("Buffer write out of range".to_string()));
        }

        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                mapped_ptr.offset(offset as isize),
                data.len(),
            );
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if the lock fails - the buffer must still go
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}

// ===== SYNC PRIMITIVES =====

pub struct VulkanFence {
    ctx: Arc<GpuContext>,
    pub(crate) fence: vk::Fence,
}

impl VulkanFence {
    pub(crate) fn new(ctx: Arc<GpuContext>, fence: vk::Fence) -> Self {
        Self { ctx, fence }
    }
}

impl Fence for VulkanFence {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanFence {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_fence(self.fence, None);
        }
    }
}

pub struct VulkanSemaphore {
    ctx: Arc<GpuContext>,
    pub(crate) semaphore: vk::Semaphore,
}

impl VulkanSemaphore {
    pub(crate) fn new(ctx: Arc<GpuContext>, semaphore: vk::Semaphore) -> Self {
        Self { ctx, semaphore }
    }
}

impl Semaphore for VulkanSemaphore {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

// ===== DESCRIPTORS =====

pub struct VulkanDescriptorSetLayout {
    ctx: Arc<GpuContext>,
    pub(crate) layout: vk::DescriptorSetLayout,
}

impl VulkanDescriptorSetLayout {
    pub(crate) fn new(ctx: Arc<GpuContext>, layout: vk::DescriptorSetLayout) -> Self {
        Self { ctx, layout }
    }
}

impl DescriptorSetLayout for VulkanDescriptorSetLayout {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Set handle; storage is owned by its pool, freed on pool reset/drop
pub struct VulkanDescriptorSet {
    pub(crate) set: vk::DescriptorSet,
}

impl DescriptorSet for VulkanDescriptorSet {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct VulkanDescriptorPool {
    ctx: Arc<GpuContext>,
    pool: vk::DescriptorPool,
}

impl VulkanDescriptorPool {
    pub(crate) fn new(ctx: Arc<GpuContext>, pool: vk::DescriptorPool) -> Self {
        Self { ctx, pool }
    }
}

impl DescriptorPool for VulkanDescriptorPool {
    fn try_allocate(
        &self,
        layout: &Arc<dyn DescriptorSetLayout>,
    ) -> std::result::Result<Arc<dyn DescriptorSet>, PoolAllocError> {
        let layout = layout
            .as_any()
            .downcast_ref::<VulkanDescriptorSetLayout>()
            .ok_or_else(|| {
                PoolAllocError::Backend(Error::InvalidResource(
                    "Layout was not created by this backend".to_string(),
                ))
            })?;

        let layouts = [layout.layout];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        unsafe {
            match self.ctx.device.allocate_descriptor_sets(&allocate_info) {
                Ok(sets) => Ok(Arc::new(VulkanDescriptorSet { set: sets[0] })),
                // The two exhaustion signals the allocator retries on
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY)
                | Err(vk::Result::ERROR_FRAGMENTED_POOL) => Err(PoolAllocError::Exhausted),
                Err(e) => Err(PoolAllocError::Backend(Error::BackendError(format!(
                    "Failed to allocate descriptor set: {:?}",
                    e
                )))),
            }
        }
    }

    fn reset(&self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty())
                .map_err(|e| {
                    engine_error!("crow::vulkan", "Failed to reset descriptor pool: {:?}", e);
                    Error::BackendError(format!("Failed to reset descriptor pool: {:?}", e))
                })
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

// ===== TEXTURE VIEW =====

/// Sampled image, its view, and the sampler it is bound with
pub struct VulkanTextureView {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    pub(crate) sampler: vk::Sampler,
    pub(crate) layout: vk::ImageLayout,
    allocation: Option<Allocation>,
}

impl VulkanTextureView {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        image: vk::Image,
        view: vk::ImageView,
        sampler: vk::Sampler,
        layout: vk::ImageLayout,
        allocation: Allocation,
    ) -> Self {
        Self {
            ctx,
            image,
            view,
            sampler,
            layout,
            allocation: Some(allocation),
        }
    }
}

impl TextureView for VulkanTextureView {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanTextureView {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_sampler(self.sampler, None);
            self.ctx.device.destroy_image_view(self.view, None);
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}

// ===== PIPELINE =====

pub struct VulkanPipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) layout: vk::PipelineLayout,
}

impl VulkanPipeline {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        pipeline: vk::Pipeline,
        layout: vk::PipelineLayout,
    ) -> Self {
        Self {
            ctx,
            pipeline,
            layout,
        }
    }
}

impl Pipeline for VulkanPipeline {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}
