//! GPU abstraction layer
//!
//! The engine core records frames against the [`GraphicsDevice`] trait
//! instead of a concrete API. Backends (Vulkan in
//! `crow_engine_renderer_vulkan`) implement the trait; tests use the
//! in-memory mock from `mock_device`.

pub mod types;
pub mod device;

#[cfg(test)]
pub mod mock_device;

pub use types::{
    BufferDesc, BufferUsage, BufferWriteInfo, DescriptorKind, DescriptorWrite, DeviceLimits,
    ImageWriteInfo, LayoutBinding, PoolAllocError, ShaderStages, SurfaceStatus, TextureDesc,
    TextureFilter, WriteResource,
};

pub use device::{
    CommandList, DescriptorPool, DescriptorSet, DescriptorSetLayout, Fence, GpuBuffer,
    GraphicsDevice, Pipeline, Semaphore, TextureView,
};
