//! GPU device and resource traits
//!
//! These traits are the seam between the engine core and a concrete
//! graphics API. All methods take `&self`; backends use interior
//! mutability where the underlying API requires it, so the core can
//! hold the device behind `Arc<dyn GraphicsDevice>`.

use crate::error::Result;
use std::any::Any;
use std::sync::Arc;

use super::types::{
    BufferDesc, DescriptorKind, DescriptorWrite, DeviceLimits, LayoutBinding, PoolAllocError,
    SurfaceStatus, TextureDesc,
};

// ===== RESOURCE HANDLES =====

/// GPU buffer handle
///
/// Engine-created buffers are persistently mapped; `write` copies into
/// the mapped region at a byte offset.
pub trait GpuBuffer: Send + Sync {
    /// Size in bytes
    fn size(&self) -> u64;

    /// Copy `data` into the mapped buffer at `offset`
    fn write(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;
}

/// Compiled pipeline handle (program + fixed-function state)
pub trait Pipeline: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// View over a texture, bindable through a descriptor
pub trait TextureView: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Cached descriptor-set layout handle
pub trait DescriptorSetLayout: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Allocated descriptor set handle
pub trait DescriptorSet: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// CPU-observable sync primitive, signaled on GPU work completion
pub trait Fence: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// GPU-side sync primitive ordering queue operations
pub trait Semaphore: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

// ===== DESCRIPTOR POOL =====

/// Fixed-capacity arena descriptor sets are allocated from
///
/// Pools report exhaustion separately from other failures so the
/// allocator layer can retry against a fresh pool.
pub trait DescriptorPool: Send + Sync {
    /// Allocate one set with the given layout
    fn try_allocate(
        &self,
        layout: &Arc<dyn DescriptorSetLayout>,
    ) -> std::result::Result<Arc<dyn DescriptorSet>, PoolAllocError>;

    /// Return all allocated sets to the pool
    fn reset(&self) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

// ===== COMMAND LIST =====

/// Recorded sequence of GPU commands for one frame
///
/// Recording is single-threaded; a list is recorded, submitted once,
/// and recycled by its frame slot on the next reuse cycle.
pub trait CommandList {
    /// Begin recording (resets any previously recorded commands)
    fn begin(&mut self) -> Result<()>;

    /// Finish recording
    fn end(&mut self) -> Result<()>;

    /// Begin the render pass targeting the given swapchain image
    fn begin_render_pass(&mut self, image_index: u32, clear_color: [f32; 4]) -> Result<()>;

    /// End the current render pass
    fn end_render_pass(&mut self) -> Result<()>;

    /// Bind a graphics pipeline
    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()>;

    /// Bind a descriptor set at `set_index` on the pipeline's layout
    ///
    /// `dynamic_offsets` supplies byte offsets for dynamic uniform or
    /// storage bindings in the set, in binding order.
    fn bind_descriptor_set(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        set: &Arc<dyn DescriptorSet>,
        dynamic_offsets: &[u32],
    ) -> Result<()>;

    /// Bind a vertex buffer at binding 0
    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn GpuBuffer>) -> Result<()>;

    /// Issue a non-indexed draw
    ///
    /// `first_instance` carries the draw ordinal so shaders can index
    /// the per-object storage buffer.
    fn draw(&mut self, vertex_count: u32, first_vertex: u32, first_instance: u32) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

// ===== GRAPHICS DEVICE =====

/// The device seam the engine core records frames against
///
/// One implementation wraps a real API (Vulkan); tests use a mock.
/// All creation methods hand back reference-counted opaque handles;
/// destruction order across unrelated handles is controlled by the
/// owning deletion queues, not by these traits.
pub trait GraphicsDevice: Send + Sync {
    /// Limits the core needs for buffer layout decisions
    fn limits(&self) -> DeviceLimits;

    // ----- Resource creation -----

    /// Create a host-visible, persistently mapped buffer
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn GpuBuffer>>;

    /// Create a sampled 2D texture, uploading its pixel data when present
    ///
    /// A failed texture creation is a soft failure for materials: the
    /// caller logs it and falls back to an untextured material.
    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn TextureView>>;

    /// Create a descriptor pool with per-kind capacities
    ///
    /// # Arguments
    ///
    /// * `sizes` - `(kind, capacity)` pairs; kinds absent from the list have capacity 0
    /// * `max_sets` - maximum number of sets the pool can hand out
    fn create_descriptor_pool(
        &self,
        sizes: &[(DescriptorKind, u32)],
        max_sets: u32,
    ) -> Result<Arc<dyn DescriptorPool>>;

    /// Create a descriptor-set layout from binding descriptions
    fn create_descriptor_set_layout(
        &self,
        bindings: &[LayoutBinding],
    ) -> Result<Arc<dyn DescriptorSetLayout>>;

    /// Apply a batch of descriptor writes to `set` in one update
    fn update_descriptor_set(
        &self,
        set: &Arc<dyn DescriptorSet>,
        writes: &[DescriptorWrite],
    ) -> Result<()>;

    /// Create a fence, optionally already signaled
    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>>;

    /// Create a binary semaphore
    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>>;

    /// Create a command list for frame recording
    fn create_command_list(&self) -> Result<Box<dyn CommandList>>;

    // ----- Synchronization -----

    /// Block until `fence` signals or `timeout_ns` elapses
    ///
    /// A timeout is returned as an error; callers treat it as fatal
    /// (likely device loss).
    fn wait_for_fence(&self, fence: &Arc<dyn Fence>, timeout_ns: u64) -> Result<()>;

    /// Return `fence` to the unsignaled state
    fn reset_fence(&self, fence: &Arc<dyn Fence>) -> Result<()>;

    // ----- Surface / presentation -----

    /// Request the next presentable image, signaling `acquired` when ready
    fn acquire_next_image(&self, acquired: &Arc<dyn Semaphore>) -> Result<SurfaceStatus>;

    /// Submit recorded commands to the graphics queue
    ///
    /// Execution waits on `wait`, signals `signal` on completion, and
    /// signals `fence` for the CPU. The list stays owned by the caller
    /// and is re-recorded on the slot's next reuse cycle.
    fn submit(
        &self,
        cmds: &dyn CommandList,
        wait: &Arc<dyn Semaphore>,
        signal: &Arc<dyn Semaphore>,
        fence: &Arc<dyn Fence>,
    ) -> Result<()>;

    /// Present the image at `image_index`, gated on `wait`
    fn present(&self, image_index: u32, wait: &Arc<dyn Semaphore>) -> Result<SurfaceStatus>;

    /// Rebuild all surface-size-dependent resources after a resize
    fn rebuild_surface(&self, width: u32, height: u32) -> Result<()>;

    /// Block until the GPU has finished all submitted work
    fn wait_idle(&self) -> Result<()>;
}
