//! Frame-slot ring and synchronization
//!
//! N slots (N = [`FRAME_OVERLAP`]) are allocated once at startup and
//! reused every N-th frame. Each slot owns its command list, sync
//! primitives, mapped per-frame buffers, and the descriptor sets bound
//! to them; buffers are overwritten in place, never reallocated. The
//! fence wait in `acquire_frame` is the only blocking point: it
//! guarantees the GPU is done with a slot before the CPU touches its
//! buffers again.

use crate::descriptors::{DescriptorAllocator, DescriptorBuilder, DescriptorLayoutCache};
use crate::engine_info;
use crate::error::Result;
use crate::gpu::{
    BufferDesc, BufferUsage, BufferWriteInfo, CommandList, DescriptorKind, DescriptorSet, Fence,
    GpuBuffer, GraphicsDevice, Semaphore, ShaderStages, SurfaceStatus,
};
use crate::render::gpu_data::{GpuCameraData, GpuObjectData, GpuSceneData};
use crate::utils::{pad_uniform_size, DeletionQueue};
use std::mem::size_of;
use std::sync::Arc;

const LOG_SOURCE: &str = "crow::FrameRing";

/// Number of frames in flight
pub const FRAME_OVERLAP: usize = 2;

/// Fence wait bound; exceeding it means the GPU is likely lost
const FENCE_TIMEOUT_NS: u64 = 1_000_000_000;

/// Outcome of beginning or presenting a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Frame proceeds against the swapchain image at this index
    Ready(u32),

    /// Surface must be rebuilt; the in-progress frame is discarded
    OutOfDate,
}

/// Ring configuration
#[derive(Debug, Clone)]
pub struct FrameRingConfig {
    /// Capacity of each slot's object-transform storage buffer
    pub max_objects: u32,
}

impl Default for FrameRingConfig {
    fn default() -> Self {
        Self { max_objects: 10_000 }
    }
}

/// One in-flight frame context, reused every N-th frame
pub struct FrameSlot {
    /// Command list recorded each reuse cycle
    pub command_list: Box<dyn CommandList>,

    /// Signaled when the swapchain image is ready for rendering
    pub acquired: Arc<dyn Semaphore>,

    /// Signaled when rendering finishes, gates presentation
    pub rendered: Arc<dyn Semaphore>,

    /// Signaled when this slot's submission completes on the GPU
    pub submitted: Arc<dyn Fence>,

    /// Mapped per-frame camera uniform buffer
    pub camera_buffer: Arc<dyn GpuBuffer>,

    /// Mapped per-frame object-transform storage buffer
    pub object_buffer: Arc<dyn GpuBuffer>,

    /// Set 0: camera + scene parameters (scene at a dynamic offset)
    pub global_set: Arc<dyn DescriptorSet>,

    /// Set 1: object-transform storage
    pub object_set: Arc<dyn DescriptorSet>,

    /// Cleanup scoped to this slot's reuse cycle
    pub deletion_queue: DeletionQueue,

    // True between a completed fence wait and the next submit, so a
    // discarded frame does not wait on the already-reset fence again
    fence_waited: bool,
}

/// N-deep ring of frame slots plus the shared scene-parameter buffer
pub struct FrameRing {
    device: Arc<dyn GraphicsDevice>,
    slots: Vec<FrameSlot>,
    frame_number: u64,
    scene_buffer: Arc<dyn GpuBuffer>,
    scene_stride: u64,
}

impl FrameRing {
    /// Allocate all slots, buffers, and descriptor sets
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        cache: &mut DescriptorLayoutCache,
        allocator: &mut DescriptorAllocator,
        config: FrameRingConfig,
    ) -> Result<Self> {
        let min_alignment = device.limits().min_uniform_buffer_offset_alignment;
        let scene_stride = pad_uniform_size(size_of::<GpuSceneData>() as u64, min_alignment);

        // One scene buffer shared by all slots, one padded region each
        let scene_buffer = device.create_buffer(&BufferDesc {
            size: scene_stride * FRAME_OVERLAP as u64,
            usage: BufferUsage::UNIFORM,
        })?;

        let mut slots = Vec::with_capacity(FRAME_OVERLAP);
        for _ in 0..FRAME_OVERLAP {
            let camera_buffer = device.create_buffer(&BufferDesc {
                size: size_of::<GpuCameraData>() as u64,
                usage: BufferUsage::UNIFORM,
            })?;
            let object_buffer = device.create_buffer(&BufferDesc {
                size: size_of::<GpuObjectData>() as u64 * config.max_objects as u64,
                usage: BufferUsage::STORAGE,
            })?;

            let (global_set, _) = DescriptorBuilder::begin(cache, allocator)
                .bind_buffer(
                    0,
                    BufferWriteInfo {
                        buffer: camera_buffer.clone(),
                        offset: 0,
                        range: size_of::<GpuCameraData>() as u64,
                    },
                    DescriptorKind::UniformBuffer,
                    ShaderStages::VERTEX,
                )
                .bind_buffer(
                    1,
                    BufferWriteInfo {
                        buffer: scene_buffer.clone(),
                        offset: 0,
                        range: size_of::<GpuSceneData>() as u64,
                    },
                    DescriptorKind::UniformBufferDynamic,
                    ShaderStages::ALL_GRAPHICS,
                )
                .build()?;

            let (object_set, _) = DescriptorBuilder::begin(cache, allocator)
                .bind_buffer(
                    0,
                    BufferWriteInfo {
                        buffer: object_buffer.clone(),
                        offset: 0,
                        range: object_buffer.size(),
                    },
                    DescriptorKind::StorageBuffer,
                    ShaderStages::VERTEX,
                )
                .build()?;

            slots.push(FrameSlot {
                command_list: device.create_command_list()?,
                acquired: device.create_semaphore()?,
                rendered: device.create_semaphore()?,
                // Created signaled so the first wait passes immediately
                submitted: device.create_fence(true)?,
                camera_buffer,
                object_buffer,
                global_set,
                object_set,
                deletion_queue: DeletionQueue::new(),
                fence_waited: false,
            });
        }

        engine_info!(
            LOG_SOURCE,
            "Created {} frame slots ({} objects per slot)",
            FRAME_OVERLAP,
            config.max_objects
        );

        Ok(Self {
            device,
            slots,
            frame_number: 0,
            scene_buffer,
            scene_stride,
        })
    }

    /// Index of the slot serving the current frame
    pub fn slot_index(&self) -> usize {
        (self.frame_number % FRAME_OVERLAP as u64) as usize
    }

    /// Frames presented so far
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// The slot serving the current frame
    pub fn current(&self) -> &FrameSlot {
        &self.slots[self.slot_index()]
    }

    pub fn current_mut(&mut self) -> &mut FrameSlot {
        let index = self.slot_index();
        &mut self.slots[index]
    }

    /// Shared scene-parameter buffer
    pub fn scene_buffer(&self) -> &Arc<dyn GpuBuffer> {
        &self.scene_buffer
    }

    /// Stride between per-frame scene regions
    pub fn scene_stride(&self) -> u64 {
        self.scene_stride
    }

    /// Byte offset of the current frame's scene region
    pub fn scene_offset(&self) -> u64 {
        self.scene_stride * self.slot_index() as u64
    }

    /// Block until the current slot's prior submission is fenced, then
    /// reclaim the slot
    ///
    /// Flushes the slot's deletion queue once the GPU is done with it.
    /// A timeout propagates as an error and is fatal to the caller.
    pub fn acquire_frame(&mut self) -> Result<()> {
        let index = self.slot_index();
        if self.slots[index].fence_waited {
            // Fence already consumed by a frame discarded on resize
            return Ok(());
        }
        self.device
            .wait_for_fence(&self.slots[index].submitted, FENCE_TIMEOUT_NS)?;
        self.device.reset_fence(&self.slots[index].submitted)?;
        self.slots[index].fence_waited = true;
        self.slots[index].deletion_queue.flush();
        Ok(())
    }

    /// Reclaim the slot and request the next presentable image
    ///
    /// `OutOfDate` is a recoverable resize state: rebuild the surface
    /// with [`Self::handle_resize`] and call again. On `Ready`, the
    /// slot's command list has begun recording.
    pub fn begin_frame(&mut self) -> Result<FrameStatus> {
        self.acquire_frame()?;
        let index = self.slot_index();
        match self.device.acquire_next_image(&self.slots[index].acquired)? {
            SurfaceStatus::OutOfDate => Ok(FrameStatus::OutOfDate),
            SurfaceStatus::Ready(image_index) => {
                self.slots[index].command_list.begin()?;
                Ok(FrameStatus::Ready(image_index))
            }
        }
    }

    /// Submit the recorded commands and present `image_index`
    ///
    /// Submission waits on the acquired semaphore and signals the
    /// rendered semaphore plus the slot's fence; presentation waits on
    /// the rendered semaphore. The frame index advances unconditionally
    /// after present, even when the surface reports out-of-date.
    pub fn submit_and_present(&mut self, image_index: u32) -> Result<FrameStatus> {
        let index = self.slot_index();
        let slot = &mut self.slots[index];

        slot.command_list.end()?;
        self.device.submit(
            slot.command_list.as_ref(),
            &slot.acquired,
            &slot.rendered,
            &slot.submitted,
        )?;
        slot.fence_waited = false;

        let status = self.device.present(image_index, &slot.rendered)?;
        self.frame_number += 1;

        Ok(match status {
            SurfaceStatus::Ready(_) => FrameStatus::Ready(image_index),
            SurfaceStatus::OutOfDate => FrameStatus::OutOfDate,
        })
    }

    /// Rebuild surface-size-dependent resources after a resize
    pub fn handle_resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.device.wait_idle()?;
        self.device.rebuild_surface(width, height)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "frame_ring_tests.rs"]
mod tests;
