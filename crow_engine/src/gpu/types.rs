//! Plain data types shared between the engine core and GPU backends

use crate::error::Error;
use bitflags::bitflags;
use std::sync::Arc;

use super::device::{DescriptorSet, GpuBuffer, TextureView};

// ===== DESCRIPTOR TYPES =====

/// Kind of resource a descriptor binding refers to
///
/// Mirrors the descriptor types graphics APIs distinguish when sizing
/// pools and declaring layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    /// Standalone sampler object
    Sampler,

    /// Texture + sampler bound as one unit
    CombinedImageSampler,

    /// Texture sampled with a separate sampler
    SampledImage,

    /// Texture written from shaders
    StorageImage,

    /// Formatted read-only buffer view
    UniformTexelBuffer,

    /// Formatted read-write buffer view
    StorageTexelBuffer,

    /// Read-only constant buffer
    UniformBuffer,

    /// Read-write structured buffer
    StorageBuffer,

    /// Uniform buffer addressed with a dynamic offset at bind time
    UniformBufferDynamic,

    /// Storage buffer addressed with a dynamic offset at bind time
    StorageBufferDynamic,

    /// Framebuffer attachment read as an input
    InputAttachment,
}

impl DescriptorKind {
    /// All descriptor kinds, in declaration order
    pub const ALL: [DescriptorKind; 11] = [
        DescriptorKind::Sampler,
        DescriptorKind::CombinedImageSampler,
        DescriptorKind::SampledImage,
        DescriptorKind::StorageImage,
        DescriptorKind::UniformTexelBuffer,
        DescriptorKind::StorageTexelBuffer,
        DescriptorKind::UniformBuffer,
        DescriptorKind::StorageBuffer,
        DescriptorKind::UniformBufferDynamic,
        DescriptorKind::StorageBufferDynamic,
        DescriptorKind::InputAttachment,
    ];

    /// Stable small integer id, used for structural layout hashing
    pub fn index(self) -> u32 {
        match self {
            DescriptorKind::Sampler => 0,
            DescriptorKind::CombinedImageSampler => 1,
            DescriptorKind::SampledImage => 2,
            DescriptorKind::StorageImage => 3,
            DescriptorKind::UniformTexelBuffer => 4,
            DescriptorKind::StorageTexelBuffer => 5,
            DescriptorKind::UniformBuffer => 6,
            DescriptorKind::StorageBuffer => 7,
            DescriptorKind::UniformBufferDynamic => 8,
            DescriptorKind::StorageBufferDynamic => 9,
            DescriptorKind::InputAttachment => 10,
        }
    }
}

bitflags! {
    /// Shader stages a binding is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 0b0001;
        const FRAGMENT = 0b0010;
        const COMPUTE = 0b0100;
        const ALL_GRAPHICS = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

/// One binding slot in a descriptor-set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutBinding {
    /// Binding index within the set
    pub binding: u32,

    /// Kind of descriptor bound at this slot
    pub kind: DescriptorKind,

    /// Number of descriptors (1 unless arrayed)
    pub count: u32,

    /// Stages that read this binding
    pub stages: ShaderStages,
}

// ===== BUFFER TYPES =====

bitflags! {
    /// How a buffer will be used by the GPU
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufferUsage: u32 {
        const UNIFORM = 0b0000_0001;
        const STORAGE = 0b0000_0010;
        const VERTEX = 0b0000_0100;
        const INDEX = 0b0000_1000;
        const TRANSFER_SRC = 0b0001_0000;
        const TRANSFER_DST = 0b0010_0000;
    }
}

/// Description of a buffer to create
///
/// All engine-created buffers are host-visible and persistently mapped;
/// per-frame data is overwritten in place, never reallocated.
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,

    /// Usage flags
    pub usage: BufferUsage,
}

// ===== TEXTURE TYPES =====

/// Sampler filtering applied when a texture is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFilter {
    Linear,
    Nearest,
}

/// Description of a sampled 2D texture to create
///
/// Pixel data is tightly packed RGBA8, `width * height * 4` bytes.
/// A texture without data is still created in a shader-readable state
/// and samples as undefined content.
#[derive(Debug, Clone)]
pub struct TextureDesc {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// RGBA8 pixel data to upload, if any
    pub pixels: Option<Vec<u8>>,

    /// Sampler filter mode
    pub filter: TextureFilter,
}

// ===== DESCRIPTOR WRITES =====

/// Buffer region referenced by a descriptor write
#[derive(Clone)]
pub struct BufferWriteInfo {
    pub buffer: Arc<dyn GpuBuffer>,
    pub offset: u64,
    pub range: u64,
}

/// Texture view referenced by a descriptor write
#[derive(Clone)]
pub struct ImageWriteInfo {
    pub view: Arc<dyn TextureView>,
}

/// Resource side of a pending descriptor write
#[derive(Clone)]
pub enum WriteResource {
    Buffer(BufferWriteInfo),
    Image(ImageWriteInfo),
}

/// One pending descriptor write, batched by the descriptor builder
#[derive(Clone)]
pub struct DescriptorWrite {
    /// Destination binding index
    pub binding: u32,

    /// Descriptor kind being written
    pub kind: DescriptorKind,

    /// Bound resource
    pub resource: WriteResource,
}

// ===== DEVICE QUERIES =====

/// Device limits the engine core needs for correct buffer layouts
#[derive(Debug, Clone, Copy)]
pub struct DeviceLimits {
    /// Required alignment for dynamic uniform-buffer offsets, in bytes
    pub min_uniform_buffer_offset_alignment: u64,
}

/// Outcome of acquiring or presenting a surface image
///
/// `OutOfDate` is a recoverable resize state: surface-size-dependent
/// resources must be rebuilt before retrying, it is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    /// Image at the given swapchain index is ready for use
    Ready(u32),

    /// Surface no longer matches the window; rebuild and retry
    OutOfDate,
}

// ===== ALLOCATION FAILURE =====

/// Failure mode of a descriptor-pool allocation
///
/// `Exhausted` covers out-of-pool-memory and fragmented-pool signals
/// and is the only retryable case; the allocator grabs a fresh pool
/// and retries exactly once. Everything else is `Backend` and
/// propagates as-is.
#[derive(Debug, Clone)]
pub enum PoolAllocError {
    /// Pool cannot satisfy the request; a fresh pool might
    Exhausted,

    /// Non-retryable backend failure
    Backend(Error),
}

impl std::fmt::Display for PoolAllocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolAllocError::Exhausted => write!(f, "Descriptor pool exhausted"),
            PoolAllocError::Backend(err) => write!(f, "Descriptor allocation failed: {}", err),
        }
    }
}

impl std::error::Error for PoolAllocError {}
