//! GPU-visible data layouts
//!
//! All structs are `repr(C)` and `Pod` so they can be written into
//! mapped buffers byte-for-byte. Field order matches the shader-side
//! declarations; do not reorder.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

/// Per-frame camera matrices, bound at set 0 binding 0
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuCameraData {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
}

/// Scene-wide lighting parameters, bound at set 0 binding 1
///
/// One buffer holds a region per in-flight frame at a dynamic offset;
/// the region stride is the padded size, not `size_of`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuSceneData {
    pub fog_color: Vec4,
    /// x = fog min distance, y = fog max distance
    pub fog_distances: Vec4,
    pub ambient_color: Vec4,
    /// w = sun power
    pub sunlight_direction: Vec4,
    pub sunlight_color: Vec4,
}

/// Per-object transform, indexed by draw ordinal in the object storage
/// buffer at set 1 binding 0
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuObjectData {
    pub model: Mat4,
}
