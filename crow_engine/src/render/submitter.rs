//! Render-object batch submitter
//!
//! Walks an ordered object list and records draws with the minimum
//! number of state changes: a pipeline (and its descriptor sets) is
//! bound only when the material changes between consecutive objects,
//! vertex data only when the mesh changes. Per-object transforms are
//! delivered through the slot's storage buffer, indexed by draw
//! ordinal carried in `first_instance`; inline constant blocks are not
//! used.

use crate::error::Result;
use crate::frame::FrameSlot;
use crate::gpu::{CommandList, GpuBuffer};
use std::mem::size_of;
use std::sync::Arc;

use super::gpu_data::{GpuCameraData, GpuObjectData, GpuSceneData};
use super::material::{Material, Mesh, RenderObject};

/// Set index for camera + scene parameters
const GLOBAL_SET: u32 = 0;
/// Set index for object-transform storage
const OBJECT_SET: u32 = 1;
/// Set index for the optional per-material texture set
const TEXTURE_SET: u32 = 2;

/// Counters for one submission, used to verify batching behavior
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub pipeline_binds: usize,
    pub mesh_binds: usize,
    pub draws: usize,
}

/// Records draw batches against a frame slot
///
/// Holds the shared scene-parameter buffer; everything per-frame comes
/// from the slot passed to [`Self::submit`].
pub struct BatchSubmitter {
    scene_buffer: Arc<dyn GpuBuffer>,
    scene_stride: u64,
}

impl BatchSubmitter {
    /// # Arguments
    ///
    /// * `scene_buffer` - multi-frame scene-parameter buffer
    /// * `scene_stride` - padded per-frame region stride
    pub fn new(scene_buffer: Arc<dyn GpuBuffer>, scene_stride: u64) -> Self {
        Self {
            scene_buffer,
            scene_stride,
        }
    }

    /// Write per-frame data and record draws for `objects` in order
    ///
    /// Camera and scene parameters are written before any draw; the
    /// scene write lands at `scene_stride × slot_index`, so frames in
    /// flight never touch each other's region.
    pub fn submit(
        &self,
        cmd: &mut dyn CommandList,
        slot: &FrameSlot,
        slot_index: usize,
        camera: &GpuCameraData,
        scene: &GpuSceneData,
        objects: &[RenderObject],
    ) -> Result<DrawStats> {
        slot.camera_buffer.write(0, bytemuck::bytes_of(camera))?;

        let scene_offset = self.scene_stride * slot_index as u64;
        self.scene_buffer
            .write(scene_offset, bytemuck::bytes_of(scene))?;

        for (ordinal, object) in objects.iter().enumerate() {
            let data = GpuObjectData {
                model: object.transform,
            };
            slot.object_buffer.write(
                (ordinal * size_of::<GpuObjectData>()) as u64,
                bytemuck::bytes_of(&data),
            )?;
        }

        let mut stats = DrawStats::default();
        let mut last_material: Option<&Arc<Material>> = None;
        let mut last_mesh: Option<&Arc<Mesh>> = None;

        for (ordinal, object) in objects.iter().enumerate() {
            let same_material =
                last_material.is_some_and(|last| Arc::ptr_eq(last, &object.material));
            if !same_material {
                let pipeline = &object.material.pipeline;
                cmd.bind_pipeline(pipeline)?;
                stats.pipeline_binds += 1;

                cmd.bind_descriptor_set(
                    pipeline,
                    GLOBAL_SET,
                    &slot.global_set,
                    &[scene_offset as u32],
                )?;
                cmd.bind_descriptor_set(pipeline, OBJECT_SET, &slot.object_set, &[])?;
                if let Some(texture_set) = &object.material.texture_set {
                    cmd.bind_descriptor_set(pipeline, TEXTURE_SET, texture_set, &[])?;
                }
                last_material = Some(&object.material);
            }

            let same_mesh = last_mesh.is_some_and(|last| Arc::ptr_eq(last, &object.mesh));
            if !same_mesh {
                cmd.bind_vertex_buffer(&object.mesh.vertex_buffer)?;
                stats.mesh_binds += 1;
                last_mesh = Some(&object.mesh);
            }

            cmd.draw(object.mesh.vertex_count, 0, ordinal as u32)?;
            stats.draws += 1;
        }

        Ok(stats)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "submitter_tests.rs"]
mod tests;
