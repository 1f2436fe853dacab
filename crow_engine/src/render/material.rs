//! Materials, meshes, and drawable objects

use crate::gpu::{DescriptorSet, GpuBuffer, Pipeline};
use glam::Mat4;
use std::sync::Arc;

/// A pipeline plus its optional per-material texture set
///
/// Two render objects sharing a material compare equal by pointer
/// identity; the submitter relies on that to skip redundant binds.
pub struct Material {
    pub pipeline: Arc<dyn Pipeline>,

    /// Texture set bound at set 2, absent for untextured materials
    pub texture_set: Option<Arc<dyn DescriptorSet>>,
}

impl Material {
    pub fn new(pipeline: Arc<dyn Pipeline>) -> Self {
        Self {
            pipeline,
            texture_set: None,
        }
    }

    pub fn with_texture(pipeline: Arc<dyn Pipeline>, texture_set: Arc<dyn DescriptorSet>) -> Self {
        Self {
            pipeline,
            texture_set: Some(texture_set),
        }
    }
}

/// Uploaded vertex data
pub struct Mesh {
    pub vertex_buffer: Arc<dyn GpuBuffer>,
    pub vertex_count: u32,
}

/// One drawable: non-owning references into the registries plus a
/// world transform. Rebuilt freely every frame.
#[derive(Clone)]
pub struct RenderObject {
    pub mesh: Arc<Mesh>,
    pub material: Arc<Material>,
    pub transform: Mat4,
}
