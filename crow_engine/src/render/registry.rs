//! Name-keyed material and mesh registry
//!
//! One owned instance with process lifetime serves all lookups; it is
//! passed by reference, never held as an ambient global. Lookups for
//! missing names return `None` so callers can substitute a default
//! (e.g. an untextured material) instead of aborting.

use crate::engine_warn;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::material::{Material, Mesh};

const LOG_SOURCE: &str = "crow::RenderRegistry";

/// Registry of named materials and meshes
#[derive(Default)]
pub struct RenderRegistry {
    materials: FxHashMap<String, Arc<Material>>,
    meshes: FxHashMap<String, Arc<Mesh>>,
}

impl RenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a material under `name`, returning its shared handle
    ///
    /// Re-registering a name replaces the entry; objects holding the
    /// old handle keep drawing with it.
    pub fn insert_material(&mut self, name: &str, material: Material) -> Arc<Material> {
        let material = Arc::new(material);
        self.materials.insert(name.to_string(), material.clone());
        material
    }

    /// Register a mesh under `name`, returning its shared handle
    pub fn insert_mesh(&mut self, name: &str, mesh: Mesh) -> Arc<Mesh> {
        let mesh = Arc::new(mesh);
        self.meshes.insert(name.to_string(), mesh.clone());
        mesh
    }

    /// Look up a material by name
    pub fn material(&self, name: &str) -> Option<Arc<Material>> {
        let found = self.materials.get(name).cloned();
        if found.is_none() {
            engine_warn!(LOG_SOURCE, "Material '{}' not found", name);
        }
        found
    }

    /// Look up a mesh by name
    pub fn mesh(&self, name: &str) -> Option<Arc<Mesh>> {
        let found = self.meshes.get(name).cloned();
        if found.is_none() {
            engine_warn!(LOG_SOURCE, "Mesh '{}' not found", name);
        }
        found
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
