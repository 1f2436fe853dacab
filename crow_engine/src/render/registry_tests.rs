use super::*;
use crate::gpu::mock_device::{MockDevice, MockPipeline};
use crate::gpu::{BufferDesc, BufferUsage, GraphicsDevice};
use crate::render::{Material, Mesh};
use std::sync::Arc;

fn test_mesh(device: &MockDevice, vertex_count: u32) -> Mesh {
    let vertex_buffer = device
        .create_buffer(&BufferDesc {
            size: vertex_count as u64 * 32,
            usage: BufferUsage::VERTEX,
        })
        .unwrap();
    Mesh {
        vertex_buffer,
        vertex_count,
    }
}

#[test]
fn test_insert_and_lookup_material() {
    let mut registry = RenderRegistry::new();
    let inserted = registry.insert_material("default", Material::new(MockPipeline::new("default")));

    let found = registry.material("default").unwrap();
    assert!(Arc::ptr_eq(&inserted, &found));
    assert_eq!(registry.material_count(), 1);
}

#[test]
fn test_insert_and_lookup_mesh() {
    let device = MockDevice::new();
    let mut registry = RenderRegistry::new();
    let inserted = registry.insert_mesh("triangle", test_mesh(&device, 3));

    let found = registry.mesh("triangle").unwrap();
    assert!(Arc::ptr_eq(&inserted, &found));
    assert_eq!(found.vertex_count, 3);
}

#[test]
fn test_missing_names_return_none() {
    let registry = RenderRegistry::new();
    assert!(registry.material("nope").is_none());
    assert!(registry.mesh("nope").is_none());
}

#[test]
fn test_reinsert_replaces_entry_but_old_handle_survives() {
    let mut registry = RenderRegistry::new();
    let old = registry.insert_material("mat", Material::new(MockPipeline::new("v1")));
    let new = registry.insert_material("mat", Material::new(MockPipeline::new("v2")));

    assert_eq!(registry.material_count(), 1);
    let found = registry.material("mat").unwrap();
    assert!(Arc::ptr_eq(&new, &found));
    assert!(!Arc::ptr_eq(&old, &found));
    // Old handle is still usable by objects that captured it
    assert!(Arc::strong_count(&old) >= 1);
}
