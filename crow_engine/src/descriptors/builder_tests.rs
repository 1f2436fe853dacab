use super::*;
use crate::descriptors::{DescriptorAllocator, DescriptorLayoutCache, PoolSizes};
use crate::gpu::mock_device::{MockDescriptorSet, MockDevice, MockTextureView};
use crate::gpu::{
    BufferDesc, BufferUsage, BufferWriteInfo, DescriptorKind, GraphicsDevice, ImageWriteInfo,
    ShaderStages, TextureDesc, TextureFilter,
};
use crate::gpu::mock_device::MockPipeline;
use crate::render::Material;
use std::sync::Arc;

fn buffer_info(device: &MockDevice, size: u64) -> BufferWriteInfo {
    let buffer = device
        .create_buffer(&BufferDesc {
            size,
            usage: BufferUsage::UNIFORM,
        })
        .unwrap();
    BufferWriteInfo {
        buffer,
        offset: 0,
        range: size,
    }
}

fn setup(device: &Arc<MockDevice>) -> (DescriptorLayoutCache, DescriptorAllocator) {
    let cache = DescriptorLayoutCache::new(device.clone());
    let allocator = DescriptorAllocator::new(device.clone());
    (cache, allocator)
}

// ============================================================================
// Build success path
// ============================================================================

#[test]
fn test_build_allocates_set_and_applies_one_batched_update() {
    let device = Arc::new(MockDevice::new());
    let (mut cache, mut allocator) = setup(&device);

    let (set, _layout) = DescriptorBuilder::begin(&mut cache, &mut allocator)
        .bind_buffer(
            0,
            buffer_info(&device, 64),
            DescriptorKind::UniformBuffer,
            ShaderStages::VERTEX,
        )
        .bind_buffer(
            1,
            buffer_info(&device, 128),
            DescriptorKind::StorageBuffer,
            ShaderStages::VERTEX,
        )
        .bind_image(
            2,
            ImageWriteInfo {
                view: MockTextureView::new("albedo"),
            },
            DescriptorKind::CombinedImageSampler,
            ShaderStages::FRAGMENT,
        )
        .build()
        .unwrap();

    let updates = device.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].bindings, vec![0, 1, 2]);

    let set_id = set
        .as_any()
        .downcast_ref::<MockDescriptorSet>()
        .unwrap()
        .id;
    assert_eq!(updates[0].set_id, set_id);
}

#[test]
fn test_build_reuses_cached_layout() {
    let device = Arc::new(MockDevice::new());
    let (mut cache, mut allocator) = setup(&device);

    let build = |cache: &mut DescriptorLayoutCache, allocator: &mut DescriptorAllocator| {
        DescriptorBuilder::begin(cache, allocator)
            .bind_buffer(
                0,
                buffer_info(&device, 64),
                DescriptorKind::UniformBuffer,
                ShaderStages::VERTEX,
            )
            .build()
            .unwrap()
    };

    let (_, layout_a) = build(&mut cache, &mut allocator);
    let (_, layout_b) = build(&mut cache, &mut allocator);

    assert!(Arc::ptr_eq(&layout_a, &layout_b));
    assert_eq!(device.layouts_created(), 1);
}

// ============================================================================
// Texture path
// ============================================================================

#[test]
fn test_created_texture_binds_into_a_material_texture_set() {
    let device = Arc::new(MockDevice::new());
    let (mut cache, mut allocator) = setup(&device);

    let view = device
        .create_texture(&TextureDesc {
            width: 2,
            height: 2,
            pixels: Some(vec![255; 2 * 2 * 4]),
            filter: TextureFilter::Linear,
        })
        .unwrap();
    assert_eq!(device.textures_created(), 1);

    let (set, _layout) = DescriptorBuilder::begin(&mut cache, &mut allocator)
        .bind_image(
            0,
            ImageWriteInfo { view },
            DescriptorKind::CombinedImageSampler,
            ShaderStages::FRAGMENT,
        )
        .build()
        .unwrap();

    let material = Material::with_texture(MockPipeline::new("textured"), set);
    assert!(material.texture_set.is_some());

    let updates = device.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].bindings, vec![0]);
}

#[test]
fn test_failed_texture_creation_falls_back_to_untextured_material() {
    let device = Arc::new(MockDevice::new());

    // Pixel data that does not match the declared dimensions
    let result = device.create_texture(&TextureDesc {
        width: 4,
        height: 4,
        pixels: Some(vec![0; 7]),
        filter: TextureFilter::Nearest,
    });
    assert!(result.is_err());
    assert_eq!(device.textures_created(), 0);

    let material = match result {
        Ok(_) => unreachable!(),
        Err(_) => Material::new(MockPipeline::new("fallback")),
    };
    assert!(material.texture_set.is_none());
}

// ============================================================================
// Failure path
// ============================================================================

#[test]
fn test_failed_allocation_issues_no_writes() {
    let device = Arc::new(MockDevice::new());
    let mut cache = DescriptorLayoutCache::new(device.clone());
    // Pools have zero uniform-buffer capacity, so allocation must fail
    let mut allocator = DescriptorAllocator::with_config(
        device.clone(),
        4,
        PoolSizes {
            multipliers: vec![(DescriptorKind::UniformBuffer, 0.0)],
        },
    );

    let result = DescriptorBuilder::begin(&mut cache, &mut allocator)
        .bind_buffer(
            0,
            buffer_info(&device, 64),
            DescriptorKind::UniformBuffer,
            ShaderStages::VERTEX,
        )
        .build();

    assert!(result.is_err());
    assert!(device.updates().is_empty());
}
