use super::*;
use crate::descriptors::{DescriptorAllocator, DescriptorLayoutCache};
use crate::frame::{FrameRing, FrameRingConfig};
use crate::gpu::mock_device::{
    MockBuffer, MockCommandList, MockDescriptorSet, MockDevice, MockPipeline,
};
use crate::gpu::{BufferDesc, BufferUsage, GraphicsDevice};
use crate::render::{GpuCameraData, GpuObjectData, GpuSceneData, Material, Mesh, RenderObject};
use glam::{Mat4, Vec4};
use std::sync::Arc;

fn setup() -> (Arc<MockDevice>, FrameRing, BatchSubmitter) {
    let device = Arc::new(MockDevice::new());
    let mut cache = DescriptorLayoutCache::new(device.clone());
    let mut allocator = DescriptorAllocator::new(device.clone());
    let ring = FrameRing::new(
        device.clone(),
        &mut cache,
        &mut allocator,
        FrameRingConfig { max_objects: 16 },
    )
    .unwrap();
    let submitter = BatchSubmitter::new(ring.scene_buffer().clone(), ring.scene_stride());
    (device, ring, submitter)
}

fn material(name: &str) -> Arc<Material> {
    Arc::new(Material::new(MockPipeline::new(name)))
}

fn mesh(device: &MockDevice, vertex_count: u32) -> Arc<Mesh> {
    let vertex_buffer = device
        .create_buffer(&BufferDesc {
            size: vertex_count as u64 * 32,
            usage: BufferUsage::VERTEX,
        })
        .unwrap();
    Arc::new(Mesh {
        vertex_buffer,
        vertex_count,
    })
}

fn object(mesh: &Arc<Mesh>, material: &Arc<Material>, transform: Mat4) -> RenderObject {
    RenderObject {
        mesh: mesh.clone(),
        material: material.clone(),
        transform,
    }
}

fn default_camera() -> GpuCameraData {
    GpuCameraData {
        view: Mat4::IDENTITY,
        projection: Mat4::IDENTITY,
        view_projection: Mat4::IDENTITY,
    }
}

fn default_scene() -> GpuSceneData {
    GpuSceneData {
        fog_color: Vec4::ZERO,
        fog_distances: Vec4::new(10.0, 100.0, 0.0, 0.0),
        ambient_color: Vec4::splat(0.1),
        sunlight_direction: Vec4::new(0.0, -1.0, 0.0, 1.0),
        sunlight_color: Vec4::ONE,
    }
}

// ============================================================================
// Batching
// ============================================================================

#[test]
fn test_two_materials_three_meshes_batch_correctly() {
    let (device, ring, submitter) = setup();
    let material_a = material("a");
    let material_b = material("b");
    let objects = [
        object(&mesh(&device, 3), &material_a, Mat4::IDENTITY),
        object(&mesh(&device, 6), &material_a, Mat4::IDENTITY),
        object(&mesh(&device, 9), &material_b, Mat4::IDENTITY),
    ];

    let mut cmd = MockCommandList::new();
    let stats = submitter
        .submit(
            &mut cmd,
            ring.current(),
            ring.slot_index(),
            &default_camera(),
            &default_scene(),
            &objects,
        )
        .unwrap();

    assert_eq!(stats.pipeline_binds, 2);
    assert_eq!(stats.mesh_binds, 3);
    assert_eq!(stats.draws, 3);
    assert_eq!(cmd.count_with_prefix("bind_pipeline"), 2);
    assert_eq!(cmd.count_with_prefix("bind_vertex_buffer"), 3);
}

#[test]
fn test_consecutive_same_material_skips_pipeline_bind() {
    let (device, ring, submitter) = setup();
    let shared = material("shared");
    let shared_mesh = mesh(&device, 3);
    let objects = vec![object(&shared_mesh, &shared, Mat4::IDENTITY); 5];

    let mut cmd = MockCommandList::new();
    let stats = submitter
        .submit(
            &mut cmd,
            ring.current(),
            ring.slot_index(),
            &default_camera(),
            &default_scene(),
            &objects,
        )
        .unwrap();

    assert_eq!(stats.pipeline_binds, 1);
    assert_eq!(stats.mesh_binds, 1);
    assert_eq!(stats.draws, 5);
}

#[test]
fn test_same_mesh_across_material_change_is_not_rebound() {
    let (device, ring, submitter) = setup();
    let shared_mesh = mesh(&device, 3);
    let objects = [
        object(&shared_mesh, &material("a"), Mat4::IDENTITY),
        object(&shared_mesh, &material("b"), Mat4::IDENTITY),
    ];

    let mut cmd = MockCommandList::new();
    let stats = submitter
        .submit(
            &mut cmd,
            ring.current(),
            ring.slot_index(),
            &default_camera(),
            &default_scene(),
            &objects,
        )
        .unwrap();

    assert_eq!(stats.pipeline_binds, 2);
    assert_eq!(stats.mesh_binds, 1);
}

#[test]
fn test_draw_ordinal_rides_first_instance() {
    let (device, ring, submitter) = setup();
    let shared = material("shared");
    let shared_mesh = mesh(&device, 3);
    let objects = vec![object(&shared_mesh, &shared, Mat4::IDENTITY); 3];

    let mut cmd = MockCommandList::new();
    submitter
        .submit(
            &mut cmd,
            ring.current(),
            ring.slot_index(),
            &default_camera(),
            &default_scene(),
            &objects,
        )
        .unwrap();

    let draws: Vec<&String> = cmd
        .recorded()
        .iter()
        .filter(|c| c.starts_with("draw"))
        .collect();
    assert_eq!(draws, vec!["draw:3:0:0", "draw:3:0:1", "draw:3:0:2"]);
}

#[test]
fn test_textured_material_binds_texture_set() {
    let (device, ring, submitter) = setup();
    let texture_set: Arc<dyn crate::gpu::DescriptorSet> = Arc::new(MockDescriptorSet { id: 99 });
    let textured = Arc::new(Material::with_texture(
        MockPipeline::new("textured"),
        texture_set,
    ));
    let plain = material("plain");
    let objects = [
        object(&mesh(&device, 3), &textured, Mat4::IDENTITY),
        object(&mesh(&device, 3), &plain, Mat4::IDENTITY),
    ];

    let mut cmd = MockCommandList::new();
    submitter
        .submit(
            &mut cmd,
            ring.current(),
            ring.slot_index(),
            &default_camera(),
            &default_scene(),
            &objects,
        )
        .unwrap();

    assert_eq!(cmd.count_with_prefix("bind_descriptor_set:2"), 1);
}

// ============================================================================
// Per-frame buffer writes
// ============================================================================

fn read_buffer(buffer: &Arc<dyn crate::gpu::GpuBuffer>, offset: u64, len: usize) -> Vec<u8> {
    buffer
        .as_any()
        .downcast_ref::<MockBuffer>()
        .unwrap()
        .read(offset, len)
}

#[test]
fn test_camera_data_written_before_draws() {
    let (device, ring, submitter) = setup();
    let camera = GpuCameraData {
        view: Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0)),
        projection: Mat4::IDENTITY,
        view_projection: Mat4::IDENTITY,
    };
    let objects = [object(&mesh(&device, 3), &material("a"), Mat4::IDENTITY)];

    let mut cmd = MockCommandList::new();
    submitter
        .submit(
            &mut cmd,
            ring.current(),
            ring.slot_index(),
            &camera,
            &default_scene(),
            &objects,
        )
        .unwrap();

    let written = read_buffer(
        &ring.current().camera_buffer,
        0,
        std::mem::size_of::<GpuCameraData>(),
    );
    assert_eq!(written, bytemuck::bytes_of(&camera));
}

#[test]
fn test_scene_data_lands_in_current_frame_region() {
    let (device, mut ring, submitter) = setup();

    // Advance to slot 1 so the offset is non-zero
    let image_index = match ring.begin_frame().unwrap() {
        crate::frame::FrameStatus::Ready(index) => index,
        crate::frame::FrameStatus::OutOfDate => panic!("unexpected out-of-date surface"),
    };
    ring.submit_and_present(image_index).unwrap();
    assert_eq!(ring.slot_index(), 1);

    let scene = default_scene();
    let objects = [object(&mesh(&device, 3), &material("a"), Mat4::IDENTITY)];
    let mut cmd = MockCommandList::new();
    submitter
        .submit(
            &mut cmd,
            ring.current(),
            ring.slot_index(),
            &default_camera(),
            &scene,
            &objects,
        )
        .unwrap();

    let offset = ring.scene_stride();
    let written = read_buffer(
        ring.scene_buffer(),
        offset,
        std::mem::size_of::<GpuSceneData>(),
    );
    assert_eq!(written, bytemuck::bytes_of(&scene));

    // Slot 0's region is untouched
    let other = read_buffer(ring.scene_buffer(), 0, std::mem::size_of::<GpuSceneData>());
    assert_eq!(other, vec![0; std::mem::size_of::<GpuSceneData>()]);
}

#[test]
fn test_object_transforms_written_by_draw_ordinal() {
    let (device, ring, submitter) = setup();
    let shared = material("shared");
    let shared_mesh = mesh(&device, 3);
    let transforms = [
        Mat4::from_translation(glam::Vec3::X),
        Mat4::from_translation(glam::Vec3::Y),
        Mat4::from_translation(glam::Vec3::Z),
    ];
    let objects: Vec<RenderObject> = transforms
        .iter()
        .map(|&t| object(&shared_mesh, &shared, t))
        .collect();

    let mut cmd = MockCommandList::new();
    submitter
        .submit(
            &mut cmd,
            ring.current(),
            ring.slot_index(),
            &default_camera(),
            &default_scene(),
            &objects,
        )
        .unwrap();

    let stride = std::mem::size_of::<GpuObjectData>();
    for (ordinal, transform) in transforms.iter().enumerate() {
        let written = read_buffer(
            &ring.current().object_buffer,
            (ordinal * stride) as u64,
            stride,
        );
        let expected = GpuObjectData { model: *transform };
        assert_eq!(written, bytemuck::bytes_of(&expected));
    }
}
