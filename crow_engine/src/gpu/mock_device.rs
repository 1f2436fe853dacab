//! Mock GPU device for engine-core tests
//!
//! Implements [`GraphicsDevice`] entirely in memory: buffers store
//! their bytes, command lists record string traces, pools enforce
//! per-kind capacities, and fences are signaled by `submit`. Acquire
//! and present results can be scripted to exercise the out-of-date
//! surface path.

use crate::error::{Error, Result};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::device::{
    CommandList, DescriptorPool, DescriptorSet, DescriptorSetLayout, Fence, GpuBuffer,
    GraphicsDevice, Pipeline, Semaphore, TextureView,
};
use super::types::{
    BufferDesc, DescriptorKind, DescriptorWrite, DeviceLimits, LayoutBinding, PoolAllocError,
    SurfaceStatus, TextureDesc,
};

// ===== MOCK RESOURCES =====

/// Buffer that stores written bytes for inspection
pub struct MockBuffer {
    size: u64,
    data: Mutex<Vec<u8>>,
}

impl MockBuffer {
    /// Read back a region, for assertions
    pub fn read(&self, offset: u64, len: usize) -> Vec<u8> {
        let data = self.data.lock().unwrap();
        data[offset as usize..offset as usize + len].to_vec()
    }
}

impl GpuBuffer for MockBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn write(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        let end = offset as usize + bytes.len();
        if end > data.len() {
            return Err(Error::InvalidResource(format!(
                "Write of {} bytes at offset {} exceeds buffer size {}",
                bytes.len(),
                offset,
                self.size
            )));
        }
        data[offset as usize..end].copy_from_slice(bytes);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Named pipeline so command traces are readable
pub struct MockPipeline {
    pub name: String,
}

impl MockPipeline {
    pub fn new(name: &str) -> Arc<dyn Pipeline> {
        Arc::new(MockPipeline {
            name: name.to_string(),
        })
    }
}

impl Pipeline for MockPipeline {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Named texture view
pub struct MockTextureView {
    pub name: String,
}

impl MockTextureView {
    pub fn new(name: &str) -> Arc<dyn TextureView> {
        Arc::new(MockTextureView {
            name: name.to_string(),
        })
    }
}

impl TextureView for MockTextureView {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Layout that remembers its bindings so pools can check demand
pub struct MockDescriptorSetLayout {
    pub bindings: Vec<LayoutBinding>,
}

impl DescriptorSetLayout for MockDescriptorSetLayout {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Set identified by a device-unique id
pub struct MockDescriptorSet {
    pub id: usize,
}

impl DescriptorSet for MockDescriptorSet {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockFence {
    signaled: AtomicBool,
}

impl MockFence {
    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::SeqCst)
    }
}

impl Fence for MockFence {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockSemaphore;

impl Semaphore for MockSemaphore {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ===== MOCK DESCRIPTOR POOL =====

/// Pool with per-kind capacity counters
///
/// Allocation checks every binding's demand against the remaining
/// capacity before deducting, so a failed allocation leaves the pool
/// untouched.
pub struct MockDescriptorPool {
    capacities: FxHashMap<DescriptorKind, u32>,
    remaining: Mutex<FxHashMap<DescriptorKind, u32>>,
    max_sets: u32,
    sets_allocated: AtomicU32,
    resets: AtomicUsize,
    next_set_id: Arc<AtomicUsize>,
}

impl MockDescriptorPool {
    /// Number of times this pool has been reset
    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    /// Sets currently allocated from this pool
    pub fn allocated_count(&self) -> u32 {
        self.sets_allocated.load(Ordering::SeqCst)
    }
}

impl DescriptorPool for MockDescriptorPool {
    fn try_allocate(
        &self,
        layout: &Arc<dyn DescriptorSetLayout>,
    ) -> std::result::Result<Arc<dyn DescriptorSet>, PoolAllocError> {
        let layout = layout
            .as_any()
            .downcast_ref::<MockDescriptorSetLayout>()
            .ok_or_else(|| {
                PoolAllocError::Backend(Error::InvalidResource(
                    "Layout was not created by MockDevice".to_string(),
                ))
            })?;

        if self.sets_allocated.load(Ordering::SeqCst) >= self.max_sets {
            return Err(PoolAllocError::Exhausted);
        }

        let mut remaining = self.remaining.lock().unwrap();
        for binding in &layout.bindings {
            let available = remaining.get(&binding.kind).copied().unwrap_or(0);
            if available < binding.count {
                return Err(PoolAllocError::Exhausted);
            }
        }
        for binding in &layout.bindings {
            *remaining.get_mut(&binding.kind).unwrap() -= binding.count;
        }

        self.sets_allocated.fetch_add(1, Ordering::SeqCst);
        let id = self.next_set_id.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockDescriptorSet { id }))
    }

    fn reset(&self) -> Result<()> {
        let mut remaining = self.remaining.lock().unwrap();
        *remaining = self.capacities.clone();
        self.sets_allocated.store(0, Ordering::SeqCst);
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ===== MOCK COMMAND LIST =====

/// Command list that records each call as a readable string
pub struct MockCommandList {
    commands: Vec<String>,
}

impl MockCommandList {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Recorded command trace
    pub fn recorded(&self) -> &[String] {
        &self.commands
    }

    /// Count of recorded commands starting with `prefix`
    pub fn count_with_prefix(&self, prefix: &str) -> usize {
        self.commands.iter().filter(|c| c.starts_with(prefix)).count()
    }
}

impl Default for MockCommandList {
    fn default() -> Self {
        Self::new()
    }
}

fn pipeline_name(pipeline: &Arc<dyn Pipeline>) -> String {
    pipeline
        .as_any()
        .downcast_ref::<MockPipeline>()
        .map(|p| p.name.clone())
        .unwrap_or_else(|| "?".to_string())
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        self.commands.clear();
        self.commands.push("begin".to_string());
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.commands.push("end".to_string());
        Ok(())
    }

    fn begin_render_pass(&mut self, image_index: u32, _clear_color: [f32; 4]) -> Result<()> {
        self.commands
            .push(format!("begin_render_pass:{}", image_index));
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.commands.push("end_render_pass".to_string());
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        self.commands
            .push(format!("bind_pipeline:{}", pipeline_name(pipeline)));
        Ok(())
    }

    fn bind_descriptor_set(
        &mut self,
        _pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        set: &Arc<dyn DescriptorSet>,
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        let id = set
            .as_any()
            .downcast_ref::<MockDescriptorSet>()
            .map(|s| s.id as i64)
            .unwrap_or(-1);
        self.commands.push(format!(
            "bind_descriptor_set:{}:{}:{:?}",
            set_index, id, dynamic_offsets
        ));
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn GpuBuffer>) -> Result<()> {
        self.commands
            .push(format!("bind_vertex_buffer:{}", buffer.size()));
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32, first_instance: u32) -> Result<()> {
        self.commands.push(format!(
            "draw:{}:{}:{}",
            vertex_count, first_vertex, first_instance
        ));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ===== MOCK DEVICE =====

/// Recorded batched descriptor update
#[derive(Debug, Clone)]
pub struct RecordedUpdate {
    pub set_id: usize,
    pub bindings: Vec<u32>,
}

/// In-memory [`GraphicsDevice`] implementation
pub struct MockDevice {
    min_uniform_alignment: u64,
    pools_created: AtomicUsize,
    layouts_created: AtomicUsize,
    textures_created: AtomicUsize,
    updates: Mutex<Vec<RecordedUpdate>>,
    submits: Mutex<Vec<Vec<String>>>,
    acquire_script: Mutex<VecDeque<SurfaceStatus>>,
    present_script: Mutex<VecDeque<SurfaceStatus>>,
    next_image: AtomicU32,
    rebuilds: Mutex<Vec<(u32, u32)>>,
    next_set_id: Arc<AtomicUsize>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            min_uniform_alignment: 256,
            pools_created: AtomicUsize::new(0),
            layouts_created: AtomicUsize::new(0),
            textures_created: AtomicUsize::new(0),
            updates: Mutex::new(Vec::new()),
            submits: Mutex::new(Vec::new()),
            acquire_script: Mutex::new(VecDeque::new()),
            present_script: Mutex::new(VecDeque::new()),
            next_image: AtomicU32::new(0),
            rebuilds: Mutex::new(Vec::new()),
            next_set_id: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Override the reported uniform-offset alignment
    pub fn with_min_uniform_alignment(mut self, alignment: u64) -> Self {
        self.min_uniform_alignment = alignment;
        self
    }

    /// Queue a result for the next `acquire_next_image` call
    pub fn script_acquire(&self, status: SurfaceStatus) {
        self.acquire_script.lock().unwrap().push_back(status);
    }

    /// Queue a result for the next `present` call
    pub fn script_present(&self, status: SurfaceStatus) {
        self.present_script.lock().unwrap().push_back(status);
    }

    /// Total pools created so far
    pub fn pools_created(&self) -> usize {
        self.pools_created.load(Ordering::SeqCst)
    }

    /// Total layouts created so far
    pub fn layouts_created(&self) -> usize {
        self.layouts_created.load(Ordering::SeqCst)
    }

    /// Total textures created so far
    pub fn textures_created(&self) -> usize {
        self.textures_created.load(Ordering::SeqCst)
    }

    /// All batched descriptor updates applied so far
    pub fn updates(&self) -> Vec<RecordedUpdate> {
        self.updates.lock().unwrap().clone()
    }

    /// Command traces of all submitted lists, in submission order
    pub fn submits(&self) -> Vec<Vec<String>> {
        self.submits.lock().unwrap().clone()
    }

    /// Extents passed to `rebuild_surface`
    pub fn rebuilds(&self) -> Vec<(u32, u32)> {
        self.rebuilds.lock().unwrap().clone()
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for MockDevice {
    fn limits(&self) -> DeviceLimits {
        DeviceLimits {
            min_uniform_buffer_offset_alignment: self.min_uniform_alignment,
        }
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn GpuBuffer>> {
        Ok(Arc::new(MockBuffer {
            size: desc.size,
            data: Mutex::new(vec![0; desc.size as usize]),
        }))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn TextureView>> {
        if let Some(pixels) = &desc.pixels {
            let expected = desc.width as usize * desc.height as usize * 4;
            if pixels.len() != expected {
                return Err(Error::InvalidResource(format!(
                    "Texture data is {} bytes, expected {} for {}x{} RGBA8",
                    pixels.len(),
                    expected,
                    desc.width,
                    desc.height
                )));
            }
        }
        self.textures_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockTextureView {
            name: format!("texture_{}x{}", desc.width, desc.height),
        }))
    }

    fn create_descriptor_pool(
        &self,
        sizes: &[(DescriptorKind, u32)],
        max_sets: u32,
    ) -> Result<Arc<dyn DescriptorPool>> {
        self.pools_created.fetch_add(1, Ordering::SeqCst);
        let capacities: FxHashMap<DescriptorKind, u32> = sizes.iter().copied().collect();
        Ok(Arc::new(MockDescriptorPool {
            remaining: Mutex::new(capacities.clone()),
            capacities,
            max_sets,
            sets_allocated: AtomicU32::new(0),
            resets: AtomicUsize::new(0),
            next_set_id: self.next_set_id.clone(),
        }))
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[LayoutBinding],
    ) -> Result<Arc<dyn DescriptorSetLayout>> {
        self.layouts_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockDescriptorSetLayout {
            bindings: bindings.to_vec(),
        }))
    }

    fn update_descriptor_set(
        &self,
        set: &Arc<dyn DescriptorSet>,
        writes: &[DescriptorWrite],
    ) -> Result<()> {
        let set_id = set
            .as_any()
            .downcast_ref::<MockDescriptorSet>()
            .ok_or_else(|| {
                Error::InvalidResource("Set was not created by MockDevice".to_string())
            })?
            .id;
        self.updates.lock().unwrap().push(RecordedUpdate {
            set_id,
            bindings: writes.iter().map(|w| w.binding).collect(),
        });
        Ok(())
    }

    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>> {
        Ok(Arc::new(MockFence {
            signaled: AtomicBool::new(signaled),
        }))
    }

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>> {
        Ok(Arc::new(MockSemaphore))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(MockCommandList::new()))
    }

    fn wait_for_fence(&self, fence: &Arc<dyn Fence>, _timeout_ns: u64) -> Result<()> {
        let fence = fence
            .as_any()
            .downcast_ref::<MockFence>()
            .ok_or_else(|| {
                Error::InvalidResource("Fence was not created by MockDevice".to_string())
            })?;
        if fence.signaled.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::DeviceLost("Fence wait timed out".to_string()))
        }
    }

    fn reset_fence(&self, fence: &Arc<dyn Fence>) -> Result<()> {
        let fence = fence
            .as_any()
            .downcast_ref::<MockFence>()
            .ok_or_else(|| {
                Error::InvalidResource("Fence was not created by MockDevice".to_string())
            })?;
        fence.signaled.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn acquire_next_image(&self, _acquired: &Arc<dyn Semaphore>) -> Result<SurfaceStatus> {
        if let Some(status) = self.acquire_script.lock().unwrap().pop_front() {
            return Ok(status);
        }
        // Cycle through a pretend 3-image swapchain
        let index = self.next_image.fetch_add(1, Ordering::SeqCst) % 3;
        Ok(SurfaceStatus::Ready(index))
    }

    fn submit(
        &self,
        cmds: &dyn CommandList,
        _wait: &Arc<dyn Semaphore>,
        _signal: &Arc<dyn Semaphore>,
        fence: &Arc<dyn Fence>,
    ) -> Result<()> {
        let trace = cmds
            .as_any()
            .downcast_ref::<MockCommandList>()
            .map(|c| c.recorded().to_vec())
            .unwrap_or_default();
        self.submits.lock().unwrap().push(trace);

        // The mock "GPU" completes instantly
        let fence = fence
            .as_any()
            .downcast_ref::<MockFence>()
            .ok_or_else(|| {
                Error::InvalidResource("Fence was not created by MockDevice".to_string())
            })?;
        fence.signaled.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn present(&self, image_index: u32, _wait: &Arc<dyn Semaphore>) -> Result<SurfaceStatus> {
        if let Some(status) = self.present_script.lock().unwrap().pop_front() {
            return Ok(status);
        }
        Ok(SurfaceStatus::Ready(image_index))
    }

    fn rebuild_surface(&self, width: u32, height: u32) -> Result<()> {
        self.rebuilds.lock().unwrap().push((width, height));
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(())
    }
}
