//! Descriptor-set builder
//!
//! Per-request accumulator that turns a list of bindings into a cached
//! layout, an allocated set, and one batched write-update. Allocation
//! failure aborts the build before any write is issued, so no
//! partially-bound set is ever observable.

use crate::error::Result;
use crate::gpu::{
    BufferWriteInfo, DescriptorKind, DescriptorSet, DescriptorSetLayout, DescriptorWrite,
    ImageWriteInfo, LayoutBinding, ShaderStages, WriteResource,
};
use std::sync::Arc;

use super::allocator::DescriptorAllocator;
use super::layout_cache::DescriptorLayoutCache;

/// Accumulates bindings and pending writes for one descriptor set
///
/// # Example
///
/// ```no_run
/// # use crow_engine::descriptors::{DescriptorAllocator, DescriptorBuilder, DescriptorLayoutCache};
/// # use crow_engine::gpu::{BufferWriteInfo, DescriptorKind, ShaderStages};
/// # fn demo(
/// #     cache: &mut DescriptorLayoutCache,
/// #     allocator: &mut DescriptorAllocator,
/// #     camera: BufferWriteInfo,
/// # ) -> crow_engine::error::Result<()> {
/// let (set, layout) = DescriptorBuilder::begin(cache, allocator)
///     .bind_buffer(0, camera, DescriptorKind::UniformBuffer, ShaderStages::VERTEX)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct DescriptorBuilder<'a> {
    cache: &'a mut DescriptorLayoutCache,
    allocator: &'a mut DescriptorAllocator,
    bindings: Vec<LayoutBinding>,
    writes: Vec<DescriptorWrite>,
}

impl<'a> DescriptorBuilder<'a> {
    /// Start building a set against the given cache and allocator
    pub fn begin(
        cache: &'a mut DescriptorLayoutCache,
        allocator: &'a mut DescriptorAllocator,
    ) -> Self {
        Self {
            cache,
            allocator,
            bindings: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Bind a buffer region at `binding`
    pub fn bind_buffer(
        mut self,
        binding: u32,
        info: BufferWriteInfo,
        kind: DescriptorKind,
        stages: ShaderStages,
    ) -> Self {
        self.bindings.push(LayoutBinding {
            binding,
            kind,
            count: 1,
            stages,
        });
        self.writes.push(DescriptorWrite {
            binding,
            kind,
            resource: WriteResource::Buffer(info),
        });
        self
    }

    /// Bind a texture view at `binding`
    pub fn bind_image(
        mut self,
        binding: u32,
        info: ImageWriteInfo,
        kind: DescriptorKind,
        stages: ShaderStages,
    ) -> Self {
        self.bindings.push(LayoutBinding {
            binding,
            kind,
            count: 1,
            stages,
        });
        self.writes.push(DescriptorWrite {
            binding,
            kind,
            resource: WriteResource::Image(info),
        });
        self
    }

    /// Resolve the layout, allocate the set, and apply all writes
    pub fn build(self) -> Result<(Arc<dyn DescriptorSet>, Arc<dyn DescriptorSetLayout>)> {
        let layout = self.cache.get_or_create(&self.bindings)?;
        let set = self.allocator.allocate(&layout)?;
        self.allocator
            .device()
            .update_descriptor_set(&set, &self.writes)?;
        Ok((set, layout))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
