//! Growable descriptor-pool allocator
//!
//! Pool creation and reset are expensive relative to per-set
//! allocation, so pools are grabbed from a free list, retired to a
//! used list when they report exhaustion, and recycled wholesale by
//! `reset_pools`. The per-kind multiplier table sizes one shared pool
//! for mixed workloads instead of one pool per descriptor kind.

use crate::error::{Error, Result};
use crate::gpu::{DescriptorKind, DescriptorPool, DescriptorSet, DescriptorSetLayout, GraphicsDevice, PoolAllocError};
use crate::engine_debug;
use std::sync::Arc;

const LOG_SOURCE: &str = "crow::DescriptorAllocator";

/// Default number of sets (and multiplier base) per pool
const DEFAULT_BASE_CAPACITY: u32 = 1000;

/// Per-kind capacity multipliers applied to the base capacity
///
/// A pool sized with base capacity `B` holds `B × multiplier`
/// descriptors of each kind.
#[derive(Debug, Clone)]
pub struct PoolSizes {
    pub multipliers: Vec<(DescriptorKind, f32)>,
}

impl Default for PoolSizes {
    fn default() -> Self {
        Self {
            multipliers: vec![
                (DescriptorKind::Sampler, 0.5),
                (DescriptorKind::CombinedImageSampler, 4.0),
                (DescriptorKind::SampledImage, 4.0),
                (DescriptorKind::StorageImage, 1.0),
                (DescriptorKind::UniformTexelBuffer, 1.0),
                (DescriptorKind::StorageTexelBuffer, 1.0),
                (DescriptorKind::UniformBuffer, 2.0),
                (DescriptorKind::StorageBuffer, 2.0),
                (DescriptorKind::UniformBufferDynamic, 1.0),
                (DescriptorKind::StorageBufferDynamic, 1.0),
                (DescriptorKind::InputAttachment, 0.5),
            ],
        }
    }
}

impl PoolSizes {
    /// Concrete `(kind, capacity)` pairs for a pool of the given base capacity
    fn resolve(&self, base_capacity: u32) -> Vec<(DescriptorKind, u32)> {
        self.multipliers
            .iter()
            .map(|&(kind, multiplier)| (kind, (multiplier * base_capacity as f32) as u32))
            .collect()
    }
}

/// Descriptor-set allocator backed by a growable set of pools
///
/// Single-threaded by design: one instance belongs to the recording
/// thread. Concurrent recording would need per-thread instances.
pub struct DescriptorAllocator {
    device: Arc<dyn GraphicsDevice>,
    pool_sizes: PoolSizes,
    base_capacity: u32,
    current: Option<Arc<dyn DescriptorPool>>,
    used_pools: Vec<Arc<dyn DescriptorPool>>,
    free_pools: Vec<Arc<dyn DescriptorPool>>,
    grabs: usize,
}

impl DescriptorAllocator {
    /// Create an allocator with the default multiplier table
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self::with_config(device, DEFAULT_BASE_CAPACITY, PoolSizes::default())
    }

    /// Create an allocator with explicit sizing
    pub fn with_config(
        device: Arc<dyn GraphicsDevice>,
        base_capacity: u32,
        pool_sizes: PoolSizes,
    ) -> Self {
        Self {
            device,
            pool_sizes,
            base_capacity,
            current: None,
            used_pools: Vec::new(),
            free_pools: Vec::new(),
            grabs: 0,
        }
    }

    /// Device this allocator creates pools on
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// Allocate one descriptor set with the given layout
    ///
    /// Tries the current pool first. Exhaustion retires that pool and
    /// retries exactly once against a freshly grabbed pool; a second
    /// exhaustion means the layout's demand exceeds a whole pool's
    /// capacity, which is a configuration error, never transient.
    pub fn allocate(
        &mut self,
        layout: &Arc<dyn DescriptorSetLayout>,
    ) -> Result<Arc<dyn DescriptorSet>> {
        if self.current.is_none() {
            self.current = Some(self.grab_pool()?);
        }
        let pool = self.current.as_ref().unwrap().clone();

        match pool.try_allocate(layout) {
            Ok(set) => Ok(set),
            Err(PoolAllocError::Backend(err)) => Err(err),
            Err(PoolAllocError::Exhausted) => {
                self.used_pools.push(pool);
                let fresh = self.grab_pool()?;
                self.current = Some(fresh.clone());

                match fresh.try_allocate(layout) {
                    Ok(set) => Ok(set),
                    Err(PoolAllocError::Backend(err)) => Err(err),
                    // A fresh pool could not satisfy the layout either;
                    // its demand can never fit, so do not keep growing
                    Err(PoolAllocError::Exhausted) => Err(Error::OutOfMemory),
                }
            }
        }
    }

    /// Reset every pool and return it to the free list
    ///
    /// Sets handed out so far become invalid; callers only do this when
    /// no frame still references them.
    pub fn reset_pools(&mut self) -> Result<()> {
        for pool in self.used_pools.drain(..) {
            pool.reset()?;
            self.free_pools.push(pool);
        }
        if let Some(pool) = self.current.take() {
            pool.reset()?;
            self.free_pools.push(pool);
        }
        engine_debug!(LOG_SOURCE, "Reset pools, {} now free", self.free_pools.len());
        Ok(())
    }

    /// Pop a freed pool, or create a new one if none are free
    fn grab_pool(&mut self) -> Result<Arc<dyn DescriptorPool>> {
        self.grabs += 1;
        if let Some(pool) = self.free_pools.pop() {
            return Ok(pool);
        }
        let sizes = self.pool_sizes.resolve(self.base_capacity);
        engine_debug!(
            LOG_SOURCE,
            "Creating descriptor pool (base capacity {})",
            self.base_capacity
        );
        self.device.create_descriptor_pool(&sizes, self.base_capacity)
    }

    /// Pools retired since the last reset
    pub fn used_count(&self) -> usize {
        self.used_pools.len()
    }

    /// Pools currently on the free list
    pub fn free_count(&self) -> usize {
        self.free_pools.len()
    }

    /// Total pool-grab events (free-list pops plus creations)
    pub fn grab_count(&self) -> usize {
        self.grabs
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "allocator_tests.rs"]
mod tests;
