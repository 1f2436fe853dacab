//! Structural descriptor-set layout cache
//!
//! Layout objects have device lifetime and are expensive to churn, so
//! every request goes through this cache. Binding lists are
//! canonicalized by sorting on binding index; structurally equal lists
//! always resolve to the same handle, in any order.

use crate::error::Result;
use crate::gpu::{DescriptorSetLayout, GraphicsDevice, LayoutBinding};
use rustc_hash::FxHashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Canonical (sorted) binding list used as the cache key
#[derive(Debug, Clone, Eq)]
pub struct LayoutKey {
    bindings: Vec<LayoutBinding>,
}

impl LayoutKey {
    /// Build a key, sorting bindings by binding index
    fn new(bindings: &[LayoutBinding]) -> Self {
        let mut bindings = bindings.to_vec();
        bindings.sort_by_key(|b| b.binding);
        Self { bindings }
    }

    /// Canonical bindings, for creating the backing layout
    fn bindings(&self) -> &[LayoutBinding] {
        &self.bindings
    }
}

impl PartialEq for LayoutKey {
    fn eq(&self, other: &Self) -> bool {
        // Length first, then every field of every entry
        if self.bindings.len() != other.bindings.len() {
            return false;
        }
        self.bindings
            .iter()
            .zip(other.bindings.iter())
            .all(|(a, b)| {
                a.binding == b.binding
                    && a.kind == b.kind
                    && a.count == b.count
                    && a.stages == b.stages
            })
    }
}

impl Hash for LayoutKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bindings.len().hash(state);
        for b in &self.bindings {
            // Pack each entry into one word before folding
            let packed: u64 = b.binding as u64
                | (b.kind.index() as u64) << 8
                | (b.count as u64) << 16
                | (b.stages.bits() as u64) << 24;
            packed.hash(state);
        }
    }
}

/// Cache mapping canonical binding lists to layout handles
///
/// Device lifetime; each underlying handle is created once and dropped
/// once when the cache is dropped.
pub struct DescriptorLayoutCache {
    device: Arc<dyn GraphicsDevice>,
    layouts: FxHashMap<LayoutKey, Arc<dyn DescriptorSetLayout>>,
}

impl DescriptorLayoutCache {
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self {
            device,
            layouts: FxHashMap::default(),
        }
    }

    /// Return the cached layout for `bindings`, creating it on first use
    pub fn get_or_create(
        &mut self,
        bindings: &[LayoutBinding],
    ) -> Result<Arc<dyn DescriptorSetLayout>> {
        let key = LayoutKey::new(bindings);
        if let Some(layout) = self.layouts.get(&key) {
            return Ok(layout.clone());
        }
        let layout = self.device.create_descriptor_set_layout(key.bindings())?;
        self.layouts.insert(key, layout.clone());
        Ok(layout)
    }

    /// Number of distinct layouts created so far
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "layout_cache_tests.rs"]
mod tests;
