//! Descriptor management
//!
//! Three cooperating layers, matching how the engine hands sets to the
//! render loop:
//! - [`DescriptorAllocator`] grows and recycles fixed-capacity pools
//! - [`DescriptorLayoutCache`] deduplicates structurally equal layouts
//! - [`DescriptorBuilder`] composes bindings into a layout + written set

pub mod allocator;
pub mod layout_cache;
pub mod builder;

pub use allocator::{DescriptorAllocator, PoolSizes};
pub use builder::DescriptorBuilder;
pub use layout_cache::DescriptorLayoutCache;
