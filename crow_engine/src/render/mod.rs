//! Render data model and batching
//!
//! Materials and meshes live in a name-keyed [`RenderRegistry`] with
//! process lifetime; [`RenderObject`]s are transient references into
//! it. [`BatchSubmitter`] turns an ordered object list into GPU
//! commands with minimal pipeline and mesh rebinds.

pub mod gpu_data;
pub mod material;
pub mod registry;
pub mod submitter;

pub use gpu_data::{GpuCameraData, GpuObjectData, GpuSceneData};
pub use material::{Material, Mesh, RenderObject};
pub use registry::RenderRegistry;
pub use submitter::{BatchSubmitter, DrawStats};
