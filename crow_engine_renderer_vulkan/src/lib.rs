/*!
# Crow Engine - Vulkan Renderer Backend

Vulkan implementation of the Crow engine's `GraphicsDevice` seam.

This crate provides a Vulkan backend using the Ash library for Vulkan
bindings and gpu-allocator for memory management. The engine core never
sees a Vulkan type; everything crosses the seam as trait objects.
*/

// Vulkan implementation modules
mod vulkan_context;
mod vulkan_resources;
mod vulkan_swapchain;
mod vulkan_command_list;
mod vulkan_pipeline;
mod vulkan_device;

pub use vulkan_device::{DeviceConfig, VulkanDevice};
pub use vulkan_pipeline::{PipelineDesc, VertexAttribute, VertexAttributeFormat};
