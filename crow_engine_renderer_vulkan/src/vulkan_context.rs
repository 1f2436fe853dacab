/// Shared GPU context owned by every Vulkan resource
///
/// Holds the handles each resource needs for its own destruction, so
/// resources can be dropped in any order relative to the device
/// wrapper. The context itself is dropped last (all resources hold an
/// `Arc`) and tears down allocator, device, and instance in order.

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use std::mem::ManuallyDrop;
use std::sync::Mutex;

pub(crate) struct GpuContext {
    pub device: ash::Device,
    pub instance: ash::Instance,
    /// Allocator requires &mut for allocate/free; Mutex gives &self access
    pub allocator: Mutex<ManuallyDrop<Allocator>>,
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
}

impl GpuContext {
    pub fn new(
        device: ash::Device,
        instance: ash::Instance,
        allocator: Allocator,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
    ) -> Self {
        Self {
            device,
            instance,
            allocator: Mutex::new(ManuallyDrop::new(allocator)),
            graphics_queue,
            graphics_queue_family,
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // Allocator must go before the device it allocates from
            if let Ok(mut allocator) = self.allocator.lock() {
                ManuallyDrop::drop(&mut *allocator);
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
