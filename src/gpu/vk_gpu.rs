use std::{ptr, sync::Arc};

use vulkanalia::{
    Device, Instance,
    vk::{self, DeviceV1_0, InstanceV1_0},
};

use tracing::debug;

use crate::error::VkSyncError;

use super::{gpu_memory::GpuMemory, memory_tracker::MemoryTracker};

/// One logical device over a shared Vulkan instance.
///
/// Only buffer allocation is needed here: synchronization copies go through
/// mapped host-visible memory, so no queues are recorded against after setup.
pub struct Gpu {
    instance: Arc<Instance>,
    device: Arc<Device>,
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
    memory_tracker: Arc<MemoryTracker>,
}

impl Gpu {
    pub(crate) fn new_shared(
        instance: Arc<Instance>,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self, VkSyncError> {
        unsafe {
            let queue_family_index = instance
                .get_physical_device_queue_family_properties(physical_device)
                .iter()
                .enumerate()
                .find(|(_, properties)| properties.queue_flags.contains(vk::QueueFlags::COMPUTE))
                .map(|(index, _)| index as u32)
                .ok_or_else(|| {
                    VkSyncError::Device("No compute queue family found".to_string())
                })?;

            let queue_priorities = [1.0f32];

            let queue_info = vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                next: ptr::null(),
                flags: vk::DeviceQueueCreateFlags::empty(),
                queue_family_index,
                queue_count: 1,
                queue_priorities: queue_priorities.as_ptr(),
            };

            let device_features = vk::PhysicalDeviceFeatures::default();

            let device_create_info = vk::DeviceCreateInfo {
                s_type: vk::StructureType::DEVICE_CREATE_INFO,
                next: ptr::null(),
                flags: vk::DeviceCreateFlags::empty(),
                queue_create_info_count: 1,
                queue_create_infos: &queue_info,
                enabled_layer_count: 0,
                enabled_layer_names: ptr::null(),
                enabled_extension_count: 0,
                enabled_extension_names: ptr::null(),
                enabled_features: &device_features,
            };

            let device = instance.create_device(physical_device, &device_create_info, None)?;

            let total_memory = Self::device_local_heap_size(&instance, physical_device);

            debug!(
                total_memory,
                queue_family_index, "initialised logical device"
            );

            Ok(Self {
                instance,
                device: Arc::new(device),
                physical_device,
                queue_family_index,
                memory_tracker: Arc::new(MemoryTracker::new(total_memory)),
            })
        }
    }

    /// Allocate a host-visible, host-coherent storage buffer of `size_bytes`.
    /// Contents are uninitialised; callers fill it through a sync copy.
    pub fn allocate_buffer(&self, size_bytes: u64) -> Result<GpuMemory, VkSyncError> {
        self.memory_tracker.reserve(size_bytes)?;

        let result = unsafe { self.create_buffer(size_bytes) };

        match result {
            Ok(memory) => Ok(memory),
            Err(e) => {
                self.memory_tracker.release(size_bytes);
                Err(e)
            }
        }
    }

    unsafe fn create_buffer(&self, size_bytes: u64) -> Result<GpuMemory, VkSyncError> {
        unsafe {
            let buffer_info = vk::BufferCreateInfo {
                s_type: vk::StructureType::BUFFER_CREATE_INFO,
                next: ptr::null(),
                flags: vk::BufferCreateFlags::empty(),
                size: size_bytes,
                usage: vk::BufferUsageFlags::STORAGE_BUFFER,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                queue_family_index_count: 0,
                queue_family_indices: ptr::null(),
            };

            let buffer = self.device.create_buffer(&buffer_info, None)?;
            let mem_requirements = self.device.get_buffer_memory_requirements(buffer);

            let memory_type = self.find_memory_type(
                mem_requirements.memory_type_bits,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?;

            let alloc_info = vk::MemoryAllocateInfo {
                s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
                next: ptr::null(),
                allocation_size: mem_requirements.size,
                memory_type_index: memory_type,
            };

            let memory = match self.device.allocate_memory(&alloc_info, None) {
                Ok(m) => m,
                Err(e) => {
                    self.device.destroy_buffer(buffer, None);
                    return Err(e.into());
                }
            };

            if let Err(e) = self.device.bind_buffer_memory(buffer, memory, 0) {
                self.device.destroy_buffer(buffer, None);
                self.device.free_memory(memory, None);
                return Err(e.into());
            }

            Ok(GpuMemory::new(
                buffer,
                memory,
                size_bytes,
                self.device.clone(),
                self.memory_tracker.clone(),
            ))
        }
    }

    fn find_memory_type(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<u32, VkSyncError> {
        unsafe {
            let mem_properties = self
                .instance
                .get_physical_device_memory_properties(self.physical_device);

            for i in 0..mem_properties.memory_type_count {
                if (type_filter & (1 << i)) != 0
                    && mem_properties.memory_types[i as usize]
                        .property_flags
                        .contains(properties)
                {
                    return Ok(i);
                }
            }

            Err(VkSyncError::Device(
                "No suitable memory type found".to_string(),
            ))
        }
    }

    fn device_local_heap_size(instance: &Instance, physical_device: vk::PhysicalDevice) -> u64 {
        unsafe {
            let memory_properties = instance.get_physical_device_memory_properties(physical_device);

            let device_local_heap_index = (0..memory_properties.memory_type_count)
                .find(|&i| {
                    let memory_type = memory_properties.memory_types[i as usize];
                    memory_type
                        .property_flags
                        .contains(vk::MemoryPropertyFlags::DEVICE_LOCAL)
                })
                .map(|i| memory_properties.memory_types[i as usize].heap_index)
                .unwrap_or(0);

            memory_properties.memory_heaps[device_local_heap_index as usize].size
        }
    }

    pub fn total_memory(&self) -> u64 {
        self.memory_tracker.get_maximum()
    }

    pub fn available_memory(&self) -> u64 {
        self.memory_tracker.get_available()
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    pub(crate) fn get_instance(&self) -> &Instance {
        &self.instance
    }

    pub(crate) fn get_physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }
}

impl Drop for Gpu {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);
        }
    }
}
