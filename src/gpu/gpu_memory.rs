use std::sync::Arc;

use vulkanalia::{Device, vk, vk::DeviceV1_0};

use crate::error::VkSyncError;

use super::memory_tracker::MemoryTracker;

/// One device-side allocation: a storage buffer plus its backing memory.
///
/// The allocation is owned exclusively by this struct and released exactly
/// once, on drop, which also returns the bytes to the owning tracker.
pub struct GpuMemory {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
    device: Arc<Device>,
    tracker: Arc<MemoryTracker>,
}

impl GpuMemory {
    pub(crate) fn new(
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        size: vk::DeviceSize,
        device: Arc<Device>,
        tracker: Arc<MemoryTracker>,
    ) -> Self {
        Self {
            buffer,
            memory,
            size,
            device,
            tracker,
        }
    }

    /// Copy raw bytes into the device buffer.
    pub fn copy_into(&self, data: &[u8]) -> Result<(), VkSyncError> {
        let data_size = data.len() as vk::DeviceSize;

        if data_size > self.size {
            return Err(VkSyncError::SizeMismatch(format!(
                "data size {} exceeds device buffer size {}",
                data_size, self.size
            )));
        }

        unsafe {
            let data_ptr =
                self.device
                    .map_memory(self.memory, 0, data_size, vk::MemoryMapFlags::empty())?
                    as *mut u8;

            std::ptr::copy_nonoverlapping(data.as_ptr(), data_ptr, data.len());

            self.device.unmap_memory(self.memory);
        }

        Ok(())
    }

    /// Read raw bytes from the device buffer into a pre-sized host slice.
    pub fn read_into(&self, dst: &mut [u8]) -> Result<(), VkSyncError> {
        let read_size = dst.len() as vk::DeviceSize;

        if read_size > self.size {
            return Err(VkSyncError::SizeMismatch(format!(
                "read of {} bytes exceeds device buffer size {}",
                read_size, self.size
            )));
        }

        unsafe {
            let data_ptr =
                self.device
                    .map_memory(self.memory, 0, read_size, vk::MemoryMapFlags::empty())?
                    as *const u8;

            std::ptr::copy_nonoverlapping(data_ptr, dst.as_mut_ptr(), dst.len());

            self.device.unmap_memory(self.memory);
        }

        Ok(())
    }

    /// Read the whole device buffer into a fresh Vec.
    pub fn read_memory(&self) -> Result<Vec<u8>, VkSyncError> {
        let mut output_data = vec![0u8; self.size as usize];
        self.read_into(&mut output_data)?;
        Ok(output_data)
    }
}

impl Drop for GpuMemory {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
        self.tracker.release(self.size);
    }
}
