use crate::{error::VkSyncError, gpu::gpu_memory::GpuMemory};

/// GPU-backed device array: owns one buffer allocation, released on drop.
pub struct GpuArrayStorage {
    memory: GpuMemory,
}

impl GpuArrayStorage {
    pub fn new(memory: GpuMemory) -> Self {
        Self { memory }
    }

    /// Direct access to the underlying allocation, for binding the buffer
    /// into compute work outside this crate.
    pub fn memory(&self) -> &GpuMemory {
        &self.memory
    }

    pub fn len_bytes(&self) -> usize {
        self.memory.size as usize
    }

    pub fn copy_to_host(&self, dst: &mut [u8]) -> Result<(), VkSyncError> {
        self.memory.read_into(dst)
    }

    pub fn copy_from_host(&self, src: &[u8]) -> Result<(), VkSyncError> {
        self.memory.copy_into(src)
    }
}
