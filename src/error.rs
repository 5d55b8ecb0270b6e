use thiserror::Error;

#[derive(Error, Debug)]
pub enum VkSyncError {
    #[error("conflicting dirty state: host and device were both modified since the last sync")]
    ConflictingDirtyState,

    #[error("Vulkan error: {0}")]
    Vulkan(String),

    #[error("Size mismatch: {0}")]
    SizeMismatch(String),

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Device error: {0}")]
    Device(String),
}

// Convert vk::Result (Vulkan return codes) into VkSyncError
impl From<vulkanalia::vk::Result> for VkSyncError {
    fn from(r: vulkanalia::vk::Result) -> Self {
        VkSyncError::Vulkan(format!("vk::Result: {:?}", r))
    }
}

impl From<vulkanalia::vk::ErrorCode> for VkSyncError {
    fn from(c: vulkanalia::vk::ErrorCode) -> Self {
        VkSyncError::Vulkan(format!("vk::ErrorCode: {:?}", c))
    }
}
