mod gpu;
mod host;

pub use gpu::GpuArrayStorage;
pub use host::HostArrayStorage;

use crate::error::VkSyncError;

/// Device-side storage for one array.
///
/// The GPU variant is backed by a mapped Vulkan buffer; the host variant is a
/// plain byte vector, used as the fallback backend when no device is present.
/// Both are interior-mutable so a shared handle can be written through.
pub enum DeviceArray {
    Gpu(GpuArrayStorage),
    Host(HostArrayStorage),
}

impl DeviceArray {
    /// Capacity of the storage, fixed at allocation time.
    pub fn len_bytes(&self) -> usize {
        match self {
            DeviceArray::Gpu(storage) => storage.len_bytes(),
            DeviceArray::Host(storage) => storage.len_bytes(),
        }
    }

    /// Copy the first `dst.len()` bytes of the array into `dst`.
    pub fn copy_to_host(&self, dst: &mut [u8]) -> Result<(), VkSyncError> {
        match self {
            DeviceArray::Gpu(storage) => storage.copy_to_host(dst),
            DeviceArray::Host(storage) => storage.copy_to_host(dst),
        }
    }

    /// Copy `src` into the front of the array.
    pub fn copy_from_host(&self, src: &[u8]) -> Result<(), VkSyncError> {
        match self {
            DeviceArray::Gpu(storage) => storage.copy_from_host(src),
            DeviceArray::Host(storage) => storage.copy_from_host(src),
        }
    }

    /// Read the whole array into a fresh Vec.
    pub fn read(&self) -> Result<Vec<u8>, VkSyncError> {
        let mut out = vec![0u8; self.len_bytes()];
        self.copy_to_host(&mut out)?;
        Ok(out)
    }

    pub fn location_string(&self) -> String {
        match self {
            DeviceArray::Gpu(_) => "GPU array".to_string(),
            DeviceArray::Host(_) => "Host array".to_string(),
        }
    }
}
