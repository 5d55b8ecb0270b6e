use std::sync::Arc;

use tracing::debug;

use crate::{error::VkSyncError, gpu::vk_gpu::Gpu};

use super::{
    data_type::DataType,
    dims::ArrayDims,
    storage::{DeviceArray, GpuArrayStorage, HostArrayStorage},
};

/// Where device arrays live. `Host` keeps everything CPU-side and is the
/// fallback when no Vulkan device is usable.
#[derive(Clone)]
pub enum ArrayBackend {
    Host,
    Gpu(Arc<Gpu>),
}

impl ArrayBackend {
    /// Allocate uninitialised device storage for `dims` elements of
    /// `data_type`. The caller decides when to fill it from host data.
    pub fn allocate(
        &self,
        dims: &ArrayDims,
        data_type: DataType,
    ) -> Result<DeviceArray, VkSyncError> {
        let size_bytes = dims.elements() as usize * data_type.size_in_bytes();

        debug!(size_bytes, dims = %dims, "allocating device array");

        match self {
            ArrayBackend::Host => Ok(DeviceArray::Host(HostArrayStorage::with_zeros(size_bytes))),
            ArrayBackend::Gpu(gpu) => {
                let memory = gpu.allocate_buffer(size_bytes as u64)?;
                Ok(DeviceArray::Gpu(GpuArrayStorage::new(memory)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_allocation_is_sized_from_dims_and_type() {
        let array = ArrayBackend::Host
            .allocate(&ArrayDims::new(4, 4, 1, 1), DataType::F32)
            .unwrap();
        assert_eq!(array.len_bytes(), 16 * 4);
    }

    #[test]
    fn zero_dims_allocate_empty_storage() {
        let array = ArrayBackend::Host
            .allocate(&ArrayDims::zeros(), DataType::U8)
            .unwrap();
        assert_eq!(array.len_bytes(), 0);
    }
}
