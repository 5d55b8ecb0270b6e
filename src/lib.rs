//! vksync - Lazy host/device buffer coherence for Vulkan compute
//!
//! Keeps a CPU-resident buffer and a device-resident buffer consistent under
//! dirty-flag based, copy-on-demand synchronization, with one side
//! authoritative at a time.

mod array;

mod error;

mod gpu;

mod sync;

mod utils;

pub use array::{
    ArrayBackend, ArrayDims, DataType, DeviceArray, GpuArrayStorage, HostArrayStorage, HostBuffer,
    new_host_buffer,
};
pub use error::VkSyncError;
pub use gpu::{info::GpuInfo, pool::GpuPool, vk_gpu::Gpu};
pub use sync::{data_manager::DataManager, modified::Modified};
