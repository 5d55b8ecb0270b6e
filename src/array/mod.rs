mod backend;
mod data_type;
mod dims;
mod storage;

pub use backend::ArrayBackend;
pub use data_type::DataType;
pub use dims::ArrayDims;
pub use storage::{DeviceArray, GpuArrayStorage, HostArrayStorage};

use std::sync::{Arc, RwLock};

/// Caller-managed host memory, co-owned with whoever attached it.
///
/// The coherence manager only ever clones the handle; it never allocates or
/// frees the underlying vector.
pub type HostBuffer = Arc<RwLock<Vec<u8>>>;

pub fn new_host_buffer(data: Vec<u8>) -> HostBuffer {
    Arc::new(RwLock::new(data))
}
