pub mod gpu_memory;
pub mod info;
pub mod memory_tracker;
pub mod pool;
pub mod vk_gpu;
