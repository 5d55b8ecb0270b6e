use crate::{error::VkSyncError, gpu::{pool::GpuPool, vk_gpu::Gpu}};

use vulkanalia::vk::{self, InstanceV1_0};

#[derive(Clone, Debug)]
pub struct GpuInfo {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub has_compute: bool,
    pub compute_queue_count: u32,
    pub total_memory: u64,
}

impl GpuInfo {
    pub fn new(gpu: &Gpu) -> GpuInfo {
        unsafe {
            let instance = gpu.get_instance();
            let physical_device = gpu.get_physical_device();

            let properties = instance.get_physical_device_properties(physical_device);

            let name = String::from_utf8_lossy(
                &properties
                    .device_name
                    .iter()
                    .take_while(|&&c| c != 0)
                    .map(|&c| c as u8)
                    .collect::<Vec<u8>>(),
            )
            .to_string();

            let queue_families =
                instance.get_physical_device_queue_family_properties(physical_device);

            let (has_compute, compute_queue_count) = queue_families
                .iter()
                .find(|props| props.queue_flags.contains(vk::QueueFlags::COMPUTE))
                .map(|props| (true, props.queue_count))
                .unwrap_or((false, 0));

            GpuInfo {
                name,
                device_type: properties.device_type,
                has_compute,
                compute_queue_count,
                total_memory: gpu.total_memory(),
            }
        }
    }

    pub fn system_gpus_info() -> Result<Vec<GpuInfo>, VkSyncError> {
        let pool = GpuPool::new(None)?;

        let info: Vec<GpuInfo> = pool.gpus().iter().map(|gpu| GpuInfo::new(gpu)).collect();

        Ok(info)
    }
}
