use std::{collections::HashSet, ffi::CString, ptr, sync::Arc};

use vulkanalia::{
    Entry,
    loader::{LIBRARY, LibloadingLoader},
    vk::{self, InstanceV1_0},
};

use tracing::info;

use crate::{error::VkSyncError, gpu::info::GpuInfo, gpu::vk_gpu::Gpu};

/// All usable devices on the system, sharing one Vulkan instance.
pub struct GpuPool {
    gpus: Vec<Arc<Gpu>>,
    _entry: Entry,
}

impl GpuPool {
    /// Initialise a logical device for every physical device found, or for
    /// the given subset of device indices.
    pub fn new(selected: Option<Vec<usize>>) -> Result<Self, VkSyncError> {
        unsafe {
            let loader = LibloadingLoader::new(LIBRARY)
                .map_err(|e| VkSyncError::Vulkan(e.to_string()))?;
            let entry = Entry::new(loader).map_err(|e| VkSyncError::Vulkan(e.to_string()))?;

            let aname =
                CString::new("vksync").map_err(|e| VkSyncError::Vulkan(e.to_string()))?;

            let appinfo = vk::ApplicationInfo {
                s_type: vk::StructureType::APPLICATION_INFO,
                next: ptr::null(),
                application_name: aname.as_ptr(),
                application_version: vk::make_version(1, 0, 0),
                engine_name: aname.as_ptr(),
                engine_version: vk::make_version(1, 0, 0),
                api_version: vk::make_version(1, 0, 0),
            };

            let create_info = vk::InstanceCreateInfo {
                s_type: vk::StructureType::INSTANCE_CREATE_INFO,
                next: ptr::null(),
                flags: vk::InstanceCreateFlags::empty(),
                application_info: &appinfo,
                enabled_layer_count: 0,
                enabled_layer_names: ptr::null(),
                enabled_extension_count: 0,
                enabled_extension_names: ptr::null(),
            };

            let instance = Arc::new(entry.create_instance(&create_info, None)?);

            let physical_devices = instance.enumerate_physical_devices()?;

            let mut init_gpus = Vec::new();

            // If selected is Some, iterate over those indices and validate them.
            // Otherwise initialise every physical device found.
            if let Some(selected_set) = selected {
                let mut seen = HashSet::new();

                for &idx in selected_set.iter() {
                    if idx >= physical_devices.len() {
                        return Err(VkSyncError::Device(format!(
                            "Selected GPU index {} out of range",
                            idx
                        )));
                    }

                    if !seen.insert(idx) {
                        return Err(VkSyncError::Device(format!(
                            "Duplicate GPU index {} in selection",
                            idx
                        )));
                    }

                    init_gpus
                        .push(Arc::new(Gpu::new_shared(instance.clone(), physical_devices[idx])?));
                }
            } else {
                for &physical_device in physical_devices.iter() {
                    init_gpus.push(Arc::new(Gpu::new_shared(instance.clone(), physical_device)?));
                }
            }

            info!(gpu_count = init_gpus.len(), "initialised GPU pool");

            Ok(Self {
                gpus: init_gpus,
                _entry: entry,
            })
        }
    }

    pub fn gpus(&self) -> &[Arc<Gpu>] {
        &self.gpus
    }

    pub fn get_gpu(&self, idx: usize) -> Option<&Arc<Gpu>> {
        self.gpus.get(idx)
    }
}

impl std::fmt::Debug for GpuPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let infos: Vec<GpuInfo> = self.gpus.iter().map(|gpu| GpuInfo::new(gpu)).collect();
        f.debug_struct("GpuPool")
            .field("gpus_info", &infos)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Runs only where a Vulkan implementation is present; skips silently
    // otherwise, like the rest of the GPU-dependent tests.
    #[test]
    fn pool_reports_device_info() {
        if let Ok(pool) = GpuPool::new(None) {
            for gpu in pool.gpus() {
                let info = GpuInfo::new(gpu);
                assert!(info.has_compute);
                assert!(info.total_memory > 0);
            }
        }
    }

    #[test]
    fn rejects_out_of_range_selection() {
        match GpuPool::new(Some(vec![usize::MAX])) {
            Err(VkSyncError::Device(msg)) => assert!(msg.contains("out of range")),
            // No Vulkan library on this machine, or somehow usize::MAX GPUs
            _ => {}
        }
    }
}
