use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::{
    array::{ArrayBackend, ArrayDims, DataType, DeviceArray, HostBuffer},
    error::VkSyncError,
    utils::expect_msg::ExpectMsg,
};

use super::modified::Modified;

/// Lazy coherence manager for one logical array mirrored between a
/// caller-managed host buffer and a device array.
///
/// Flag convention: a dirty flag on one side means that side is out of date
/// and must be refreshed from the other side before it can be read. The
/// update calls perform that refresh on demand; the mark calls declare that
/// the opposite side is about to be mutated through an externally held
/// handle. At most one side is ever authoritative; letting both sides go
/// dirty without an intervening sync is unresolvable and `update` refuses it.
///
/// All state sits behind one mutex, so the dirty-check-then-copy sequence of
/// every operation is atomic with respect to other threads.
pub struct DataManager {
    // state drops before backend, so device allocations are released while
    // their device is still alive
    state: Mutex<ManagerState>,
    backend: ArrayBackend,
    data_type: DataType,
    modified: Modified,
}

struct ManagerState {
    dims: ArrayDims,
    host_buffer: Option<HostBuffer>,
    device_array: Option<Arc<DeviceArray>>,
    host_dirty: bool,
    device_dirty: bool,
}

impl DataManager {
    /// A manager starts fully reset: zero dims, no buffers, both sides clean.
    pub fn new(backend: ArrayBackend, data_type: DataType) -> Self {
        Self {
            state: Mutex::new(ManagerState {
                dims: ArrayDims::zeros(),
                host_buffer: None,
                device_array: None,
                host_dirty: false,
                device_dirty: false,
            }),
            backend,
            data_type,
            modified: Modified::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state
            .lock()
            .expect_msg("Failed to acquire data manager lock")
    }

    /// Declare the array's shape. Does not allocate or copy; an existing
    /// device array keeps the size it was allocated with until the next
    /// `allocate` call.
    pub fn set_array_dimensions(&self, dims: ArrayDims) {
        let changed = {
            let mut state = self.lock();
            if state.dims != dims {
                state.dims = dims;
                true
            } else {
                false
            }
        };

        // Observers run outside the state lock
        if changed {
            self.modified.notify();
        }
    }

    pub fn array_dimensions(&self) -> ArrayDims {
        self.lock().dims
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn observe_modified(&self, f: impl Fn() + Send + Sync + 'static) {
        self.modified.observe(f);
    }

    /// Attach caller-managed host memory. Replaces any previous buffer
    /// unconditionally; contents are neither inspected nor transferred.
    pub fn set_host_buffer(&self, buffer: HostBuffer) {
        self.lock().host_buffer = Some(buffer);
    }

    /// Raw flag setter, bypassing the sync protocol. For initialization and
    /// grafting, not ordinary use.
    pub fn set_host_dirty_flag(&self, is_dirty: bool) {
        self.lock().host_dirty = is_dirty;
    }

    /// Raw flag setter, bypassing the sync protocol. For initialization and
    /// grafting, not ordinary use.
    pub fn set_device_dirty_flag(&self, is_dirty: bool) {
        self.lock().device_dirty = is_dirty;
    }

    pub fn is_host_dirty(&self) -> bool {
        self.lock().host_dirty
    }

    pub fn is_device_dirty(&self) -> bool {
        self.lock().device_dirty
    }

    /// Declare that the device array is about to be mutated externally:
    /// flush any pending host-side changes to the device first, then flag the
    /// host side as needing a refresh.
    pub fn mark_host_dirty(&self) -> Result<(), VkSyncError> {
        let mut state = self.lock();
        Self::update_device_array_inner(&mut state, self.data_type)?;
        state.host_dirty = true;
        Ok(())
    }

    /// Declare that host memory is about to be mutated: pull any pending
    /// device-side changes into it first, then flag the device side as
    /// needing a refresh.
    pub fn mark_device_dirty(&self) -> Result<(), VkSyncError> {
        let mut state = self.lock();
        Self::update_host_buffer_inner(&mut state)?;
        state.device_dirty = true;
        Ok(())
    }

    /// Bring the host buffer up to date with the device array, if it is
    /// flagged stale and both sides exist. Idempotent; a missing side makes
    /// this a no-op.
    pub fn update_host_buffer(&self) -> Result<(), VkSyncError> {
        let mut state = self.lock();
        Self::update_host_buffer_inner(&mut state)
    }

    /// Bring the device array up to date with the host buffer, if it is
    /// flagged stale and both sides exist. The copy size is the element
    /// count implied by the current dims. Idempotent; a missing side makes
    /// this a no-op.
    pub fn update_device_array(&self) -> Result<(), VkSyncError> {
        let mut state = self.lock();
        Self::update_device_array_inner(&mut state, self.data_type)
    }

    fn update_host_buffer_inner(state: &mut ManagerState) -> Result<(), VkSyncError> {
        if !state.host_dirty {
            return Ok(());
        }

        let (Some(device), Some(host)) = (&state.device_array, &state.host_buffer) else {
            return Ok(());
        };

        let mut guard = host
            .write()
            .expect_msg("Failed to acquire write lock on host buffer");

        let bytes = device.len_bytes();
        if guard.len() < bytes {
            return Err(VkSyncError::SizeMismatch(format!(
                "host buffer holds {} bytes but the device array holds {}",
                guard.len(),
                bytes
            )));
        }

        debug!(bytes, "device -> host copy");
        device.copy_to_host(&mut guard[..bytes])?;
        drop(guard);

        state.host_dirty = false;
        Ok(())
    }

    fn update_device_array_inner(
        state: &mut ManagerState,
        data_type: DataType,
    ) -> Result<(), VkSyncError> {
        if !state.device_dirty {
            return Ok(());
        }

        let (Some(device), Some(host)) = (&state.device_array, &state.host_buffer) else {
            return Ok(());
        };

        let guard = host
            .read()
            .expect_msg("Failed to acquire read lock on host buffer");

        let bytes = state.dims.elements() as usize * data_type.size_in_bytes();
        if guard.len() < bytes {
            return Err(VkSyncError::SizeMismatch(format!(
                "host buffer holds {} bytes but the declared dims need {}",
                guard.len(),
                bytes
            )));
        }

        debug!(bytes, "host -> device copy");
        device.copy_from_host(&guard[..bytes])?;
        drop(guard);

        state.device_dirty = false;
        Ok(())
    }

    /// Allocate device storage per the current dims and element type,
    /// replacing (and releasing) any previous array. The fresh array holds
    /// no meaningful data, so the device side is flagged stale: the next
    /// device update fills it from host before anything reads it.
    pub fn allocate(&self) -> Result<(), VkSyncError> {
        let mut state = self.lock();

        let array = self.backend.allocate(&state.dims, self.data_type)?;
        state.device_array = Some(Arc::new(array));
        state.device_dirty = true;
        Ok(())
    }

    /// One-shot full synchronization. Refuses to arbitrate when both sides
    /// were mutated since the last sync (`ConflictingDirtyState`), leaving
    /// all flags and buffers untouched so the caller can discard a side.
    /// On success both flags are clear.
    pub fn update(&self) -> Result<(), VkSyncError> {
        let mut state = self.lock();

        if state.host_dirty && state.device_dirty {
            return Err(VkSyncError::ConflictingDirtyState);
        }

        Self::update_device_array_inner(&mut state, self.data_type)?;
        Self::update_host_buffer_inner(&mut state)?;

        state.host_dirty = false;
        state.device_dirty = false;
        Ok(())
    }

    /// Hand out the device array for external mutation. The device is
    /// brought up to date with any pending host changes first, then the host
    /// side is flagged stale so the external writes are pulled back on the
    /// next host update. Returns `None` when nothing has been allocated.
    pub fn modifiable_device_array(&self) -> Result<Option<Arc<DeviceArray>>, VkSyncError> {
        let mut state = self.lock();
        Self::update_device_array_inner(&mut state, self.data_type)?;
        state.host_dirty = true;
        Ok(state.device_array.clone())
    }

    /// Symmetric counterpart: hand out the host buffer for external
    /// mutation. Host catches up with the device first, then the device side
    /// is flagged stale. Returns `None` when no buffer is attached.
    pub fn host_buffer(&self) -> Result<Option<HostBuffer>, VkSyncError> {
        let mut state = self.lock();
        Self::update_host_buffer_inner(&mut state)?;
        state.device_dirty = true;
        Ok(state.host_buffer.clone())
    }

    /// Shallow-transfer dims, both buffer handles, and both flags from
    /// `other`. No data moves; afterwards the two managers alias the same
    /// device array, whose release stays single-point through the shared
    /// handle. Grafting two managers into each other from two threads at
    /// once is the caller's hazard.
    pub fn graft(&self, other: &DataManager) {
        if std::ptr::eq(self, other) {
            return;
        }

        let mut state = self.lock();
        let other_state = other.lock();

        state.dims = other_state.dims;
        state.device_array = other_state.device_array.clone();
        state.host_buffer = other_state.host_buffer.clone();
        state.host_dirty = other_state.host_dirty;
        state.device_dirty = other_state.device_dirty;
    }

    /// Reset to the constructed state: zero dims, no buffers, both sides
    /// clean. A previously allocated device array is released here (through
    /// its handle) unless a graft recipient still shares it.
    pub fn initialize(&self) {
        let mut state = self.lock();

        state.dims = ArrayDims::zeros();
        state.device_array = None;
        state.host_buffer = None;
        state.host_dirty = false;
        state.device_dirty = false;
    }
}

impl std::fmt::Debug for DataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("DataManager")
            .field("dims", &state.dims)
            .field("data_type", &self.data_type)
            .field("host_dirty", &state.host_dirty)
            .field("device_dirty", &state.device_dirty)
            .field("host_buffer", &state.host_buffer.is_some())
            .field(
                "device_array",
                &state
                    .device_array
                    .as_ref()
                    .map(|a| a.location_string()),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::new_host_buffer;
    use crate::utils::{bytes_to_vec, slice_as_bytes};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager_f32() -> DataManager {
        DataManager::new(ArrayBackend::Host, DataType::F32)
    }

    fn attach_f32(manager: &DataManager, values: &[f32]) -> HostBuffer {
        let buffer = new_host_buffer(slice_as_bytes(values).to_vec());
        manager.set_host_buffer(buffer.clone());
        buffer
    }

    fn host_values(buffer: &HostBuffer) -> Vec<f32> {
        bytes_to_vec(&buffer.read().unwrap())
    }

    #[test]
    fn update_clears_both_flags() {
        let manager = manager_f32();
        manager.set_array_dimensions(ArrayDims::new(2, 2, 1, 1));
        attach_f32(&manager, &[1.0, 2.0, 3.0, 4.0]);
        manager.allocate().unwrap();

        manager.update().unwrap();
        assert!(!manager.is_host_dirty());
        assert!(!manager.is_device_dirty());
    }

    #[test]
    fn update_refuses_conflicting_dirty_state() {
        let manager = manager_f32();
        manager.set_array_dimensions(ArrayDims::new(2, 1, 1, 1));
        attach_f32(&manager, &[1.0, 2.0]);
        manager.allocate().unwrap();

        manager.set_host_dirty_flag(true);
        manager.set_device_dirty_flag(true);

        match manager.update() {
            Err(VkSyncError::ConflictingDirtyState) => {}
            other => panic!("expected ConflictingDirtyState, got {:?}", other.err()),
        }

        // Flags are left as-is so the caller can pick a side to discard
        assert!(manager.is_host_dirty());
        assert!(manager.is_device_dirty());
    }

    #[test]
    fn updates_are_noops_without_buffers() {
        let manager = manager_f32();
        manager.set_host_dirty_flag(true);
        manager.set_device_dirty_flag(true);

        manager.update_host_buffer().unwrap();
        manager.update_device_array().unwrap();

        // Nothing to copy between, so the flags stay put
        assert!(manager.is_host_dirty());
        assert!(manager.is_device_dirty());
    }

    #[test]
    fn updates_are_noops_with_only_one_side() {
        let manager = manager_f32();
        manager.set_array_dimensions(ArrayDims::new(2, 1, 1, 1));
        attach_f32(&manager, &[5.0, 6.0]);

        manager.set_host_dirty_flag(true);
        manager.set_device_dirty_flag(true);
        manager.update_host_buffer().unwrap();
        manager.update_device_array().unwrap();
        assert!(manager.is_host_dirty());
        assert!(manager.is_device_dirty());
    }

    #[test]
    fn dims_change_notifies_exactly_once() {
        let manager = manager_f32();
        let count = std::sync::Arc::new(AtomicUsize::new(0));
        let observed = count.clone();
        manager.observe_modified(move || {
            observed.fetch_add(1, Ordering::SeqCst);
        });

        manager.set_array_dimensions(ArrayDims::new(2, 3, 1, 1));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Same value again: no notification
        manager.set_array_dimensions(ArrayDims::new(2, 3, 1, 1));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        manager.set_array_dimensions(ArrayDims::new(4, 3, 1, 1));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn round_trip_preserves_values_exactly() {
        let manager = manager_f32();
        manager.set_array_dimensions(ArrayDims::new(4, 1, 1, 1));

        let first = [1.0f32, 2.0, 3.0, 4.0];
        let buffer = attach_f32(&manager, &first);

        manager.mark_device_dirty().unwrap();
        manager.allocate().unwrap();
        manager.update_device_array().unwrap();

        // Mutate host behind the manager's back, then declare it
        let second = [9.5f32, -8.0, 0.25, 7.0];
        buffer
            .write()
            .unwrap()
            .copy_from_slice(slice_as_bytes(&second));
        manager.mark_host_dirty().unwrap();

        // External write of the new values through the device handle
        let device = manager.modifiable_device_array().unwrap().unwrap();
        device.copy_from_host(slice_as_bytes(&second)).unwrap();

        manager.update_host_buffer().unwrap();
        assert_eq!(host_values(&buffer), second.to_vec());
        assert!(!manager.is_host_dirty());
    }

    #[test]
    fn graft_copies_dims_flags_and_aliases_the_device_array() {
        let source = manager_f32();
        source.set_array_dimensions(ArrayDims::new(2, 2, 1, 1));
        attach_f32(&source, &[1.0, 2.0, 3.0, 4.0]);
        source.allocate().unwrap();
        source.set_host_dirty_flag(true);
        source.set_device_dirty_flag(false);

        let target = manager_f32();
        target.graft(&source);

        assert_eq!(target.array_dimensions(), source.array_dimensions());
        assert!(target.is_host_dirty());
        assert!(!target.is_device_dirty());

        let a = target.modifiable_device_array().unwrap().unwrap();
        let b = source.modifiable_device_array().unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn device_flag_is_clear_after_device_update() {
        let manager = manager_f32();
        manager.set_array_dimensions(ArrayDims::new(2, 1, 1, 1));
        attach_f32(&manager, &[1.0, 2.0]);

        manager.allocate().unwrap();
        assert!(manager.is_device_dirty());

        manager.update_device_array().unwrap();
        assert!(!manager.is_device_dirty());
    }

    #[test]
    fn allocate_flags_fresh_array_for_fill_from_host() {
        let manager = manager_f32();
        manager.set_array_dimensions(ArrayDims::new(4, 4, 1, 1));
        let zeros = vec![0.0f32; 16];
        attach_f32(&manager, &zeros);

        manager.allocate().unwrap();
        assert!(manager.is_device_dirty());

        manager.update_device_array().unwrap();
        let device = manager.modifiable_device_array().unwrap().unwrap();
        assert_eq!(device.len_bytes(), 16 * 4);
        assert_eq!(bytes_to_vec::<f32>(&device.read().unwrap()), zeros);
    }

    #[test]
    fn reallocation_tracks_current_dims() {
        let manager = manager_f32();
        manager.set_array_dimensions(ArrayDims::new(2, 1, 1, 1));
        attach_f32(&manager, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        manager.allocate().unwrap();

        // Re-shaping alone must not resize the existing array
        manager.set_array_dimensions(ArrayDims::new(6, 1, 1, 1));
        {
            let device = manager.modifiable_device_array().unwrap().unwrap();
            assert_eq!(device.len_bytes(), 2 * 4);
        }

        manager.allocate().unwrap();
        let device = manager.modifiable_device_array().unwrap().unwrap();
        assert_eq!(device.len_bytes(), 6 * 4);
    }

    #[test]
    fn modifiable_device_array_flushes_host_and_flags_host_stale() {
        let manager = manager_f32();
        manager.set_array_dimensions(ArrayDims::new(2, 1, 1, 1));
        let values = [3.0f32, 4.0];
        attach_f32(&manager, &values);
        manager.allocate().unwrap();

        let device = manager.modifiable_device_array().unwrap().unwrap();

        // The pending fill from host happened before the handle went out
        assert_eq!(bytes_to_vec::<f32>(&device.read().unwrap()), values.to_vec());
        assert!(!manager.is_device_dirty());
        assert!(manager.is_host_dirty());
    }

    #[test]
    fn host_buffer_accessor_flags_device_stale() {
        let manager = manager_f32();
        manager.set_array_dimensions(ArrayDims::new(2, 1, 1, 1));
        attach_f32(&manager, &[1.0, 2.0]);
        manager.allocate().unwrap();
        manager.update().unwrap();

        let buffer = manager.host_buffer().unwrap();
        assert!(buffer.is_some());
        assert!(manager.is_device_dirty());
        assert!(!manager.is_host_dirty());
    }

    #[test]
    fn host_buffer_accessor_without_buffer_is_none() {
        let manager = manager_f32();
        assert!(manager.host_buffer().unwrap().is_none());
        assert!(manager.modifiable_device_array().unwrap().is_none());
    }

    #[test]
    fn initialize_releases_the_device_array() {
        let manager = manager_f32();
        manager.set_array_dimensions(ArrayDims::new(2, 1, 1, 1));
        attach_f32(&manager, &[1.0, 2.0]);
        manager.allocate().unwrap();

        let handle = manager.modifiable_device_array().unwrap().unwrap();
        assert_eq!(Arc::strong_count(&handle), 2);

        manager.initialize();
        assert_eq!(Arc::strong_count(&handle), 1);
        assert_eq!(manager.array_dimensions(), ArrayDims::zeros());
        assert!(!manager.is_host_dirty());
        assert!(!manager.is_device_dirty());
    }

    #[test]
    fn sixteen_element_scenario() {
        // dims (4,4,1,1) with a 16 zero host buffer: allocate flags the
        // device side, the device update copies exactly 16 elements
        let manager = manager_f32();
        manager.set_array_dimensions(ArrayDims::new(4, 4, 1, 1));
        assert_eq!(manager.array_dimensions().elements(), 16);

        attach_f32(&manager, &[0.0; 16]);
        manager.allocate().unwrap();
        assert!(manager.is_device_dirty());

        manager.update_device_array().unwrap();
        let device = manager.modifiable_device_array().unwrap().unwrap();
        assert_eq!(device.len_bytes(), 16 * DataType::F32.size_in_bytes());
    }

    #[test]
    fn undersized_host_buffer_is_an_error_not_a_corruption() {
        let manager = manager_f32();
        manager.set_array_dimensions(ArrayDims::new(4, 1, 1, 1));
        attach_f32(&manager, &[1.0, 2.0]); // two elements short
        manager.allocate().unwrap();

        match manager.update_device_array() {
            Err(VkSyncError::SizeMismatch(_)) => {}
            other => panic!("expected SizeMismatch, got {:?}", other.err()),
        }
        assert!(manager.is_device_dirty());
    }

    // Runs only where a Vulkan implementation is present; skips silently
    // otherwise.
    #[test]
    fn gpu_backend_round_trip_when_available() {
        let Ok(pool) = crate::gpu::pool::GpuPool::new(None) else {
            return;
        };
        let Some(gpu) = pool.get_gpu(0) else {
            return;
        };

        let manager = DataManager::new(ArrayBackend::Gpu(gpu.clone()), DataType::F32);
        manager.set_array_dimensions(ArrayDims::new(8, 1, 1, 1));
        let values: Vec<f32> = (0..8).map(|i| i as f32 * 1.5).collect();
        attach_f32(&manager, &values);

        manager.allocate().unwrap();
        manager.update().unwrap();

        let device = manager.modifiable_device_array().unwrap().unwrap();
        assert_eq!(bytes_to_vec::<f32>(&device.read().unwrap()), values);
    }

    #[test]
    fn set_host_buffer_replaces_unconditionally() {
        let manager = manager_f32();
        manager.set_array_dimensions(ArrayDims::new(1, 1, 1, 1));
        attach_f32(&manager, &[1.0]);
        let replacement = attach_f32(&manager, &[2.0]);

        let held = manager.host_buffer().unwrap().unwrap();
        assert!(Arc::ptr_eq(&held, &replacement));
    }
}
