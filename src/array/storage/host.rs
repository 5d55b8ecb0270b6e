use std::sync::RwLock;

use crate::{error::VkSyncError, utils::expect_msg::ExpectMsg};

/// CPU-backed device array. Stands in for GPU storage when no device is
/// available and carries the full copy semantics of the GPU variant.
pub struct HostArrayStorage {
    data: RwLock<Vec<u8>>,
    len: usize,
}

impl HostArrayStorage {
    pub fn with_zeros(len_bytes: usize) -> Self {
        Self {
            data: RwLock::new(vec![0u8; len_bytes]),
            len: len_bytes,
        }
    }

    pub fn len_bytes(&self) -> usize {
        self.len
    }

    pub fn copy_to_host(&self, dst: &mut [u8]) -> Result<(), VkSyncError> {
        let guard = self
            .data
            .read()
            .expect_msg("Failed to acquire read lock on host array storage");

        if dst.len() > guard.len() {
            return Err(VkSyncError::SizeMismatch(format!(
                "read of {} bytes exceeds array size {}",
                dst.len(),
                guard.len()
            )));
        }

        dst.copy_from_slice(&guard[..dst.len()]);
        Ok(())
    }

    pub fn copy_from_host(&self, src: &[u8]) -> Result<(), VkSyncError> {
        let mut guard = self
            .data
            .write()
            .expect_msg("Failed to acquire write lock on host array storage");

        if src.len() > guard.len() {
            return Err(VkSyncError::SizeMismatch(format!(
                "write of {} bytes exceeds array size {}",
                src.len(),
                guard.len()
            )));
        }

        guard[..src.len()].copy_from_slice(src);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_both_directions() {
        let storage = HostArrayStorage::with_zeros(4);
        storage.copy_from_host(&[1, 2, 3, 4]).unwrap();

        let mut out = [0u8; 4];
        storage.copy_to_host(&mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn rejects_oversized_transfers() {
        let storage = HostArrayStorage::with_zeros(2);
        assert!(storage.copy_from_host(&[0u8; 3]).is_err());

        let mut out = [0u8; 3];
        assert!(storage.copy_to_host(&mut out).is_err());
    }

    #[test]
    fn partial_read_takes_prefix() {
        let storage = HostArrayStorage::with_zeros(4);
        storage.copy_from_host(&[9, 8, 7, 6]).unwrap();

        let mut out = [0u8; 2];
        storage.copy_to_host(&mut out).unwrap();
        assert_eq!(out, [9, 8]);
    }
}
