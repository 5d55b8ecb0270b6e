use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::VkSyncError;

pub struct MemoryTracker {
    maximum: u64,
    current: AtomicU64,
}

// Updates never require a mutable reference. The trade off of checking after
// the change is that reserve/release are each a single atomic operation.

impl MemoryTracker {
    pub fn new(maximum: u64) -> Self {
        Self {
            maximum,
            current: AtomicU64::new(0),
        }
    }

    pub fn reserve(&self, size: u64) -> Result<(), VkSyncError> {
        let prev = self.current.fetch_add(size, Ordering::Release);

        let new = match prev.checked_add(size) {
            Some(v) => v,
            None => {
                self.current.fetch_sub(size, Ordering::Release);
                return Err(VkSyncError::OutOfMemory(format!(
                    "reservation would overflow: current {} + size {}",
                    prev, size
                )));
            }
        };

        if new > self.maximum {
            self.current.fetch_sub(size, Ordering::Release);
            return Err(VkSyncError::OutOfMemory(format!(
                "tried to reserve {} bytes when {} of {} bytes are used",
                size, prev, self.maximum
            )));
        }

        Ok(())
    }

    pub fn release(&self, size: u64) {
        self.current.fetch_sub(size, Ordering::Release);
    }

    pub fn get_current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    pub fn get_available(&self) -> u64 {
        self.maximum - self.get_current()
    }

    pub fn get_maximum(&self) -> u64 {
        self.maximum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_reserve_and_release() {
        let tracker = MemoryTracker::new(1024);
        tracker.reserve(1000).unwrap();
        assert_eq!(tracker.get_current(), 1000);
        assert_eq!(tracker.get_available(), 24);
        tracker.release(1000);
        assert_eq!(tracker.get_current(), 0);
    }

    #[test]
    fn rejects_over_budget_reservation() {
        let tracker = MemoryTracker::new(100);
        assert!(tracker.reserve(101).is_err());
        // A failed reservation must not leak usage
        assert_eq!(tracker.get_current(), 0);
        tracker.reserve(100).unwrap();
    }
}
