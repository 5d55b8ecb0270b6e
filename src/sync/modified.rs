use std::sync::Mutex;

use crate::utils::expect_msg::ExpectMsg;

/// Change-notification registry. Observers are plain callbacks, fired once
/// per notify call; whoever owns the manager decides what "changed" means
/// to the rest of the system.
pub struct Modified {
    observers: Mutex<Vec<Box<dyn Fn() + Send + Sync>>>,
}

impl Modified {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn observe(&self, f: impl Fn() + Send + Sync + 'static) {
        self.observers
            .lock()
            .expect_msg("Failed to acquire observer lock")
            .push(Box::new(f));
    }

    pub fn notify(&self) {
        let observers = self
            .observers
            .lock()
            .expect_msg("Failed to acquire observer lock");

        for observer in observers.iter() {
            observer();
        }
    }
}

impl Default for Modified {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[test]
    fn notifies_every_observer_once() {
        let modified = Modified::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = count.clone();
            modified.observe(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        modified.notify();
        assert_eq!(count.load(Ordering::SeqCst), 3);

        modified.notify();
        assert_eq!(count.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn notify_without_observers_is_fine() {
        Modified::new().notify();
    }
}
