use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Per-thread busy flags; at most one turn runs per thread
#[derive(Clone, Default)]
pub struct ThreadLocks {
    busy: Arc<Mutex<HashSet<String>>>,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when the thread already has a turn in flight
    pub fn try_acquire(&self, thread_id: &str) -> Option<ThreadGuard> {
        if !self.busy.lock().insert(thread_id.to_string()) {
            return None;
        }
        Some(ThreadGuard {
            busy: Arc::clone(&self.busy),
            thread_id: thread_id.to_string(),
        })
    }

    pub fn is_busy(&self, thread_id: &str) -> bool {
        self.busy.lock().contains(thread_id)
    }
}

/// Releases the thread on drop, including during unwinding
pub struct ThreadGuard {
    busy: Arc<Mutex<HashSet<String>>>,
    thread_id: String,
}

impl ThreadGuard {
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        self.busy.lock().remove(&self.thread_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_drop() {
        let locks = ThreadLocks::new();
        let guard = locks.try_acquire("t1").unwrap();
        assert!(locks.try_acquire("t1").is_none());
        assert!(locks.try_acquire("t2").is_some());
        drop(guard);
        assert!(!locks.is_busy("t1"));
        assert!(locks.try_acquire("t1").is_some());
    }

    #[test]
    fn test_guard_released_on_panic() {
        let locks = ThreadLocks::new();
        let cloned = locks.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = cloned.try_acquire("t1").unwrap();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(!locks.is_busy("t1"));
    }
}
