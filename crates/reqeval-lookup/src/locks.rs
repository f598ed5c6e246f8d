//! Per-token locks
//!
//! Read-modify-write cycles on one session run under that token's mutex.
//! Sessions with different tokens never contend.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Mutex per session token, held only while an operation runs
///
/// An entry is created on first use and dropped again when the last
/// operation on the token finishes, so tokens that are gone, unknown or
/// recovered leave nothing behind.
#[derive(Debug, Default)]
pub struct TokenLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TokenLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the token's lock
    pub fn with_lock<R>(&self, token: &str, f: impl FnOnce() -> R) -> R {
        let lock = self.lock_for(token);
        let result = {
            let _guard = lock.lock();
            f()
        };
        self.release(token, &lock);
        result
    }

    /// Number of tokens with an operation in flight
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }

    fn lock_for(&self, token: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.lock().entry(token.to_string()).or_default())
    }

    /// Handles are only cloned under the map lock, so a count of two (map
    /// plus caller) means nobody else holds or waits on the mutex
    fn release(&self, token: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        let idle = locks
            .get(token)
            .is_some_and(|entry| Arc::ptr_eq(entry, lock) && Arc::strong_count(lock) == 2);
        if idle {
            locks.remove(token);
        }
    }
}
