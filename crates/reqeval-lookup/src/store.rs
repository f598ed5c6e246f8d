//! Session storage
//!
//! Sessions live in any key-value store with per-entry TTLs. The in-memory
//! store is enough for tests and single-process deployments; a distributed
//! cache implements the same trait.

use crate::error::LookupResult;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Key-value store with per-entry expiry
pub trait SessionStore: Send + Sync {
    /// Read a live entry
    fn get(&self, key: &str) -> LookupResult<Option<Value>>;

    /// Write an entry that expires after `ttl`
    fn set(&self, key: &str, value: Value, ttl: Duration) -> LookupResult<()>;

    /// Remove an entry; removing a missing key is not an error
    fn delete(&self, key: &str) -> LookupResult<()>;
}

impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    fn get(&self, key: &str) -> LookupResult<Option<Value>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> LookupResult<()> {
        (**self).set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> LookupResult<()> {
        (**self).delete(key)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Session store backed by an in-memory map
///
/// Expired entries are dropped lazily when read, or in bulk through
/// `purge_expired`.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet dropped
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every expired entry and return how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, key: &str) -> LookupResult<Option<Value>> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        // Re-check: a writer may have refreshed the entry in between
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            log::debug!("session entry '{key}' expired");
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> LookupResult<()> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    fn delete(&self, key: &str) -> LookupResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}
