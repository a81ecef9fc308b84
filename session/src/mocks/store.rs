//! In-memory key/value stores.

use super::lock;
use crate::error::{Result, SessionError};
use crate::providers::{LocalStore, SecureStore};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A write the session made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite {
    /// `set(key, value)`
    Set {
        /// Key written
        key: String,
        /// Value written
        value: String,
    },
    /// `delete(key)`
    Delete {
        /// Key removed
        key: String,
    },
}

/// Shared map with a write log and failure switches.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    writes: Arc<Mutex<Vec<StoreWrite>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Seed a value without logging a write.
    pub fn insert(&self, key: &str, value: &str) {
        lock(&self.entries).insert(key.to_string(), value.to_string());
    }

    /// Current value of `key`.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    /// Writes made through the store traits, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<StoreWrite> {
        lock(&self.writes).clone()
    }

    /// Make every read fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write and delete fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SessionError::Storage("simulated read failure".to_string()));
        }
        Ok(self.value(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SessionError::Storage("simulated write failure".to_string()));
        }
        self.insert(key, value);
        lock(&self.writes).push(StoreWrite::Set {
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SessionError::Storage("simulated delete failure".to_string()));
        }
        lock(&self.entries).remove(key);
        lock(&self.writes).push(StoreWrite::Delete {
            key: key.to_string(),
        });
        Ok(())
    }
}

/// Mock [`SecureStore`].
#[derive(Debug, Clone, Default)]
pub struct MockSecureStore(MemoryStore);

impl Deref for MockSecureStore {
    type Target = MemoryStore;

    fn deref(&self) -> &MemoryStore {
        &self.0
    }
}

impl SecureStore for MockSecureStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.0.read(key)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.0.write(key, value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.0.remove(key)
    }
}

/// Mock [`LocalStore`].
#[derive(Debug, Clone, Default)]
pub struct MockLocalStore(MemoryStore);

impl Deref for MockLocalStore {
    type Target = MemoryStore;

    fn deref(&self) -> &MemoryStore {
        &self.0
    }
}

impl LocalStore for MockLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.0.read(key)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.0.write(key, value)
    }
}
