use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::Result;
use crate::storage::BlobBackend;

/// In-memory blob backend for tests. Thread-safe via Mutex; counts backend
/// `put` calls so dedupe tests can assert that re-puts write nothing.
pub struct MemoryBackend {
    data: Mutex<HashMap<String, Vec<u8>>>,
    puts: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend {
            data: Mutex::new(HashMap::new()),
            puts: AtomicUsize::new(0),
        }
    }

    pub fn object_count(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Replace stored bytes directly, bypassing the backend contract.
    /// Used to simulate bit rot.
    pub fn overwrite(&self, key: &str, data: Vec<u8>) {
        self.data.lock().unwrap().insert(key.to_string(), data);
    }

    /// Drop an object directly. Used to simulate object loss.
    pub fn remove(&self, key: &str) {
        self.data.lock().unwrap().remove(key);
    }
}

impl BlobBackend for MemoryBackend {
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.data.lock().unwrap().contains_key(key))
    }
}
