/*
 * Copyright 2019-2020 Wren Powell
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! In-memory `ObjectStore` and `KvStore` implementations.
//!
//! These back every unit and integration test in this crate, the same way
//! the teacher crate tests its repository logic against a `MemoryStore`
//! rather than a real backend.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Error as BackendError;

use super::{KvStore, ObjectStore};

/// An `ObjectStore` backed by an in-memory map of `(namespace, key) -> bytes`.
#[derive(Default)]
pub struct MemoryObjectStore {
    blobs: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn create(&self, namespace: &str, key: &str) -> Result<(), BackendError> {
        let mut blobs = self.blobs.write().expect("lock poisoned");
        blobs
            .entry((namespace.to_string(), key.to_string()))
            .or_insert_with(Vec::new);
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), BackendError> {
        let mut blobs = self.blobs.write().expect("lock poisoned");
        blobs.remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }

    fn write(&self, namespace: &str, key: &str, offset: u64, buf: &[u8]) -> Result<(), BackendError> {
        let mut blobs = self.blobs.write().expect("lock poisoned");
        let blob = blobs
            .entry((namespace.to_string(), key.to_string()))
            .or_insert_with(Vec::new);

        let end = offset as usize + buf.len();
        if blob.len() < end {
            blob.resize(end, 0);
        }
        blob[offset as usize..end].copy_from_slice(buf);
        Ok(())
    }

    fn read(&self, namespace: &str, key: &str, offset: u64, buf: &mut [u8]) -> Result<usize, BackendError> {
        let blobs = self.blobs.read().expect("lock poisoned");
        let blob = match blobs.get(&(namespace.to_string(), key.to_string())) {
            Some(blob) => blob,
            None => return Ok(0),
        };

        let offset = offset as usize;
        if offset >= blob.len() {
            return Ok(0);
        }

        let available = &blob[offset..];
        let copy_len = buf.len().min(available.len());
        buf[..copy_len].copy_from_slice(&available[..copy_len]);
        Ok(copy_len)
    }
}

/// A `KvStore` backed by an in-memory map of `(namespace, key) -> bytes`.
#[derive(Default)]
pub struct MemoryKvStore {
    values: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), BackendError> {
        let mut values = self.values.write().expect("lock poisoned");
        values.insert((namespace.to_string(), key.to_string()), value.to_vec());
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let values = self.values.read().expect("lock poisoned");
        Ok(values.get(&(namespace.to_string(), key.to_string())).cloned())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), BackendError> {
        let mut values = self.values.write().expect("lock poisoned");
        values.remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_past_end_extends_with_zeros() {
        let store = MemoryObjectStore::new();
        store.create("chunks", "a").unwrap();
        store.write("chunks", "a", 4, b"xy").unwrap();

        let mut buf = [0xFFu8; 6];
        let read = store.read("chunks", "a", 0, &mut buf).unwrap();
        assert_eq!(read, 6);
        assert_eq!(&buf, b"\0\0\0\0xy");
    }

    #[test]
    fn read_past_end_returns_zero_bytes_read() {
        let store = MemoryObjectStore::new();
        store.create("chunks", "a").unwrap();
        store.write("chunks", "a", 0, b"hi").unwrap();

        let mut buf = [0xFFu8; 4];
        let read = store.read("chunks", "a", 10, &mut buf).unwrap();
        assert_eq!(read, 0);
    }

    #[test]
    fn kv_get_missing_is_none() {
        let store = MemoryKvStore::new();
        assert_eq!(store.get("items", "/x/y").unwrap(), None);
    }
}
