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

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Batch, KvStore, ObjectStore, Promise, NS_CHUNKS, NS_CHUNK_REFS, NS_ITEMS, NS_ITEM_HASHES};
use crate::fingerprint::Fingerprint;

/// The persisted shape of a refcount record: `{"ref": n}`.
#[derive(Debug, Serialize, Deserialize)]
struct RefcountRecord {
    #[serde(rename = "ref")]
    count: i32,
}

/// The thin contract layer between the external object/KV stores and the
/// rest of the crate (C2 in the design).
///
/// Small bookkeeping reads and writes (refcounts, the hash list) are
/// synchronous: they build and execute a private sub-batch inline and return
/// the resolved value directly, mirroring the source's own pattern of
/// executing a sub-batch immediately after enqueuing a single read. Larger,
/// deferrable operations (materialising a chunk's bytes, replacing an item
/// or hash-list record) are enqueued onto the *caller-supplied* batch.
pub struct ChunkStoreAdapter<O, K> {
    objects: Arc<O>,
    kv: Arc<K>,
}

impl<O, K> Clone for ChunkStoreAdapter<O, K> {
    fn clone(&self) -> Self {
        ChunkStoreAdapter {
            objects: Arc::clone(&self.objects),
            kv: Arc::clone(&self.kv),
        }
    }
}

impl<O: ObjectStore + 'static, K: KvStore + 'static> ChunkStoreAdapter<O, K> {
    /// Wrap an object store and a KV store.
    pub fn new(objects: O, kv: K) -> Self {
        ChunkStoreAdapter {
            objects: Arc::new(objects),
            kv: Arc::new(kv),
        }
    }

    // --- Synchronous bookkeeping operations -------------------------------

    /// Read the current refcount for `fp`, defaulting to `0` if no record exists.
    pub fn ref_get(&self, fp: &Fingerprint) -> crate::Result<i32> {
        match self.kv.get(NS_CHUNK_REFS, fp.as_str())? {
            Some(bytes) => Ok(rmp_serde::from_slice::<RefcountRecord>(&bytes)?.count),
            None => Ok(0),
        }
    }

    /// Overwrite the refcount record for `fp`.
    pub fn ref_put(&self, fp: &Fingerprint, count: i32) -> crate::Result<()> {
        let bytes = rmp_serde::to_vec(&RefcountRecord { count })?;
        self.kv.put(NS_CHUNK_REFS, fp.as_str(), &bytes)?;
        Ok(())
    }

    /// Remove the refcount record for `fp`.
    pub fn ref_delete(&self, fp: &Fingerprint) -> crate::Result<()> {
        self.kv.delete(NS_CHUNK_REFS, fp.as_str())?;
        Ok(())
    }

    /// Read a chunk's bytes at `(offset, buf.len())`.
    ///
    /// If fewer bytes are available than requested (including none, when the
    /// chunk record doesn't exist), the remainder of `buf` is zero-filled;
    /// reads never fail on end-of-file.
    pub fn chunk_read(&self, fp: &Fingerprint, offset: u64, buf: &mut [u8]) -> crate::Result<()> {
        let read = self.objects.read(NS_CHUNKS, fp.as_str(), offset, buf)?;
        for byte in &mut buf[read..] {
            *byte = 0;
        }
        Ok(())
    }

    /// Fetch the current hash-list record bytes for `path`, if any.
    pub fn hashes_get(&self, path: &str) -> crate::Result<Option<Vec<u8>>> {
        Ok(self.kv.get(NS_ITEM_HASHES, path)?)
    }

    // --- Deferred operations, enqueued onto the caller's batch -------------

    /// Materialise `buf` as the chunk at `fp`, deferred until `batch` executes.
    pub fn chunk_write(&self, fp: &Fingerprint, buf: Vec<u8>, batch: &mut Batch) {
        let objects = Arc::clone(&self.objects);
        let fp = fp.clone();
        batch.enqueue(move || {
            objects.create(NS_CHUNKS, fp.as_str())?;
            objects.write(NS_CHUNKS, fp.as_str(), 0, &buf)?;
            Ok(())
        });
    }

    /// Remove the chunk record at `fp`, deferred until `batch` executes.
    pub fn chunk_delete(&self, fp: &Fingerprint, batch: &mut Batch) {
        let objects = Arc::clone(&self.objects);
        let fp = fp.clone();
        batch.enqueue(move || Ok(objects.delete(NS_CHUNKS, fp.as_str())?));
    }

    /// Persist `bytes` as the item record at `path`, deferred until `batch` executes.
    pub fn item_put(&self, path: &str, bytes: Vec<u8>, batch: &mut Batch) {
        let kv = Arc::clone(&self.kv);
        let path = path.to_string();
        batch.enqueue(move || Ok(kv.put(NS_ITEMS, &path, &bytes)?));
    }

    /// Enqueue an asynchronous fetch of the item record at `path`.
    ///
    /// The returned [`Promise`] resolves once `batch` is executed.
    pub fn item_get_async(&self, path: &str, batch: &mut Batch) -> Promise<Option<Vec<u8>>> {
        let kv = Arc::clone(&self.kv);
        let path = path.to_string();
        let promise = Promise::new();
        let resolver = promise.clone();
        batch.enqueue(move || {
            resolver.resolve(kv.get(NS_ITEMS, &path)?);
            Ok(())
        });
        promise
    }

    /// Remove the item record at `path`, deferred until `batch` executes.
    pub fn item_delete(&self, path: &str, batch: &mut Batch) {
        let kv = Arc::clone(&self.kv);
        let path = path.to_string();
        batch.enqueue(move || Ok(kv.delete(NS_ITEMS, &path)?));
    }

    /// Persist `bytes` as the hash-list record at `path`, deferred until `batch` executes.
    pub fn hashes_put(&self, path: &str, bytes: Vec<u8>, batch: &mut Batch) {
        let kv = Arc::clone(&self.kv);
        let path = path.to_string();
        batch.enqueue(move || Ok(kv.put(NS_ITEM_HASHES, &path, &bytes)?));
    }

    /// Remove the hash-list record at `path`, deferred until `batch` executes.
    pub fn hashes_delete(&self, path: &str, batch: &mut Batch) {
        let kv = Arc::clone(&self.kv);
        let path = path.to_string();
        batch.enqueue(move || Ok(kv.delete(NS_ITEM_HASHES, &path)?));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryKvStore, MemoryObjectStore};

    fn adapter() -> ChunkStoreAdapter<MemoryObjectStore, MemoryKvStore> {
        ChunkStoreAdapter::new(MemoryObjectStore::new(), MemoryKvStore::new())
    }

    #[test]
    fn missing_refcount_defaults_to_zero() {
        let adapter = adapter();
        let fp = Fingerprint::new("deadbeef");
        assert_eq!(adapter.ref_get(&fp).unwrap(), 0);
    }

    #[test]
    fn refcount_roundtrips_through_put_and_get() {
        let adapter = adapter();
        let fp = Fingerprint::new("deadbeef");
        adapter.ref_put(&fp, 3).unwrap();
        assert_eq!(adapter.ref_get(&fp).unwrap(), 3);
        adapter.ref_delete(&fp).unwrap();
        assert_eq!(adapter.ref_get(&fp).unwrap(), 0);
    }

    #[test]
    fn chunk_write_is_deferred_until_batch_executes() {
        let adapter = adapter();
        let fp = Fingerprint::new("deadbeef");
        let mut batch = Batch::new();
        adapter.chunk_write(&fp, vec![1, 2, 3, 4], &mut batch);

        let mut buf = [0u8; 4];
        adapter.chunk_read(&fp, 0, &mut buf).unwrap();
        assert_eq!(buf, [0, 0, 0, 0]);

        assert!(batch.execute());
        adapter.chunk_read(&fp, 0, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn reading_a_missing_chunk_zero_fills() {
        let adapter = adapter();
        let fp = Fingerprint::new("missing");
        let mut buf = [0xFFu8; 8];
        adapter.chunk_read(&fp, 0, &mut buf).unwrap();
        assert_eq!(buf, [0u8; 8]);
    }

    #[test]
    fn item_get_async_resolves_after_execute() {
        let adapter = adapter();
        let mut batch = Batch::new();
        adapter.item_put("/col/name", vec![9, 9, 9], &mut batch);
        assert!(batch.execute());

        let mut batch = Batch::new();
        let promise = adapter.item_get_async("/col/name", &mut batch);
        assert_eq!(promise.take(), None);
        assert!(batch.execute());
        assert_eq!(promise.take(), Some(vec![9, 9, 9]));
    }
}
