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

//! Acquire/release of fingerprint-addressed chunks, with reclamation when a
//! chunk's reference count drops to zero.

use crate::fingerprint::Fingerprint;
use crate::store::{Batch, ChunkStoreAdapter, KvStore, ObjectStore};

/// The outcome of [`ReferenceCounter::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireOutcome {
    /// Whether the chunk did not previously exist and was just materialised.
    pub was_new: bool,
}

/// Tracks how many hash-list entries, across all items, point at each chunk.
///
/// This is read-modify-write over the underlying KV store with no
/// compare-and-swap; under the single-writer-per-process model this crate
/// assumes, that's sufficient. It is not safe against concurrent writers
/// racing on the same fingerprint.
pub struct ReferenceCounter<O, K> {
    adapter: ChunkStoreAdapter<O, K>,
}

impl<O: ObjectStore + 'static, K: KvStore + 'static> ReferenceCounter<O, K> {
    /// Wrap a chunk store adapter.
    pub fn new(adapter: ChunkStoreAdapter<O, K>) -> Self {
        ReferenceCounter { adapter }
    }

    /// Ensure a chunk exists and bump its refcount by one.
    ///
    /// If the refcount was previously zero (or the chunk didn't exist),
    /// `produce_bytes` is called to obtain the chunk's content and the
    /// materialisation is enqueued onto `batch` alongside the refcount write.
    pub fn acquire(
        &self,
        fp: &Fingerprint,
        produce_bytes: impl FnOnce() -> Vec<u8>,
        batch: &mut Batch,
    ) -> crate::Result<AcquireOutcome> {
        let prev = self.adapter.ref_get(fp)?;
        let was_new = prev == 0;

        if was_new {
            tracing::debug!(fingerprint = %fp, "chunk refcount 0 -> 1, materialising");
            self.adapter.chunk_write(fp, produce_bytes(), batch);
        }

        self.adapter.ref_put(fp, prev + 1)?;
        Ok(AcquireOutcome { was_new })
    }

    /// Decrement a chunk's refcount by one, reclaiming it once it reaches zero.
    ///
    /// A fingerprint with no refcount record is treated as already at zero
    /// and the call is a no-op, preserving idempotence under repeated
    /// releases (a dangling reference, per the error handling design, is not
    /// an error).
    pub fn release(&self, fp: &Fingerprint, batch: &mut Batch) -> crate::Result<()> {
        let prev = self.adapter.ref_get(fp)?;
        if prev <= 0 {
            return Ok(());
        }

        let next = prev - 1;
        if next > 0 {
            self.adapter.ref_put(fp, next)?;
        } else {
            tracing::debug!(fingerprint = %fp, "chunk refcount 1 -> 0, reclaiming");
            self.adapter.ref_delete(fp)?;
            self.adapter.chunk_delete(fp, batch);
        }

        Ok(())
    }
}

impl<O, K> Clone for ReferenceCounter<O, K> {
    fn clone(&self) -> Self {
        ReferenceCounter {
            adapter: self.adapter.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryKvStore, MemoryObjectStore};

    fn counter() -> ReferenceCounter<MemoryObjectStore, MemoryKvStore> {
        ReferenceCounter::new(ChunkStoreAdapter::new(MemoryObjectStore::new(), MemoryKvStore::new()))
    }

    #[test]
    fn acquiring_a_new_fingerprint_materialises_it_and_sets_refcount_to_one() {
        let counter = counter();
        let fp = Fingerprint::new("fp1");
        let mut batch = Batch::new();

        let outcome = counter.acquire(&fp, || vec![1, 2, 3], &mut batch).unwrap();
        assert!(outcome.was_new);
        assert!(batch.execute());
        assert_eq!(counter.adapter.ref_get(&fp).unwrap(), 1);

        let mut buf = [0u8; 3];
        counter.adapter.chunk_read(&fp, 0, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn acquiring_an_existing_fingerprint_bumps_refcount_without_rematerialising() {
        let counter = counter();
        let fp = Fingerprint::new("fp1");
        let mut batch = Batch::new();
        counter.acquire(&fp, || vec![1, 2, 3], &mut batch).unwrap();
        batch.execute();

        let mut batch = Batch::new();
        let outcome = counter
            .acquire(&fp, || panic!("should not be called"), &mut batch)
            .unwrap();
        assert!(!outcome.was_new);
        assert!(batch.execute());
        assert_eq!(counter.adapter.ref_get(&fp).unwrap(), 2);
    }

    #[test]
    fn releasing_to_zero_deletes_refcount_and_chunk() {
        let counter = counter();
        let fp = Fingerprint::new("fp1");
        let mut batch = Batch::new();
        counter.acquire(&fp, || vec![9], &mut batch).unwrap();
        batch.execute();

        let mut batch = Batch::new();
        counter.release(&fp, &mut batch).unwrap();
        assert!(batch.execute());

        assert_eq!(counter.adapter.ref_get(&fp).unwrap(), 0);
        let mut buf = [0xFFu8; 1];
        counter.adapter.chunk_read(&fp, 0, &mut buf).unwrap();
        assert_eq!(buf, [0]);
    }

    #[test]
    fn releasing_above_zero_keeps_the_chunk() {
        let counter = counter();
        let fp = Fingerprint::new("fp1");
        let mut batch = Batch::new();
        counter.acquire(&fp, || vec![9], &mut batch).unwrap();
        counter.acquire(&fp, || panic!("unused"), &mut batch).unwrap();
        batch.execute();

        let mut batch = Batch::new();
        counter.release(&fp, &mut batch).unwrap();
        assert!(batch.execute());
        assert_eq!(counter.adapter.ref_get(&fp).unwrap(), 1);
    }

    #[test]
    fn releasing_an_unreferenced_fingerprint_is_a_no_op() {
        let counter = counter();
        let fp = Fingerprint::new("never-acquired");
        let mut batch = Batch::new();
        assert!(counter.release(&fp, &mut batch).is_ok());
        assert!(batch.execute());
        assert_eq!(counter.adapter.ref_get(&fp).unwrap(), 0);
    }
}
