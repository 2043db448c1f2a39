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

//! The public item API: create, fetch, delete, read, write, and the
//! chunk-size/size accessors, coordinating the fingerprint engine, the
//! chunk store adapter, the reference counter, and the layout engine.

use std::collections::HashSet;

use anyhow::anyhow;
use serde_json::Value;

use crate::fingerprint::{Fingerprint, FingerprintEngine};
use crate::item::record::{HashListRecord, ItemId, ItemRecord, ItemStatus};
use crate::layout::{Preservation, ReadPlan, WritePlan};
use crate::refcount::ReferenceCounter;
use crate::store::{Batch, ChunkStoreAdapter, KvStore, ObjectStore};
use crate::Error;

/// A named, mutable byte container inside a collection.
///
/// An `Item` is a local, possibly-stale view of the persisted record and
/// hash list; [`ItemManager`] is the only thing that mutates the backing
/// store on its behalf.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: ItemId,
    pub collection: ItemId,
    pub collection_name: String,
    pub name: String,
    pub credentials: Value,
    pub distribution: Value,
    pub status: Option<ItemStatus>,
    pub chunk_size: u64,
    pub(crate) chunk_size_fixed: bool,
    pub(crate) hashes: Vec<Fingerprint>,
}

impl Item {
    fn path(collection_name: &str, name: &str) -> String {
        format!("/{}/{}", collection_name, name)
    }

    /// The key this item's record and hash list are persisted under.
    pub fn path_key(&self) -> String {
        Self::path(&self.collection_name, &self.name)
    }

    /// The item's logical size as tracked in `status`, if ever set explicitly.
    ///
    /// Never inferred from writes; this is a deliberate no-op, matching the
    /// behavior of the system this crate's dedup write path was modeled on.
    pub fn get_status(&self) -> Option<ItemStatus> {
        self.status
    }

    /// Set the item's status fields directly. The only way `status` changes;
    /// writes never update it implicitly.
    pub fn set_status(&mut self, status: ItemStatus) {
        self.status = Some(status);
    }

    /// The number of distinct chunks this item currently references.
    pub fn physical_size(&self) -> u64 {
        let unique: HashSet<&Fingerprint> = self.hashes.iter().collect();
        unique.len() as u64 * self.chunk_size
    }

    /// The item's ordered chunk fingerprints, as of the last read, write, or fetch.
    pub fn hashes(&self) -> &[Fingerprint] {
        &self.hashes
    }
}

fn validate_name(name: &str) -> crate::Result<()> {
    if name.is_empty() || name.contains('/') {
        return Err(Error::InvalidName);
    }
    Ok(())
}

/// Coordinates the fingerprint engine, the chunk store adapter, the
/// reference counter, and the layout engine behind the public item API.
pub struct ItemManager<O, K> {
    adapter: ChunkStoreAdapter<O, K>,
    refcounter: ReferenceCounter<O, K>,
    fingerprint: FingerprintEngine,
    default_chunk_size: u64,
}

impl<O: ObjectStore + 'static, K: KvStore + 'static> ItemManager<O, K> {
    /// Build a manager over the given backends, using `fingerprint` to
    /// digest assembled chunks and `default_chunk_size` for items created
    /// without an explicit chunk size.
    pub fn new(objects: O, kv: K, fingerprint: FingerprintEngine, default_chunk_size: u64) -> Self {
        let adapter = ChunkStoreAdapter::new(objects, kv);
        let refcounter = ReferenceCounter::new(adapter.clone());
        ItemManager {
            adapter,
            refcounter,
            fingerprint,
            default_chunk_size,
        }
    }

    fn run(&self, batch: Batch) -> crate::Result<()> {
        if batch.execute() {
            Ok(())
        } else {
            Err(Error::Store(anyhow!("one or more batch operations failed; see logs")))
        }
    }

    /// Create a new item in `collection`. `chunk_size` defaults to the
    /// manager's configured default when `None`; it is fixed for the item's
    /// lifetime once the first write succeeds.
    pub fn create(
        &self,
        collection_name: &str,
        name: &str,
        chunk_size: Option<u64>,
        distribution: Option<Value>,
    ) -> crate::Result<Item> {
        validate_name(name)?;
        let chunk_size = chunk_size.unwrap_or(self.default_chunk_size);
        if chunk_size == 0 {
            return Err(Error::InvalidChunkSize);
        }

        let path = Item::path(collection_name, name);
        let mut probe = Batch::new();
        let existing = self.adapter.item_get_async(&path, &mut probe);
        probe.execute();
        if existing.take().flatten().is_some() {
            return Err(Error::AlreadyExists);
        }

        let item = Item {
            id: ItemId::generate(),
            collection: ItemId::generate(),
            collection_name: collection_name.to_string(),
            name: name.to_string(),
            credentials: Value::Null,
            distribution: distribution.unwrap_or(Value::Null),
            status: None,
            chunk_size,
            chunk_size_fixed: false,
            hashes: Vec::new(),
        };

        self.persist_record(&item)?;
        Ok(item)
    }

    fn persist_record(&self, item: &Item) -> crate::Result<()> {
        let record = ItemRecord {
            id: item.id,
            collection: item.collection,
            name: item.name.clone(),
            credentials: item.credentials.clone(),
            distribution: item.distribution.clone(),
            status: item.status,
            chunk_size: item.chunk_size,
        };
        let bytes = rmp_serde::to_vec(&record)?;
        let mut batch = Batch::new();
        self.adapter.item_put(&item.path_key(), bytes, &mut batch);
        self.run(batch)
    }

    /// Fetch an existing item by collection and name.
    pub fn get(&self, collection_name: &str, name: &str) -> crate::Result<Item> {
        let path = Item::path(collection_name, name);
        let mut batch = Batch::new();
        let promise = self.adapter.item_get_async(&path, &mut batch);
        batch.execute();

        let bytes = promise.take().flatten().ok_or(Error::NotFound)?;
        let record: ItemRecord = rmp_serde::from_slice(&bytes)?;
        let hashes = self.fetch_hashes(&path)?;

        Ok(Item {
            id: record.id,
            collection: record.collection,
            collection_name: collection_name.to_string(),
            name: record.name,
            credentials: record.credentials,
            distribution: record.distribution,
            status: record.status,
            chunk_size: record.chunk_size,
            chunk_size_fixed: !hashes.is_empty(),
            hashes,
        })
    }

    fn fetch_hashes(&self, path: &str) -> crate::Result<Vec<Fingerprint>> {
        match self.adapter.hashes_get(path)? {
            Some(bytes) => Ok(rmp_serde::from_slice::<HashListRecord>(&bytes)?.0),
            None => Ok(Vec::new()),
        }
    }

    /// Set the item's chunk size. Rejected once the item has completed a
    /// write, and rejected for a zero size.
    pub fn set_chunk_size(&self, item: &mut Item, chunk_size: u64) -> crate::Result<()> {
        if item.chunk_size_fixed {
            return Err(Error::ChunkSizeImmutable);
        }
        if chunk_size == 0 {
            return Err(Error::InvalidChunkSize);
        }
        item.chunk_size = chunk_size;
        self.persist_record(item)
    }

    /// Delete an item: release every chunk it references, then remove its
    /// record and hash list.
    pub fn delete(&self, item: &mut Item) -> crate::Result<()> {
        item.hashes = self.fetch_hashes(&item.path_key())?;

        let mut batch = Batch::new();
        for fp in &item.hashes {
            self.refcounter.release(fp, &mut batch)?;
        }
        self.adapter.item_delete(&item.path_key(), &mut batch);
        self.adapter.hashes_delete(&item.path_key(), &mut batch);
        self.run(batch)?;

        item.hashes.clear();
        Ok(())
    }

    /// Write `data` into `item` at `offset`, returning the number of bytes
    /// from `data` successfully incorporated into the hash list.
    ///
    /// This is the number of bytes the caller supplied, not a count of bytes
    /// newly materialised in the object store, since a dedup write may
    /// reference chunks that already existed.
    pub fn write(&self, item: &mut Item, data: &[u8], offset: u64) -> crate::Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }

        item.hashes = self.fetch_hashes(&item.path_key())?;
        let old_hash_count = item.hashes.len();

        let chunk_size = item.chunk_size as usize;
        let plan = match WritePlan::new(offset, data.len(), chunk_size, old_hash_count) {
            Some(plan) => plan,
            None => return Ok(0),
        };

        let mut batch = Batch::new();

        // A write that starts past the current end of the item leaves a gap;
        // the gap chunks are materialised as shared all-zero content.
        if plan.first_chunk > item.hashes.len() {
            let zero_chunk = vec![0u8; chunk_size];
            let zero_fp = self.fingerprint.digest(&zero_chunk);
            for _ in item.hashes.len()..plan.first_chunk {
                let bytes = zero_chunk.clone();
                self.refcounter.acquire(&zero_fp, move || bytes, &mut batch)?;
                item.hashes.push(zero_fp.clone());
            }
        }

        for index in plan.chunk_indices() {
            let slice = plan.read_slice(index);
            let mut buf = vec![0u8; chunk_size];

            match plan.head_preservation(index) {
                Preservation::FromExisting => {
                    let old_fp = item.hashes[index].clone();
                    self.adapter.chunk_read(&old_fp, 0, &mut buf[..slice.from])?;
                }
                Preservation::ZeroFill | Preservation::None => {}
            }

            match plan.tail_preservation(index, old_hash_count) {
                Preservation::FromExisting => {
                    let old_fp = item.hashes[index].clone();
                    self.adapter.chunk_read(&old_fp, slice.to as u64, &mut buf[slice.to..])?;
                }
                Preservation::ZeroFill | Preservation::None => {}
            }

            let source = plan.buffer_slice(index, data.len());
            buf[slice.from..slice.to].copy_from_slice(&data[source.from..source.to]);

            let fp = self.fingerprint.digest(&buf);
            self.refcounter.acquire(&fp, move || buf, &mut batch)?;

            if index < item.hashes.len() {
                if item.hashes[index] != fp {
                    self.refcounter.release(&item.hashes[index], &mut batch)?;
                    item.hashes[index] = fp;
                }
            } else {
                item.hashes.push(fp);
            }
        }

        let hash_list = HashListRecord(item.hashes.clone());
        let bytes = rmp_serde::to_vec(&hash_list)?;
        self.adapter.hashes_put(&item.path_key(), bytes, &mut batch);

        self.run(batch)?;
        item.chunk_size_fixed = true;
        Ok(data.len())
    }

    /// Read `buf.len()` bytes from `item` starting at `offset`.
    ///
    /// Reading past the end of the item, or any chunk not yet materialised,
    /// yields zeros rather than an error.
    pub fn read(&self, item: &mut Item, buf: &mut [u8], offset: u64) -> crate::Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        item.hashes = self.fetch_hashes(&item.path_key())?;

        let chunk_size = item.chunk_size as usize;
        let plan = match ReadPlan::new(offset, buf.len(), chunk_size) {
            Some(plan) => plan,
            None => return Ok(()),
        };

        for index in plan.chunk_indices() {
            let dest = plan.dest_slice(index, buf.len());
            if dest.is_empty() {
                continue;
            }

            if index >= item.hashes.len() {
                for byte in &mut buf[dest.from..dest.to] {
                    *byte = 0;
                }
                continue;
            }

            let chunk = plan.chunk_slice(index);
            let fp = item.hashes[index].clone();
            self.adapter.chunk_read(&fp, chunk.from as u64, &mut buf[dest.from..dest.to])?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryKvStore, MemoryObjectStore};

    fn manager() -> ItemManager<MemoryObjectStore, MemoryKvStore> {
        ItemManager::new(
            MemoryObjectStore::new(),
            MemoryKvStore::new(),
            FingerprintEngine::default_algorithm(),
            8,
        )
    }

    #[test]
    fn create_rejects_names_containing_a_slash() {
        let mgr = manager();
        assert!(matches!(mgr.create("col", "a/b", None, None), Err(Error::InvalidName)));
    }

    #[test]
    fn two_chunk_write_then_full_read_roundtrips() {
        let mgr = manager();
        let mut item = mgr.create("col", "f", Some(8), None).unwrap();
        mgr.write(&mut item, b"1234567887654321", 0).unwrap();
        assert_eq!(item.hashes.len(), 2);

        let mut buf = [0u8; 16];
        mgr.read(&mut item, &mut buf, 0).unwrap();
        assert_eq!(&buf, b"1234567887654321");
    }

    #[test]
    fn cross_chunk_slice_read() {
        let mgr = manager();
        let mut item = mgr.create("col", "f", Some(8), None).unwrap();
        mgr.write(&mut item, b"1234567887654321", 0).unwrap();

        let mut buf = [0u8; 2];
        mgr.read(&mut item, &mut buf, 7).unwrap();
        assert_eq!(&buf, b"88");
    }

    #[test]
    fn partial_overwrite_preserves_neighbours() {
        let mgr = manager();
        let mut item = mgr.create("col", "f", Some(8), None).unwrap();
        mgr.write(&mut item, b"1234567887654321", 0).unwrap();
        mgr.write(&mut item, b"ab", 1).unwrap();

        let mut buf = [0u8; 16];
        mgr.read(&mut item, &mut buf, 0).unwrap();
        assert_eq!(&buf, b"1ab4567887654321");
    }

    #[test]
    fn tail_of_second_chunk_partial_overwrite() {
        let mgr = manager();
        let mut item = mgr.create("col", "f", Some(8), None).unwrap();
        mgr.write(&mut item, b"1234567887654321", 0).unwrap();
        mgr.write(&mut item, b"ab", 1).unwrap();
        mgr.write(&mut item, b"ab", 13).unwrap();

        let mut buf = [0u8; 16];
        mgr.read(&mut item, &mut buf, 0).unwrap();
        assert_eq!(&buf, b"1ab4567887654ab1");
    }

    #[test]
    fn interior_deduplication_yields_consistent_hashes() {
        let mgr = manager();
        let mut item = mgr.create("col", "f", Some(8), None).unwrap();
        mgr.write(&mut item, b"1234567887654321", 0).unwrap();
        mgr.write(&mut item, b"ab", 1).unwrap();
        mgr.write(&mut item, b"ab", 13).unwrap();
        mgr.write(&mut item, b"ab", 3).unwrap();
        mgr.write(&mut item, b"ab", 10).unwrap();

        let mut buf = [0u8; 16];
        mgr.read(&mut item, &mut buf, 0).unwrap();
        assert_eq!(&buf, b"1abab67887ab4ab1");
        assert_eq!(item.hashes.len(), 2);
        assert_ne!(item.hashes[0], item.hashes[1]);
    }

    #[test]
    fn variable_chunk_sizes_cover_an_eight_byte_buffer() {
        for chunk_size in 1u64..=6 {
            let mgr = manager();
            let mut item = mgr.create("col", "f", Some(chunk_size), None).unwrap();
            mgr.write(&mut item, b"1234567\0", 0).unwrap();

            let mut buf = [0u8; 8];
            mgr.read(&mut item, &mut buf, 0).unwrap();
            assert_eq!(&buf, b"1234567\0");

            let expected = ((8 + chunk_size - 1) / chunk_size) as usize;
            assert_eq!(item.hashes.len(), expected);
        }
    }

    #[test]
    fn write_past_end_extends_with_a_shared_zero_chunk() {
        let mgr = manager();
        let mut item = mgr.create("col", "f", Some(8), None).unwrap();
        mgr.write(&mut item, b"ab", 20).unwrap();
        // chunk 0 and chunk 1 are the zero-filled gap; chunk 2 holds "ab".
        assert_eq!(item.hashes.len(), 3);
        assert_eq!(item.hashes[0], item.hashes[1]);
    }

    #[test]
    fn set_chunk_size_is_rejected_after_a_write() {
        let mgr = manager();
        let mut item = mgr.create("col", "f", Some(8), None).unwrap();
        mgr.write(&mut item, b"12345678", 0).unwrap();
        assert!(matches!(mgr.set_chunk_size(&mut item, 16), Err(Error::ChunkSizeImmutable)));
    }

    #[test]
    fn delete_releases_every_referenced_chunk() {
        let mgr = manager();
        let mut item = mgr.create("col", "f", Some(8), None).unwrap();
        mgr.write(&mut item, b"1234567887654321", 0).unwrap();
        let fps = item.hashes.clone();

        mgr.delete(&mut item).unwrap();
        for fp in &fps {
            assert_eq!(mgr.adapter.ref_get(fp).unwrap(), 0);
        }
        assert!(matches!(mgr.get("col", "f"), Err(Error::NotFound)));
    }

    #[test]
    fn deduplication_across_items_shares_one_chunk_record() {
        let mgr = manager();
        let mut a = mgr.create("col", "a", Some(8), None).unwrap();
        let mut b = mgr.create("col", "b", Some(8), None).unwrap();
        mgr.write(&mut a, b"deadbeef", 0).unwrap();
        mgr.write(&mut b, b"deadbeef", 0).unwrap();

        assert_eq!(a.hashes[0], b.hashes[0]);
        assert_eq!(mgr.adapter.ref_get(&a.hashes[0]).unwrap(), 2);
    }

    #[test]
    fn physical_size_counts_unique_chunks_only() {
        let mgr = manager();
        let mut item = mgr.create("col", "f", Some(8), None).unwrap();
        mgr.write(&mut item, b"1234567887654321", 0).unwrap();
        assert_eq!(item.physical_size(), 16);

        mgr.write(&mut item, b"1234567887654321", 0).unwrap();
        assert_eq!(item.physical_size(), 16);
    }
}
