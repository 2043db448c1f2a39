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

//! A content-addressed, deduplicating, fixed-chunk-size item store.
//!
//! Items are byte-addressable, mutable containers whose contents are split
//! into fixed-size chunks. Identical chunks, whether within one item or
//! shared across many, are fingerprinted and stored only once under a
//! reference count; writes that reproduce existing content never grow the
//! underlying object store.
//!
//! The store is layered over two external collaborators the caller supplies:
//! an [`store::ObjectStore`] of namespaced byte blobs and a [`store::KvStore`]
//! of namespaced opaque records. [`store::memory`] and [`store::fs`] are the
//! two backends this crate ships with.
//!
//! ```no_run
//! use dedup_store::config::ChunkStoreConfig;
//! use dedup_store::item::ItemManager;
//! use dedup_store::store::memory::{MemoryKvStore, MemoryObjectStore};
//!
//! let config = ChunkStoreConfig::default();
//! let manager = ItemManager::new(
//!     MemoryObjectStore::new(),
//!     MemoryKvStore::new(),
//!     config.fingerprint_engine().unwrap(),
//!     config.default_chunk_size,
//! );
//!
//! let mut item = manager.create("documents", "notes.txt", None, None).unwrap();
//! manager.write(&mut item, b"hello, world", 0).unwrap();
//!
//! let mut buf = [0u8; 12];
//! manager.read(&mut item, &mut buf, 0).unwrap();
//! assert_eq!(&buf, b"hello, world");
//! ```

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod item;
pub mod layout;
pub mod refcount;
pub mod store;

pub use error::{Error, Result};
