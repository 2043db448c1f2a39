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

//! The external storage interfaces the core consumes, and the adapter which
//! sits between them and the rest of the crate.
//!
//! Two primitives are required, both out of scope for this crate to
//! implement in full generality: an [`ObjectStore`] of namespaced byte blobs
//! addressable at arbitrary offsets, and a [`KvStore`] of namespaced opaque
//! values. [`memory`] and [`fs`] provide the two concrete backends this crate
//! ships with; any other backend only needs to implement the two traits.

use anyhow::Error as BackendError;

pub mod fs;
pub mod memory;

mod adapter;
mod batch;

pub use adapter::ChunkStoreAdapter;
pub use batch::{Batch, Promise};

/// The namespace chunk bytes are stored under.
pub const NS_CHUNKS: &str = "chunks";

/// The namespace chunk reference counts are stored under.
pub const NS_CHUNK_REFS: &str = "chunk_refs";

/// The namespace item records are stored under.
pub const NS_ITEMS: &str = "items";

/// The namespace item hash lists are stored under.
pub const NS_ITEM_HASHES: &str = "item_hashes";

/// A store of namespaced byte blobs addressable at arbitrary offsets.
///
/// Implementations must support writing at offsets past the current end of
/// the blob (the gap need not be materialised as zeros by the store itself;
/// the core never relies on that) and must make a freshly created blob
/// readable even before any bytes have been written to it.
pub trait ObjectStore: Send + Sync {
    /// Create the blob at `(namespace, key)` if it does not already exist.
    ///
    /// Creating an existing blob is not an error.
    fn create(&self, namespace: &str, key: &str) -> Result<(), BackendError>;

    /// Remove the blob at `(namespace, key)`.
    ///
    /// Removing a blob that doesn't exist is not an error.
    fn delete(&self, namespace: &str, key: &str) -> Result<(), BackendError>;

    /// Write `buf` into the blob at `(namespace, key)` starting at `offset`.
    fn write(&self, namespace: &str, key: &str, offset: u64, buf: &[u8]) -> Result<(), BackendError>;

    /// Read up to `buf.len()` bytes from the blob at `(namespace, key)`
    /// starting at `offset`, returning the number of bytes actually read.
    ///
    /// Reading past the end of the blob, or from a blob that doesn't exist,
    /// yields `0` rather than an error.
    fn read(&self, namespace: &str, key: &str, offset: u64, buf: &mut [u8]) -> Result<usize, BackendError>;
}

/// A store of namespaced, opaque, whole-value records.
pub trait KvStore: Send + Sync {
    /// Overwrite the value at `(namespace, key)`.
    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), BackendError>;

    /// Fetch the value at `(namespace, key)`, or `None` if it doesn't exist.
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// Remove the value at `(namespace, key)`.
    ///
    /// Removing a value that doesn't exist is not an error.
    fn delete(&self, namespace: &str, key: &str) -> Result<(), BackendError>;
}
