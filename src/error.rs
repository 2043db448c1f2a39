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

use thiserror::Error;

/// The error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred in a backing store.
    #[error("an I/O error occurred: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize a persisted record.
    #[error("failed to serialize a record: {0}")]
    Serialize(#[from] rmp_serde::encode::Error),

    /// Failed to deserialize a persisted record.
    #[error("failed to deserialize a record: {0}")]
    Deserialize(#[from] rmp_serde::decode::Error),

    /// A backend-specific error occurred in an `ObjectStore` or `KvStore` implementation.
    #[error("a backing store returned an error: {0}")]
    Store(#[from] anyhow::Error),

    /// An item name was empty or contained a `/`.
    #[error("item names must be non-empty and must not contain '/'")]
    InvalidName,

    /// A chunk size of zero was requested.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    /// An attempt was made to change the chunk size of an item after its first write.
    #[error("chunk size cannot be changed after the first write")]
    ChunkSizeImmutable,

    /// The requested item or record does not exist.
    #[error("no such item")]
    NotFound,

    /// An item already exists at the given path.
    #[error("an item already exists with this name")]
    AlreadyExists,

    /// The requested fingerprint algorithm is not registered.
    #[error("unknown fingerprint algorithm: {0}")]
    UnknownAlgorithm(String),
}

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
