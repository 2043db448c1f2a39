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

//! A registry of pluggable content-fingerprinting algorithms.
//!
//! A [`Fingerprint`] is the primary key of a stored chunk: identical byte
//! sequences must always produce byte-identical fingerprints, and the mapping
//! must be stable across process restarts. The active algorithm is selected
//! through a small capability interface (`init` / `update` / `finalize`)
//! rather than hard-coded, so the digest algorithm can be swapped without
//! touching any caller.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

mod sha256;

#[cfg(feature = "hash-algorithms")]
mod blake2;
#[cfg(feature = "hash-algorithms")]
mod sha3;

pub use sha256::Sha256Algorithm;

#[cfg(feature = "hash-algorithms")]
pub use self::blake2::Blake2Algorithm;
#[cfg(feature = "hash-algorithms")]
pub use self::sha3::Sha3Algorithm;

/// A printable digest over a chunk's content.
///
/// For the default algorithm (SHA-256) this is a 64-character lowercase hex
/// string. The type itself places no constraint on length so alternative
/// algorithms can be registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already-computed digest string.
    pub fn new(digest: impl Into<String>) -> Self {
        Fingerprint(digest.into())
    }

    /// The digest as a string slice, suitable for use as a store key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A single-use, single-threaded hashing context.
///
/// A context is obtained from [`FingerprintAlgorithm::new_context`], fed data
/// with [`update`](FingerprintContext::update) in any number of calls, and
/// consumed by [`finalize`](FingerprintContext::finalize) to produce the
/// final digest.
pub trait FingerprintContext {
    /// Feed more bytes into the running digest.
    fn update(&mut self, data: &[u8]);

    /// Consume the context and produce the final digest.
    fn finalize(self: Box<Self>) -> Fingerprint;
}

/// A pluggable content-fingerprinting algorithm.
///
/// Implementations are stateless; all per-invocation state lives in the
/// [`FingerprintContext`] returned by `new_context`.
pub trait FingerprintAlgorithm: Send + Sync {
    /// The name this algorithm is registered under.
    fn name(&self) -> &'static str;

    /// Create a fresh hashing context.
    fn new_context(&self) -> Box<dyn FingerprintContext>;

    /// Fingerprint a complete buffer in one call.
    fn digest(&self, data: &[u8]) -> Fingerprint {
        let mut context = self.new_context();
        context.update(data);
        context.finalize()
    }
}

type Registry = HashMap<&'static str, Arc<dyn FingerprintAlgorithm>>;

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry: Registry = HashMap::new();

    let sha256: Arc<dyn FingerprintAlgorithm> = Arc::new(Sha256Algorithm);
    registry.insert(sha256.name(), sha256);

    #[cfg(feature = "hash-algorithms")]
    {
        let blake2: Arc<dyn FingerprintAlgorithm> = Arc::new(Blake2Algorithm);
        registry.insert(blake2.name(), blake2);

        let sha3: Arc<dyn FingerprintAlgorithm> = Arc::new(Sha3Algorithm);
        registry.insert(sha3.name(), sha3);
    }

    registry
});

/// The name of the algorithm used when none is explicitly configured.
pub const DEFAULT_ALGORITHM: &str = "sha256";

/// Look up a registered algorithm by name.
pub fn algorithm(name: &str) -> crate::Result<Arc<dyn FingerprintAlgorithm>> {
    REGISTRY
        .get(name)
        .cloned()
        .ok_or_else(|| crate::Error::UnknownAlgorithm(name.to_string()))
}

/// A handle to the configured algorithm, used by [`crate::store::ChunkStoreAdapter`]
/// and [`crate::item::ItemManager`] to fingerprint assembled chunks.
#[derive(Clone)]
pub struct FingerprintEngine {
    algorithm: Arc<dyn FingerprintAlgorithm>,
}

impl FingerprintEngine {
    /// Create an engine using the algorithm registered under `name`.
    pub fn new(name: &str) -> crate::Result<Self> {
        Ok(FingerprintEngine {
            algorithm: algorithm(name)?,
        })
    }

    /// Create an engine using [`DEFAULT_ALGORITHM`].
    pub fn default_algorithm() -> Self {
        FingerprintEngine::new(DEFAULT_ALGORITHM).expect("default algorithm is always registered")
    }

    /// The name of the algorithm this engine uses.
    pub fn algorithm_name(&self) -> &'static str {
        self.algorithm.name()
    }

    /// Fingerprint a complete chunk buffer.
    pub fn digest(&self, data: &[u8]) -> Fingerprint {
        self.algorithm.digest(data)
    }
}

impl fmt::Debug for FingerprintEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FingerprintEngine")
            .field("algorithm", &self.algorithm.name())
            .finish()
    }
}
