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

//! Construction-time configuration for a chunk store, independent of any
//! particular backend or CLI flag parser.

use crate::fingerprint::{FingerprintEngine, DEFAULT_ALGORITHM};

/// The default chunk size used by [`crate::item::ItemManager::create`] when
/// the caller doesn't override it.
pub const DEFAULT_CHUNK_SIZE: u64 = 128_000;

/// Configuration for a [`crate::item::ItemManager`]: which fingerprint
/// algorithm to use and the default chunk size for newly created items.
#[derive(Debug, Clone)]
pub struct ChunkStoreConfig {
    pub algorithm: String,
    pub default_chunk_size: u64,
}

impl ChunkStoreConfig {
    /// Build a resolved [`FingerprintEngine`] for this configuration.
    pub fn fingerprint_engine(&self) -> crate::Result<FingerprintEngine> {
        FingerprintEngine::new(&self.algorithm)
    }
}

impl Default for ChunkStoreConfig {
    fn default() -> Self {
        ChunkStoreConfig {
            algorithm: DEFAULT_ALGORITHM.to_string(),
            default_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_resolves_to_the_default_algorithm() {
        let config = ChunkStoreConfig::default();
        let engine = config.fingerprint_engine().unwrap();
        assert_eq!(engine.algorithm_name(), DEFAULT_ALGORITHM);
    }

    #[test]
    fn unknown_algorithm_name_fails_to_resolve() {
        let config = ChunkStoreConfig {
            algorithm: "not-a-real-algorithm".to_string(),
            default_chunk_size: DEFAULT_CHUNK_SIZE,
        };
        assert!(config.fingerprint_engine().is_err());
    }
}
