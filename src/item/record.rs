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

//! Persisted record shapes for items and their hash lists.

use std::fmt;

use rand::RngCore;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::fingerprint::Fingerprint;

/// An opaque 12-byte identifier, generated at creation time for items and
/// (in principle) collections.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId([u8; 12]);

impl ItemId {
    /// Generate a new random identifier.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        ItemId(bytes)
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", hex::encode(self.0))
    }
}

/// Informational item status. Never inferred from writes in this variant;
/// only ever set by an explicit caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemStatus {
    pub size: i64,
    pub modification_time: i64,
}

/// The persisted shape of an item record (namespace `items`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    #[serde(rename = "_id")]
    pub id: ItemId,
    pub collection: ItemId,
    pub name: String,
    pub credentials: serde_json::Value,
    pub distribution: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
    pub chunk_size: u64,
}

/// An item's ordered sequence of chunk fingerprints, persisted as the
/// numbered map `{len, "0": h0, "1": h1, ...}` (namespace `item_hashes`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashListRecord(pub Vec<Fingerprint>);

impl HashListRecord {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for HashListRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len() + 1))?;
        map.serialize_entry("len", &(self.0.len() as i64))?;
        for (index, fingerprint) in self.0.iter().enumerate() {
            map.serialize_entry(&index.to_string(), fingerprint)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for HashListRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HashListVisitor;

        impl<'de> Visitor<'de> for HashListVisitor {
            type Value = HashListRecord;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map with a \"len\" field and numbered fingerprint entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut len: Option<i64> = None;
                let mut entries: Vec<(usize, Fingerprint)> = Vec::new();

                while let Some(key) = access.next_key::<String>()? {
                    if key == "len" {
                        len = Some(access.next_value()?);
                    } else {
                        let index: usize = key.parse().map_err(serde::de::Error::custom)?;
                        let fingerprint: Fingerprint = access.next_value()?;
                        entries.push((index, fingerprint));
                    }
                }

                entries.sort_by_key(|(index, _)| *index);
                let hashes: Vec<Fingerprint> = entries.into_iter().map(|(_, fp)| fp).collect();

                if let Some(len) = len {
                    if len as usize != hashes.len() {
                        return Err(serde::de::Error::custom("hash list length field does not match entry count"));
                    }
                }

                Ok(HashListRecord(hashes))
            }
        }

        deserializer.deserialize_map(HashListVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_list_roundtrips_through_rmp_serde() {
        let original = HashListRecord(vec![Fingerprint::new("aaa"), Fingerprint::new("bbb")]);
        let bytes = rmp_serde::to_vec(&original).unwrap();
        let decoded: HashListRecord = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn empty_hash_list_roundtrips() {
        let original = HashListRecord::default();
        let bytes = rmp_serde::to_vec(&original).unwrap();
        let decoded: HashListRecord = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn item_record_roundtrips_through_rmp_serde() {
        let record = ItemRecord {
            id: ItemId::generate(),
            collection: ItemId::generate(),
            name: "example".to_string(),
            credentials: serde_json::Value::Null,
            distribution: serde_json::json!({"kind": "single"}),
            status: None,
            chunk_size: 1024,
        };
        let bytes = rmp_serde::to_vec(&record).unwrap();
        let decoded: ItemRecord = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded.name, "example");
        assert_eq!(decoded.chunk_size, 1024);
        assert_eq!(decoded.id, record.id);
    }
}
