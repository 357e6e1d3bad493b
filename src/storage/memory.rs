// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// In-memory backend implementation

use super::backend::{ensure_value_size, read_stream, KeyIter, KeyValueStore, ValueReader};
use crate::config::MemoryConfig;
use crate::error::{StoreError, StoreResult};
use crate::key::KeyPolicy;
use bytes::Bytes;
use dashmap::DashMap;
use std::io::{Cursor, Read};
use tracing::debug;

/// In-memory backend for tests and ephemeral data
///
/// # Thread Safety
///
/// Safe for concurrent use: the map is sharded and every operation locks
/// only the shard holding its key.
///
/// # Listing
///
/// `keys` is not lazy. It copies the matching keys into a snapshot when
/// called and iterates over that, since a live iterator would hold shard
/// read locks and deadlock a `put` or `delete` issued from the loop body.
/// Listing costs memory proportional to the number of matching keys; keys
/// written after the call are not observed.
pub struct MemoryStore {
    entries: DashMap<String, Bytes>,
    policy: KeyPolicy,
    max_value_size: Option<u64>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_config(MemoryConfig::default())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MemoryConfig) -> Self {
        debug!("Initializing memory backend with limits {:?}", config.limits);
        Self {
            entries: DashMap::new(),
            policy: Self::policy_for(&config),
            max_value_size: config.limits.max_value_size,
        }
    }

    /// Key policy of a store built from `config`.
    pub fn policy_for(config: &MemoryConfig) -> KeyPolicy {
        config.limits.key_policy()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, key: &str) -> StoreResult<Bytes> {
        self.entries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::not_found(key))
    }
}

impl KeyValueStore for MemoryStore {
    fn backend_type(&self) -> &str {
        "memory"
    }

    fn key_policy(&self) -> &KeyPolicy {
        &self.policy
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.policy.validate(key)?;
        ensure_value_size(key, value.len() as u64, self.max_value_size)?;
        self.entries.insert(key.to_string(), Bytes::copy_from_slice(value));
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.policy.validate(key)?;
        Ok(self.lookup(key)?.to_vec())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.policy.validate(key)?;
        self.entries.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.policy.validate(key)?;
        Ok(self.entries.contains_key(key))
    }

    fn keys(&self, prefix: Option<&str>) -> StoreResult<KeyIter<'_>> {
        let prefix = prefix.unwrap_or_default();
        self.policy.validate_prefix(prefix)?;

        let snapshot: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();

        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }

    fn open_seek(&self, key: &str) -> StoreResult<Box<dyn ValueReader>> {
        self.policy.validate(key)?;
        Ok(Box::new(Cursor::new(self.lookup(key)?)))
    }

    fn put_stream(&self, key: &str, reader: &mut dyn Read) -> StoreResult<()> {
        self.policy.validate(key)?;
        let value = read_stream(self.backend_type(), key, reader, self.max_value_size)?;
        self.entries.insert(key.to_string(), Bytes::from(value));
        Ok(())
    }

    fn copy(&self, source: &str, dest: &str) -> StoreResult<()> {
        self.policy.validate(source)?;
        self.policy.validate(dest)?;
        let value = self.lookup(source)?;
        self.entries.insert(dest.to_string(), value);
        Ok(())
    }
}
