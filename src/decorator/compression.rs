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

use super::buffered;
use crate::compression::{compress, decompress};
use crate::config::CompressionConfig;
use crate::error::StoreResult;
use crate::key::KeyPolicy;
use crate::storage::{read_stream, KeyIter, KeyValueStore, SharedStore, ValueReader};
use std::io::Read;
use tracing::{debug, warn};

/// Compresses values on write; decodes by the stored format tag on read.
///
/// Readers do not need to match the writer's algorithm or level.
pub struct CompressionDecorator {
    inner: SharedStore,
    config: CompressionConfig,
    policy: KeyPolicy,
}

impl CompressionDecorator {
    pub fn new(inner: SharedStore, config: CompressionConfig) -> Self {
        debug!(
            "Compression decorator on '{}': {} level {:?}",
            inner.backend_type(),
            config.algorithm,
            config.level
        );
        let policy = inner.key_policy().clone();
        Self {
            inner,
            config,
            policy,
        }
    }

    pub fn inner(&self) -> &SharedStore {
        &self.inner
    }

    pub fn config(&self) -> CompressionConfig {
        self.config
    }
}

impl KeyValueStore for CompressionDecorator {
    fn backend_type(&self) -> &str {
        self.inner.backend_type()
    }

    fn key_policy(&self) -> &KeyPolicy {
        &self.policy
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.policy.validate(key)?;
        let encoded = compress(value, self.config.algorithm, self.config.level)?;
        debug!("Compressed '{}': {} -> {} bytes", key, value.len(), encoded.len());
        self.inner.put(key, &encoded)
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.policy.validate(key)?;
        let encoded = self.inner.get(key)?;
        decompress(&encoded).map_err(|e| {
            warn!("Stored value for '{}' failed to decompress: {}", key, e);
            e
        })
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.policy.validate(key)?;
        self.inner.delete(key)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.policy.validate(key)?;
        self.inner.exists(key)
    }

    fn keys(&self, prefix: Option<&str>) -> StoreResult<KeyIter<'_>> {
        self.policy.validate_prefix(prefix.unwrap_or_default())?;
        self.inner.keys(prefix)
    }

    fn open_seek(&self, key: &str) -> StoreResult<Box<dyn ValueReader>> {
        Ok(buffered(self.get(key)?))
    }

    fn put_stream(&self, key: &str, reader: &mut dyn Read) -> StoreResult<()> {
        self.policy.validate(key)?;
        let value = read_stream(self.backend_type(), key, reader, None)?;
        self.put(key, &value)
    }

    fn copy(&self, source: &str, dest: &str) -> StoreResult<()> {
        self.policy.validate(source)?;
        self.policy.validate(dest)?;
        self.inner.copy(source, dest)
    }

    fn health_check(&self) -> StoreResult<bool> {
        self.inner.health_check()
    }
}
