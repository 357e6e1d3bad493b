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

use crate::error::{StoreError, StoreResult};
use crate::key::KeyPolicy;
use crate::storage::{KeyIter, KeyValueStore, SharedStore, ValueReader};
use std::io::Read;

/// Rejects every mutation with [`StoreError::ReadOnly`]; reads pass through.
///
/// Mutations are refused before the key is even looked at, so the inner
/// store is never touched.
pub struct ReadOnlyDecorator {
    inner: SharedStore,
    policy: KeyPolicy,
}

impl ReadOnlyDecorator {
    pub fn new(inner: SharedStore) -> Self {
        let policy = inner.key_policy().clone();
        Self { inner, policy }
    }

    pub fn inner(&self) -> &SharedStore {
        &self.inner
    }

    fn rejected(operation: &'static str) -> StoreError {
        StoreError::ReadOnly { operation }
    }
}

impl KeyValueStore for ReadOnlyDecorator {
    fn backend_type(&self) -> &str {
        self.inner.backend_type()
    }

    fn key_policy(&self) -> &KeyPolicy {
        &self.policy
    }

    fn put(&self, _key: &str, _value: &[u8]) -> StoreResult<()> {
        Err(Self::rejected("put"))
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.policy.validate(key)?;
        self.inner.get(key)
    }

    fn delete(&self, _key: &str) -> StoreResult<()> {
        Err(Self::rejected("delete"))
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
        self.policy.validate(key)?;
        self.inner.open_seek(key)
    }

    fn put_stream(&self, _key: &str, _reader: &mut dyn Read) -> StoreResult<()> {
        Err(Self::rejected("put_stream"))
    }

    fn copy(&self, _source: &str, _dest: &str) -> StoreResult<()> {
        Err(Self::rejected("copy"))
    }

    fn health_check(&self) -> StoreResult<bool> {
        self.inner.health_check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn seeded() -> (Arc<MemoryStore>, ReadOnlyDecorator) {
        let inner = Arc::new(MemoryStore::new());
        inner.put("a", b"1").unwrap();
        let store = ReadOnlyDecorator::new(inner.clone());
        (inner, store)
    }

    #[test]
    fn test_reads_pass_through() {
        let (_inner, store) = seeded();
        assert_eq!(store.get("a").unwrap(), b"1");
        assert!(store.exists("a").unwrap());
        assert_eq!(store.keys(None).unwrap().count(), 1);
        assert!(store.get("b").unwrap_err().is_not_found());
    }

    #[test]
    fn test_mutations_rejected() {
        let (inner, store) = seeded();

        assert_eq!(store.put("a", b"2").unwrap_err().kind(), ErrorKind::ReadOnly);
        assert_eq!(store.delete("a").unwrap_err().kind(), ErrorKind::ReadOnly);
        assert_eq!(
            store.put_stream("b", &mut &b"x"[..]).unwrap_err().kind(),
            ErrorKind::ReadOnly
        );
        assert_eq!(store.copy("a", "c").unwrap_err().kind(), ErrorKind::ReadOnly);

        assert_eq!(inner.get("a").unwrap(), b"1");
        assert_eq!(inner.len(), 1);
    }

    #[test]
    fn test_invalid_key_on_write_is_still_read_only() {
        let (_inner, store) = seeded();
        match store.put("../x", b"1").unwrap_err() {
            StoreError::ReadOnly { operation } => assert_eq!(operation, "put"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
