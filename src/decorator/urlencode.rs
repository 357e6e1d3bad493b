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

// Key escaping decorator
//
// Every byte outside [A-Za-z0-9-] is written as `_XX` (two upper-case hex
// digits), so arbitrary caller keys become flat keys that any backend
// accepts. Escaping is byte-wise, so a prefix of a key escapes to a prefix
// of the escaped key and listings can be filtered by the inner store.

use crate::error::{StoreError, StoreResult};
use crate::key::{KeyCharset, KeyPolicy};
use crate::storage::{KeyIter, KeyValueStore, SharedStore, ValueReader};
use std::io::Read;

const ESCAPE: u8 = b'_';

/// Accepts any non-empty key and stores it escaped in the inner store.
pub struct UrlEncodeDecorator {
    inner: SharedStore,
    policy: KeyPolicy,
}

impl UrlEncodeDecorator {
    pub fn new(inner: SharedStore) -> Self {
        let policy = Self::policy_for(inner.key_policy());
        Self { inner, policy }
    }

    /// Key policy of an escaping decorator over a store with `inner_policy`.
    ///
    /// `/` is escaped like any other byte, so keys stay hierarchical for the
    /// decorators above even when the inner store is flat.
    pub fn policy_for(inner_policy: &KeyPolicy) -> KeyPolicy {
        // Escaped keys are never shorter than the caller's
        KeyPolicy::new()
            .with_charset(KeyCharset::Any)
            .with_max_len(inner_policy.max_len)
    }

    pub fn inner(&self) -> &SharedStore {
        &self.inner
    }

    fn inner_key(&self, key: &str) -> StoreResult<String> {
        self.policy.validate(key)?;
        let encoded = encode_key(key);
        self.inner
            .key_policy()
            .validate(&encoded)
            .map_err(|e| e.with_key(key))?;
        Ok(encoded)
    }
}

/// Escape a key. The result only contains `[A-Za-z0-9_-]`.
pub fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push(ESCAPE as char);
            out.push_str(&hex::encode_upper([byte]));
        }
    }
    out
}

/// Reverse [`encode_key`].
///
/// # Errors
///
/// [`StoreError::Unspecified`] for keys that were not produced by
/// [`encode_key`].
pub fn decode_key(encoded: &str) -> StoreResult<String> {
    let malformed = || StoreError::unspecified(format!("stored key '{encoded}' is not an escaped key"));

    let raw = encoded.as_bytes();
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            ESCAPE => {
                let digits = raw.get(i + 1..i + 3).ok_or_else(malformed)?;
                let mut byte = [0u8; 1];
                hex::decode_to_slice(digits, &mut byte).map_err(|_| malformed())?;
                bytes.push(byte[0]);
                i += 3;
            }
            b if b.is_ascii_alphanumeric() || b == b'-' => {
                bytes.push(b);
                i += 1;
            }
            _ => return Err(malformed()),
        }
    }

    String::from_utf8(bytes).map_err(|_| malformed())
}

impl KeyValueStore for UrlEncodeDecorator {
    fn backend_type(&self) -> &str {
        self.inner.backend_type()
    }

    fn key_policy(&self) -> &KeyPolicy {
        &self.policy
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let inner_key = self.inner_key(key)?;
        self.inner.put(&inner_key, value).map_err(|e| e.with_key(key))
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let inner_key = self.inner_key(key)?;
        self.inner.get(&inner_key).map_err(|e| e.with_key(key))
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let inner_key = self.inner_key(key)?;
        self.inner.delete(&inner_key).map_err(|e| e.with_key(key))
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        let inner_key = self.inner_key(key)?;
        self.inner.exists(&inner_key).map_err(|e| e.with_key(key))
    }

    fn keys(&self, prefix: Option<&str>) -> StoreResult<KeyIter<'_>> {
        let prefix = prefix.unwrap_or_default();
        self.policy.validate_prefix(prefix)?;

        let inner_prefix = encode_key(prefix);
        let keys = self
            .inner
            .keys(Some(&inner_prefix))?
            .map(|key| key.and_then(|key| decode_key(&key)));
        Ok(Box::new(keys))
    }

    fn open_seek(&self, key: &str) -> StoreResult<Box<dyn ValueReader>> {
        let inner_key = self.inner_key(key)?;
        self.inner.open_seek(&inner_key).map_err(|e| e.with_key(key))
    }

    fn put_stream(&self, key: &str, reader: &mut dyn Read) -> StoreResult<()> {
        let inner_key = self.inner_key(key)?;
        self.inner
            .put_stream(&inner_key, reader)
            .map_err(|e| e.with_key(key))
    }

    fn copy(&self, source: &str, dest: &str) -> StoreResult<()> {
        let inner_source = self.inner_key(source)?;
        let inner_dest = self.inner_key(dest)?;
        self.inner
            .copy(&inner_source, &inner_dest)
            .map_err(|e| e.with_key(source))
    }

    fn health_check(&self) -> StoreResult<bool> {
        self.inner.health_check()
    }
}
