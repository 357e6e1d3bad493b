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

// Key-value store trait implemented by native backends and decorators

use crate::error::{StoreError, StoreResult};
use crate::key::KeyPolicy;
use std::collections::BTreeSet;
use std::io::{self, Read, Seek, Write};
use std::sync::Arc;

/// Seekable read handle returned by [`KeyValueStore::open_seek`].
///
/// Handles are owned by a single caller and released when dropped.
pub trait ValueReader: Read + Seek + Send {}

impl<T: Read + Seek + Send> ValueReader for T {}

/// Lazy sequence of keys returned by [`KeyValueStore::keys`].
pub type KeyIter<'a> = Box<dyn Iterator<Item = StoreResult<String>> + Send + 'a>;

/// A store shared between decorators and callers.
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Uniform key-value store contract
///
/// Every native backend and every decorator implements this trait with the
/// same observable semantics, so callers can swap the physical backend or
/// the decoration chain without code changes.
///
/// # Contract
///
/// - Keys are validated against [`key_policy`](Self::key_policy) before any I/O.
/// - `put` is create-or-replace and is visible to the next `get` on the same store.
/// - `delete` is idempotent.
/// - `keys` is lazy, finite and restartable; ordering is unspecified.
/// - Failures are reported as [`StoreError`]; native error types never escape.
///
/// Implementations must document whether they are safe for concurrent use.
/// Decorators must not weaken the guarantee of the store they wrap.
pub trait KeyValueStore: Send + Sync {
    /// Get backend type identifier
    fn backend_type(&self) -> &str;

    /// Key constraints enforced by this store.
    fn key_policy(&self) -> &KeyPolicy;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the key does not exist.
    fn get(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// Remove `key`. Removing an absent key succeeds.
    fn delete(&self, key: &str) -> StoreResult<()>;

    /// Whether `key` exists.
    fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Iterate over all keys, or those starting with `prefix`.
    ///
    /// Backends that cannot hold a cursor open without blocking writers may
    /// iterate over a snapshot of the matching keys taken at call time, and
    /// must say so. Callers may mutate the store while iterating either way.
    fn keys(&self, prefix: Option<&str>) -> StoreResult<KeyIter<'_>>;

    /// Open a seekable handle on the value stored under `key`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the key does not exist.
    fn open_seek(&self, key: &str) -> StoreResult<Box<dyn ValueReader>>;

    /// Store the contents of `reader` under `key`.
    fn put_stream(&self, key: &str, reader: &mut dyn Read) -> StoreResult<()>;

    /// Copy the value of `source` to `dest`.
    ///
    /// The default implementation reads the whole value and writes it back.
    fn copy(&self, source: &str, dest: &str) -> StoreResult<()> {
        let value = self.get(source)?;
        self.put(dest, &value)
    }

    /// Stream the value stored under `key` into `writer`.
    ///
    /// Returns the number of bytes written.
    fn get_into(&self, key: &str, writer: &mut dyn Write) -> StoreResult<u64> {
        let mut handle = self.open_seek(key)?;
        io::copy(&mut handle, writer).map_err(|e| StoreError::from_io(self.backend_type(), key, e))
    }

    /// Distinct key prefixes up to and including the first `delimiter`
    /// following `prefix`.
    ///
    /// Keys without a further delimiter are returned whole.
    fn iter_prefixes(&self, delimiter: char, prefix: Option<&str>) -> StoreResult<BTreeSet<String>> {
        let start = prefix.unwrap_or_default();
        let mut prefixes = BTreeSet::new();

        for key in self.keys(prefix)? {
            let key = key?;
            let Some(rest) = key.strip_prefix(start) else {
                continue;
            };
            let entry = match rest.find(delimiter) {
                Some(pos) => &key[..start.len() + pos + delimiter.len_utf8()],
                None => key.as_str(),
            };
            prefixes.insert(entry.to_string());
        }

        Ok(prefixes)
    }

    /// Health check
    fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }
}

/// Collect a key listing into a sorted set.
///
/// Convenience for callers that need every key at once.
pub fn collect_keys(store: &dyn KeyValueStore, prefix: Option<&str>) -> StoreResult<BTreeSet<String>> {
    store.keys(prefix)?.collect()
}

/// Reject values larger than a backend's configured maximum.
pub(crate) fn ensure_value_size(key: &str, len: u64, max: Option<u64>) -> StoreResult<()> {
    match max {
        Some(max) if len > max => Err(StoreError::unspecified(format!(
            "value for '{key}' is {len} bytes, backend maximum is {max}"
        ))),
        _ => Ok(()),
    }
}

/// Buffer a stream into memory, honouring a backend's maximum value size.
pub(crate) fn read_stream(
    backend: &str,
    key: &str,
    reader: &mut dyn Read,
    max: Option<u64>,
) -> StoreResult<Vec<u8>> {
    let mut buffer = Vec::new();
    let result = match max {
        Some(max) => (&mut *reader)
            .take(max.saturating_add(1))
            .read_to_end(&mut buffer),
        None => reader.read_to_end(&mut buffer),
    };
    result.map_err(|e| StoreError::from_io(backend, key, e))?;
    ensure_value_size(key, buffer.len() as u64, max)?;
    Ok(buffer)
}
