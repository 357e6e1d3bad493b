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
use crate::key::{KeyPolicy, SEPARATOR};
use crate::storage::{KeyIter, KeyValueStore, SharedStore, ValueReader};
use std::io::Read;
use tracing::debug;

/// Confines a store to the `namespace/` sub-tree of the store it wraps.
///
/// Callers see keys relative to the namespace; `keys()` strips it again.
pub struct PrefixDecorator {
    inner: SharedStore,
    namespace: String,
    /// `namespace/`
    lead: String,
    policy: KeyPolicy,
}

impl PrefixDecorator {
    /// Wrap `inner` under `namespace`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Configuration`] if the namespace is empty or not a
    /// single valid segment, or if `inner` has no hierarchical keys.
    pub fn new(inner: SharedStore, namespace: impl Into<String>) -> StoreResult<Self> {
        let namespace = namespace.into();
        let policy = Self::policy_for(inner.key_policy(), inner.backend_type(), &namespace)?;
        let lead = format!("{namespace}{SEPARATOR}");

        debug!("Prefix decorator on '{}' with namespace '{}'", inner.backend_type(), namespace);

        Ok(Self {
            inner,
            namespace,
            lead,
            policy,
        })
    }

    /// Key policy of a prefix decorator over a store with `inner_policy`.
    ///
    /// Performs no I/O, so a factory can check a namespace before any
    /// backend exists.
    pub fn policy_for(inner_policy: &KeyPolicy, backend: &str, namespace: &str) -> StoreResult<KeyPolicy> {
        if namespace.is_empty() {
            return Err(StoreError::configuration("prefix: namespace cannot be empty"));
        }

        if !inner_policy.hierarchical {
            return Err(StoreError::configuration(format!(
                "prefix: inner '{backend}' store does not support hierarchical keys"
            )));
        }
        inner_policy
            .validate_segment(namespace)
            .map_err(|e| StoreError::configuration(format!("prefix: invalid namespace: {e}")))?;

        Ok(inner_policy.narrowed(namespace.len() + SEPARATOR.len_utf8()))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn inner(&self) -> &SharedStore {
        &self.inner
    }

    fn inner_key(&self, key: &str) -> StoreResult<String> {
        self.policy.validate(key)?;
        Ok(format!("{}{key}", self.lead))
    }
}

impl KeyValueStore for PrefixDecorator {
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

        let inner_prefix = format!("{}{prefix}", self.lead);
        let lead = self.lead.as_str();
        let keys = self.inner.keys(Some(&inner_prefix))?.filter_map(move |key| match key {
            Ok(key) => key.strip_prefix(lead).map(|rest| Ok(rest.to_string())),
            Err(e) => Some(Err(e)),
        });

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MemoryConfig, StoreLimits};
    use crate::decorator::UrlEncodeDecorator;
    use crate::error::ErrorKind;
    use crate::storage::{collect_keys, MemoryStore};
    use std::sync::Arc;

    fn wrapped(namespace: &str) -> (Arc<MemoryStore>, PrefixDecorator) {
        let inner = Arc::new(MemoryStore::new());
        let store = PrefixDecorator::new(inner.clone(), namespace).unwrap();
        (inner, store)
    }

    #[test]
    fn test_keys_are_namespaced() {
        let (inner, store) = wrapped("tenant");
        store.put("a/b", b"1").unwrap();

        assert_eq!(inner.get("tenant/a/b").unwrap(), b"1");
        assert_eq!(store.get("a/b").unwrap(), b"1");
        assert!(store.exists("a/b").unwrap());
    }

    #[test]
    fn test_listing_strips_namespace() {
        let (inner, store) = wrapped("ns");
        inner.put("other/x", b"").unwrap();
        store.put("img/1", b"").unwrap();
        store.put("doc", b"").unwrap();

        let keys: Vec<String> = collect_keys(&store, None).unwrap().into_iter().collect();
        assert_eq!(keys, vec!["doc", "img/1"]);

        let img: Vec<String> = collect_keys(&store, Some("img")).unwrap().into_iter().collect();
        assert_eq!(img, vec!["img/1"]);

        let prefixes: Vec<String> = store.iter_prefixes('/', None).unwrap().into_iter().collect();
        assert_eq!(prefixes, vec!["doc", "img/"]);
    }

    #[test]
    fn test_not_found_reports_caller_key() {
        let (_inner, store) = wrapped("ns");
        match store.get("missing").unwrap_err() {
            StoreError::NotFound { key } => assert_eq!(key, "missing"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_policy_is_narrowed() {
        let (_inner, store) = wrapped("abc");
        assert_eq!(store.key_policy().max_len, 250 - 4);
        let too_long = "k".repeat(247);
        assert_eq!(
            store.put(&too_long, b"").unwrap_err().kind(),
            ErrorKind::InvalidKey
        );
    }

    #[test]
    fn test_invalid_namespaces() {
        let inner: SharedStore = Arc::new(MemoryStore::new());
        for namespace in ["", "a/b", "..", "bad ns"] {
            let err = PrefixDecorator::new(inner.clone(), namespace).err().unwrap();
            assert_eq!(err.kind(), ErrorKind::Configuration, "namespace {namespace:?}");
        }
    }

    #[test]
    fn test_flat_inner_store_rejected() {
        let flat = MemoryStore::with_config(MemoryConfig {
            limits: StoreLimits {
                hierarchical: false,
                ..StoreLimits::default()
            },
        });
        let err = PrefixDecorator::new(Arc::new(flat), "ns").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_prefix_over_escaped_keys() {
        let inner: SharedStore = Arc::new(MemoryStore::new());
        let escaped: SharedStore = Arc::new(UrlEncodeDecorator::new(inner.clone()));
        let store = PrefixDecorator::new(escaped, "ns").unwrap();

        store.put("a b/c", b"v").unwrap();
        assert_eq!(store.get("a b/c").unwrap(), b"v");
        assert!(inner.exists("ns_2Fa_20b_2Fc").unwrap());
        assert_eq!(
            collect_keys(&store, None).unwrap().into_iter().collect::<Vec<_>>(),
            vec!["a b/c"]
        );
    }

    #[test]
    fn test_copy_within_namespace() {
        let (inner, store) = wrapped("ns");
        store.put("src", b"v").unwrap();
        store.copy("src", "dst").unwrap();
        assert_eq!(inner.get("ns/dst").unwrap(), b"v");
    }
}
