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

// Store factory for creating decorated stores from configuration

use super::backend::SharedStore;
use super::filesystem::FilesystemStore;
use super::memory::MemoryStore;
use crate::config::{parse_store_url, BackendConfig, DecoratorConfig, FilesystemConfig, MemoryConfig, StoreSpec};
use crate::decorator::{
    CompressionDecorator, EncryptionDecorator, EncryptionKey, PrefixDecorator, ReadOnlyDecorator,
    UrlEncodeDecorator,
};
use crate::error::{StoreError, StoreResult};
use crate::key::KeyPolicy;
use std::sync::Arc;
use tracing::info;

/// Validated, typed form of a [`StoreSpec`].
///
/// Producing a plan performs no I/O, so configuration mistakes surface
/// before any medium is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePlan {
    pub backend: BackendConfig,
    /// Innermost first.
    pub decorators: Vec<DecoratorConfig>,
}

pub struct StoreFactory;

impl StoreFactory {
    /// Resolve backend and decorator names and type-check their parameters.
    pub fn plan(spec: &StoreSpec) -> StoreResult<StorePlan> {
        let backend = match spec.backend.as_str() {
            "memory" => BackendConfig::Memory(MemoryConfig::from_params(&spec.params)?),
            "fs" | "file" => BackendConfig::Filesystem(FilesystemConfig::from_params(&spec.params)?),
            unknown => {
                return Err(StoreError::configuration(format!(
                    "Unknown storage backend: '{unknown}'. Supported: memory, fs"
                )))
            }
        };

        let decorators = spec
            .decorators
            .iter()
            .map(DecoratorConfig::from_spec)
            .collect::<StoreResult<Vec<_>>>()?;

        Self::check_chain(&backend, &decorators)?;

        Ok(StorePlan {
            backend,
            decorators,
        })
    }

    /// Walk the key policies the chain will have once built and resolve
    /// key material, so namespace and key errors surface without I/O.
    fn check_chain(backend: &BackendConfig, decorators: &[DecoratorConfig]) -> StoreResult<()> {
        let (name, mut policy): (&str, KeyPolicy) = match backend {
            BackendConfig::Memory(memory) => ("memory", MemoryStore::policy_for(memory)),
            BackendConfig::Filesystem(filesystem) => ("fs", FilesystemStore::policy_for(filesystem)),
        };

        for decorator in decorators {
            match decorator {
                DecoratorConfig::Prefix { namespace } => {
                    policy = PrefixDecorator::policy_for(&policy, name, namespace)?;
                }
                DecoratorConfig::UrlEncode => policy = UrlEncodeDecorator::policy_for(&policy),
                DecoratorConfig::Encryption(encryption) => {
                    EncryptionKey::from_source(&encryption.key)?;
                }
                DecoratorConfig::Compression(_) | DecoratorConfig::ReadOnly => {}
            }
        }
        Ok(())
    }

    /// Create a store from a declarative description
    pub fn build(spec: &StoreSpec) -> StoreResult<SharedStore> {
        let plan = Self::plan(spec)?;
        Self::instantiate(&plan)
    }

    /// Create a store from a URL such as `readonly+fs:///data?wrap=compression`
    pub fn from_url(url: &str) -> StoreResult<SharedStore> {
        let spec = parse_store_url(url)?;
        Self::build(&spec)
    }

    /// Instantiate the native backend and wrap it, innermost decorator first.
    pub fn instantiate(plan: &StorePlan) -> StoreResult<SharedStore> {
        let mut store = Self::create_backend(&plan.backend)?;
        for decorator in &plan.decorators {
            store = Self::apply_decorator(store, decorator)?;
        }

        info!(
            "Created '{}' store with decorators [{}]",
            store.backend_type(),
            plan.decorators
                .iter()
                .map(DecoratorConfig::name)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(store)
    }

    fn create_backend(config: &BackendConfig) -> StoreResult<SharedStore> {
        match config {
            BackendConfig::Memory(memory) => Ok(Arc::new(MemoryStore::with_config(memory.clone()))),
            BackendConfig::Filesystem(filesystem) => {
                Ok(Arc::new(FilesystemStore::new(filesystem.clone())?))
            }
        }
    }

    /// Wrap `inner` with one decorator.
    pub fn apply_decorator(inner: SharedStore, config: &DecoratorConfig) -> StoreResult<SharedStore> {
        let store: SharedStore = match config {
            DecoratorConfig::Prefix { namespace } => {
                Arc::new(PrefixDecorator::new(inner, namespace.clone())?)
            }
            DecoratorConfig::Encryption(encryption) => {
                Arc::new(EncryptionDecorator::from_config(inner, encryption)?)
            }
            DecoratorConfig::Compression(compression) => {
                Arc::new(CompressionDecorator::new(inner, *compression))
            }
            DecoratorConfig::ReadOnly => Arc::new(ReadOnlyDecorator::new(inner)),
            DecoratorConfig::UrlEncode => Arc::new(UrlEncodeDecorator::new(inner)),
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecoratorSpec;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_create_memory_store() {
        let store = StoreFactory::build(&StoreSpec::new("memory")).unwrap();
        assert_eq!(store.backend_type(), "memory");
        store.put("k", b"v").unwrap();
        assert_eq!(store.get("k").unwrap(), b"v");
    }

    #[test]
    fn test_create_filesystem_store() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().to_string_lossy().to_string();

        for name in ["fs", "file"] {
            let store = StoreFactory::build(&StoreSpec::new(name).param("path", path.clone())).unwrap();
            assert_eq!(store.backend_type(), "fs");
        }
    }

    #[test]
    fn test_create_unknown_backend() {
        let err = StoreFactory::build(&StoreSpec::new("unknown_backend")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("Unknown storage backend"));
    }

    #[test]
    fn test_plan_performs_no_io() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("never-created");
        let spec = StoreSpec::new("fs").param("path", target.to_string_lossy());

        let plan = StoreFactory::plan(&spec).unwrap();
        assert!(plan.backend.as_filesystem().is_some());
        assert!(!target.exists());
    }

    #[test]
    fn test_plan_rejects_bad_decorator() {
        let spec = StoreSpec::new("memory").decorator(DecoratorSpec::new("prefix"));
        let err = StoreFactory::plan(&spec).unwrap_err();
        assert!(err.to_string().contains("namespace"));

        let spec = StoreSpec::new("memory")
            .decorator(DecoratorSpec::new("compression").param("level", "9"));
        assert_eq!(StoreFactory::plan(&spec).unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_plan_checks_namespace_and_key_material() {
        let bad = [
            DecoratorSpec::new("prefix").param("namespace", ".."),
            DecoratorSpec::new("prefix").param("namespace", ""),
            DecoratorSpec::new("encryption").param("key_hex", "zz"),
            DecoratorSpec::new("encryption").param("key_hex", "00ff"),
        ];
        for decorator in bad {
            let spec = StoreSpec::new("memory").decorator(decorator.clone());
            let err = StoreFactory::plan(&spec).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{decorator:?}");
        }

        // Flat backends cannot carry a prefix, unless keys are escaped first
        let flat = StoreSpec::new("memory")
            .param("hierarchical", "false")
            .decorator(DecoratorSpec::new("prefix").param("namespace", "ns"));
        assert_eq!(StoreFactory::plan(&flat).unwrap_err().kind(), ErrorKind::Configuration);

        let escaped = StoreSpec::new("memory")
            .param("hierarchical", "false")
            .decorator(DecoratorSpec::new("urlencode"))
            .decorator(DecoratorSpec::new("prefix").param("namespace", "ns"));
        assert!(StoreFactory::plan(&escaped).is_ok());
    }

    #[test]
    fn test_decorators_applied_in_order() {
        let spec = StoreSpec::new("memory")
            .decorator(DecoratorSpec::new("prefix").param("namespace", "ns"))
            .decorator(DecoratorSpec::new("readonly"));

        let store = StoreFactory::build(&spec).unwrap();
        assert_eq!(store.put("k", b"v").unwrap_err().kind(), ErrorKind::ReadOnly);
        assert_eq!(store.key_policy().max_len, 250 - 3);
    }

    #[test]
    fn test_from_url() {
        let store = StoreFactory::from_url("memory://?wrap=compression&compression.algorithm=lz4").unwrap();
        store.put("a", b"1").unwrap();
        assert_eq!(store.get("a").unwrap(), b"1");

        let err = StoreFactory::from_url("nope://").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
