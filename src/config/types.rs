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

// Configuration types for kvstack

use crate::compression::{CompressionLevel, CompressionType};
use crate::error::{StoreError, StoreResult};
use crate::key::{KeyPolicy, DEFAULT_MAX_KEY_LEN};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Untyped parameters, as read from YAML or a URL query string.
pub type Params = BTreeMap<String, String>;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KvConfig {
    /// Declarative store description.
    #[serde(default)]
    pub store: Option<StoreSpec>,

    /// URL alternative to `store`.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Declarative description of a decorated store.
///
/// Decorators are applied in list order: the first entry wraps the native
/// backend, the last entry is the store handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoreSpec {
    /// Backend type: "memory", "fs"
    pub backend: String,

    #[serde(default, deserialize_with = "scalar_params")]
    pub params: Params,

    #[serde(default)]
    pub decorators: Vec<DecoratorSpec>,
}

impl StoreSpec {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            params: Params::new(),
            decorators: Vec::new(),
        }
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn decorator(mut self, decorator: DecoratorSpec) -> Self {
        self.decorators.push(decorator);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DecoratorSpec {
    /// Decorator name: "prefix", "encryption", "compression", "readonly", "urlencode"
    pub name: String,

    #[serde(default, deserialize_with = "scalar_params")]
    pub params: Params,
}

impl DecoratorSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Params::new(),
        }
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// Accept YAML scalars of any type and keep them as strings, so YAML and
/// URL query parameters share one representation.
fn scalar_params<'de, D>(deserializer: D) -> Result<Params, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let raw = BTreeMap::<String, serde_yaml::Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(name, value)| {
            let value = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Null => String::new(),
                _ => {
                    return Err(D::Error::custom(format!(
                        "parameter '{name}' must be a scalar value"
                    )))
                }
            };
            Ok((name, value))
        })
        .collect()
}

/// Reads typed values out of [`Params`] and rejects unknown names.
pub(crate) struct ParamReader<'a> {
    owner: &'a str,
    params: &'a Params,
    used: BTreeSet<&'a str>,
}

impl<'a> ParamReader<'a> {
    pub(crate) fn new(owner: &'a str, params: &'a Params) -> Self {
        Self {
            owner,
            params,
            used: BTreeSet::new(),
        }
    }

    pub(crate) fn optional(&mut self, name: &'a str) -> Option<&'a str> {
        self.used.insert(name);
        self.params.get(name).map(String::as_str)
    }

    pub(crate) fn required(&mut self, name: &'a str) -> StoreResult<&'a str> {
        match self.optional(name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(StoreError::configuration(format!(
                "{}: missing required parameter '{}'",
                self.owner, name
            ))),
        }
    }

    pub(crate) fn parse<T>(&mut self, name: &'a str) -> StoreResult<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let owner = self.owner;
        self.optional(name)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| {
                    StoreError::configuration(format!(
                        "{owner}: invalid value '{raw}' for '{name}': {e}"
                    ))
                })
            })
            .transpose()
    }

    pub(crate) fn flag(&mut self, name: &'a str, default: bool) -> StoreResult<bool> {
        let owner = self.owner;
        match self.optional(name) {
            None => Ok(default),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(StoreError::configuration(format!(
                    "{owner}: invalid boolean '{raw}' for '{name}'"
                ))),
            },
        }
    }

    /// Fail if any parameter was not consumed.
    pub(crate) fn finish(self) -> StoreResult<()> {
        let unknown: Vec<&str> = self
            .params
            .keys()
            .map(String::as_str)
            .filter(|name| !self.used.contains(name))
            .collect();

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(StoreError::configuration(format!(
                "{}: unknown parameter(s): {}",
                self.owner,
                unknown.join(", ")
            )))
        }
    }
}

/// Limits shared by the native backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLimits {
    pub max_value_size: Option<u64>,
    pub max_key_len: usize,
    pub hierarchical: bool,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_value_size: None,
            max_key_len: DEFAULT_MAX_KEY_LEN,
            hierarchical: true,
        }
    }
}

impl StoreLimits {
    fn read(params: &mut ParamReader<'_>) -> StoreResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_value_size: params.parse("max_value_size")?,
            max_key_len: params.parse("max_key_len")?.unwrap_or(defaults.max_key_len),
            hierarchical: params.flag("hierarchical", defaults.hierarchical)?,
        })
    }

    pub fn key_policy(&self) -> KeyPolicy {
        KeyPolicy::default()
            .with_max_len(self.max_key_len)
            .with_hierarchical(self.hierarchical)
    }
}

/// Typed configuration of a native backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Memory(MemoryConfig),
    Filesystem(FilesystemConfig),
}

impl BackendConfig {
    pub fn as_memory(&self) -> Option<&MemoryConfig> {
        match self {
            BackendConfig::Memory(memory) => Some(memory),
            _ => None,
        }
    }

    pub fn as_filesystem(&self) -> Option<&FilesystemConfig> {
        match self {
            BackendConfig::Filesystem(filesystem) => Some(filesystem),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryConfig {
    pub limits: StoreLimits,
}

impl MemoryConfig {
    pub(crate) fn from_params(params: &Params) -> StoreResult<Self> {
        let mut reader = ParamReader::new("memory", params);
        let limits = StoreLimits::read(&mut reader)?;
        reader.finish()?;
        Ok(Self { limits })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemConfig {
    pub base_path: PathBuf,
    pub create_if_missing: bool,
    pub limits: StoreLimits,
}

impl FilesystemConfig {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            create_if_missing: true,
            limits: StoreLimits::default(),
        }
    }

    pub(crate) fn from_params(params: &Params) -> StoreResult<Self> {
        let mut reader = ParamReader::new("fs", params);
        let path = reader.required("path")?;
        // URL authorities have no meaning for a local directory
        if let Some(host) = reader.optional("host") {
            if host != "localhost" {
                return Err(StoreError::configuration(format!(
                    "fs: remote host '{host}' is not supported"
                )));
            }
        }
        let create_if_missing = reader.flag("create_if_missing", true)?;
        let limits = StoreLimits::read(&mut reader)?;
        reader.finish()?;

        Ok(Self {
            base_path: PathBuf::from(path),
            create_if_missing,
            limits,
        })
    }
}

/// Typed configuration of one decorator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoratorConfig {
    Prefix { namespace: String },
    Encryption(EncryptionConfig),
    Compression(CompressionConfig),
    ReadOnly,
    UrlEncode,
}

impl DecoratorConfig {
    pub fn name(&self) -> &'static str {
        match self {
            DecoratorConfig::Prefix { .. } => "prefix",
            DecoratorConfig::Encryption(_) => "encryption",
            DecoratorConfig::Compression(_) => "compression",
            DecoratorConfig::ReadOnly => "readonly",
            DecoratorConfig::UrlEncode => "urlencode",
        }
    }

    pub(crate) fn from_spec(spec: &DecoratorSpec) -> StoreResult<Self> {
        let mut reader = ParamReader::new(&spec.name, &spec.params);
        let config = match spec.name.as_str() {
            "prefix" => DecoratorConfig::Prefix {
                namespace: reader.required("namespace")?.to_string(),
            },
            "encryption" => DecoratorConfig::Encryption(EncryptionConfig::read(&mut reader)?),
            "compression" => DecoratorConfig::Compression(CompressionConfig::read(&mut reader)?),
            "readonly" => DecoratorConfig::ReadOnly,
            "urlencode" => DecoratorConfig::UrlEncode,
            unknown => {
                return Err(StoreError::configuration(format!(
                    "Unknown decorator: '{unknown}'. Supported: prefix, encryption, compression, readonly, urlencode"
                )))
            }
        };
        reader.finish()?;
        Ok(config)
    }
}

/// Where the encryption key comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum KeySource {
    /// 32 raw key bytes, hex encoded
    Hex(String),
    /// Passphrase stretched with HKDF-SHA256
    Passphrase { passphrase: String, salt: String },
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Hex(_) => f.write_str("Hex([REDACTED])"),
            KeySource::Passphrase { salt, .. } => f
                .debug_struct("Passphrase")
                .field("passphrase", &"[REDACTED]")
                .field("salt", salt)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionConfig {
    pub key: KeySource,
}

impl EncryptionConfig {
    fn read(reader: &mut ParamReader<'_>) -> StoreResult<Self> {
        let key_hex = reader.optional("key_hex");
        let passphrase = reader.optional("passphrase");
        let salt = reader.optional("salt");

        let key = match (key_hex, passphrase) {
            (Some(hex), None) => {
                if salt.is_some() {
                    return Err(StoreError::configuration(
                        "encryption: 'salt' only applies to 'passphrase'",
                    ));
                }
                // Decoded only to check it; the key is zeroized on drop
                crate::decorator::EncryptionKey::from_hex(hex)?;
                KeySource::Hex(hex.to_string())
            }
            (None, Some(passphrase)) if !passphrase.is_empty() => KeySource::Passphrase {
                passphrase: passphrase.to_string(),
                salt: salt.unwrap_or(DEFAULT_SALT).to_string(),
            },
            (Some(_), Some(_)) => {
                return Err(StoreError::configuration(
                    "encryption: 'key_hex' and 'passphrase' are mutually exclusive",
                ))
            }
            _ => {
                return Err(StoreError::configuration(
                    "encryption: one of 'key_hex' or 'passphrase' is required",
                ))
            }
        };

        Ok(Self { key })
    }
}

const DEFAULT_SALT: &str = "kvstack";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionConfig {
    pub algorithm: CompressionType,
    pub level: CompressionLevel,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            algorithm: CompressionType::default(),
            level: CompressionLevel::default(),
        }
    }
}

impl CompressionConfig {
    fn read(reader: &mut ParamReader<'_>) -> StoreResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            algorithm: reader.parse("algorithm")?.unwrap_or(defaults.algorithm),
            level: reader.parse("level")?.unwrap_or(defaults.level),
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,  // "trace", "debug", "info", "warn", "error"

    #[serde(default = "default_log_format")]
    pub format: String,  // "text", "compact"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
