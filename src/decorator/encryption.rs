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

//! Authenticated value encryption with AES-256-GCM.
//!
//! Stored layout:
//!
//! ```text
//! version (1 byte) || nonce (12 bytes) || ciphertext || tag (16 bytes)
//! ```
//!
//! The key is not bound to the ciphertext, so values survive key-transforming
//! decorators and server-side copies.

use super::buffered;
use crate::config::{EncryptionConfig, KeySource};
use crate::error::{StoreError, StoreResult};
use crate::key::KeyPolicy;
use crate::storage::{read_stream, KeyIter, KeyValueStore, SharedStore, ValueReader};
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use std::io::Read;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;
/// Current stored format version.
pub const FORMAT_VERSION: u8 = 1;

const HKDF_INFO: &[u8] = b"kvstack-value-key-v1";

/// AES-256 key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Generates a new random encryption key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a key from exactly 32 raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> StoreResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(StoreError::configuration(format!(
                "encryption: key must be {KEY_SIZE} bytes, got {}",
                bytes.len()
            )));
        }

        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Creates a key from 64 hex digits.
    pub fn from_hex(hex_key: &str) -> StoreResult<Self> {
        let mut decoded = hex::decode(hex_key.trim())
            .map_err(|e| StoreError::configuration(format!("encryption: invalid key_hex: {e}")))?;
        let key = Self::from_bytes(&decoded);
        decoded.zeroize();
        key
    }

    /// Derives a key from a passphrase using HKDF-SHA256.
    ///
    /// HKDF does not slow down brute force; passphrases should carry enough
    /// entropy on their own.
    pub fn derive_from_passphrase(passphrase: &[u8], salt: &[u8]) -> StoreResult<Self> {
        use hkdf::Hkdf;
        use sha2::Sha256;

        let hk = Hkdf::<Sha256>::new(Some(salt), passphrase);

        let mut bytes = [0u8; KEY_SIZE];
        hk.expand(HKDF_INFO, &mut bytes)
            .map_err(|_| StoreError::configuration("encryption: key derivation failed"))?;

        Ok(Self { bytes })
    }

    /// Resolves a configured key source.
    pub fn from_source(source: &KeySource) -> StoreResult<Self> {
        match source {
            KeySource::Hex(hex_key) => Self::from_hex(hex_key),
            KeySource::Passphrase { passphrase, salt } => {
                Self::derive_from_passphrase(passphrase.as_bytes(), salt.as_bytes())
            }
        }
    }

    fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Encrypts values on write and authenticates them on read.
pub struct EncryptionDecorator {
    inner: SharedStore,
    cipher: Aes256Gcm,
    policy: KeyPolicy,
}

impl EncryptionDecorator {
    pub fn new(inner: SharedStore, key: EncryptionKey) -> Self {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
        let policy = inner.key_policy().clone();
        debug!("Encryption decorator on '{}'", inner.backend_type());
        Self {
            inner,
            cipher,
            policy,
        }
    }

    pub fn from_config(inner: SharedStore, config: &EncryptionConfig) -> StoreResult<Self> {
        let key = EncryptionKey::from_source(&config.key)?;
        Ok(Self::new(inner, key))
    }

    pub fn inner(&self) -> &SharedStore {
        &self.inner
    }

    fn seal(&self, plaintext: &[u8]) -> StoreResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| StoreError::unspecified("encryption failed"))?;

        let mut sealed = Vec::with_capacity(1 + NONCE_SIZE + ciphertext.len());
        sealed.push(FORMAT_VERSION);
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend(ciphertext);
        Ok(sealed)
    }

    fn open(&self, key: &str, sealed: &[u8]) -> StoreResult<Vec<u8>> {
        if sealed.len() < 1 + NONCE_SIZE + TAG_SIZE {
            warn!("Encrypted value for '{}' is truncated ({} bytes)", key, sealed.len());
            return Err(StoreError::integrity(format!(
                "encrypted value for '{key}' is too short"
            )));
        }
        if sealed[0] != FORMAT_VERSION {
            warn!("Encrypted value for '{}' has unknown version {}", key, sealed[0]);
            return Err(StoreError::integrity(format!(
                "unsupported encryption format version {}",
                sealed[0]
            )));
        }

        let nonce = Nonce::from_slice(&sealed[1..1 + NONCE_SIZE]);
        self.cipher
            .decrypt(nonce, &sealed[1 + NONCE_SIZE..])
            .map_err(|_| {
                warn!("Authentication failed for '{}'", key);
                StoreError::integrity(format!("authentication failed for '{key}'"))
            })
    }
}

impl KeyValueStore for EncryptionDecorator {
    fn backend_type(&self) -> &str {
        self.inner.backend_type()
    }

    fn key_policy(&self) -> &KeyPolicy {
        &self.policy
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.policy.validate(key)?;
        let sealed = self.seal(value)?;
        self.inner.put(key, &sealed)
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.policy.validate(key)?;
        let sealed = self.inner.get(key)?;
        self.open(key, &sealed)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::MemoryStore;
    use std::io::{Seek, SeekFrom};
    use std::sync::Arc;

    fn encrypted(key: EncryptionKey) -> (Arc<MemoryStore>, EncryptionDecorator) {
        let inner = Arc::new(MemoryStore::new());
        let store = EncryptionDecorator::new(inner.clone(), key);
        (inner, store)
    }

    #[test]
    fn test_round_trip_hides_plaintext() {
        let (inner, store) = encrypted(EncryptionKey::generate());
        store.put("secret", b"attack at dawn").unwrap();

        let stored = inner.get("secret").unwrap();
        assert_eq!(stored[0], FORMAT_VERSION);
        assert_eq!(stored.len(), 1 + NONCE_SIZE + 14 + TAG_SIZE);
        assert!(!stored.windows(6).any(|w| w == b"attack"));

        assert_eq!(store.get("secret").unwrap(), b"attack at dawn");
    }

    #[test]
    fn test_nonce_differs_per_write() {
        let (inner, store) = encrypted(EncryptionKey::generate());
        store.put("a", b"same").unwrap();
        let first = inner.get("a").unwrap();
        store.put("a", b"same").unwrap();
        assert_ne!(first, inner.get("a").unwrap());
    }

    #[test]
    fn test_tampering_detected() {
        let (inner, store) = encrypted(EncryptionKey::generate());
        store.put("k", b"payload").unwrap();

        let mut stored = inner.get("k").unwrap();
        let last = stored.len() - 1;
        stored[last] ^= 0x01;
        inner.put("k", &stored).unwrap();

        assert_eq!(store.get("k").unwrap_err().kind(), ErrorKind::Integrity);
    }

    #[test]
    fn test_wrong_key_detected() {
        let (inner, writer) = encrypted(EncryptionKey::generate());
        writer.put("k", b"payload").unwrap();

        let reader = EncryptionDecorator::new(inner, EncryptionKey::generate());
        assert_eq!(reader.get("k").unwrap_err().kind(), ErrorKind::Integrity);
    }

    #[test]
    fn test_short_and_unversioned_values_rejected() {
        let (inner, store) = encrypted(EncryptionKey::generate());
        inner.put("short", b"tiny").unwrap();
        assert_eq!(store.get("short").unwrap_err().kind(), ErrorKind::Integrity);

        inner.put("v9", &[9u8; 64]).unwrap();
        assert_eq!(store.get("v9").unwrap_err().kind(), ErrorKind::Integrity);
    }

    #[test]
    fn test_passphrase_keys_are_deterministic() {
        let (inner, writer) = encrypted(
            EncryptionKey::derive_from_passphrase(b"correct horse", b"salt").unwrap(),
        );
        writer.put("k", b"v").unwrap();

        let same = EncryptionKey::derive_from_passphrase(b"correct horse", b"salt").unwrap();
        let reader = EncryptionDecorator::new(inner.clone(), same);
        assert_eq!(reader.get("k").unwrap(), b"v");

        let other_salt = EncryptionKey::derive_from_passphrase(b"correct horse", b"pepper").unwrap();
        let stranger = EncryptionDecorator::new(inner, other_salt);
        assert!(stranger.get("k").is_err());
    }

    #[test]
    fn test_hex_keys() {
        let hex_key = "00".repeat(KEY_SIZE);
        assert!(EncryptionKey::from_hex(&hex_key).is_ok());
        assert_eq!(
            EncryptionKey::from_hex("abcd").unwrap_err().kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            EncryptionKey::from_hex("zz").unwrap_err().kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_key_debug_redacted() {
        let key = EncryptionKey::from_bytes(&[0xAB; KEY_SIZE]).unwrap();
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("171"));
    }

    #[test]
    fn test_streaming_and_copy() {
        let (_inner, store) = encrypted(EncryptionKey::generate());
        store.put_stream("s", &mut &b"0123456789"[..]).unwrap();

        let mut handle = store.open_seek("s").unwrap();
        handle.seek(SeekFrom::Start(5)).unwrap();
        let mut tail = Vec::new();
        handle.read_to_end(&mut tail).unwrap();
        assert_eq!(tail, b"56789");

        store.copy("s", "t").unwrap();
        assert_eq!(store.get("t").unwrap(), b"0123456789");
    }
}
