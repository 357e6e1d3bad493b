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

//! Error taxonomy shared by every store, decorator and the factory.
//!
//! Native driver errors never cross the [`KeyValueStore`](crate::KeyValueStore)
//! boundary: each implementation translates them into one of the variants
//! below before returning.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Boxed source error kept by [`StoreError::Unspecified`].
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can be returned by any store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key failed validation. Raised before any I/O.
    #[error("invalid key '{key}': {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The key does not exist.
    #[error("key not found: '{key}'")]
    NotFound {
        /// The missing key, as seen by the caller.
        key: String,
    },

    /// Authenticated decryption or a format-tag check failed.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// A mutation was attempted on a read-only store.
    #[error("store is read-only: {operation} rejected")]
    ReadOnly {
        /// The rejected operation.
        operation: &'static str,
    },

    /// Unknown backend/decorator, missing or malformed parameter.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The underlying medium is unreachable or timed out.
    #[error("backend '{backend}' unavailable: {message}")]
    BackendUnavailable {
        /// Backend type identifier.
        backend: String,
        /// Description of the failure.
        message: String,
    },

    /// Any other backend failure.
    #[error("storage error: {message}")]
    Unspecified {
        /// Description of the failure.
        message: String,
        /// The original cause, if any.
        #[source]
        source: Option<BoxedCause>,
    },
}

/// Fieldless classification of a [`StoreError`], for backend-agnostic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidKey,
    NotFound,
    Integrity,
    ReadOnly,
    Configuration,
    BackendUnavailable,
    Unspecified,
}

impl StoreError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidKey { .. } => ErrorKind::InvalidKey,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::ReadOnly { .. } => ErrorKind::ReadOnly,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Self::Unspecified { .. } => ErrorKind::Unspecified,
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates an integrity error.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a backend unavailable error.
    pub fn unavailable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Creates an unspecified error without a source.
    pub fn unspecified(message: impl Into<String>) -> Self {
        Self::Unspecified {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an unspecified error wrapping its cause.
    pub fn unspecified_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Unspecified {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Translates an I/O error raised while operating on `key`.
    ///
    /// `NotFound` keeps the caller-visible key, connection and timeout
    /// errors become [`StoreError::BackendUnavailable`], everything else is
    /// wrapped as [`StoreError::Unspecified`].
    pub fn from_io(backend: &str, key: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::not_found(key),
            io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe => Self::unavailable(backend, err.to_string()),
            _ => Self::unspecified_with(format!("I/O error on '{key}'"), err),
        }
    }

    /// Returns true for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Rewrites the key carried by a [`StoreError::NotFound`] or
    /// [`StoreError::InvalidKey`].
    ///
    /// Key-transforming decorators use this so callers never observe an
    /// inner (prefixed or encoded) key in an error.
    pub fn with_key(self, key: &str) -> Self {
        match self {
            Self::NotFound { .. } => Self::not_found(key),
            Self::InvalidKey { reason, .. } => Self::invalid_key(key, reason),
            other => other,
        }
    }
}
