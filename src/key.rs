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

// Key validation shared by every store implementation

use crate::error::{StoreError, StoreResult};

/// Default maximum key length in bytes.
pub const DEFAULT_MAX_KEY_LEN: usize = 250;

/// Segment separator for hierarchical keys.
pub const SEPARATOR: char = '/';

/// Which characters a key may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCharset {
    /// `[A-Za-z0-9._-]`, plus `/` for hierarchical stores, plus any extra characters
    Common,
    /// Any character. Used by stores that escape keys before storing them.
    Any,
}

/// Key constraints of one store.
///
/// Native backends pick their own policy; decorators derive theirs from the
/// store they wrap. The same policy accepts or rejects the same input
/// everywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPolicy {
    pub max_len: usize,
    pub hierarchical: bool,
    pub charset: KeyCharset,
    pub extra_chars: String,
    pub reserved_prefixes: Vec<String>,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_KEY_LEN,
            hierarchical: true,
            charset: KeyCharset::Common,
            extra_chars: String::new(),
            reserved_prefixes: Vec::new(),
        }
    }
}

impl KeyPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    #[must_use]
    pub fn with_hierarchical(mut self, hierarchical: bool) -> Self {
        self.hierarchical = hierarchical;
        self
    }

    #[must_use]
    pub fn with_charset(mut self, charset: KeyCharset) -> Self {
        self.charset = charset;
        self
    }

    #[must_use]
    pub fn with_extra_chars(mut self, extra: impl Into<String>) -> Self {
        self.extra_chars = extra.into();
        self
    }

    #[must_use]
    pub fn with_reserved_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.reserved_prefixes.push(prefix.into());
        self
    }

    /// Returns a copy whose maximum length leaves room for `n` extra bytes.
    #[must_use]
    pub fn narrowed(&self, n: usize) -> Self {
        let mut policy = self.clone();
        policy.max_len = policy.max_len.saturating_sub(n);
        policy
    }

    fn allows_char(&self, c: char) -> bool {
        match self.charset {
            KeyCharset::Any => true,
            KeyCharset::Common => {
                c.is_ascii_alphanumeric()
                    || matches!(c, '.' | '_' | '-')
                    || (self.hierarchical && c == SEPARATOR)
                    || self.extra_chars.contains(c)
            }
        }
    }

    fn check_chars(&self, key: &str) -> StoreResult<()> {
        if key.len() > self.max_len {
            return Err(StoreError::invalid_key(
                key,
                format!("length {} exceeds maximum of {}", key.len(), self.max_len),
            ));
        }

        if let Some(c) = key.chars().find(|c| !self.allows_char(*c)) {
            return Err(StoreError::invalid_key(
                key,
                format!("character {c:?} is not allowed"),
            ));
        }

        if self.charset == KeyCharset::Common && key.starts_with(SEPARATOR) {
            return Err(StoreError::invalid_key(key, "leading '/' is not allowed"));
        }

        Ok(())
    }

    /// Validates a full key.
    pub fn validate(&self, key: &str) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::invalid_key(key, "key is empty"));
        }

        self.check_chars(key)?;

        if self.charset == KeyCharset::Common {
            for segment in key.split(SEPARATOR) {
                match segment {
                    "" => return Err(StoreError::invalid_key(key, "empty path segment")),
                    "." | ".." => {
                        return Err(StoreError::invalid_key(
                            key,
                            format!("path segment '{segment}' is not allowed"),
                        ))
                    }
                    _ => {}
                }
            }
        }

        if let Some(reserved) = self
            .reserved_prefixes
            .iter()
            .find(|p| key.starts_with(p.as_str()))
        {
            return Err(StoreError::invalid_key(
                key,
                format!("prefix '{reserved}' is reserved"),
            ));
        }

        Ok(())
    }

    /// Validates a listing prefix. Empty prefixes and a trailing `/` are fine.
    pub fn validate_prefix(&self, prefix: &str) -> StoreResult<()> {
        if prefix.is_empty() {
            return Ok(());
        }
        self.check_chars(prefix)
    }

    /// Validates a single path segment, e.g. a namespace.
    pub fn validate_segment(&self, segment: &str) -> StoreResult<()> {
        if segment.contains(SEPARATOR) {
            return Err(StoreError::invalid_key(
                segment,
                "a single segment cannot contain '/'",
            ));
        }
        self.clone().with_hierarchical(false).validate(segment)
    }
}

/// Validates `key` against the default policy.
pub fn validate_key(key: &str) -> StoreResult<()> {
    KeyPolicy::default().validate(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn rejected(policy: &KeyPolicy, key: &str) -> bool {
        matches!(policy.validate(key), Err(e) if e.kind() == ErrorKind::InvalidKey)
    }

    #[test]
    fn test_accepts_common_keys() {
        for key in ["a", "A-b_c.d", "0", "dir/file.txt", "a/b/c", "..x", "x.."] {
            assert!(validate_key(key).is_ok(), "{key} should be valid");
        }
    }

    #[test]
    fn test_rejects_bad_keys() {
        let policy = KeyPolicy::default();
        for key in ["", "/a", "a//b", "a/", "./a", "a/../b", "..", ".", "a b", "ä", "a:b"] {
            assert!(rejected(&policy, key), "{key:?} should be rejected");
        }
    }

    #[test]
    fn test_length_limit() {
        let policy = KeyPolicy::default().with_max_len(4);
        assert!(policy.validate("abcd").is_ok());
        assert!(rejected(&policy, "abcde"));
    }

    #[test]
    fn test_flat_policy_rejects_separator() {
        let policy = KeyPolicy::default().with_hierarchical(false);
        assert!(rejected(&policy, "a/b"));
        assert!(policy.validate("a.b").is_ok());
    }

    #[test]
    fn test_extra_chars() {
        let policy = KeyPolicy::default().with_extra_chars("@:");
        assert!(policy.validate("user@host:1").is_ok());
        assert!(rejected(&policy, "user#1"));
    }

    #[test]
    fn test_reserved_prefix() {
        let policy = KeyPolicy::default().with_reserved_prefix(".tmp-");
        assert!(rejected(&policy, ".tmp-123"));
        assert!(policy.validate("tmp-123").is_ok());
    }

    #[test]
    fn test_any_charset_still_rejects_empty_and_long() {
        let policy = KeyPolicy::default()
            .with_charset(KeyCharset::Any)
            .with_max_len(8);
        assert!(policy.validate("a b/../ä").is_ok());
        assert!(rejected(&policy, ""));
        assert!(rejected(&policy, "123456789"));
    }

    #[test]
    fn test_prefix_validation() {
        let policy = KeyPolicy::default();
        assert!(policy.validate_prefix("").is_ok());
        assert!(policy.validate_prefix("dir/").is_ok());
        assert!(policy.validate_prefix("/dir").is_err());
        assert!(policy.validate_prefix("a b").is_err());
    }

    #[test]
    fn test_segment_validation() {
        let policy = KeyPolicy::default();
        assert!(policy.validate_segment("tenant-a").is_ok());
        assert!(policy.validate_segment("a/b").is_err());
        assert!(policy.validate_segment("..").is_err());
        assert!(policy.validate_segment("").is_err());
    }

    #[test]
    fn test_narrowed() {
        let policy = KeyPolicy::default().with_max_len(10).narrowed(3);
        assert_eq!(policy.max_len, 7);
        assert_eq!(KeyPolicy::default().with_max_len(2).narrowed(5).max_len, 0);
    }
}
