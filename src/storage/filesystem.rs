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

// Filesystem backend implementation

use super::backend::{ensure_value_size, KeyIter, KeyValueStore, ValueReader};
use crate::config::FilesystemConfig;
use crate::error::{StoreError, StoreResult};
use crate::key::{KeyPolicy, SEPARATOR};
use std::fs::{self, File, ReadDir};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Name prefix of in-flight temporary files. Reserved in the key policy.
pub const TEMP_PREFIX: &str = ".kvstack-tmp-";

const BACKEND: &str = "fs";

/// Filesystem backend storing one file per key under a base directory
///
/// Keys containing `/` map to sub-directories. Values are written to a
/// temporary file first and renamed into place, so readers see either the
/// old or the new value, never a partial one.
///
/// # Nested keys
///
/// A key cannot be both a file and a directory. While `a` exists, writing
/// `a/b` fails with [`StoreError::InvalidKey`], and so does writing `a`
/// while any key below `a/` exists. The memory backend has no such limit.
///
/// # Thread Safety
///
/// Safe for concurrent use. Concurrent writers to the same key race and the
/// last rename wins.
pub struct FilesystemStore {
    base_path: PathBuf,
    policy: KeyPolicy,
    max_value_size: Option<u64>,
}

impl FilesystemStore {
    pub fn new(config: FilesystemConfig) -> StoreResult<Self> {
        let base_path = config.base_path.clone();

        info!(
            "Initializing filesystem backend at: {}",
            base_path.display()
        );

        match fs::metadata(&base_path) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                return Err(StoreError::unavailable(
                    BACKEND,
                    format!("base path is not a directory: {}", base_path.display()),
                ))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && config.create_if_missing => {
                info!("Creating base directory: {}", base_path.display());
                fs::create_dir_all(&base_path).map_err(|e| {
                    StoreError::unavailable(
                        BACKEND,
                        format!("cannot create {}: {e}", base_path.display()),
                    )
                })?;
            }
            Err(e) => {
                return Err(StoreError::unavailable(
                    BACKEND,
                    format!("cannot access {}: {e}", base_path.display()),
                ))
            }
        }

        Ok(Self {
            base_path,
            policy: Self::policy_for(&config),
            max_value_size: config.limits.max_value_size,
        })
    }

    /// Key policy of a store built from `config`. Performs no I/O.
    pub fn policy_for(config: &FilesystemConfig) -> KeyPolicy {
        config.limits.key_policy().with_reserved_prefix(TEMP_PREFIX)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the file path for a given key
    fn path_for(&self, key: &str) -> PathBuf {
        key.split(SEPARATOR)
            .fold(self.base_path.clone(), |path, segment| path.join(segment))
    }

    fn io_error(key: &str, err: io::Error) -> StoreError {
        StoreError::from_io(BACKEND, key, err)
    }

    /// Fail with `NotFound` unless `path` is a regular file.
    fn ensure_file(key: &str, path: &Path) -> StoreResult<()> {
        match fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => Ok(()),
            Ok(_) => Err(StoreError::not_found(key)),
            Err(e) => Err(Self::missing_or(key, path, e)),
        }
    }

    /// A component of the path being a regular file also means the key is absent.
    fn missing_or(key: &str, path: &Path, err: io::Error) -> StoreError {
        if err.kind() == io::ErrorKind::NotFound || !path.exists() {
            StoreError::not_found(key)
        } else {
            Self::io_error(key, err)
        }
    }

    /// Reject keys whose file would collide with a directory of other keys.
    fn check_nesting(&self, key: &str) -> StoreResult<()> {
        // Reasons never name the colliding path; decorators rewrite only the key
        let mut ancestor = self.base_path.clone();
        let mut segments = key.split(SEPARATOR).peekable();
        while let Some(segment) = segments.next() {
            ancestor.push(segment);
            if segments.peek().is_some() && ancestor.is_file() {
                return Err(StoreError::invalid_key(
                    key,
                    "a parent of this key is itself a key",
                ));
            }
        }

        if ancestor.is_dir() {
            return Err(StoreError::invalid_key(key, "other keys are nested below this key"));
        }
        Ok(())
    }

    /// Write a value through a temporary file and rename it over `key`.
    ///
    /// `fill` returns the number of bytes it wrote. The temporary file is
    /// removed on every error path when the `NamedTempFile` is dropped.
    fn write_atomic<F>(&self, key: &str, fill: F) -> StoreResult<u64>
    where
        F: FnOnce(&mut File) -> io::Result<u64>,
    {
        self.check_nesting(key)?;

        let target = self.path_for(key);
        if let Some(parent) = target.parent() {
            if !parent.exists() {
                debug!("Creating key directory: {}", parent.display());
                fs::create_dir_all(parent).map_err(|e| Self::io_error(key, e))?;
            }
        }

        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.base_path)
            .map_err(|e| Self::io_error(key, e))?;

        let written = fill(temp.as_file_mut()).map_err(|e| Self::io_error(key, e))?;
        ensure_value_size(key, written, self.max_value_size)?;

        temp.as_file_mut()
            .flush()
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| Self::io_error(key, e))?;

        persist(temp, &target).map_err(|e| Self::io_error(key, e))?;

        debug!("Wrote {} bytes to {}", written, target.display());
        Ok(written)
    }

    /// Remove empty directories between a deleted file and the base path.
    fn prune_empty_parents(&self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.base_path || !dir.starts_with(&self.base_path) {
                break;
            }
            if fs::remove_dir(dir).is_err() {
                // Not empty, or already gone
                break;
            }
            current = dir.parent();
        }
    }
}

fn persist(temp: NamedTempFile, target: &Path) -> io::Result<()> {
    temp.persist(target).map(|_| ()).map_err(|e| e.error)
}

impl KeyValueStore for FilesystemStore {
    fn backend_type(&self) -> &str {
        BACKEND
    }

    fn key_policy(&self) -> &KeyPolicy {
        &self.policy
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.policy.validate(key)?;
        ensure_value_size(key, value.len() as u64, self.max_value_size)?;

        self.write_atomic(key, |file| {
            file.write_all(value)?;
            Ok(value.len() as u64)
        })?;
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.policy.validate(key)?;
        let path = self.path_for(key);
        Self::ensure_file(key, &path)?;
        fs::read(&path).map_err(|e| Self::io_error(key, e))
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.policy.validate(key)?;
        let path = self.path_for(key);

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                self.prune_empty_parents(&path);
                Ok(())
            }
            Err(e) if path.is_dir() => {
                debug!("Delete of directory path {} ignored: {}", path.display(), e);
                Ok(())
            }
            Err(e) => match Self::missing_or(key, &path, e) {
                StoreError::NotFound { .. } => Ok(()),
                other => Err(other),
            },
        }
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.policy.validate(key)?;
        let path = self.path_for(key);
        match fs::metadata(&path) {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) => match Self::missing_or(key, &path, e) {
                StoreError::NotFound { .. } => Ok(false),
                other => Err(other),
            },
        }
    }

    fn keys(&self, prefix: Option<&str>) -> StoreResult<KeyIter<'_>> {
        let prefix = prefix.unwrap_or_default().to_string();
        self.policy.validate_prefix(&prefix)?;

        // Only the directory named by the prefix's complete segments needs walking
        let start_rel = match prefix.rfind(SEPARATOR) {
            Some(pos) => prefix[..pos].to_string(),
            None => String::new(),
        };
        let start_dir = if start_rel.is_empty() {
            self.base_path.clone()
        } else {
            self.path_for(&start_rel)
        };

        Ok(Box::new(KeyWalker::new(start_dir, start_rel, prefix)))
    }

    fn open_seek(&self, key: &str) -> StoreResult<Box<dyn ValueReader>> {
        self.policy.validate(key)?;
        let path = self.path_for(key);
        Self::ensure_file(key, &path)?;
        let file = File::open(&path).map_err(|e| Self::io_error(key, e))?;
        Ok(Box::new(file))
    }

    fn put_stream(&self, key: &str, reader: &mut dyn Read) -> StoreResult<()> {
        self.policy.validate(key)?;
        let limit = self.max_value_size.map(|max| max.saturating_add(1));

        self.write_atomic(key, |file| match limit {
            Some(limit) => io::copy(&mut (&mut *reader).take(limit), file),
            None => io::copy(reader, file),
        })?;
        Ok(())
    }

    fn copy(&self, source: &str, dest: &str) -> StoreResult<()> {
        self.policy.validate(source)?;
        self.policy.validate(dest)?;

        let source_path = self.path_for(source);
        Self::ensure_file(source, &source_path)?;
        let mut input = File::open(&source_path).map_err(|e| Self::io_error(source, e))?;

        self.write_atomic(dest, |file| io::copy(&mut input, file))?;
        Ok(())
    }

    fn health_check(&self) -> StoreResult<bool> {
        // Check if base directory is accessible and writable
        match fs::metadata(&self.base_path) {
            Ok(metadata) if metadata.is_dir() => {
                match tempfile::Builder::new()
                    .prefix(TEMP_PREFIX)
                    .tempfile_in(&self.base_path)
                {
                    Ok(mut probe) => {
                        if let Err(e) = probe.write_all(b"test") {
                            warn!("Health check failed - cannot write: {}", e);
                            return Ok(false);
                        }
                        Ok(true)
                    }
                    Err(e) => {
                        warn!("Health check failed - cannot create file: {}", e);
                        Ok(false)
                    }
                }
            }
            Ok(_) => {
                warn!(
                    "Health check failed - base path is not a directory: {}",
                    self.base_path.display()
                );
                Ok(false)
            }
            Err(e) => {
                warn!(
                    "Health check failed - cannot access base path {}: {}",
                    self.base_path.display(),
                    e
                );
                Ok(false)
            }
        }
    }
}

/// Lazy depth-first walk over the files below one directory
struct KeyWalker {
    /// Directories still to visit, with their key prefix relative to the base
    pending: Vec<(PathBuf, String)>,
    current: Option<(ReadDir, String)>,
    prefix: String,
}

impl KeyWalker {
    fn new(start_dir: PathBuf, start_rel: String, prefix: String) -> Self {
        Self {
            pending: vec![(start_dir, start_rel)],
            current: None,
            prefix,
        }
    }

    fn join(rel: &str, name: &str) -> String {
        if rel.is_empty() {
            name.to_string()
        } else {
            format!("{rel}{SEPARATOR}{name}")
        }
    }
}

impl Iterator for KeyWalker {
    type Item = StoreResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                let (dir, rel) = self.pending.pop()?;
                match fs::read_dir(&dir) {
                    Ok(entries) => self.current = Some((entries, rel)),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                    Err(e) => return Some(Err(StoreError::from_io(BACKEND, &rel, e))),
                }
            }

            let (entries, rel) = self.current.as_mut()?;
            let entry = match entries.next() {
                Some(Ok(entry)) => entry,
                Some(Err(e)) => return Some(Err(StoreError::from_io(BACKEND, rel, e))),
                None => {
                    self.current = None;
                    continue;
                }
            };

            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                debug!("Skipping non UTF-8 entry {}", entry.path().display());
                continue;
            };
            // Temporary files only ever live directly in the base directory
            if rel.is_empty() && name.starts_with(TEMP_PREFIX) {
                continue;
            }

            let key = Self::join(rel, &name);
            match entry.file_type() {
                Ok(file_type) if file_type.is_dir() => {
                    let dir_prefix = format!("{key}{SEPARATOR}");
                    // Skip subtrees that cannot contain a match
                    if dir_prefix.starts_with(&self.prefix) || self.prefix.starts_with(&dir_prefix) {
                        self.pending.push((entry.path(), key));
                    }
                }
                Ok(file_type) if file_type.is_file() => {
                    if key.starts_with(&self.prefix) {
                        return Some(Ok(key));
                    }
                }
                Ok(_) => {}
                Err(e) => return Some(Err(StoreError::from_io(BACKEND, &key, e))),
            }
        }
    }
}
