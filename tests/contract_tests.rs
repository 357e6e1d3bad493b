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

// Behavioural contract shared by every backend and decorator stack
//
// Each check runs against a fresh store for every entry of the matrix, so a
// stack that diverges from the plain backends fails here.

use kvstack::{collect_keys, DecoratorSpec, ErrorKind, SharedStore, StoreFactory, StoreSpec};
use std::collections::BTreeSet;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tempfile::TempDir;

const HEX_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

fn prefix(namespace: &str) -> DecoratorSpec {
    DecoratorSpec::new("prefix").param("namespace", namespace)
}

fn compression(algorithm: &str) -> DecoratorSpec {
    DecoratorSpec::new("compression").param("algorithm", algorithm)
}

fn encryption() -> DecoratorSpec {
    DecoratorSpec::new("encryption").param("key_hex", HEX_KEY)
}

fn fs(dir: &Path, name: &str) -> StoreSpec {
    StoreSpec::new("fs").param("path", dir.join(name).to_string_lossy())
}

/// Every store configuration the contract is checked against
fn matrix(dir: &Path) -> Vec<(&'static str, StoreSpec)> {
    vec![
        ("memory", StoreSpec::new("memory")),
        ("fs", fs(dir, "fs")),
        ("memory+prefix", StoreSpec::new("memory").decorator(prefix("tenant"))),
        (
            "fs+prefix+compression",
            fs(dir, "fs-pc").decorator(prefix("ns")).decorator(compression("zstd")),
        ),
        ("memory+encryption", StoreSpec::new("memory").decorator(encryption())),
        (
            "fs+compression+encryption+prefix",
            fs(dir, "fs-cep")
                .decorator(compression("lz4"))
                .decorator(encryption())
                .decorator(prefix("ns")),
        ),
        (
            "memory+encryption+gzip",
            StoreSpec::new("memory").decorator(encryption()).decorator(compression("gzip")),
        ),
        ("memory+urlencode", StoreSpec::new("memory").decorator(DecoratorSpec::new("urlencode"))),
        (
            "memory+urlencode+prefix",
            StoreSpec::new("memory")
                .decorator(DecoratorSpec::new("urlencode"))
                .decorator(prefix("ns")),
        ),
        (
            "fs+prefix+urlencode",
            fs(dir, "fs-pu")
                .decorator(prefix("enc"))
                .decorator(DecoratorSpec::new("urlencode")),
        ),
    ]
}

fn for_each_store(check: impl Fn(&str, SharedStore)) {
    let temp_dir = TempDir::new().unwrap();
    for (name, spec) in matrix(temp_dir.path()) {
        let store = StoreFactory::build(&spec)
            .unwrap_or_else(|e| panic!("{name}: failed to build store: {e}"));
        check(name, store);
    }
}

#[test]
fn test_put_then_get() {
    for_each_store(|name, store| {
        store.put("alpha", b"first").unwrap();
        assert_eq!(store.get("alpha").unwrap(), b"first", "{name}");

        store.put("alpha", b"second").unwrap();
        assert_eq!(store.get("alpha").unwrap(), b"second", "{name}");
    });
}

#[test]
fn test_binary_and_empty_values() {
    let binary: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    for_each_store(|name, store| {
        store.put("bin", &binary).unwrap();
        assert_eq!(store.get("bin").unwrap(), binary, "{name}");

        store.put("empty", b"").unwrap();
        assert!(store.get("empty").unwrap().is_empty(), "{name}");
        assert!(store.exists("empty").unwrap(), "{name}");
    });
}

#[test]
fn test_missing_keys() {
    for_each_store(|name, store| {
        assert_eq!(store.get("ghost").unwrap_err().kind(), ErrorKind::NotFound, "{name}");
        assert_eq!(
            store.open_seek("ghost").err().unwrap().kind(),
            ErrorKind::NotFound,
            "{name}"
        );
        assert_eq!(
            store.copy("ghost", "other").unwrap_err().kind(),
            ErrorKind::NotFound,
            "{name}"
        );
        assert!(!store.exists("ghost").unwrap(), "{name}");
    });
}

#[test]
fn test_delete_is_idempotent() {
    for_each_store(|name, store| {
        store.put("doomed", b"x").unwrap();
        store.delete("doomed").unwrap();
        store.delete("doomed").unwrap();
        store.delete("never-existed").unwrap();
        assert!(!store.exists("doomed").unwrap(), "{name}");
        assert!(store.get("doomed").unwrap_err().is_not_found(), "{name}");
    });
}

#[test]
fn test_keys_lists_exactly_written_keys() {
    for_each_store(|name, store| {
        let written: BTreeSet<String> = ["a", "b/1", "b/2", "b/sub/3", "c.txt"]
            .iter()
            .map(|k| k.to_string())
            .collect();
        for key in &written {
            store.put(key, key.as_bytes()).unwrap();
        }
        store.put("gone", b"").unwrap();
        store.delete("gone").unwrap();

        assert_eq!(collect_keys(store.as_ref(), None).unwrap(), written, "{name}");

        let under_b: Vec<String> = collect_keys(store.as_ref(), Some("b/")).unwrap().into_iter().collect();
        assert_eq!(under_b, vec!["b/1", "b/2", "b/sub/3"], "{name}");

        // Listing twice yields the same keys
        assert_eq!(store.keys(None).unwrap().count(), written.len(), "{name}");
        assert_eq!(store.keys(None).unwrap().count(), written.len(), "{name}");
    });
}

#[test]
fn test_iter_prefixes() {
    for_each_store(|name, store| {
        for key in ["img/1", "img/2", "doc/a/b", "readme"] {
            store.put(key, b"").unwrap();
        }
        let prefixes: Vec<String> = store.iter_prefixes('/', None).unwrap().into_iter().collect();
        assert_eq!(prefixes, vec!["doc/", "img/", "readme"], "{name}");

        let nested: Vec<String> = store.iter_prefixes('/', Some("doc/")).unwrap().into_iter().collect();
        assert_eq!(nested, vec!["doc/a/"], "{name}");
    });
}

#[test]
fn test_open_seek() {
    for_each_store(|name, store| {
        store.put("seekable", b"0123456789abcdef").unwrap();
        let mut handle = store.open_seek("seekable").unwrap();

        let mut head = [0u8; 4];
        handle.read_exact(&mut head).unwrap();
        assert_eq!(&head, b"0123", "{name}");

        handle.seek(SeekFrom::End(-3)).unwrap();
        let mut tail = Vec::new();
        handle.read_to_end(&mut tail).unwrap();
        assert_eq!(tail, b"def", "{name}");

        handle.seek(SeekFrom::Start(10)).unwrap();
        let mut middle = [0u8; 2];
        handle.read_exact(&mut middle).unwrap();
        assert_eq!(&middle, b"ab", "{name}");
    });
}

#[test]
fn test_streams() {
    let payload: Vec<u8> = (0..50_000u32).map(|i| (i * 7 % 256) as u8).collect();
    for_each_store(|name, store| {
        store.put_stream("streamed", &mut payload.as_slice()).unwrap();

        let mut out = Vec::new();
        let written = store.get_into("streamed", &mut out).unwrap();
        assert_eq!(written, payload.len() as u64, "{name}");
        assert_eq!(out, payload, "{name}");
    });
}

#[test]
fn test_copy() {
    for_each_store(|name, store| {
        store.put("original", b"payload").unwrap();
        store.copy("original", "dup/copy").unwrap();
        assert_eq!(store.get("dup/copy").unwrap(), b"payload", "{name}");
        assert_eq!(store.get("original").unwrap(), b"payload", "{name}");
    });
}

#[test]
fn test_invalid_keys_rejected() {
    for_each_store(|name, store| {
        assert_eq!(store.put("", b"x").unwrap_err().kind(), ErrorKind::InvalidKey, "{name}");
        assert_eq!(store.get("").unwrap_err().kind(), ErrorKind::InvalidKey, "{name}");

        let too_long = "k".repeat(1000);
        assert_eq!(
            store.put(&too_long, b"x").unwrap_err().kind(),
            ErrorKind::InvalidKey,
            "{name}"
        );
        assert_eq!(store.keys(None).unwrap().count(), 0, "{name}");
    });
}

#[test]
fn test_health_check() {
    for_each_store(|name, store| {
        assert!(store.health_check().unwrap(), "{name}");
    });
}
