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

// Uniform key-value store abstraction
//
// Application code is written once against `KeyValueStore` and the physical
// backend is picked by configuration:
// - Native backends: in-memory and local filesystem
// - Stackable decorators: prefix, encryption, compression, readonly, urlencode
// - Construction from a YAML file or a store URL through `StoreFactory`
// - One error taxonomy (`StoreError`) for every backend and decorator

pub mod compression;
pub mod config;
pub mod decorator;
pub mod error;
pub mod key;
pub mod storage;

// Re-export main types
pub use config::{load_config, load_config_with_env, parse_store_url, DecoratorSpec, KvConfig, StoreSpec};
pub use decorator::{
    CompressionDecorator, EncryptionDecorator, EncryptionKey, PrefixDecorator, ReadOnlyDecorator,
    UrlEncodeDecorator,
};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use key::{validate_key, KeyCharset, KeyPolicy};
pub use storage::{
    collect_keys, FilesystemStore, KeyIter, KeyValueStore, MemoryStore, SharedStore, StoreFactory,
    StorePlan, ValueReader,
};
