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

// Storage backend module
//
// Provides a trait-based abstraction over key-value media, so callers can
// switch between backends (memory, local filesystem, ...) through
// configuration alone. Decorators in `crate::decorator` implement the same
// trait on top of any backend.

pub mod backend;
pub mod factory;
pub mod filesystem;
pub mod memory;

pub use backend::{collect_keys, KeyIter, KeyValueStore, SharedStore, ValueReader};
pub use factory::{StoreFactory, StorePlan};
pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;

pub(crate) use backend::read_stream;
