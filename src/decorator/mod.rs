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

// Store decorators
//
// Each decorator wraps exactly one store and implements the full
// KeyValueStore contract on top of it:
// - key transforms: prefix, urlencode
// - value transforms: encryption, compression
// - access control: readonly
//
// Key transforms and value transforms are independent, so any stacking
// order round-trips the caller's keys and bytes.

pub mod compression;
pub mod encryption;
pub mod prefix;
pub mod readonly;
pub mod urlencode;

pub use compression::CompressionDecorator;
pub use encryption::{EncryptionDecorator, EncryptionKey};
pub use prefix::PrefixDecorator;
pub use readonly::ReadOnlyDecorator;
pub use urlencode::UrlEncodeDecorator;

use crate::storage::ValueReader;
use std::io::Cursor;

/// Serve a fully decoded value through a seekable handle.
///
/// Value transforms cannot seek inside the stored representation, so they
/// buffer the whole plaintext.
pub(crate) fn buffered(value: Vec<u8>) -> Box<dyn ValueReader> {
    Box::new(Cursor::new(value))
}
