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

//! Format-tagged value compression
//!
//! Every compressed value starts with a 12-byte header so a reader can decode
//! values written by a differently configured writer:
//!
//! ```text
//! 'K' 'V' 'Z' <algorithm tag> <original length: u64 LE> <payload...>
//! ```
//!
//! | tag | algorithm |
//! |-----|-----------|
//! | 0   | none (stored) |
//! | 1   | gzip (flate2) |
//! | 2   | LZ4 frame |
//! | 3   | Zstd frame |
//!
//! Values without the header, with an unknown tag, whose payload fails to
//! decode, or whose decoded length differs from the recorded one are
//! rejected with [`StoreError::Integrity`].

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// Magic bytes preceding the algorithm tag.
pub const MAGIC: &[u8; 3] = b"KVZ";

/// Header length (magic + tag + original length).
pub const HEADER_LEN: usize = MAGIC.len() + 1 + 8;

/// Compression level (0-4)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum CompressionLevel {
    Fastest = 0,
    Fast = 1,
    #[default]
    Default = 2,
    Slow = 3,
    Slowest = 4,
}

impl CompressionLevel {
    pub fn to_zstd_level(self) -> i32 {
        match self {
            CompressionLevel::Fastest => 1,
            CompressionLevel::Fast => 3,
            CompressionLevel::Default => 5,
            CompressionLevel::Slow => 10,
            CompressionLevel::Slowest => 19,
        }
    }

    pub fn to_lz4_level(self) -> u32 {
        match self {
            CompressionLevel::Fastest => 1,
            CompressionLevel::Fast => 3,
            CompressionLevel::Default => 5,
            CompressionLevel::Slow => 9,
            CompressionLevel::Slowest => 12,
        }
    }

    pub fn to_gzip_level(self) -> u32 {
        match self {
            CompressionLevel::Fastest => 1,
            CompressionLevel::Fast => 3,
            CompressionLevel::Default => 6,
            CompressionLevel::Slow => 8,
            CompressionLevel::Slowest => 9,
        }
    }
}

impl FromStr for CompressionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(CompressionLevel::Fastest),
            "1" => Ok(CompressionLevel::Fast),
            "2" => Ok(CompressionLevel::Default),
            "3" => Ok(CompressionLevel::Slow),
            "4" => Ok(CompressionLevel::Slowest),
            other => Err(format!("compression level must be 0-4, got '{other}'")),
        }
    }
}

/// Compression type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    None,
    Gzip,
    Lz4,
    #[default]
    Zstd,
}

impl CompressionType {
    fn tag(self) -> u8 {
        match self {
            CompressionType::None => 0,
            CompressionType::Gzip => 1,
            CompressionType::Lz4 => 2,
            CompressionType::Zstd => 3,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Gzip),
            2 => Some(CompressionType::Lz4),
            3 => Some(CompressionType::Zstd),
            _ => None,
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionType::None => "none",
            CompressionType::Gzip => "gzip",
            CompressionType::Lz4 => "lz4",
            CompressionType::Zstd => "zstd",
        };
        f.write_str(name)
    }
}

impl FromStr for CompressionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(CompressionType::None),
            "gzip" | "gz" => Ok(CompressionType::Gzip),
            "lz4" => Ok(CompressionType::Lz4),
            "zstd" => Ok(CompressionType::Zstd),
            other => Err(format!(
                "unknown compression algorithm '{other}', expected none, gzip, lz4 or zstd"
            )),
        }
    }
}

/// Compress `data` and prepend the format header.
pub fn compress(data: &[u8], algorithm: CompressionType, level: CompressionLevel) -> StoreResult<Vec<u8>> {
    let mut out = Vec::with_capacity(HEADER_LEN + data.len() / 2);
    out.extend_from_slice(MAGIC);
    out.push(algorithm.tag());
    out.extend_from_slice(&(data.len() as u64).to_le_bytes());

    match algorithm {
        CompressionType::None => out.extend_from_slice(data),
        CompressionType::Gzip => compress_gzip(data, level, &mut out)?,
        CompressionType::Lz4 => out = compress_lz4(data, level, out)?,
        CompressionType::Zstd => compress_zstd(data, level, &mut out)?,
    }

    Ok(out)
}

/// Decode a value produced by [`compress`], whatever algorithm wrote it.
pub fn decompress(data: &[u8]) -> StoreResult<Vec<u8>> {
    let algorithm = detect(data)?;
    let mut length = [0u8; 8];
    length.copy_from_slice(&data[MAGIC.len() + 1..HEADER_LEN]);
    let expected = u64::from_le_bytes(length);
    let payload = &data[HEADER_LEN..];

    let decoded = match algorithm {
        CompressionType::None => Ok(payload.to_vec()),
        CompressionType::Gzip => read_all(flate2::read::GzDecoder::new(payload), algorithm),
        CompressionType::Lz4 => {
            let decoder = lz4::Decoder::new(payload)
                .map_err(|e| StoreError::integrity(format!("lz4 payload rejected: {e}")))?;
            read_all(decoder, algorithm)
        }
        CompressionType::Zstd => zstd::decode_all(payload)
            .map_err(|e| StoreError::integrity(format!("zstd payload rejected: {e}"))),
    }?;

    if decoded.len() as u64 != expected {
        return Err(StoreError::integrity(format!(
            "{algorithm} payload decoded to {} bytes, header records {expected}",
            decoded.len()
        )));
    }

    Ok(decoded)
}

/// Read the algorithm from a value's header.
pub fn detect(data: &[u8]) -> StoreResult<CompressionType> {
    if data.len() < HEADER_LEN || &data[..MAGIC.len()] != MAGIC {
        return Err(StoreError::integrity("missing compression format tag"));
    }
    CompressionType::from_tag(data[MAGIC.len()]).ok_or_else(|| {
        StoreError::integrity(format!(
            "unknown compression format tag {}",
            data[MAGIC.len()]
        ))
    })
}

fn read_all(mut decoder: impl Read, algorithm: CompressionType) -> StoreResult<Vec<u8>> {
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| StoreError::integrity(format!("{algorithm} payload rejected: {e}")))?;
    Ok(out)
}

fn compress_gzip(data: &[u8], level: CompressionLevel, out: &mut Vec<u8>) -> StoreResult<()> {
    let mut encoder =
        flate2::write::GzEncoder::new(out, flate2::Compression::new(level.to_gzip_level()));
    encoder
        .write_all(data)
        .and_then(|_| encoder.try_finish())
        .map_err(|e| StoreError::unspecified_with("gzip compression failed", e))
}

/// LZ4 provides very fast compression/decompression with moderate compression ratio.
fn compress_lz4(data: &[u8], level: CompressionLevel, out: Vec<u8>) -> StoreResult<Vec<u8>> {
    let mut encoder = lz4::EncoderBuilder::new()
        .level(level.to_lz4_level())
        .build(out)
        .map_err(|e| StoreError::unspecified_with("failed to create LZ4 encoder", e))?;

    encoder
        .write_all(data)
        .map_err(|e| StoreError::unspecified_with("failed to write data to LZ4 encoder", e))?;

    let (compressed, result) = encoder.finish();
    result.map_err(|e| StoreError::unspecified_with("LZ4 compression failed", e))?;

    Ok(compressed)
}

/// Zstd provides excellent compression ratio with good speed.
fn compress_zstd(data: &[u8], level: CompressionLevel, out: &mut Vec<u8>) -> StoreResult<()> {
    let compressed = zstd::encode_all(data, level.to_zstd_level())
        .map_err(|e| StoreError::unspecified_with("Zstd compression failed", e))?;
    out.extend_from_slice(&compressed);
    Ok(())
}
