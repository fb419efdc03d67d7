// Copyright 2025 eraflo
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

use super::PackError;
use serde::{Deserialize, Serialize};
use stowage_core::asset::{AssetId, BundleArchive, BundleName, SourceError};
use std::collections::HashMap;

/// Magic bytes opening every bundle file.
pub const BUNDLE_MAGIC: [u8; 4] = *b"STWB";

/// Current bundle format version.
pub const FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = 4 + 2 + 4;

/// Upper bound on how much an LZ4 block can expand: one token byte encodes
/// at most 255 bytes of match length, plus the trailing literals.
const MAX_LZ4_RATIO: u64 = 255;
const MAX_LZ4_SLACK: u64 = 16;

/// One row of a bundle's entry table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// Entry name (an asset identifier, or a manifest section name).
    pub name: String,
    /// Offset of the compressed blob within the blob region.
    pub offset: u64,
    /// Length of the compressed blob.
    pub compressed_len: u64,
    /// Length of the entry once decompressed.
    pub raw_len: u64,
    /// BLAKE3 hash of the raw bytes.
    pub hash: [u8; 32],
}

/// Encodes a complete bundle file from named entries.
pub fn write_bundle<'a>(
    entries: impl IntoIterator<Item = (&'a str, &'a [u8])>,
) -> Result<Vec<u8>, PackError> {
    let mut table = Vec::new();
    let mut blobs = Vec::new();

    for (name, raw) in entries {
        let compressed = lz4_flex::compress(raw);
        table.push(EntryRecord {
            name: name.to_string(),
            offset: blobs.len() as u64,
            compressed_len: compressed.len() as u64,
            raw_len: raw.len() as u64,
            hash: *blake3::hash(raw).as_bytes(),
        });
        blobs.extend_from_slice(&compressed);
    }

    let table = bincode::serde::encode_to_vec(&table, bincode::config::standard())?;
    let table_len = u32::try_from(table.len()).map_err(|_| PackError::TableTooLarge(table.len()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + table.len() + blobs.len());
    bytes.extend_from_slice(&BUNDLE_MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&table_len.to_le_bytes());
    bytes.extend_from_slice(&table);
    bytes.extend_from_slice(&blobs);
    Ok(bytes)
}

/// A parsed bundle file held in memory.
#[derive(Debug)]
pub struct BundleFile {
    name: BundleName,
    entries: HashMap<String, EntryRecord>,
    blobs: Vec<u8>,
}

impl BundleFile {
    /// Parses the bytes of a bundle file.
    pub fn parse(name: BundleName, bytes: &[u8]) -> Result<Self, SourceError> {
        let corrupt = |reason: String| SourceError::Corrupt {
            bundle: name.clone(),
            reason,
        };

        if bytes.len() < HEADER_LEN {
            return Err(corrupt(format!("file is only {} bytes long", bytes.len())));
        }
        if bytes[..4] != BUNDLE_MAGIC {
            return Err(corrupt("bad magic bytes".to_string()));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != FORMAT_VERSION {
            return Err(corrupt(format!("unsupported format version {version}")));
        }
        let table_len = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]) as usize;
        let table_end = HEADER_LEN
            .checked_add(table_len)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| corrupt("entry table runs past the end of the file".to_string()))?;

        let (table, _): (Vec<EntryRecord>, usize) = bincode::serde::decode_from_slice(
            &bytes[HEADER_LEN..table_end],
            bincode::config::standard(),
        )
        .map_err(|e| corrupt(format!("unreadable entry table: {e}")))?;

        let blobs = bytes[table_end..].to_vec();
        for record in &table {
            let end = record.offset.checked_add(record.compressed_len);
            if !matches!(end, Some(end) if end <= blobs.len() as u64) {
                return Err(corrupt(format!(
                    "entry '{}' runs past the end of the file",
                    record.name
                )));
            }
            let max_raw = record
                .compressed_len
                .saturating_mul(MAX_LZ4_RATIO)
                .saturating_add(MAX_LZ4_SLACK);
            if record.raw_len > max_raw {
                return Err(corrupt(format!(
                    "entry '{}' claims {} raw bytes from {} compressed bytes",
                    record.name, record.raw_len, record.compressed_len
                )));
            }
        }

        let entries = table
            .into_iter()
            .map(|record| (record.name.clone(), record))
            .collect();
        Ok(Self {
            name,
            entries,
            blobs,
        })
    }

    /// Entry names, unordered.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Decompresses and verifies one entry. `Ok(None)` if absent.
    pub fn entry(&self, name: &str) -> Result<Option<Vec<u8>>, SourceError> {
        let Some(record) = self.entries.get(name) else {
            return Ok(None);
        };
        let start = record.offset as usize;
        let compressed = &self.blobs[start..start + record.compressed_len as usize];
        let raw = lz4_flex::decompress(compressed, record.raw_len as usize).map_err(|e| {
            SourceError::Corrupt {
                bundle: self.name.clone(),
                reason: format!("entry '{name}' does not decompress: {e}"),
            }
        })?;
        if raw.len() as u64 != record.raw_len || *blake3::hash(&raw).as_bytes() != record.hash {
            return Err(SourceError::Corrupt {
                bundle: self.name.clone(),
                reason: format!("entry '{name}' failed its integrity check"),
            });
        }
        Ok(Some(raw))
    }
}

impl BundleArchive for BundleFile {
    fn name(&self) -> &BundleName {
        &self.name
    }

    fn read(&self, asset: &AssetId) -> Result<Option<Vec<u8>>, SourceError> {
        self.entry(asset.as_str())
    }
}
