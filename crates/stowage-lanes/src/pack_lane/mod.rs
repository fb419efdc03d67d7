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

//! The reference bundle file format.
//!
//! A bundle file is laid out as:
//!
//! ```text
//! "STWB" | u16 version | u32 table_len | table (bincode) | blobs...
//! ```
//!
//! The table lists every entry with its offset into the blob region, its
//! compressed and raw lengths, and the BLAKE3 hash of its raw bytes. Blobs
//! are LZ4 block-compressed. [`PackWriter`] produces these files at build
//! time; [`PackBundleSource`] opens them at runtime.

mod format;
mod source;
mod writer;

pub use format::*;
pub use source::*;
pub use writer::*;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while writing bundle files.
#[derive(Debug, Error)]
pub enum PackError {
    /// A source asset could not be read.
    #[error("failed to read source asset '{asset}' from '{path}': {source}")]
    ReadAsset {
        /// The asset being packed.
        asset: String,
        /// Where the locator said it lives.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// An output file could not be written.
    #[error("failed to write '{path}': {source}")]
    Write {
        /// The output path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A content bundle would overwrite the manifest bundle or the platform
    /// manifest.
    #[error("bundle '{bundle}' collides with the reserved output file '{reserved}'")]
    ReservedName {
        /// The offending bundle.
        bundle: String,
        /// The reserved file name it collides with.
        reserved: String,
    },
    /// A bundle name would resolve outside the output directory.
    #[error("bundle name '{0}' does not stay inside the output directory")]
    UnsafeName(String),
    /// The entry table or platform manifest could not be encoded.
    #[error("failed to encode bundle metadata: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    /// The entry table does not fit its `u32` length prefix.
    #[error("bundle entry table is {0} bytes, too large for the file header")]
    TableTooLarge(usize),
}
