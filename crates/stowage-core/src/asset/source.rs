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

use super::{AssetId, BundleName};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Host-supplied callback that turns a logical file name (a bundle name, the
/// manifest bundle, the platform manifest, or a source asset path in editor
/// mode) into a physical, readable location.
///
/// The core never assumes a fixed directory layout; every file it opens goes
/// through this callback.
pub type FileLocator = Arc<dyn Fn(&str) -> PathBuf + Send + Sync>;

/// Errors raised by a [`BundleSource`] while opening or reading a bundle.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The physical bundle file could not be read.
    #[error("failed to read bundle '{bundle}' from '{path}': {source}")]
    Io {
        /// The bundle being opened.
        bundle: BundleName,
        /// The physical path the locator resolved it to.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The bundle file exists but its contents are not a valid bundle.
    #[error("bundle '{bundle}' is corrupt: {reason}")]
    Corrupt {
        /// The bundle being opened.
        bundle: BundleName,
        /// What was wrong with it.
        reason: String,
    },
}

/// An opened bundle: the payload handle returned by `LoadBundle`.
///
/// Implementations are free to keep the whole bundle in memory or to read
/// entries lazily; the cache only ever asks for individual assets.
pub trait BundleArchive: Send + Sync {
    /// The name of the bundle this archive was opened from.
    fn name(&self) -> &BundleName;

    /// Reads the raw bytes of one asset.
    ///
    /// Returns `Ok(None)` when the bundle does not contain the asset.
    fn read(&self, asset: &AssetId) -> Result<Option<Vec<u8>>, SourceError>;
}

/// The runtime half of the packaging backend: opens and closes bundles.
pub trait BundleSource: Send + Sync {
    /// Opens a bundle by name (`LoadBundle`).
    fn load_bundle(&self, name: &BundleName) -> Result<Arc<dyn BundleArchive>, SourceError>;

    /// Releases a bundle previously returned by [`load_bundle`](Self::load_bundle)
    /// (`UnloadBundle`).
    fn unload_bundle(&self, bundle: Arc<dyn BundleArchive>);
}
