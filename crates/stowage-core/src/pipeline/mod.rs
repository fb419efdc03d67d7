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

//! Pluggable seams of the offline packing pipeline.
//!
//! The packer itself is backend-agnostic: it discovers dependencies through a
//! [`DependencyOracle`] and hands the finished partition to a
//! [`PackagingBackend`] that knows how to write bundle files.

use crate::asset::AssetId;
use crate::manifest::{BundleDependencyManifest, BundleMap, DependencyMap, ManifestSections};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;

/// Boxed error returned by host-supplied pipeline components.
pub type BoxedError = Box<dyn Error + Send + Sync>;

/// Answers "what does this asset directly reference?".
///
/// Implementations may consult an asset database, sidecar metadata files or
/// the asset contents themselves. Results may contain duplicates and the
/// asset itself; the graph builder filters both.
pub trait DependencyOracle: Send + Sync {
    /// Returns the direct dependencies of `asset`.
    fn direct_dependencies(&self, asset: &AssetId) -> Result<Vec<AssetId>, BoxedError>;
}

/// An in-memory oracle. Assets missing from the map have no dependencies.
impl DependencyOracle for BTreeMap<AssetId, Vec<AssetId>> {
    fn direct_dependencies(&self, asset: &AssetId) -> Result<Vec<AssetId>, BoxedError> {
        Ok(self.get(asset).cloned().unwrap_or_default())
    }
}

impl DependencyOracle for HashMap<AssetId, Vec<AssetId>> {
    fn direct_dependencies(&self, asset: &AssetId) -> Result<Vec<AssetId>, BoxedError> {
        Ok(self.get(asset).cloned().unwrap_or_default())
    }
}

/// Writes the bundle files for a finished build.
///
/// The backend receives the final partition, the asset-level dependency map,
/// and the encoded manifest sections it must ship alongside the bundles. It
/// returns the bundle-level dependency manifest it produced for the target
/// platform.
pub trait PackagingBackend {
    /// Packs every bundle and the manifest.
    fn package(
        &self,
        bundles: &BundleMap,
        dependencies: &DependencyMap,
        manifest: &ManifestSections,
    ) -> Result<BundleDependencyManifest, BoxedError>;
}
