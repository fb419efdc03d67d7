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

//! The runtime lookup index built from a decoded manifest.

use crate::asset::{AssetId, BundleName};
use crate::manifest::{self, Manifest, ManifestError, ManifestSections};
use std::collections::{BTreeMap, HashMap};

/// Answers "which bundle holds this asset?" and "what does it depend on?".
///
/// The index is built once at startup from the packed manifest and never
/// changes afterwards. It is the runtime's single source of truth for bundle
/// ownership and asset dependencies in a packed build.
#[derive(Debug, Default, Clone)]
pub struct BundleManifestIndex {
    owners: HashMap<AssetId, BundleName>,
    dependencies: HashMap<AssetId, Vec<AssetId>>,
    bundles: BTreeMap<BundleName, Vec<AssetId>>,
}

impl BundleManifestIndex {
    /// Builds the index from a validated manifest.
    pub fn new(manifest: &Manifest) -> Self {
        let bundles = manifest.bundle_map();
        let owners = bundles
            .iter()
            .flat_map(|(bundle, assets)| {
                assets
                    .iter()
                    .map(move |asset| (asset.clone(), bundle.clone()))
            })
            .collect();
        let dependencies = manifest.dependency_map().into_iter().collect();

        Self {
            owners,
            dependencies,
            bundles,
        }
    }

    /// Decodes the concatenated manifest bytes and builds the index.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ManifestError> {
        let manifest = manifest::decode(bytes)?;
        Ok(Self::new(&manifest))
    }

    /// Decodes the three separately stored manifest sections and builds the index.
    pub fn from_sections(sections: &ManifestSections) -> Result<Self, ManifestError> {
        let manifest = manifest::decode_sections(
            &sections.assets,
            &sections.bundles,
            &sections.dependencies,
        )?;
        Ok(Self::new(&manifest))
    }

    /// The bundle that owns `asset`, or `None` for unknown assets.
    pub fn bundle_of(&self, asset: &AssetId) -> Option<&BundleName> {
        self.owners.get(asset)
    }

    /// Direct dependencies of `asset`. Empty when it has none or is unknown.
    pub fn dependencies_of(&self, asset: &AssetId) -> &[AssetId] {
        self.dependencies
            .get(asset)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns `true` if `asset` is part of the packed build.
    pub fn contains(&self, asset: &AssetId) -> bool {
        self.owners.contains_key(asset)
    }

    /// The assets owned by `bundle`.
    pub fn assets_in(&self, bundle: &BundleName) -> Option<&[AssetId]> {
        self.bundles.get(bundle).map(Vec::as_slice)
    }

    /// All bundle names, sorted.
    pub fn bundle_names(&self) -> impl Iterator<Item = &BundleName> {
        self.bundles.keys()
    }

    /// Number of indexed assets.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Returns `true` if the index holds no assets.
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
