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

use super::{BundleMap, DependencyMap};
use crate::asset::{AssetId, BundleName};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Bundle-level facts recorded by the packager for one bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRecord {
    /// Bundles that must be open before this one can be used, sorted.
    pub dependencies: Vec<BundleName>,
    /// Content hash of the packed bundle file, when known.
    pub hash: Option<String>,
}

/// The platform manifest: which bundles depend on which other bundles.
///
/// This is derived from the asset-level tables (asset `a` in bundle `X`
/// depending on asset `b` in bundle `Y ≠ X` makes `X` depend on `Y`) and is
/// what a runtime bundle lane consults to open dependencies first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleDependencyManifest {
    platform: String,
    bundles: BTreeMap<BundleName, BundleRecord>,
}

impl BundleDependencyManifest {
    /// Creates an empty manifest for `platform`.
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            bundles: BTreeMap::new(),
        }
    }

    /// Derives bundle-level dependencies from the asset-level maps.
    pub fn derive(platform: impl Into<String>, bundles: &BundleMap, deps: &DependencyMap) -> Self {
        let owner_of: HashMap<&AssetId, &BundleName> = bundles
            .iter()
            .flat_map(|(bundle, assets)| assets.iter().map(move |asset| (asset, bundle)))
            .collect();

        let mut manifest = Self::new(platform);
        for (bundle, assets) in bundles {
            let mut needed = BTreeSet::new();
            for asset in assets {
                for dep in deps.get(asset).into_iter().flatten() {
                    if let Some(&other) = owner_of.get(dep) {
                        if other != bundle {
                            needed.insert(other.clone());
                        }
                    }
                }
            }
            manifest.bundles.insert(
                bundle.clone(),
                BundleRecord {
                    dependencies: needed.into_iter().collect(),
                    hash: None,
                },
            );
        }
        manifest
    }

    /// The platform this manifest was produced for.
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Records the content hash of a packed bundle.
    pub fn set_hash(&mut self, bundle: &BundleName, hash: impl Into<String>) {
        self.bundles.entry(bundle.clone()).or_default().hash = Some(hash.into());
    }

    /// Returns the record of one bundle.
    pub fn record(&self, bundle: &BundleName) -> Option<&BundleRecord> {
        self.bundles.get(bundle)
    }

    /// Iterates over every bundle and its record, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&BundleName, &BundleRecord)> {
        self.bundles.iter()
    }

    /// Number of bundles described.
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    /// Returns `true` if no bundle is described.
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Bundles `bundle` depends on directly. Empty for unknown bundles.
    pub fn direct_dependencies(&self, bundle: &BundleName) -> &[BundleName] {
        self.bundles
            .get(bundle)
            .map(|record| record.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Every bundle `bundle` transitively depends on, deepest first.
    ///
    /// Opening bundles in this order guarantees each one's dependencies are
    /// already open. `bundle` itself is not included. Cycles are tolerated:
    /// each bundle appears at most once.
    pub fn load_order(&self, bundle: &BundleName) -> Vec<BundleName> {
        let mut visited = HashSet::from([bundle]);
        let mut order = Vec::new();
        self.visit(bundle, &mut visited, &mut order);
        order
    }

    fn visit<'a>(
        &'a self,
        bundle: &BundleName,
        visited: &mut HashSet<&'a BundleName>,
        order: &mut Vec<BundleName>,
    ) {
        for dep in self.direct_dependencies(bundle) {
            if visited.insert(dep) {
                self.visit(dep, visited, order);
                order.push(dep.clone());
            }
        }
    }

    /// Serializes the manifest with the standard `bincode` configuration.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
    }

    /// Deserializes a manifest written by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(manifest, _)| manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> BundleName {
        BundleName::new(s)
    }

    fn id(s: &str) -> AssetId {
        AssetId::new(s)
    }

    fn ui_build() -> BundleDependencyManifest {
        let mut bundles = BundleMap::new();
        bundles.insert(name("ui.ab"), vec![id("ui/root.prefab")]);
        bundles.insert(name("textures.ab"), vec![id("tex/a.png"), id("tex/b.png")]);
        bundles.insert(name("shaders.ab"), vec![id("sh/ui.shader")]);

        let mut deps = DependencyMap::new();
        deps.insert(id("ui/root.prefab"), vec![id("tex/a.png"), id("sh/ui.shader")]);
        deps.insert(id("tex/a.png"), vec![id("tex/b.png"), id("sh/ui.shader")]);
        BundleDependencyManifest::derive("linux", &bundles, &deps)
    }

    #[test]
    fn test_derive_ignores_intra_bundle_edges() {
        let manifest = ui_build();
        assert_eq!(
            manifest.direct_dependencies(&name("ui.ab")),
            &[name("shaders.ab"), name("textures.ab")]
        );
        assert_eq!(
            manifest.direct_dependencies(&name("textures.ab")),
            &[name("shaders.ab")]
        );
        assert!(manifest.direct_dependencies(&name("shaders.ab")).is_empty());
    }

    #[test]
    fn test_load_order_puts_dependencies_first() {
        let order = ui_build().load_order(&name("ui.ab"));
        assert_eq!(order, vec![name("shaders.ab"), name("textures.ab")]);
    }

    #[test]
    fn test_load_order_survives_cycles() {
        let mut bundles = BundleMap::new();
        bundles.insert(name("x.ab"), vec![id("x")]);
        bundles.insert(name("y.ab"), vec![id("y")]);
        let mut deps = DependencyMap::new();
        deps.insert(id("x"), vec![id("y")]);
        deps.insert(id("y"), vec![id("x")]);
        let manifest = BundleDependencyManifest::derive("linux", &bundles, &deps);

        assert_eq!(manifest.load_order(&name("x.ab")), vec![name("y.ab")]);
    }

    #[test]
    fn test_bincode_round_trip_keeps_hashes() {
        let mut manifest = ui_build();
        manifest.set_hash(&name("ui.ab"), "abc123");

        let bytes = manifest.to_bytes().unwrap();
        let restored = BundleDependencyManifest::from_bytes(&bytes).unwrap();
        assert_eq!(restored, manifest);
        assert_eq!(restored.platform(), "linux");
        assert_eq!(
            restored.record(&name("ui.ab")).and_then(|r| r.hash.as_deref()),
            Some("abc123")
        );
    }
}
