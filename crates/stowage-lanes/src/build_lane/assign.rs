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

use super::RuleSet;
use stowage_core::asset::{AssetId, ResourceKind};
use stowage_core::manifest::BundleMap;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by [`assign`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignError {
    /// Some assets match no rule. Every one of them is listed.
    #[error("{} asset(s) match no packaging rule:{}", .0.len(), list_assets(.0))]
    Unassignable(Vec<AssetId>),
}

fn list_assets(assets: &[AssetId]) -> String {
    assets.iter().map(|asset| format!("\n  - {asset}")).collect()
}

/// Places every asset of the build universe into exactly one bundle.
///
/// Each bundle's asset list is in lexicographic identifier order, so the same
/// inputs always yield the same map.
pub fn assign(
    kinds: &BTreeMap<AssetId, ResourceKind>,
    rules: &RuleSet,
) -> Result<BundleMap, AssignError> {
    let mut bundles = BundleMap::new();
    let mut unassignable = Vec::new();

    for (asset, &kind) in kinds {
        match rules.bundle_for(asset, kind) {
            Some(bundle) => bundles.entry(bundle).or_default().push(asset.clone()),
            None => unassignable.push(asset.clone()),
        }
    }

    if !unassignable.is_empty() {
        return Err(AssignError::Unassignable(unassignable));
    }

    for assets in bundles.values_mut() {
        assets.sort();
    }
    log::debug!(
        "Assigned {} assets to {} bundles.",
        kinds.len(),
        bundles.len()
    );
    Ok(bundles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_lane::{BundleGranularity, PackRule, RuleTarget};
    use stowage_core::asset::BundleName;
    use std::collections::HashSet;

    fn id(s: &str) -> AssetId {
        AssetId::new(s)
    }

    fn rules() -> RuleSet {
        RuleSet::new(
            vec![
                PackRule::new("ui", RuleTarget::Direct, BundleGranularity::File),
                PackRule::new("textures", RuleTarget::Any, BundleGranularity::All),
            ],
            |_| true,
        )
        .unwrap()
    }

    fn universe() -> BTreeMap<AssetId, ResourceKind> {
        [
            ("ui/root.prefab", ResourceKind::Direct),
            ("textures/z.png", ResourceKind::Dependency),
            ("textures/a.png", ResourceKind::Dependency),
            ("textures/m/b.png", ResourceKind::Dependency),
        ]
        .into_iter()
        .map(|(path, kind)| (id(path), kind))
        .collect()
    }

    #[test]
    fn test_every_asset_lands_in_exactly_one_bundle() {
        let kinds = universe();
        let bundles = assign(&kinds, &rules()).unwrap();

        let mut seen = HashSet::new();
        for assets in bundles.values() {
            for asset in assets {
                assert!(seen.insert(asset.clone()), "{asset} assigned twice");
            }
        }
        let assigned: HashSet<_> = kinds.keys().cloned().collect();
        assert_eq!(seen, assigned);
    }

    #[test]
    fn test_bundle_contents_are_sorted_and_repeatable() {
        let first = assign(&universe(), &rules()).unwrap();
        let second = assign(&universe(), &rules()).unwrap();
        assert_eq!(first, second);

        assert_eq!(
            first[&BundleName::new("textures.ab")],
            vec![id("textures/a.png"), id("textures/m/b.png"), id("textures/z.png")]
        );
        assert_eq!(
            first[&BundleName::new("ui/root.prefab.ab")],
            vec![id("ui/root.prefab")]
        );
    }

    #[test]
    fn test_all_unassignable_assets_are_reported_together() {
        let mut kinds = universe();
        kinds.insert(id("audio/theme.ogg"), ResourceKind::Dependency);
        // A dependency inside a direct-only scope matches nothing either.
        kinds.insert(id("ui/atlas.png"), ResourceKind::Dependency);

        let err = assign(&kinds, &rules()).unwrap_err();
        assert_eq!(
            err,
            AssignError::Unassignable(vec![id("audio/theme.ogg"), id("ui/atlas.png")])
        );
        assert!(err.to_string().contains("2 asset(s)"));
    }
}
