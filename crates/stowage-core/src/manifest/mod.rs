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

//! The persisted cross-reference between assets, bundles and dependencies.
//!
//! A [`Manifest`] holds three linked tables:
//! - the asset table, which gives every asset identifier a dense `u16` id
//!   (its position in the table);
//! - the bundle table, which lists the asset ids owned by each bundle;
//! - the dependency table, which lists the direct dependency ids of every
//!   asset that has at least one dependency.
//!
//! Manifests are immutable once built. They are produced by the packer with
//! [`Manifest::build`], persisted through the [`codec`], and decoded at runtime
//! into a [`BundleManifestIndex`](crate::index::BundleManifestIndex).

mod bundle_deps;
pub mod codec;

pub use bundle_deps::*;
pub use codec::{
    decode, decode_sections, encode, encode_sections, ManifestSections, Section, BUNDLE_ENTRY,
    DEPENDENCY_ENTRY, MANIFEST_BUNDLE, RESOURCE_ENTRY,
};

use crate::asset::{AssetId, BundleName};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Maximum number of entries any `u16`-counted table can hold.
pub const MAX_TABLE_ENTRIES: usize = u16::MAX as usize;

/// Maximum number of direct dependencies a single asset may declare.
pub const MAX_DEPENDENCIES: usize = u8::MAX as usize;

/// Bundle name → the assets it owns, in canonical order.
pub type BundleMap = BTreeMap<BundleName, Vec<AssetId>>;

/// Asset → its direct dependencies, in discovery order.
pub type DependencyMap = BTreeMap<AssetId, Vec<AssetId>>;

/// One row of the bundle table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    /// The bundle's name.
    pub name: BundleName,
    /// Ids (asset table positions) of the assets it owns.
    pub assets: Vec<u16>,
}

/// One row of the dependency table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyChain {
    /// Id of the asset that owns the dependency list.
    pub owner: u16,
    /// Ids of its direct dependencies, in discovery order. Never empty.
    pub dependencies: Vec<u16>,
}

/// A single problem found while building or validating a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestViolation {
    /// More assets than the asset table can address.
    #[error("{count} assets exceed the asset table capacity of {MAX_TABLE_ENTRIES}")]
    TooManyAssets {
        /// Number of assets found.
        count: usize,
    },
    /// More bundles than the bundle table can hold.
    #[error("{count} bundles exceed the bundle table capacity of {MAX_TABLE_ENTRIES}")]
    TooManyBundles {
        /// Number of bundles found.
        count: usize,
    },
    /// A single bundle owns more assets than its `u16` count allows.
    #[error("bundle '{bundle}' holds {count} assets, more than {MAX_TABLE_ENTRIES}")]
    BundleTooLarge {
        /// The offending bundle.
        bundle: BundleName,
        /// Number of assets it holds.
        count: usize,
    },
    /// An asset declares more direct dependencies than allowed.
    #[error("asset '{asset}' has {count} dependencies, more than {MAX_DEPENDENCIES}")]
    TooManyDependencies {
        /// The offending asset.
        asset: AssetId,
        /// Number of dependencies it declares.
        count: usize,
    },
    /// An asset is owned by two bundles (or twice by the same bundle).
    #[error("asset '{asset}' is owned by both '{first}' and '{second}'")]
    DuplicateAsset {
        /// The offending asset.
        asset: AssetId,
        /// The first owning bundle.
        first: BundleName,
        /// The second owning bundle.
        second: BundleName,
    },
    /// The same identifier appears twice in the asset table.
    #[error("asset '{asset}' appears more than once in the asset table")]
    DuplicateAssetPath {
        /// The repeated identifier.
        asset: AssetId,
    },
    /// Two rows of the bundle table share a name.
    #[error("bundle '{bundle}' appears more than once in the bundle table")]
    DuplicateBundle {
        /// The repeated bundle name.
        bundle: BundleName,
    },
    /// An asset table entry is not owned by any bundle.
    #[error("asset '{asset}' is not owned by any bundle")]
    UnownedAsset {
        /// The orphaned asset.
        asset: AssetId,
    },
    /// A dependency list was recorded for an asset that no bundle owns.
    #[error("asset '{asset}' has dependencies but is not part of any bundle")]
    UnbundledAsset {
        /// The offending asset.
        asset: AssetId,
    },
    /// An asset depends on an asset that no bundle owns.
    #[error("asset '{asset}' depends on '{dependency}', which is not part of any bundle")]
    UnbundledDependency {
        /// The depending asset.
        asset: AssetId,
        /// The missing dependency.
        dependency: AssetId,
    },
    /// A table references an id past the end of the asset table.
    #[error("{context} references asset id {id}, but the asset table has {count} entries")]
    IdOutOfRange {
        /// Where the reference was found.
        context: String,
        /// The out-of-range id.
        id: u16,
        /// Size of the asset table.
        count: usize,
    },
    /// A dependency chain lists an owner and no dependencies.
    #[error("dependency chain for '{asset}' is empty")]
    EmptyChain {
        /// The owner of the empty chain.
        asset: AssetId,
    },
    /// Two dependency chains share the same owner.
    #[error("asset '{asset}' has more than one dependency chain")]
    DuplicateChain {
        /// The repeated owner.
        asset: AssetId,
    },
}

/// Errors raised while building, encoding or decoding a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The tables violate one or more manifest invariants. Every violation
    /// found is listed, not just the first.
    #[error("manifest is invalid ({} problem(s)):{}", .0.len(), list_violations(.0))]
    Invalid(Vec<ManifestViolation>),
    /// A count does not fit its `u16` wire slot.
    #[error("{what} has {count} entries, which overflows its u16 count")]
    Overflow {
        /// Which table or entry overflowed.
        what: String,
        /// The count that did not fit.
        count: usize,
    },
    /// The input ended before a complete value could be read.
    #[error("{section} section truncated at byte {offset}: needed {needed} more byte(s)")]
    Truncated {
        /// Section being decoded.
        section: Section,
        /// Byte offset of the incomplete read.
        offset: usize,
        /// Number of bytes missing.
        needed: usize,
    },
    /// A string was not valid UTF-8.
    #[error("{section} section holds invalid UTF-8 at byte {offset}")]
    InvalidUtf8 {
        /// Section being decoded.
        section: Section,
        /// Byte offset of the string.
        offset: usize,
    },
    /// The bytes are structurally wrong in some other way.
    #[error("{section} section is malformed at byte {offset}: {reason}")]
    Malformed {
        /// Section being decoded.
        section: Section,
        /// Byte offset of the problem.
        offset: usize,
        /// What was wrong.
        reason: &'static str,
    },
    /// Bytes remained after the last section was decoded.
    #[error("{section} section is followed by {remaining} unexpected byte(s)")]
    TrailingBytes {
        /// The last section decoded.
        section: Section,
        /// Number of leftover bytes.
        remaining: usize,
    },
}

fn list_violations(violations: &[ManifestViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("\n  - {v}"))
        .collect()
}

/// The immutable, id-space form of the cross-reference tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    assets: Vec<AssetId>,
    bundles: Vec<BundleEntry>,
    dependencies: Vec<DependencyChain>,
}

impl Manifest {
    /// Builds a manifest from the packer's bundle map and dependency map.
    ///
    /// Asset ids are assigned in lexicographic identifier order, bundles are
    /// written in name order and dependency chains in owner order, so identical
    /// inputs always produce identical manifests. Assets without dependencies
    /// get no chain.
    ///
    /// # Errors
    /// Returns [`ManifestError::Invalid`] listing every capacity or partition
    /// violation found.
    pub fn build(bundles: &BundleMap, dependencies: &DependencyMap) -> Result<Self, ManifestError> {
        let mut violations = Vec::new();

        if bundles.len() > MAX_TABLE_ENTRIES {
            violations.push(ManifestViolation::TooManyBundles {
                count: bundles.len(),
            });
        }

        let mut owners: BTreeMap<&AssetId, &BundleName> = BTreeMap::new();
        for (bundle, assets) in bundles {
            if assets.len() > MAX_TABLE_ENTRIES {
                violations.push(ManifestViolation::BundleTooLarge {
                    bundle: bundle.clone(),
                    count: assets.len(),
                });
            }
            for asset in assets {
                if let Some(first) = owners.insert(asset, bundle) {
                    violations.push(ManifestViolation::DuplicateAsset {
                        asset: asset.clone(),
                        first: first.clone(),
                        second: bundle.clone(),
                    });
                }
            }
        }

        if owners.len() > MAX_TABLE_ENTRIES {
            violations.push(ManifestViolation::TooManyAssets {
                count: owners.len(),
            });
        }

        let positions: HashMap<&AssetId, usize> = owners
            .keys()
            .enumerate()
            .map(|(position, asset)| (*asset, position))
            .collect();

        for (asset, deps) in dependencies {
            if deps.is_empty() {
                continue;
            }
            if !positions.contains_key(asset) {
                violations.push(ManifestViolation::UnbundledAsset {
                    asset: asset.clone(),
                });
                continue;
            }
            if deps.len() > MAX_DEPENDENCIES {
                violations.push(ManifestViolation::TooManyDependencies {
                    asset: asset.clone(),
                    count: deps.len(),
                });
            }
            for dep in deps {
                if !positions.contains_key(dep) {
                    violations.push(ManifestViolation::UnbundledDependency {
                        asset: asset.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        if !violations.is_empty() {
            return Err(ManifestError::Invalid(violations));
        }

        // Every position is below MAX_TABLE_ENTRIES once validation passed.
        let id = |asset: &AssetId| positions[asset] as u16;

        let bundle_entries = bundles
            .iter()
            .map(|(name, assets)| BundleEntry {
                name: name.clone(),
                assets: assets.iter().map(id).collect(),
            })
            .collect();

        let chains = dependencies
            .iter()
            .filter(|(_, deps)| !deps.is_empty())
            .map(|(asset, deps)| DependencyChain {
                owner: id(asset),
                dependencies: deps.iter().map(id).collect(),
            })
            .collect();

        Ok(Self {
            assets: owners.into_keys().cloned().collect(),
            bundles: bundle_entries,
            dependencies: chains,
        })
    }

    /// Assembles a manifest from already-id-mapped tables, as read off the wire.
    ///
    /// # Errors
    /// Returns [`ManifestError::Invalid`] listing every violation: ids out of
    /// range, assets owned twice or not at all, repeated bundle names, empty
    /// or repeated chains, and capacity overflows.
    pub fn from_parts(
        assets: Vec<AssetId>,
        bundles: Vec<BundleEntry>,
        dependencies: Vec<DependencyChain>,
    ) -> Result<Self, ManifestError> {
        let mut violations = Vec::new();
        let count = assets.len();

        if count > MAX_TABLE_ENTRIES {
            violations.push(ManifestViolation::TooManyAssets { count });
        }
        if bundles.len() > MAX_TABLE_ENTRIES {
            violations.push(ManifestViolation::TooManyBundles {
                count: bundles.len(),
            });
        }

        let mut seen = HashSet::with_capacity(count);
        for asset in &assets {
            if !seen.insert(asset) {
                violations.push(ManifestViolation::DuplicateAssetPath {
                    asset: asset.clone(),
                });
            }
        }

        let mut names = HashSet::with_capacity(bundles.len());
        let mut owner_of: Vec<Option<&BundleName>> = vec![None; count];
        for bundle in &bundles {
            if !names.insert(&bundle.name) {
                violations.push(ManifestViolation::DuplicateBundle {
                    bundle: bundle.name.clone(),
                });
            }
            if bundle.assets.len() > MAX_TABLE_ENTRIES {
                violations.push(ManifestViolation::BundleTooLarge {
                    bundle: bundle.name.clone(),
                    count: bundle.assets.len(),
                });
            }
            for &id in &bundle.assets {
                let Some(slot) = owner_of.get_mut(id as usize) else {
                    violations.push(ManifestViolation::IdOutOfRange {
                        context: format!("bundle '{}'", bundle.name),
                        id,
                        count,
                    });
                    continue;
                };
                match slot {
                    Some(first) => violations.push(ManifestViolation::DuplicateAsset {
                        asset: assets[id as usize].clone(),
                        first: (*first).clone(),
                        second: bundle.name.clone(),
                    }),
                    None => *slot = Some(&bundle.name),
                }
            }
        }
        for (position, owner) in owner_of.iter().enumerate() {
            if owner.is_none() {
                violations.push(ManifestViolation::UnownedAsset {
                    asset: assets[position].clone(),
                });
            }
        }

        let mut chained = HashSet::new();
        for chain in &dependencies {
            let Some(owner) = assets.get(chain.owner as usize) else {
                violations.push(ManifestViolation::IdOutOfRange {
                    context: "dependency chain owner".to_string(),
                    id: chain.owner,
                    count,
                });
                continue;
            };
            if !chained.insert(chain.owner) {
                violations.push(ManifestViolation::DuplicateChain {
                    asset: owner.clone(),
                });
            }
            if chain.dependencies.is_empty() {
                violations.push(ManifestViolation::EmptyChain {
                    asset: owner.clone(),
                });
            }
            if chain.dependencies.len() > MAX_DEPENDENCIES {
                violations.push(ManifestViolation::TooManyDependencies {
                    asset: owner.clone(),
                    count: chain.dependencies.len(),
                });
            }
            for &id in &chain.dependencies {
                if id as usize >= count {
                    violations.push(ManifestViolation::IdOutOfRange {
                        context: format!("dependency chain of '{owner}'"),
                        id,
                        count,
                    });
                }
            }
        }

        if !violations.is_empty() {
            return Err(ManifestError::Invalid(violations));
        }

        Ok(Self {
            assets,
            bundles,
            dependencies,
        })
    }

    /// The asset table. An asset's id is its index in this slice.
    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    /// The bundle table.
    pub fn bundles(&self) -> &[BundleEntry] {
        &self.bundles
    }

    /// The dependency table (only assets with at least one dependency).
    pub fn dependencies(&self) -> &[DependencyChain] {
        &self.dependencies
    }

    /// Looks up the identifier behind an asset id.
    pub fn asset(&self, id: u16) -> Option<&AssetId> {
        self.assets.get(id as usize)
    }

    /// Expands the bundle table back into identifier space.
    pub fn bundle_map(&self) -> BundleMap {
        self.bundles
            .iter()
            .map(|bundle| {
                let assets = bundle
                    .assets
                    .iter()
                    .map(|&id| self.assets[id as usize].clone())
                    .collect();
                (bundle.name.clone(), assets)
            })
            .collect()
    }

    /// Expands the dependency table back into identifier space.
    ///
    /// Assets without dependencies are absent, exactly as on the wire.
    pub fn dependency_map(&self) -> DependencyMap {
        self.dependencies
            .iter()
            .map(|chain| {
                let deps = chain
                    .dependencies
                    .iter()
                    .map(|&id| self.assets[id as usize].clone())
                    .collect();
                (self.assets[chain.owner as usize].clone(), deps)
            })
            .collect()
    }
}
