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

use stowage_core::asset::{AssetId, ResourceKind};
use stowage_core::manifest::DependencyMap;
use stowage_core::pipeline::{BoxedError, DependencyOracle};
use std::collections::{BTreeMap, HashSet, VecDeque};
use thiserror::Error;

/// File extensions that never carry runtime content.
pub const DEFAULT_EXCLUDED_EXTENSIONS: &[&str] = &["cs", "dll", "so", "dylib", "asmdef"];

/// Tuning for dependency discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSettings {
    /// Extensions (without the dot, case-insensitive) of identifiers that are
    /// code or compiled libraries rather than content.
    pub excluded_extensions: Vec<String>,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            excluded_extensions: DEFAULT_EXCLUDED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl GraphSettings {
    /// Returns `true` if `asset` is content that may enter the build.
    pub fn is_content(&self, asset: &AssetId) -> bool {
        match asset.extension() {
            Some(ext) => !self
                .excluded_extensions
                .iter()
                .any(|excluded| excluded.trim_start_matches('.').eq_ignore_ascii_case(ext)),
            None => true,
        }
    }

    /// Cleans a raw oracle answer for `asset`: drops non-content identifiers,
    /// self-references and repeats, keeping discovery order.
    pub fn filter_dependencies(&self, asset: &AssetId, raw: Vec<AssetId>) -> Vec<AssetId> {
        let mut seen = HashSet::with_capacity(raw.len());
        raw.into_iter()
            .filter(|dep| dep != asset && self.is_content(dep))
            .filter(|dep| seen.insert(dep.clone()))
            .collect()
    }
}

/// Errors raised while resolving the dependency closure.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The oracle could not answer for an asset. The whole resolve is aborted.
    #[error("dependency oracle failed for '{asset}': {source}")]
    Oracle {
        /// The asset being queried.
        asset: AssetId,
        /// The oracle's error.
        #[source]
        source: BoxedError,
    },
}

/// The complete build universe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    /// Direct dependencies of every asset touched, seed or transitive.
    pub dependencies: DependencyMap,
    /// How each asset entered the universe.
    pub kinds: BTreeMap<AssetId, ResourceKind>,
}

impl DependencyGraph {
    /// Number of assets in the universe.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Returns `true` if the universe is empty.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// Expands seed assets into their full transitive dependency closure.
pub struct DependencyGraphBuilder<'a> {
    oracle: &'a dyn DependencyOracle,
    settings: GraphSettings,
}

impl<'a> DependencyGraphBuilder<'a> {
    /// Creates a builder that queries `oracle`.
    pub fn new(oracle: &'a dyn DependencyOracle, settings: GraphSettings) -> Self {
        Self { oracle, settings }
    }

    /// Resolves the closure of `seeds`.
    ///
    /// The oracle is asked about each identifier exactly once, no matter how
    /// many assets reference it or whether references form cycles. Seeds are
    /// recorded as [`ResourceKind::Direct`], everything discovered through
    /// them as [`ResourceKind::Dependency`].
    pub fn resolve(
        &self,
        seeds: impl IntoIterator<Item = AssetId>,
    ) -> Result<DependencyGraph, GraphError> {
        let mut graph = DependencyGraph::default();
        let mut queue = VecDeque::new();
        let mut queued = HashSet::new();

        for seed in seeds {
            if !self.settings.is_content(&seed) {
                log::warn!("Ignoring seed '{seed}': its extension is excluded from builds.");
                continue;
            }
            if queued.insert(seed.clone()) {
                graph.kinds.insert(seed.clone(), ResourceKind::Direct);
                queue.push_back(seed);
            }
        }

        while let Some(asset) = queue.pop_front() {
            let raw = self
                .oracle
                .direct_dependencies(&asset)
                .map_err(|source| GraphError::Oracle {
                    asset: asset.clone(),
                    source,
                })?;
            let deps = self.settings.filter_dependencies(&asset, raw);

            for dep in &deps {
                if queued.insert(dep.clone()) {
                    graph.kinds.insert(dep.clone(), ResourceKind::Dependency);
                    queue.push_back(dep.clone());
                }
            }
            log::trace!("'{asset}' -> {} dependencies", deps.len());
            graph.dependencies.insert(asset, deps);
        }

        log::debug!(
            "Resolved {} assets ({} seeds).",
            graph.len(),
            graph
                .kinds
                .values()
                .filter(|kind| **kind == ResourceKind::Direct)
                .count()
        );
        Ok(graph)
    }
}
