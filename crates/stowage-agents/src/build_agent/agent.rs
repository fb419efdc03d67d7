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

use super::BuildError;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stowage_core::asset::AssetId;
use stowage_core::manifest::{
    encode_sections, BundleDependencyManifest, BundleMap, Manifest, ManifestSections,
};
use stowage_core::pipeline::{DependencyOracle, PackagingBackend};
use stowage_lanes::{assign, DependencyGraph, DependencyGraphBuilder, GraphSettings, RuleSet};
use stowage_telemetry::{GaugeHandle, HistogramHandle, MetricsRegistry, ScopedMetricTimer};

/// Everything the builder decided, before anything is written.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    /// The build universe and its dependency map.
    pub graph: DependencyGraph,
    /// Which bundle owns which assets.
    pub bundles: BundleMap,
    /// The id-space manifest.
    pub manifest: Manifest,
    /// The encoded manifest sections.
    pub sections: ManifestSections,
}

/// Summary of a finished build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Assets packed, seeds and dependencies together.
    pub assets: usize,
    /// Bundles written.
    pub bundles: usize,
    /// Assets with at least one dependency.
    pub dependency_chains: usize,
    /// Size of the three encoded manifest sections together.
    pub manifest_bytes: usize,
    /// Bundle-level dependencies reported by the packaging backend.
    pub platform: BundleDependencyManifest,
    /// Wall-clock time of the whole build.
    pub duration: Duration,
}

#[derive(Default)]
struct BuildMetrics {
    assets: Option<GaugeHandle>,
    bundles: Option<GaugeHandle>,
    duration: Option<HistogramHandle>,
}

impl BuildMetrics {
    fn register(registry: &MetricsRegistry) -> Self {
        let warn = |e| log::warn!("Failed to register build metric: {e}");
        Self {
            assets: registry
                .register_gauge("build", "assets", "Assets in the last build", "assets")
                .map_err(warn)
                .ok(),
            bundles: registry
                .register_gauge("build", "bundles", "Bundles in the last build", "bundles")
                .map_err(warn)
                .ok(),
            duration: registry
                .register_histogram(
                    "build",
                    "duration",
                    "Wall-clock time of a build",
                    "ms",
                    stowage_telemetry::metrics::registry::DURATION_BUCKETS_MS.to_vec(),
                )
                .map_err(warn)
                .ok(),
        }
    }

    fn record(&self, assets: usize, bundles: usize) {
        for (gauge, value) in [(&self.assets, assets), (&self.bundles, bundles)] {
            if let Some(gauge) = gauge {
                if let Err(e) = gauge.set(value as f64) {
                    log::warn!("Failed to update metric {}: {e}", gauge.id());
                }
            }
        }
    }
}

/// Runs the packing pipeline.
pub struct BundleBuilder {
    oracle: Arc<dyn DependencyOracle>,
    rules: RuleSet,
    settings: GraphSettings,
    metrics: BuildMetrics,
}

impl BundleBuilder {
    /// Creates a builder with the default graph settings.
    pub fn new(oracle: Arc<dyn DependencyOracle>, rules: RuleSet) -> Self {
        Self {
            oracle,
            rules,
            settings: GraphSettings::default(),
            metrics: BuildMetrics::default(),
        }
    }

    /// Overrides which extensions count as non-content.
    pub fn with_settings(mut self, settings: GraphSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Records build metrics into `registry`.
    pub fn with_metrics(mut self, registry: &MetricsRegistry) -> Self {
        self.metrics = BuildMetrics::register(registry);
        self
    }

    /// The packaging rules in use.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Picks the seed assets out of host-enumerated candidate files.
    pub fn collect_seeds<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a AssetId>,
    ) -> BTreeSet<AssetId> {
        self.rules.collect_seeds(candidates)
    }

    /// Runs every stage except packaging.
    pub fn plan(&self, seeds: impl IntoIterator<Item = AssetId>) -> Result<BuildPlan, BuildError> {
        let graph = DependencyGraphBuilder::new(self.oracle.as_ref(), self.settings.clone())
            .resolve(seeds)?;
        log::info!("Resolved {} assets.", graph.len());

        let bundles = assign(&graph.kinds, &self.rules)?;
        log::info!("Assigned assets to {} bundles.", bundles.len());

        let manifest = Manifest::build(&bundles, &graph.dependencies)?;
        let sections = encode_sections(&manifest)?;
        log::info!(
            "Encoded manifest: {} assets, {} bundles, {} dependency chains.",
            manifest.assets().len(),
            manifest.bundles().len(),
            manifest.dependencies().len()
        );

        Ok(BuildPlan {
            graph,
            bundles,
            manifest,
            sections,
        })
    }

    /// Plans the build and hands it to `backend`.
    pub fn build(
        &self,
        seeds: impl IntoIterator<Item = AssetId>,
        backend: &dyn PackagingBackend,
    ) -> Result<BuildReport, BuildError> {
        let started = Instant::now();
        let _timer = self.metrics.duration.as_ref().map(ScopedMetricTimer::new);

        let plan = self.plan(seeds)?;
        let platform = backend
            .package(&plan.bundles, &plan.graph.dependencies, &plan.sections)
            .map_err(BuildError::Packaging)?;

        let report = BuildReport {
            assets: plan.manifest.assets().len(),
            bundles: plan.manifest.bundles().len(),
            dependency_chains: plan.manifest.dependencies().len(),
            manifest_bytes: plan.sections.assets.len()
                + plan.sections.bundles.len()
                + plan.sections.dependencies.len(),
            platform,
            duration: started.elapsed(),
        };
        self.metrics.record(report.assets, report.bundles);
        log::info!(
            "Build finished: {} assets in {} bundles ({:.2?}).",
            report.assets,
            report.bundles,
            report.duration
        );
        Ok(report)
    }
}
