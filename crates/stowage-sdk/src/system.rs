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

use crate::RuntimeConfig;
use anyhow::{Context, Result};
use std::sync::Arc;
use stowage_agents::{CacheError, ResourceCache, ResourceHandle, ResourceStatus};
use stowage_core::agent::{Agent, AgentStatus};
use stowage_core::asset::{AssetId, Instantiator, Payload};
use stowage_core::BundleManifestIndex;
use stowage_lanes::{
    read_manifest_bundle, read_platform_manifest, BundleLane, EditorLane, LoadError, LoadMode,
    MetaFileOracle, PackBundleSource,
};
use stowage_telemetry::MetricsRegistry;

/// The runtime entry point: one resource cache wired to the lanes selected
/// by a [`RuntimeConfig`].
///
/// Construct it once at startup and tear it down with
/// [`shutdown`](Self::shutdown). Dropping it shuts it down as well.
pub struct ResourceSystem {
    cache: ResourceCache,
    metrics: MetricsRegistry,
    platform: String,
    editor_mode: bool,
    shut_down: bool,
}

impl ResourceSystem {
    /// Reads the manifests (bundled mode) or prepares the source oracle
    /// (editor mode) and builds the cache.
    pub fn initialize(config: RuntimeConfig) -> Result<Self> {
        let metrics = MetricsRegistry::new();
        let cache = if config.editor_mode {
            Self::editor_cache(&config)
        } else {
            Self::bundled_cache(&config)?
        };
        let cache = cache
            .with_metrics(&metrics)
            .with_sweep_budget(config.sweep_budget);

        log::info!(
            "Resource system ready (platform '{}', {} mode).",
            config.platform,
            if config.editor_mode { "editor" } else { "bundled" }
        );
        Ok(Self {
            cache,
            metrics,
            platform: config.platform,
            editor_mode: config.editor_mode,
            shut_down: false,
        })
    }

    fn bundled_cache(config: &RuntimeConfig) -> Result<ResourceCache> {
        let sections = read_manifest_bundle(&config.locator, config.payload_offset)
            .context("Failed to read the manifest bundle")?;
        let index = BundleManifestIndex::from_sections(&sections)
            .context("Failed to decode the asset manifest")?;
        let platform = read_platform_manifest(&config.locator, &config.platform, config.payload_offset)
            .with_context(|| format!("Failed to read the '{}' platform manifest", config.platform))?;
        log::debug!(
            "Manifest lists {} assets in {} bundles.",
            index.len(),
            platform.len()
        );

        let platform = Arc::new(platform);
        let source = PackBundleSource::new(config.locator.clone(), config.payload_offset)
            .with_manifest(Arc::clone(&platform));
        let lane = BundleLane::new(Arc::new(source), platform)
            .context("Failed to start the bundle loader thread")?;
        Ok(ResourceCache::bundled(Arc::new(index), Box::new(lane)))
    }

    fn editor_cache(config: &RuntimeConfig) -> ResourceCache {
        let oracle = MetaFileOracle::with_locator(config.locator.clone());
        let lane = EditorLane::with_locator(config.locator.clone());
        ResourceCache::editor(Arc::new(oracle), config.graph.clone(), Box::new(lane))
    }

    /// Acquires `asset` and its dependencies.
    ///
    /// A synchronous acquire returns once the payload is ready and
    /// `on_ready` has run. An asynchronous one returns a pending handle;
    /// `on_ready` runs from a later [`update`](Self::update).
    pub fn acquire<F>(
        &mut self,
        asset: impl Into<AssetId>,
        is_async: bool,
        on_ready: F,
    ) -> Result<ResourceHandle, CacheError>
    where
        F: FnOnce(&AssetId, Result<Payload, LoadError>) + Send + 'static,
    {
        let mode = if is_async { LoadMode::Async } else { LoadMode::Sync };
        self.cache.acquire(asset, mode, Some(Box::new(on_ready)))
    }

    /// Synchronous acquire without a callback.
    pub fn load(&mut self, asset: impl Into<AssetId>) -> Result<ResourceHandle, CacheError> {
        self.cache.acquire(asset, LoadMode::Sync, None)
    }

    pub fn release(&mut self, handle: ResourceHandle) -> Result<(), CacheError> {
        self.cache.release(handle)
    }

    pub fn status(&self, handle: &ResourceHandle) -> Result<ResourceStatus, CacheError> {
        self.cache.status(handle)
    }

    /// The payload behind `handle`, once it is ready.
    pub fn payload(&self, handle: &ResourceHandle) -> Option<Payload> {
        self.cache.payload(handle)
    }

    /// Instantiates the payload behind `handle`, optionally under `parent`.
    pub fn instantiate<I: Instantiator>(
        &self,
        handle: &ResourceHandle,
        instantiator: &I,
        parent: Option<&I::Parent>,
    ) -> Option<I::Instance> {
        self.cache.instantiate(handle, instantiator, parent)
    }

    /// Applies finished loads and runs the configured unload sweep. Call it
    /// once per frame.
    pub fn update(&mut self) {
        self.cache.update();
    }

    pub fn report_status(&self) -> AgentStatus {
        self.cache.report_status()
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn is_editor_mode(&self) -> bool {
        self.editor_mode
    }

    /// Releases everything and closes every bundle. Further calls are no-ops.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.cache.shutdown();
        log::info!("Resource system shut down.");
    }
}

impl Drop for ResourceSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}
