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

//! The `ResourceCache`: reference counting, dependency ordering, and deferred
//! eviction on top of a single [`PayloadLane`].

use super::entry::{Entry, Orphan};
use super::metrics::CacheMetrics;
use super::{CacheError, ReadyCallback, ResourceHandle, ResourceState, ResourceStatus};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use stowage_core::agent::{Agent, AgentStatus};
use stowage_core::asset::{AssetId, BundleName, Instantiator, Payload};
use stowage_core::index::BundleManifestIndex;
use stowage_core::pipeline::DependencyOracle;
use stowage_lanes::{
    GraphSettings, LoadCompletion, LoadError, LoadMode, LoadRequest, LoadTicket, PayloadLane,
};
use stowage_telemetry::MetricsRegistry;

/// Where the cache learns an asset's bundle and dependencies.
enum Resolver {
    /// Packed build: the decoded manifest.
    Index(Arc<BundleManifestIndex>),
    /// Editor mode: a dependency oracle, filtered like the build graph.
    Oracle {
        oracle: Arc<dyn DependencyOracle>,
        settings: GraphSettings,
    },
}

impl Resolver {
    fn resolve(&self, asset: &AssetId) -> Result<(Option<BundleName>, Vec<AssetId>), CacheError> {
        match self {
            Resolver::Index(index) => {
                let bundle = index
                    .bundle_of(asset)
                    .ok_or_else(|| CacheError::UnknownAsset(asset.clone()))?;
                Ok((Some(bundle.clone()), index.dependencies_of(asset).to_vec()))
            }
            Resolver::Oracle { oracle, settings } => {
                let raw = oracle.direct_dependencies(asset).map_err(|e| LoadError::Lookup {
                    asset: asset.clone(),
                    reason: e.to_string(),
                })?;
                Ok((None, settings.filter_dependencies(asset, raw)))
            }
        }
    }
}

/// Handle tickets are unique across every cache in the process.
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default, Clone, Copy)]
struct CacheStats {
    loads_completed: u64,
    load_failures: u64,
}

/// A keyed, reference-counted, dependency-aware cache of loaded assets.
///
/// At most one load per asset is ever in flight, however many callers or
/// dependents ask for it. An asset's dependencies are always `Ready` before
/// the asset's own load begins. Unreferenced assets linger in a
/// pending-unload queue until [`sweep`](Self::sweep) (or the budgeted sweep in
/// [`update`](Self::update)) unloads them.
pub struct ResourceCache {
    resolver: Resolver,
    lane: Box<dyn PayloadLane>,
    entries: HashMap<AssetId, Entry>,
    in_flight: HashMap<LoadTicket, AssetId>,
    pending_unload: VecDeque<AssetId>,
    orphans: HashMap<u64, Orphan>,
    sweep_budget: Option<usize>,
    metrics: CacheMetrics,
    stats: CacheStats,
}

impl ResourceCache {
    /// Creates a cache for a packed build.
    pub fn bundled(index: Arc<BundleManifestIndex>, lane: Box<dyn PayloadLane>) -> Self {
        Self::with_resolver(Resolver::Index(index), lane)
    }

    /// Creates a cache that reads straight from source (editor mode).
    pub fn editor(
        oracle: Arc<dyn DependencyOracle>,
        settings: GraphSettings,
        lane: Box<dyn PayloadLane>,
    ) -> Self {
        Self::with_resolver(Resolver::Oracle { oracle, settings }, lane)
    }

    fn with_resolver(resolver: Resolver, lane: Box<dyn PayloadLane>) -> Self {
        log::info!("Resource cache created with the '{}' lane.", lane.name());
        Self {
            resolver,
            lane,
            entries: HashMap::new(),
            in_flight: HashMap::new(),
            pending_unload: VecDeque::new(),
            orphans: HashMap::new(),
            sweep_budget: None,
            metrics: CacheMetrics::default(),
            stats: CacheStats::default(),
        }
    }

    /// Records cache metrics into `registry`.
    pub fn with_metrics(mut self, registry: &MetricsRegistry) -> Self {
        self.metrics = CacheMetrics::register(registry);
        self
    }

    /// Caps how many entries one [`update`](Self::update) may unload.
    /// `None` means no cap.
    pub fn with_sweep_budget(mut self, budget: Option<usize>) -> Self {
        self.sweep_budget = budget;
        self
    }

    /// Acquires `asset` and, first, all of its dependencies.
    ///
    /// With [`LoadMode::Sync`] this blocks until the whole dependency subtree
    /// is ready; `on_ready` has run by the time it returns. With
    /// [`LoadMode::Async`] it returns a pending handle at once and `on_ready`
    /// runs from a later [`update`](Self::update), or immediately if the asset
    /// is already ready.
    ///
    /// Errors detected before any load starts (unknown asset, mode mismatch,
    /// failed dependency lookup) are returned without running `on_ready`. A
    /// synchronous load failure runs `on_ready` with the error and returns it.
    pub fn acquire(
        &mut self,
        asset: impl Into<AssetId>,
        mode: LoadMode,
        on_ready: Option<ReadyCallback>,
    ) -> Result<ResourceHandle, CacheError> {
        let asset = asset.into();
        let existing = self.entries.get(&asset).map(|entry| (entry.state, entry.mode));
        if let Some((ResourceState::Loading, in_flight)) = existing {
            if in_flight != mode {
                return Err(CacheError::ModeMismatch {
                    asset,
                    in_flight,
                    requested: mode,
                });
            }
        }

        self.retain(&asset, mode, &mut Vec::new())?;
        if existing.is_some() {
            self.metrics.hit();
        }

        let ticket = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
        let entry = self
            .entries
            .get_mut(&asset)
            .ok_or_else(|| CacheError::UnknownAsset(asset.clone()))?;
        entry.holders.insert(ticket);
        if let Some(callback) = on_ready {
            match (&entry.state, &entry.payload) {
                (ResourceState::Ready, Some(payload)) => callback(&asset, Ok(payload.clone())),
                _ => entry.callbacks.push(callback),
            }
        }

        if mode == LoadMode::Sync {
            self.drive(&asset);
            if !self.is_ready(&asset) {
                let error = match self.orphans.remove(&ticket) {
                    Some(Orphan::Failed(error)) => error,
                    _ => {
                        // Stuck rather than failed: give the reference back.
                        if let Some(entry) = self.entries.get_mut(&asset) {
                            entry.holders.remove(&ticket);
                        }
                        self.drop_ref(&asset);
                        LoadError::Disconnected
                    }
                };
                return Err(CacheError::Load(error));
            }
        }

        Ok(ResourceHandle { asset, ticket })
    }

    /// Takes one reference to `asset`, creating its entry (and acquiring its
    /// dependencies) if it has none.
    ///
    /// `stack` holds the entries being created further up this call chain;
    /// a dependency on one of them is a cycle back-edge and takes no reference.
    fn retain(
        &mut self,
        asset: &AssetId,
        mode: LoadMode,
        stack: &mut Vec<AssetId>,
    ) -> Result<(), CacheError> {
        if let Some(entry) = self.entries.get_mut(asset) {
            match entry.state {
                ResourceState::Loading | ResourceState::Ready => entry.refs += 1,
                ResourceState::PendingUnload => {
                    entry.state = ResourceState::Ready;
                    entry.refs = 1;
                    log::debug!("'{asset}' revived from pending unload.");
                }
            }
            return Ok(());
        }

        let (bundle, dependencies) = self.resolver.resolve(asset)?;
        self.entries
            .insert(asset.clone(), Entry::loading(bundle, mode));
        log::debug!("'{asset}' is loading ({} dependencies).", dependencies.len());

        stack.push(asset.clone());
        let mut held: Vec<AssetId> = Vec::with_capacity(dependencies.len());
        let mut pending = 0;
        for dep in dependencies {
            if &dep == asset || stack.contains(&dep) || held.contains(&dep) {
                continue;
            }
            if let Err(err) = self.retain(&dep, mode, stack) {
                log::warn!("'{asset}' cannot load: dependency '{dep}' failed: {err}");
                stack.pop();
                self.abandon(asset, &held);
                return Err(CacheError::Load(LoadError::Dependency {
                    asset: asset.clone(),
                    dependency: dep,
                }));
            }
            if let Some(dep_entry) = self.entries.get_mut(&dep) {
                if dep_entry.is_loading() {
                    dep_entry.dependents.push(asset.clone());
                    pending += 1;
                }
            }
            held.push(dep);
        }
        stack.pop();

        if let Some(entry) = self.entries.get_mut(asset) {
            entry.deps = held;
            entry.pending_deps = pending;
        }
        if pending == 0 {
            self.begin_load(asset);
        }
        Ok(())
    }

    /// Undoes a half-built entry whose dependency could not be acquired.
    fn abandon(&mut self, asset: &AssetId, held: &[AssetId]) {
        for dep in held {
            if let Some(dep_entry) = self.entries.get_mut(dep) {
                dep_entry.dependents.retain(|dependent| dependent != asset);
            }
            self.drop_ref(dep);
        }
        self.entries.remove(asset);
    }

    fn begin_load(&mut self, asset: &AssetId) {
        let Some(entry) = self.entries.get_mut(asset) else {
            return;
        };
        let ticket = self.lane.begin(LoadRequest {
            asset: asset.clone(),
            bundle: entry.bundle.clone(),
            mode: entry.mode,
        });
        entry.load = Some(ticket);
        self.in_flight.insert(ticket, asset.clone());
        self.metrics.load_started();
        log::trace!("Load {ticket} started for '{asset}'.");
    }

    /// Blocks until `asset` is no longer loading (ready or failed).
    fn drive(&mut self, asset: &AssetId) {
        loop {
            let Some(entry) = self.entries.get(asset) else {
                return;
            };
            if !entry.is_loading() {
                return;
            }

            if let Some(ticket) = entry.load {
                let completion = self.lane.wait(ticket);
                self.complete(completion);
                continue;
            }

            let next = entry
                .deps
                .iter()
                .find(|dep| self.entries.get(*dep).is_some_and(Entry::is_loading))
                .cloned();
            match next {
                Some(dep) => self.drive(&dep),
                None => {
                    log::error!("'{asset}' is waiting on dependencies that are not loading.");
                    return;
                }
            }
        }
    }

    fn is_ready(&self, asset: &AssetId) -> bool {
        self.entries
            .get(asset)
            .is_some_and(|entry| entry.state == ResourceState::Ready)
    }

    /// Applies one lane completion.
    fn complete(&mut self, completion: LoadCompletion) {
        let Some(asset) = self.in_flight.remove(&completion.ticket) else {
            log::warn!("Ignoring completion of unknown load {}.", completion.ticket);
            return;
        };
        match completion.result {
            Ok(payload) => self.mark_ready(&asset, payload),
            Err(error) => self.fail(&asset, error),
        }
    }

    fn mark_ready(&mut self, asset: &AssetId, payload: Payload) {
        let Some(entry) = self.entries.get_mut(asset) else {
            return;
        };
        entry.load = None;
        entry.payload = Some(payload.clone());
        let elapsed_ms = entry.started.elapsed().as_secs_f64() * 1000.0;
        if entry.refs == 0 {
            entry.state = ResourceState::PendingUnload;
            self.pending_unload.push_back(asset.clone());
            log::debug!("'{asset}' is ready but unreferenced; pending unload.");
        } else {
            entry.state = ResourceState::Ready;
            log::debug!("'{asset}' is ready ({elapsed_ms:.2} ms).");
        }
        let callbacks = std::mem::take(&mut entry.callbacks);
        let dependents = std::mem::take(&mut entry.dependents);
        self.stats.loads_completed += 1;
        self.metrics.loaded(elapsed_ms);

        for callback in callbacks {
            callback(asset, Ok(payload.clone()));
        }

        for dependent in dependents {
            let start = match self.entries.get_mut(&dependent) {
                Some(entry) if entry.is_loading() => {
                    entry.pending_deps = entry.pending_deps.saturating_sub(1);
                    entry.pending_deps == 0 && entry.load.is_none()
                }
                _ => false,
            };
            if start {
                self.begin_load(&dependent);
            }
        }
    }

    /// Removes a failed entry and everything waiting on it.
    ///
    /// The asset returns to unrequested, so a later acquire retries it.
    fn fail(&mut self, asset: &AssetId, error: LoadError) {
        let Some(entry) = self.entries.remove(asset) else {
            return;
        };
        if let Some(ticket) = entry.load {
            self.in_flight.remove(&ticket);
        }
        log::warn!("Load of '{asset}' failed: {error}");
        self.stats.load_failures += 1;
        self.metrics.load_failed();

        for ticket in entry.holders {
            self.orphans.insert(ticket, Orphan::Failed(error.clone()));
        }
        for dep in &entry.deps {
            if let Some(dep_entry) = self.entries.get_mut(dep) {
                dep_entry.dependents.retain(|dependent| dependent != asset);
            }
            self.drop_ref(dep);
        }
        for callback in entry.callbacks {
            callback(asset, Err(error.clone()));
        }
        for dependent in entry.dependents {
            let cause = LoadError::Dependency {
                asset: dependent.clone(),
                dependency: asset.clone(),
            };
            self.fail(&dependent, cause);
        }
    }

    fn drop_ref(&mut self, asset: &AssetId) {
        let Some(entry) = self.entries.get_mut(asset) else {
            return;
        };
        if entry.refs == 0 {
            log::warn!("Reference count of '{asset}' would go negative; ignoring.");
            return;
        }
        entry.refs -= 1;
        if entry.refs == 0 && entry.state == ResourceState::Ready {
            entry.state = ResourceState::PendingUnload;
            self.pending_unload.push_back(asset.clone());
            log::debug!("'{asset}' is pending unload.");
        }
    }

    /// Releases a handle.
    ///
    /// Handles of failed loads (and handles that outlived a shutdown) release
    /// without effect.
    pub fn release(&mut self, handle: ResourceHandle) -> Result<(), CacheError> {
        if self.orphans.remove(&handle.ticket).is_some() {
            return Ok(());
        }
        let held = self
            .entries
            .get_mut(&handle.asset)
            .is_some_and(|entry| entry.holders.remove(&handle.ticket));
        if !held {
            return Err(CacheError::NotHeld {
                asset: handle.asset,
                ticket: handle.ticket,
            });
        }
        self.drop_ref(&handle.asset);
        Ok(())
    }

    /// Reports what `handle` currently points at.
    pub fn status(&self, handle: &ResourceHandle) -> Result<ResourceStatus, CacheError> {
        match self.orphans.get(&handle.ticket) {
            Some(Orphan::Failed(error)) => return Ok(ResourceStatus::Failed(error.clone())),
            Some(Orphan::ShutDown) => return Ok(ResourceStatus::Unloaded),
            None => {}
        }
        match self.entries.get(&handle.asset) {
            Some(entry) if entry.holders.contains(&handle.ticket) => Ok(match entry.state {
                ResourceState::Loading => ResourceStatus::Loading,
                _ => ResourceStatus::Ready,
            }),
            _ => Err(CacheError::NotHeld {
                asset: handle.asset.clone(),
                ticket: handle.ticket,
            }),
        }
    }

    /// The payload behind `handle`; `None` while loading or after a failure.
    pub fn payload(&self, handle: &ResourceHandle) -> Option<Payload> {
        self.entries
            .get(&handle.asset)
            .filter(|entry| entry.holders.contains(&handle.ticket))
            .and_then(|entry| entry.payload.clone())
    }

    /// Hands the payload behind `handle` to `instantiator`.
    ///
    /// Returns `None` while the payload is not available, or when the
    /// instantiator declines it.
    pub fn instantiate<I: Instantiator>(
        &self,
        handle: &ResourceHandle,
        instantiator: &I,
        parent: Option<&I::Parent>,
    ) -> Option<I::Instance> {
        let payload = self.payload(handle)?;
        instantiator.instantiate(&handle.asset, &payload, parent)
    }

    /// Current state of `asset`, if it has an entry.
    pub fn state_of(&self, asset: &AssetId) -> Option<ResourceState> {
        self.entries.get(asset).map(|entry| entry.state)
    }

    /// Current reference count of `asset`; 0 without an entry.
    pub fn ref_count(&self, asset: &AssetId) -> usize {
        self.entries.get(asset).map_or(0, |entry| entry.refs)
    }

    /// Number of assets with an entry, in any state.
    pub fn live_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of entries waiting for a sweep.
    pub fn pending_unload_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.state == ResourceState::PendingUnload)
            .count()
    }

    /// Number of payload loads in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Applies finished loads, then runs a sweep within the configured budget.
    pub fn update(&mut self) {
        for completion in self.lane.poll() {
            self.complete(completion);
        }
        self.sweep_with_budget(self.sweep_budget);
    }

    /// Unloads every unreferenced entry, cascading into dependencies that
    /// become unreferenced along the way. Returns how many were unloaded.
    pub fn sweep(&mut self) -> usize {
        self.sweep_with_budget(None)
    }

    fn sweep_with_budget(&mut self, budget: Option<usize>) -> usize {
        let mut unloaded = 0;
        while budget.map_or(true, |budget| unloaded < budget) {
            let Some(asset) = self.pending_unload.pop_front() else {
                break;
            };
            // The queue may hold stale names of revived or already unloaded entries.
            let eligible = self.entries.get(&asset).is_some_and(|entry| {
                entry.state == ResourceState::PendingUnload && entry.refs == 0
            });
            if !eligible {
                continue;
            }
            let Some(entry) = self.entries.remove(&asset) else {
                continue;
            };
            self.lane.unload(&asset, entry.bundle.as_ref());
            for dep in &entry.deps {
                self.drop_ref(dep);
            }
            log::debug!("'{asset}' unloaded.");
            unloaded += 1;
        }

        if unloaded > 0 {
            self.metrics.unloaded(unloaded);
            log::info!(
                "Sweep unloaded {unloaded} resource(s); {} pending.",
                self.pending_unload_count()
            );
        }
        unloaded
    }

    /// Finishes every load in flight, then unloads everything.
    ///
    /// Outstanding handles report [`ResourceStatus::Unloaded`] and release
    /// without effect.
    pub fn shutdown(&mut self) {
        while let Some(&ticket) = self.in_flight.keys().next() {
            let completion = self.lane.wait(ticket);
            self.complete(LoadCompletion {
                ticket,
                result: completion.result,
            });
        }

        let count = self.entries.len();
        for (asset, entry) in self.entries.drain() {
            if entry.payload.is_some() {
                self.lane.unload(&asset, entry.bundle.as_ref());
            }
            for ticket in entry.holders {
                self.orphans.insert(ticket, Orphan::ShutDown);
            }
            for callback in entry.callbacks {
                callback(&asset, Err(LoadError::Disconnected));
            }
        }
        self.pending_unload.clear();
        self.lane.shutdown();
        self.metrics.unloaded(count);
        log::info!("Resource cache shut down; {count} resource(s) unloaded.");
    }
}

impl Agent for ResourceCache {
    fn name(&self) -> &'static str {
        "resource_cache"
    }

    fn update(&mut self) {
        ResourceCache::update(self);
    }

    fn report_status(&self) -> AgentStatus {
        let finished = self.stats.loads_completed + self.stats.load_failures;
        let health_score = if finished == 0 {
            1.0
        } else {
            self.stats.loads_completed as f32 / finished as f32
        };
        AgentStatus {
            agent: self.name(),
            health_score,
            is_stalled: false,
            message: format!(
                "live={} pending_unload={} in_flight={} failures={}",
                self.live_count(),
                self.pending_unload_count(),
                self.in_flight_count(),
                self.stats.load_failures
            ),
        }
    }
}
