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

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use stowage_agents::{CacheError, ResourceCache, ResourceState, ResourceStatus};
use stowage_core::agent::Agent;
use stowage_core::asset::{AssetId, BundleName, Instantiator, Payload};
use stowage_core::manifest::{BundleMap, DependencyMap, Manifest};
use stowage_core::BundleManifestIndex;
use stowage_lanes::{
    EditorLane, GraphSettings, LoadCompletion, LoadError, LoadMode, LoadRequest, LoadTicket,
    PayloadLane,
};
use stowage_telemetry::MetricsRegistry;

// --- Test setup: a payload lane whose async loads complete on demand ---

#[derive(Default)]
struct Script {
    payloads: HashMap<AssetId, Vec<u8>>,
    begun: Vec<AssetId>,
    unloaded: Vec<AssetId>,
    ready: VecDeque<LoadCompletion>,
    pending: Vec<(LoadTicket, LoadRequest)>,
    next: u64,
}

impl Script {
    fn result(&self, request: &LoadRequest) -> Result<Payload, LoadError> {
        self.payloads
            .get(&request.asset)
            .map(|bytes| Payload::new(bytes.clone()))
            .ok_or_else(|| LoadError::NotInBundle {
                asset: request.asset.clone(),
                bundle: request
                    .bundle
                    .clone()
                    .unwrap_or_else(|| BundleName::new("none")),
            })
    }
}

#[derive(Clone, Default)]
struct ScriptedLane(Arc<Mutex<Script>>);

impl ScriptedLane {
    fn with_payloads(assets: &[&str]) -> Self {
        let lane = Self::default();
        for asset in assets {
            lane.set_payload(asset, asset.as_bytes());
        }
        lane
    }

    fn set_payload(&self, asset: &str, bytes: &[u8]) {
        self.0
            .lock()
            .unwrap()
            .payloads
            .insert(AssetId::new(asset), bytes.to_vec());
    }

    /// Completes every async load started so far.
    fn finish_all(&self) {
        let mut script = self.0.lock().unwrap();
        let pending = std::mem::take(&mut script.pending);
        for (ticket, request) in pending {
            let result = script.result(&request);
            script.ready.push_back(LoadCompletion { ticket, result });
        }
    }

    fn begun(&self) -> Vec<AssetId> {
        self.0.lock().unwrap().begun.clone()
    }

    fn unloaded(&self) -> Vec<AssetId> {
        self.0.lock().unwrap().unloaded.clone()
    }
}

impl PayloadLane for ScriptedLane {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn begin(&mut self, request: LoadRequest) -> LoadTicket {
        let mut script = self.0.lock().unwrap();
        script.next += 1;
        let ticket = LoadTicket(script.next);
        script.begun.push(request.asset.clone());
        match request.mode {
            LoadMode::Sync => {
                let result = script.result(&request);
                script.ready.push_back(LoadCompletion { ticket, result });
            }
            LoadMode::Async => script.pending.push((ticket, request)),
        }
        ticket
    }

    fn poll(&mut self) -> Vec<LoadCompletion> {
        self.0.lock().unwrap().ready.drain(..).collect()
    }

    fn wait(&mut self, ticket: LoadTicket) -> LoadCompletion {
        let mut script = self.0.lock().unwrap();
        if let Some(index) = script.ready.iter().position(|c| c.ticket == ticket) {
            return script.ready.remove(index).unwrap();
        }
        if let Some(index) = script.pending.iter().position(|(t, _)| *t == ticket) {
            let (_, request) = script.pending.remove(index);
            let result = script.result(&request);
            return LoadCompletion { ticket, result };
        }
        LoadCompletion {
            ticket,
            result: Err(LoadError::UnknownTicket(ticket.0)),
        }
    }

    fn unload(&mut self, asset: &AssetId, _bundle: Option<&BundleName>) {
        self.0.lock().unwrap().unloaded.push(asset.clone());
    }

    fn in_flight(&self) -> usize {
        let script = self.0.lock().unwrap();
        script.ready.len() + script.pending.len()
    }
}

fn id(s: &str) -> AssetId {
    AssetId::new(s)
}

/// Builds an index where every asset lives in `bundle1.ab`.
fn index(deps: &[(&str, &[&str])], assets: &[&str]) -> Arc<BundleManifestIndex> {
    let mut bundles = BundleMap::new();
    bundles.insert(
        BundleName::new("bundle1.ab"),
        assets.iter().map(|a| id(a)).collect(),
    );
    let dependencies: DependencyMap = deps
        .iter()
        .map(|(owner, list)| (id(owner), list.iter().map(|d| id(d)).collect()))
        .collect();
    let manifest = Manifest::build(&bundles, &dependencies).unwrap();
    Arc::new(BundleManifestIndex::new(&manifest))
}

fn cache_with(lane: &ScriptedLane, deps: &[(&str, &[&str])], assets: &[&str]) -> ResourceCache {
    ResourceCache::bundled(index(deps, assets), Box::new(lane.clone()))
}

type Events = Arc<Mutex<Vec<String>>>;

fn recorder(events: &Events, tag: &'static str) -> stowage_agents::ReadyCallback {
    let events = events.clone();
    Box::new(move |asset, result| {
        let outcome = if result.is_ok() { "ok" } else { "err" };
        events.lock().unwrap().push(format!("{tag}:{asset}:{outcome}"));
    })
}

// --- Tests ---

#[test]
fn test_dependency_loads_first_and_sweep_cascades() {
    // --- Arrange ---
    let lane = ScriptedLane::with_payloads(&["A", "B"]);
    let mut cache = cache_with(&lane, &[("A", &["B"])], &["A", "B"]);

    // --- Act ---
    let handle = cache.acquire("A", LoadMode::Sync, None).unwrap();

    // --- Assert ---
    assert_eq!(lane.begun(), vec![id("B"), id("A")]);
    assert_eq!(cache.state_of(&id("A")), Some(ResourceState::Ready));
    assert_eq!(cache.state_of(&id("B")), Some(ResourceState::Ready));
    assert_eq!(cache.ref_count(&id("B")), 1);
    assert_eq!(cache.payload(&handle).unwrap().bytes(), b"A");

    cache.release(handle).unwrap();
    assert_eq!(cache.state_of(&id("A")), Some(ResourceState::PendingUnload));
    assert_eq!(cache.state_of(&id("B")), Some(ResourceState::Ready));

    assert_eq!(cache.sweep(), 2);
    assert_eq!(lane.unloaded(), vec![id("A"), id("B")]);
    assert_eq!(cache.live_count(), 0);
}

#[test]
fn test_single_flight_per_asset() {
    let lane = ScriptedLane::with_payloads(&["A", "B", "C"]);
    let mut cache = cache_with(&lane, &[("A", &["B"]), ("C", &["B"])], &["A", "B", "C"]);

    let a1 = cache.acquire("A", LoadMode::Async, None).unwrap();
    let a2 = cache.acquire("A", LoadMode::Async, None).unwrap();
    let c = cache.acquire("C", LoadMode::Async, None).unwrap();

    // B is shared and started once; A and C wait for it.
    assert_eq!(lane.begun(), vec![id("B")]);
    assert_eq!(cache.ref_count(&id("A")), 2);
    assert_eq!(cache.ref_count(&id("B")), 2);

    lane.finish_all();
    cache.update();
    assert_eq!(lane.begun(), vec![id("B"), id("A"), id("C")]);

    lane.finish_all();
    cache.update();
    for handle in [&a1, &a2, &c] {
        assert_eq!(cache.status(handle).unwrap(), ResourceStatus::Ready);
    }
    assert_eq!(lane.begun().len(), 3);
}

#[test]
fn test_callbacks_fire_in_request_order_after_dependencies() {
    let lane = ScriptedLane::with_payloads(&["A", "B"]);
    let mut cache = cache_with(&lane, &[("A", &["B"])], &["A", "B"]);
    let events = Events::default();

    let _first = cache
        .acquire("A", LoadMode::Async, Some(recorder(&events, "first")))
        .unwrap();
    let _dep = cache
        .acquire("B", LoadMode::Async, Some(recorder(&events, "dep")))
        .unwrap();
    let _second = cache
        .acquire("A", LoadMode::Async, Some(recorder(&events, "second")))
        .unwrap();
    assert!(events.lock().unwrap().is_empty());

    // Nothing happens until the owner polls.
    lane.finish_all();
    assert!(events.lock().unwrap().is_empty());
    cache.update();
    assert_eq!(*events.lock().unwrap(), vec!["dep:B:ok"]);
    assert_eq!(cache.state_of(&id("A")), Some(ResourceState::Loading));

    lane.finish_all();
    cache.update();
    assert_eq!(
        *events.lock().unwrap(),
        vec!["dep:B:ok", "first:A:ok", "second:A:ok"]
    );

    // A ready asset answers at once.
    let _third = cache
        .acquire("A", LoadMode::Async, Some(recorder(&events, "third")))
        .unwrap();
    assert_eq!(events.lock().unwrap().last().unwrap(), "third:A:ok");
}

#[test]
fn test_release_before_completion_parks_the_result() {
    let lane = ScriptedLane::with_payloads(&["A"]);
    let mut cache = cache_with(&lane, &[], &["A"]).with_sweep_budget(Some(0));

    let handle = cache.acquire("A", LoadMode::Async, None).unwrap();
    cache.release(handle).unwrap();
    assert_eq!(cache.state_of(&id("A")), Some(ResourceState::Loading));
    assert_eq!(cache.ref_count(&id("A")), 0);

    lane.finish_all();
    cache.update();
    assert_eq!(cache.state_of(&id("A")), Some(ResourceState::PendingUnload));
    assert_eq!(cache.sweep(), 1);
}

#[test]
fn test_reacquire_revives_pending_unload_without_reload() {
    let lane = ScriptedLane::with_payloads(&["A"]);
    let mut cache = cache_with(&lane, &[], &["A"]);

    let handle = cache.acquire("A", LoadMode::Sync, None).unwrap();
    cache.release(handle).unwrap();
    assert_eq!(cache.pending_unload_count(), 1);

    let again = cache.acquire("A", LoadMode::Sync, None).unwrap();
    assert_eq!(cache.state_of(&id("A")), Some(ResourceState::Ready));
    assert_eq!(cache.ref_count(&id("A")), 1);
    assert_eq!(lane.begun(), vec![id("A")]);

    // The stale queue entry must not unload the revived asset.
    assert_eq!(cache.sweep(), 0);
    assert!(cache.payload(&again).is_some());
}

#[test]
fn test_dependency_failure_fails_dependent_and_allows_retry() {
    let lane = ScriptedLane::with_payloads(&["A"]);
    let mut cache = cache_with(&lane, &[("A", &["B"])], &["A", "B"]);
    let events = Events::default();

    let err = cache
        .acquire("A", LoadMode::Sync, Some(recorder(&events, "cb")))
        .unwrap_err();
    assert_eq!(
        err,
        CacheError::Load(LoadError::Dependency {
            asset: id("A"),
            dependency: id("B"),
        })
    );
    assert!(!err.is_misuse());
    assert_eq!(*events.lock().unwrap(), vec!["cb:A:err"]);
    assert_eq!(cache.live_count(), 0);
    // A never started its own load.
    assert_eq!(lane.begun(), vec![id("B")]);

    lane.set_payload("B", b"B");
    let handle = cache.acquire("A", LoadMode::Sync, None).unwrap();
    assert_eq!(cache.status(&handle).unwrap(), ResourceStatus::Ready);
}

#[test]
fn test_async_failure_orphans_the_handle() {
    let lane = ScriptedLane::default();
    let mut cache = cache_with(&lane, &[], &["A"]);

    let handle = cache.acquire("A", LoadMode::Async, None).unwrap();
    lane.finish_all();
    cache.update();

    assert!(matches!(
        cache.status(&handle).unwrap(),
        ResourceStatus::Failed(LoadError::NotInBundle { .. })
    ));
    assert!(cache.payload(&handle).is_none());
    cache.release(handle).unwrap();
    assert_eq!(cache.report_status().health_score, 0.0);
}

#[test]
fn test_misuse_errors_are_distinct() {
    let lane = ScriptedLane::with_payloads(&["A"]);
    let mut cache = cache_with(&lane, &[], &["A"]);

    let unknown = cache.acquire("missing", LoadMode::Sync, None).unwrap_err();
    assert_eq!(unknown, CacheError::UnknownAsset(id("missing")));
    assert!(!unknown.is_misuse());

    let _pending = cache.acquire("A", LoadMode::Async, None).unwrap();
    let mismatch = cache.acquire("A", LoadMode::Sync, None).unwrap_err();
    assert!(matches!(mismatch, CacheError::ModeMismatch { .. }));
    assert!(mismatch.is_misuse());

    let other_lane = ScriptedLane::with_payloads(&["A"]);
    let mut other = cache_with(&other_lane, &[], &["A"]);
    let foreign = other.acquire("A", LoadMode::Sync, None).unwrap();
    let not_held = cache.release(foreign).unwrap_err();
    assert!(matches!(not_held, CacheError::NotHeld { .. }));
    assert!(not_held.is_misuse());
}

#[test]
fn test_cycles_load_and_unload() {
    let lane = ScriptedLane::with_payloads(&["A", "B"]);
    let mut cache = cache_with(&lane, &[("A", &["B"]), ("B", &["A"])], &["A", "B"]);

    let handle = cache.acquire("A", LoadMode::Sync, None).unwrap();
    assert_eq!(cache.state_of(&id("B")), Some(ResourceState::Ready));
    // The back-edge from B to A takes no reference.
    assert_eq!(cache.ref_count(&id("A")), 1);

    cache.release(handle).unwrap();
    assert_eq!(cache.sweep(), 2);
    assert_eq!(cache.live_count(), 0);
}

#[test]
fn test_budgeted_sweep_unloads_a_chain_over_several_updates() {
    let lane = ScriptedLane::with_payloads(&["A", "B", "C"]);
    let mut cache = cache_with(&lane, &[("A", &["B"]), ("B", &["C"])], &["A", "B", "C"])
        .with_sweep_budget(Some(1));

    let handle = cache.acquire("A", LoadMode::Sync, None).unwrap();
    cache.release(handle).unwrap();

    cache.update();
    assert_eq!(lane.unloaded(), vec![id("A")]);
    cache.update();
    cache.update();
    assert_eq!(lane.unloaded(), vec![id("A"), id("B"), id("C")]);
    assert_eq!(cache.live_count(), 0);
}

struct PrefabInstantiator;

impl Instantiator for PrefabInstantiator {
    type Parent = String;
    type Instance = String;

    fn instantiate(
        &self,
        asset: &AssetId,
        payload: &Payload,
        parent: Option<&String>,
    ) -> Option<String> {
        if !payload.starts_with(b"prefab") {
            return None;
        }
        Some(match parent {
            Some(parent) => format!("{parent}/{asset}"),
            None => asset.to_string(),
        })
    }
}

#[test]
fn test_instantiate_defers_to_the_host() {
    let lane = ScriptedLane::default();
    lane.set_payload("ui/root.prefab", b"prefab:root");
    lane.set_payload("ui/atlas.png", b"\x89PNG");
    let mut cache = cache_with(&lane, &[], &["ui/atlas.png", "ui/root.prefab"]);

    let root = cache.acquire("ui/root.prefab", LoadMode::Sync, None).unwrap();
    let atlas = cache.acquire("ui/atlas.png", LoadMode::Sync, None).unwrap();

    let canvas = "canvas".to_string();
    assert_eq!(
        cache.instantiate(&root, &PrefabInstantiator, Some(&canvas)),
        Some("canvas/ui/root.prefab".to_string())
    );
    assert_eq!(cache.instantiate(&atlas, &PrefabInstantiator, None), None);
}

#[test]
fn test_shutdown_finishes_loads_and_orphans_handles() {
    let lane = ScriptedLane::with_payloads(&["A", "B"]);
    let mut cache = cache_with(&lane, &[("A", &["B"])], &["A", "B"]);

    let handle = cache.acquire("A", LoadMode::Async, None).unwrap();
    cache.shutdown();

    assert_eq!(cache.live_count(), 0);
    assert_eq!(cache.in_flight_count(), 0);
    assert_eq!(cache.status(&handle).unwrap(), ResourceStatus::Unloaded);
    let mut unloaded = lane.unloaded();
    unloaded.sort();
    assert_eq!(unloaded, vec![id("A"), id("B")]);
    cache.release(handle).unwrap();
}

#[test]
fn test_metrics_and_status_report() {
    let registry = MetricsRegistry::new();
    let lane = ScriptedLane::with_payloads(&["A", "B"]);
    let mut cache = cache_with(&lane, &[("A", &["B"])], &["A", "B"]).with_metrics(&registry);

    let a = cache.acquire("A", LoadMode::Sync, None).unwrap();
    let b = cache.acquire("B", LoadMode::Sync, None).unwrap();
    cache.release(a).unwrap();
    cache.release(b).unwrap();
    cache.sweep();

    assert_eq!(registry.counter_value("cache", "loads_started"), Some(2));
    assert_eq!(registry.counter_value("cache", "hits"), Some(1));
    assert_eq!(registry.counter_value("cache", "unloaded"), Some(2));
    assert_eq!(registry.gauge_value("cache", "resident"), Some(0.0));

    let status = cache.report_status();
    assert_eq!(status.agent, "resource_cache");
    assert_eq!(status.health_score, 1.0);
    assert!(status.message.contains("live=0"));
}

#[test]
fn test_editor_mode_reads_sources_and_filters_code_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("ui")).unwrap();
    std::fs::write(dir.path().join("ui/root.prefab"), b"root").unwrap();
    std::fs::write(dir.path().join("ui/atlas.png"), b"atlas").unwrap();

    let oracle: HashMap<AssetId, Vec<AssetId>> = [(
        id("ui/root.prefab"),
        vec![id("ui/atlas.png"), id("Scripts/Root.cs")],
    )]
    .into_iter()
    .collect();
    let mut cache = ResourceCache::editor(
        Arc::new(oracle),
        GraphSettings::default(),
        Box::new(EditorLane::new(dir.path())),
    );

    let handle = cache.acquire("ui/root.prefab", LoadMode::Sync, None).unwrap();
    assert_eq!(cache.payload(&handle).unwrap().bytes(), b"root");
    assert_eq!(cache.state_of(&id("ui/atlas.png")), Some(ResourceState::Ready));
    assert_eq!(cache.state_of(&id("Scripts/Root.cs")), None);
    assert_eq!(cache.live_count(), 2);
}
