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

use anyhow::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use stowage_agents::BundleBuilder;
use stowage_lanes::{BundleGranularity, PackRule, PackWriter, RuleSet, RuleTarget};
use stowage_sdk::prelude::*;
use tempfile::tempdir;

// --- Test setup ---

fn id(s: &str) -> AssetId {
    AssetId::new(s)
}

fn write_sources(root: &Path) -> Result<()> {
    fs::create_dir_all(root.join("ui"))?;
    fs::create_dir_all(root.join("tex"))?;
    fs::write(root.join("ui/uiroot.prefab"), b"uiroot")?;
    fs::write(root.join("ui/testui.prefab"), b"testui")?;
    fs::write(root.join("tex/atlas.png"), vec![7u8; 1024])?;
    Ok(())
}

/// Packs `ui/*.prefab` (each in its own bundle) and `tex/` into `output`.
fn pack(sources: &Path, output: &Path) -> Result<()> {
    let oracle: BTreeMap<AssetId, Vec<AssetId>> = [
        (id("ui/uiroot.prefab"), vec![id("tex/atlas.png")]),
        (id("ui/testui.prefab"), vec![id("tex/atlas.png")]),
    ]
    .into_iter()
    .collect();
    let rules = RuleSet::new(
        vec![
            PackRule::new("ui", RuleTarget::Direct, BundleGranularity::File),
            PackRule::new("tex", RuleTarget::Dependency, BundleGranularity::All),
        ],
        |_| true,
    )?;
    let builder = BundleBuilder::new(Arc::new(oracle), rules);
    builder.build(
        [id("ui/uiroot.prefab"), id("ui/testui.prefab")],
        &PackWriter::new(output, "linux", sources),
    )?;
    Ok(())
}

type Seen = Arc<Mutex<Vec<(AssetId, Result<Payload, LoadError>)>>>;

fn recorder() -> (Seen, impl Fn() -> usize) {
    let seen: Seen = Arc::default();
    let count = {
        let seen = Arc::clone(&seen);
        move || seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    };
    (seen, count)
}

fn push(seen: &Seen) -> impl FnOnce(&AssetId, Result<Payload, LoadError>) + Send + 'static {
    let seen = Arc::clone(seen);
    move |asset, result| {
        seen.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((asset.clone(), result));
    }
}

fn pump_until(system: &mut ResourceSystem, done: impl Fn() -> bool) {
    for _ in 0..500 {
        system.update();
        if done() {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("loads did not finish in time");
}

struct Named;

impl Instantiator for Named {
    type Parent = String;
    type Instance = String;

    fn instantiate(
        &self,
        asset: &AssetId,
        payload: &Payload,
        parent: Option<&String>,
    ) -> Option<String> {
        let body = std::str::from_utf8(payload.bytes()).ok()?;
        Some(match parent {
            Some(parent) => format!("{parent}/{}:{body}", asset.file_name()),
            None => format!("{}:{body}", asset.file_name()),
        })
    }
}

// --- Tests ---

#[test]
fn test_bundled_async_acquire_and_instantiate() -> Result<()> {
    // --- Arrange ---
    let sources = tempdir()?;
    let output = tempdir()?;
    write_sources(sources.path())?;
    pack(sources.path(), output.path())?;
    let mut system = ResourceSystem::initialize(RuntimeConfig::from_root("linux", output.path()))?;
    let (seen, count) = recorder();

    // --- Act ---
    let root = system.acquire("ui/uiroot.prefab", true, push(&seen))?;
    assert_eq!(system.status(&root)?, ResourceStatus::Loading);
    pump_until(&mut system, || count() == 1);

    let child = system.acquire("ui/testui.prefab", true, push(&seen))?;
    pump_until(&mut system, || count() == 2);

    // --- Assert ---
    let parent = system.instantiate(&root, &Named, None);
    assert_eq!(parent.as_deref(), Some("uiroot.prefab:uiroot"));
    assert_eq!(
        system.instantiate(&child, &Named, parent.as_ref()).as_deref(),
        Some("uiroot.prefab:uiroot/testui.prefab:testui")
    );
    {
        let seen = seen.lock().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(seen[0].0, id("ui/uiroot.prefab"));
        assert_eq!(seen[1].0, id("ui/testui.prefab"));
        assert!(seen.iter().all(|(_, result)| result.is_ok()));
    }
    // Both prefabs share the one texture entry.
    assert_eq!(system.cache().ref_count(&id("tex/atlas.png")), 2);

    system.release(root)?;
    system.release(child)?;
    system.update();
    assert_eq!(system.cache().live_count(), 0);
    assert_eq!(system.metrics().counter_value("cache", "unloaded"), Some(3));
    Ok(())
}

#[test]
fn test_sync_load_with_payload_offset() -> Result<()> {
    // --- Arrange: every built file gets a 16 byte prefix ---
    let sources = tempdir()?;
    let output = tempdir()?;
    write_sources(sources.path())?;
    pack(sources.path(), output.path())?;
    for entry in fs::read_dir(output.path())? {
        let path = entry?.path();
        if path.is_file() {
            let mut bytes = vec![0xEE; 16];
            bytes.extend(fs::read(&path)?);
            fs::write(&path, bytes)?;
        }
    }
    let config = RuntimeConfig::from_root("linux", output.path()).with_payload_offset(16);

    // --- Act ---
    let mut system = ResourceSystem::initialize(config)?;
    let handle = system.load("ui/testui.prefab")?;

    // --- Assert ---
    assert_eq!(system.payload(&handle).as_deref(), Some(&b"testui"[..]));
    assert_eq!(system.status(&handle)?, ResourceStatus::Ready);
    Ok(())
}

#[test]
fn test_unknown_asset_is_rejected() -> Result<()> {
    let sources = tempdir()?;
    let output = tempdir()?;
    write_sources(sources.path())?;
    pack(sources.path(), output.path())?;
    let mut system = ResourceSystem::initialize(RuntimeConfig::from_root("linux", output.path()))?;

    let result = system.load("ui/missing.prefab");

    assert_eq!(result, Err(CacheError::UnknownAsset(id("ui/missing.prefab"))));
    Ok(())
}

#[test]
fn test_initialize_fails_without_a_build() {
    let empty = tempdir().expect("tempdir");

    let result = ResourceSystem::initialize(RuntimeConfig::from_root("linux", empty.path()));

    match result {
        Err(err) => assert!(format!("{err:#}").contains("manifest bundle")),
        Ok(_) => panic!("initialize must fail when manifest.ab is absent"),
    }
}

#[test]
fn test_editor_mode_reads_sources_and_sidecars() -> Result<()> {
    // --- Arrange ---
    let sources = tempdir()?;
    write_sources(sources.path())?;
    fs::write(
        sources.path().join("ui/uiroot.prefab.meta"),
        "dependencies = [\"tex/atlas.png\", \"scripts/ui.cs\"]\n",
    )?;
    let config = RuntimeConfig::from_root("editor", sources.path()).editor_mode(true);

    // --- Act ---
    let mut system = ResourceSystem::initialize(config)?;
    let handle = system.load("ui/uiroot.prefab")?;

    // --- Assert ---
    assert!(system.is_editor_mode());
    assert_eq!(system.payload(&handle).as_deref(), Some(&b"uiroot"[..]));
    assert_eq!(system.cache().ref_count(&id("tex/atlas.png")), 1);
    assert_eq!(system.cache().state_of(&id("scripts/ui.cs")), None);

    system.shutdown();
    assert_eq!(system.status(&handle)?, ResourceStatus::Unloaded);
    Ok(())
}
