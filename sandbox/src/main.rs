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

// Stowage Sandbox
// Packs a small UI asset tree, then loads it back the way a game would.

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use stowage_agents::BundleBuilder;
use stowage_lanes::{BundleGranularity, MetaFileOracle, PackRule, PackWriter, RuleSet, RuleTarget};
use stowage_sdk::prelude::*;

const PLATFORM: &str = "sandbox";
const UI_ROOT: &str = "ui/uiroot.prefab";
const TEST_UI: &str = "ui/testui.prefab";

/// A scene node built from a prefab payload.
#[derive(Debug, Clone)]
struct UiNode {
    path: String,
    bytes: usize,
}

struct UiInstantiator;

impl Instantiator for UiInstantiator {
    type Parent = UiNode;
    type Instance = UiNode;

    fn instantiate(
        &self,
        asset: &AssetId,
        payload: &Payload,
        parent: Option<&UiNode>,
    ) -> Option<UiNode> {
        // Only prefabs are instantiable.
        if asset.extension() != Some("prefab") {
            return None;
        }
        let name = asset.file_name().trim_end_matches(".prefab");
        let path = match parent {
            Some(parent) => format!("{}/{name}", parent.path),
            None => format!("/{name}"),
        };
        Some(UiNode {
            path,
            bytes: payload.len(),
        })
    }
}

type Loaded = (AssetId, Result<Payload, LoadError>);

fn notify(tx: &Sender<Loaded>) -> impl FnOnce(&AssetId, Result<Payload, LoadError>) + Send + 'static {
    let tx = tx.clone();
    move |asset, result| {
        // The receiver lives for the whole frame loop.
        let _ = tx.send((asset.clone(), result));
    }
}

fn write_sources(root: &Path) -> Result<()> {
    let files: [(&str, &[u8]); 6] = [
        (UI_ROOT, b"canvas { layer: 0 }"),
        (TEST_UI, b"panel { title: \"Test UI\" }"),
        ("ui/fonts/main.ttf", &[0x00, 0x01, 0x00, 0x00]),
        ("ui/atlas.png", &[0x89, b'P', b'N', b'G']),
        ("ui/uiroot.prefab.meta", b"dependencies = [\"ui/atlas.png\", \"scripts/ui_root.cs\"]\n"),
        ("ui/testui.prefab.meta", b"dependencies = [\"ui/atlas.png\", \"ui/fonts/main.ttf\"]\n"),
    ];
    for (name, bytes) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes).with_context(|| format!("Failed to write '{}'", path.display()))?;
    }
    Ok(())
}

fn pack(sources: &Path, output: &Path) -> Result<()> {
    // Prefabs get a bundle each; fonts share one; the atlas gets its own.
    let rules = RuleSet::new(
        vec![
            PackRule::new("ui", RuleTarget::Direct, BundleGranularity::File)
                .with_suffixes([".prefab"]),
            PackRule::new("ui/fonts", RuleTarget::Dependency, BundleGranularity::All),
            PackRule::new("ui/atlas.png", RuleTarget::Dependency, BundleGranularity::File),
        ],
        |scope| sources.join(scope).is_dir(),
    )?;

    let builder = BundleBuilder::new(Arc::new(MetaFileOracle::new(sources)), rules);
    let seeds = [AssetId::new(UI_ROOT), AssetId::new(TEST_UI)];
    let report = builder.build(seeds, &PackWriter::new(output, PLATFORM, sources))?;
    log::info!(
        "Packed {} assets into {} bundles ({} dependency chains).",
        report.assets,
        report.bundles,
        report.dependency_chains
    );
    Ok(())
}

/// Pumps the system until `rx` yields a load result.
fn wait_for(system: &mut ResourceSystem, rx: &Receiver<Loaded>) -> Result<Loaded> {
    for _ in 0..1000 {
        system.update();
        if let Ok(loaded) = rx.try_recv() {
            return Ok(loaded);
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    anyhow::bail!("timed out waiting for a load to finish")
}

fn run(output: &Path) -> Result<()> {
    let config = RuntimeConfig::from_root(PLATFORM, output).with_sweep_budget(Some(8));
    let mut system = ResourceSystem::initialize(config)?;
    let (tx, rx) = crossbeam_channel::unbounded();

    // The child is only requested once the root has finished loading.
    let root = system.acquire(UI_ROOT, true, notify(&tx))?;
    log::info!("Requested {root}: {:?}", system.status(&root)?);

    let (asset, result) = wait_for(&mut system, &rx)?;
    result.with_context(|| format!("Failed to load '{asset}'"))?;
    let root_node = system
        .instantiate(&root, &UiInstantiator, None)
        .context("uiroot is not instantiable")?;
    log::info!("Instantiated {} ({} bytes).", root_node.path, root_node.bytes);

    let child = system.acquire(TEST_UI, true, notify(&tx))?;
    let (asset, result) = wait_for(&mut system, &rx)?;
    result.with_context(|| format!("Failed to load '{asset}'"))?;
    let child_node = system
        .instantiate(&child, &UiInstantiator, Some(&root_node))
        .context("testui is not instantiable")?;
    log::info!("Instantiated {} ({} bytes).", child_node.path, child_node.bytes);

    // A second request for a ready asset is served at once.
    let again = system.acquire(TEST_UI, true, notify(&tx))?;
    let (asset, _) = rx.recv_timeout(Duration::from_millis(10))?;
    log::info!("'{asset}' was already resident.");

    let status = system.report_status();
    log::info!("{}: {}", status.agent, status.message);

    for handle in [again, child, root] {
        system.release(handle)?;
    }
    system.update();
    let status = system.report_status();
    log::info!("After release: {}", status.message);

    system.shutdown();
    Ok(())
}

fn main() -> Result<()> {
    stowage_telemetry::init_logging("info");

    let workspace = tempfile::tempdir().context("Failed to create a scratch directory")?;
    let sources = workspace.path().join("assets");
    let output = workspace.path().join("bundles");
    write_sources(&sources)?;
    pack(&sources, &output)?;
    run(&output)
}
