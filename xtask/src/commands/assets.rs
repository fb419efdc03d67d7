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

use crate::commands::assets_config::AssetsConfig;
use crate::helpers::*;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stowage_agents::BundleBuilder;
use stowage_core::asset::{AssetId, FileLocator};
use stowage_core::manifest::{decode_sections, Manifest};
use stowage_lanes::{
    read_manifest_bundle, read_platform_manifest, MetaFileOracle, PackWriter, RuleSet,
    META_EXTENSION,
};
use stowage_telemetry::{MetricValue, MetricsRegistry};
use walkdir::WalkDir;

/// Runs the whole bundle build described by `config_path`.
pub fn pack(config_path: &Path) -> Result<()> {
    print_task_start("Packing Assets", PACKAGE, MAGENTA);

    let config = AssetsConfig::load(config_path)?;
    let root = config.project.root.clone();
    if !root.is_dir() {
        print_error(&format!(
            "Asset root '{}' does not exist. Nothing to pack.",
            root.display()
        ));
        return Ok(());
    }
    if config.rules.is_empty() {
        print_error("No [[rule]] entries configured. Nothing to pack.");
        return Ok(());
    }

    let rules = RuleSet::new(config.rules.clone(), |scope| root.join(scope).is_dir())?;
    let candidates = find_asset_files(&root)?;
    println!(
        "{}🔎 Found:{} {} candidate files under '{}'.",
        BOLD,
        RESET,
        candidates.len(),
        root.display()
    );

    let registry = MetricsRegistry::new();
    let builder = BundleBuilder::new(Arc::new(MetaFileOracle::new(&root)), rules)
        .with_settings(config.graph_settings())
        .with_metrics(&registry);
    let seeds = builder.collect_seeds(&candidates);
    if seeds.is_empty() {
        print_success("No seed assets matched the rules.");
        return Ok(());
    }
    print_info(&format!("{} seed assets selected.", seeds.len()));

    let writer = PackWriter::new(&config.project.output, &config.project.platform, &root);
    let report = builder
        .build(seeds, &writer)
        .with_context(|| format!("Failed to pack project '{}'", config.project.name))?;

    print_field("Assets", report.assets);
    print_field("Bundles", report.bundles);
    print_field("Dependency chains", report.dependency_chains);
    print_field("Manifest size", format!("{} bytes", report.manifest_bytes));
    print_field("Platform", report.platform.platform());
    print_field("Output", writer.output().display());
    print_build_metrics(&registry);
    print_success(&format!(
        "Asset pipeline finished in {:.2}s.",
        report.duration.as_secs_f64()
    ));
    Ok(())
}

/// Decodes a built `manifest.ab` in `dir` and prints its tables.
pub fn inspect(dir: &Path, platform: Option<&str>, payload_offset: u64) -> Result<()> {
    print_task_start("Inspecting Build", MAGNIFIER, CYAN);

    let locator = locator(dir);
    let sections = read_manifest_bundle(&locator, payload_offset)
        .with_context(|| format!("Failed to open the manifest bundle in '{}'", dir.display()))?;
    let manifest = decode_sections(&sections.assets, &sections.bundles, &sections.dependencies)
        .context("Failed to decode the manifest")?;
    print_manifest(&manifest);

    if let Some(platform) = platform {
        let bundles = read_platform_manifest(&locator, platform, payload_offset)
            .with_context(|| format!("Failed to read the '{platform}' platform manifest"))?;
        println!("\n{}Bundle dependencies ({platform}):{}", BOLD, RESET);
        for (bundle, record) in bundles.iter() {
            let deps: Vec<&str> = record.dependencies.iter().map(|b| b.as_str()).collect();
            println!(
                "  {bundle} -> [{}]  {}",
                deps.join(", "),
                record.hash.as_deref().unwrap_or("(no hash)")
            );
        }
    }

    print_success("Manifest decoded.");
    Ok(())
}

fn print_build_metrics(registry: &MetricsRegistry) {
    for metric in registry.namespace_metrics("build") {
        let value = match &metric.value {
            MetricValue::Counter(count) => count.to_string(),
            MetricValue::Gauge(value) => format!("{value}"),
            MetricValue::Histogram { samples, .. } => match samples.last() {
                Some(last) => format!("{last:.2}"),
                None => "-".to_string(),
            },
        };
        print_field(&metric.description, format!("{value} {}", metric.unit));
    }
}

fn print_manifest(manifest: &Manifest) {
    println!("\n{}Assets ({}):{}", BOLD, manifest.assets().len(), RESET);
    for (id, asset) in manifest.assets().iter().enumerate() {
        println!("  {id:>5}  {asset}");
    }

    println!("\n{}Bundles ({}):{}", BOLD, manifest.bundles().len(), RESET);
    for bundle in manifest.bundles() {
        println!("  {}  {:?}", bundle.name, bundle.assets);
    }

    println!(
        "\n{}Dependency chains ({}):{}",
        BOLD,
        manifest.dependencies().len(),
        RESET
    );
    for chain in manifest.dependencies() {
        let name = |id: u16| {
            manifest
                .asset(id)
                .map(|asset| asset.as_str().to_string())
                .unwrap_or_else(|| format!("#{id}"))
        };
        let deps: Vec<String> = chain.dependencies.iter().map(|&id| name(id)).collect();
        println!("  {} -> {}", name(chain.owner), deps.join(", "));
    }
}

fn locator(dir: &Path) -> FileLocator {
    let dir = dir.to_path_buf();
    Arc::new(move |name: &str| dir.join(name))
}

/// Every file under `root` as an asset id relative to it, sidecars excluded.
fn find_asset_files(root: &Path) -> Result<Vec<AssetId>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("Failed to walk '{}'", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some(META_EXTENSION) {
            continue;
        }
        files.push(asset_id(root, path)?);
    }
    Ok(files)
}

fn asset_id(root: &Path, path: &Path) -> Result<AssetId> {
    let relative: PathBuf = path
        .strip_prefix(root)
        .with_context(|| format!("'{}' is outside '{}'", path.display(), root.display()))?
        .to_path_buf();
    let relative = relative
        .to_str()
        .with_context(|| format!("Invalid path encoding: '{}'", relative.display()))?;
    Ok(AssetId::new(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_asset_files_are_relative_and_skip_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("ui/menus")).unwrap();
        fs::write(dir.path().join("ui/menus/main.prefab"), b"x").unwrap();
        fs::write(dir.path().join("ui/menus/main.prefab.meta"), b"").unwrap();
        fs::write(dir.path().join("ui/atlas.png"), b"x").unwrap();

        let files = find_asset_files(dir.path()).unwrap();

        assert_eq!(
            files,
            vec![AssetId::new("ui/atlas.png"), AssetId::new("ui/menus/main.prefab")]
        );
    }

    #[test]
    fn test_pack_then_inspect() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("assets");
        fs::create_dir_all(root.join("ui")).unwrap();
        fs::create_dir_all(root.join("tex")).unwrap();
        fs::write(root.join("ui/main.prefab"), b"prefab").unwrap();
        fs::write(
            root.join("ui/main.prefab.meta"),
            "dependencies = [\"tex/atlas.png\"]\n",
        )
        .unwrap();
        fs::write(root.join("tex/atlas.png"), b"png").unwrap();
        let output = dir.path().join("out");
        let config = dir.path().join("Assets.toml");
        fs::write(
            &config,
            format!(
                "[project]\nroot = {:?}\nplatform = \"linux\"\noutput = {:?}\n\n\
                 [[rule]]\nscope = \"ui\"\n\n\
                 [[rule]]\nscope = \"tex\"\ntarget = \"dependency\"\ngranularity = \"all\"\n",
                root.display().to_string(),
                output.display().to_string()
            ),
        )
        .unwrap();

        pack(&config).unwrap();

        assert!(output.join("manifest.ab").is_file());
        assert!(output.join("ui/main.prefab.ab").is_file());
        assert!(output.join("tex.ab").is_file());
        inspect(&output, Some("linux"), 0).unwrap();
    }
}
