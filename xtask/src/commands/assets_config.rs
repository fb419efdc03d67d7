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

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use stowage_lanes::{GraphSettings, PackRule, DEFAULT_EXCLUDED_EXTENSIONS};

/// The structure of the `Assets.toml` build configuration.
///
/// ```toml
/// [project]
/// name = "demo"
/// root = "resources/assets"
/// platform = "linux"
/// output = ".dist/bundles"
///
/// [graph]
/// excluded_extensions = ["cs", "dll"]
///
/// [[rule]]
/// scope = "ui"
/// target = "direct"
/// granularity = "file"
/// suffixes = [".prefab"]
/// ```
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct AssetsConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    /// Packaging rules, in declaration order.
    #[serde(default, rename = "rule")]
    pub rules: Vec<PackRule>,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
    /// Directory holding the source assets. Asset ids are relative to it.
    pub root: PathBuf,
    /// Platform tag; names the platform manifest file.
    pub platform: String,
    /// Where bundles and manifests are written.
    pub output: PathBuf,
}

impl Default for ProjectConfig {
    /// Packs `resources/assets` into `.dist/bundles` for the host OS.
    fn default() -> Self {
        Self {
            name: "stowage".to_string(),
            root: PathBuf::from("resources/assets"),
            platform: std::env::consts::OS.to_string(),
            output: PathBuf::from(".dist/bundles"),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct GraphConfig {
    /// Extensions of identifiers that never enter a build.
    pub excluded_extensions: Vec<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            excluded_extensions: DEFAULT_EXCLUDED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl AssetsConfig {
    /// Loads `path`, or returns the default configuration if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!(
                "No '{}' found. Using default configuration.",
                path.display()
            );
            return Ok(Self::default());
        }
        log::info!("Found '{}'. Loading configuration.", path.display());
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read '{}'", path.display()))?;
        Self::parse(&text).with_context(|| format!("Failed to parse TOML from '{}'", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn graph_settings(&self) -> GraphSettings {
        GraphSettings {
            excluded_extensions: self.graph.excluded_extensions.clone(),
        }
    }
}
