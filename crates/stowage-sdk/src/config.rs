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

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use stowage_core::asset::FileLocator;
use stowage_lanes::GraphSettings;

/// Everything [`ResourceSystem::initialize`](crate::ResourceSystem::initialize)
/// needs to know. Chosen once at startup.
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Platform tag; also the file name of the platform manifest.
    pub platform: String,
    /// Resolves logical names (bundles, manifests, source assets) to files.
    pub locator: FileLocator,
    /// Load straight from source instead of from bundles.
    pub editor_mode: bool,
    /// Leading bytes skipped in every bundle and manifest file.
    pub payload_offset: u64,
    /// Most entries one `update()` may unload. `None` sweeps everything.
    pub sweep_budget: Option<usize>,
    /// Dependency filtering used in editor mode.
    pub graph: GraphSettings,
}

impl RuntimeConfig {
    /// A bundled-mode configuration using `locator` to find files.
    pub fn new(platform: impl Into<String>, locator: FileLocator) -> Self {
        Self {
            platform: platform.into(),
            locator,
            editor_mode: false,
            payload_offset: 0,
            sweep_budget: None,
            graph: GraphSettings::default(),
        }
    }

    /// A configuration whose locator joins every name onto `root`.
    pub fn from_root(platform: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self::new(platform, Arc::new(move |name: &str| root.join(name)))
    }

    pub fn editor_mode(mut self, enabled: bool) -> Self {
        self.editor_mode = enabled;
        self
    }

    pub fn with_payload_offset(mut self, offset: u64) -> Self {
        self.payload_offset = offset;
        self
    }

    pub fn with_sweep_budget(mut self, budget: Option<usize>) -> Self {
        self.sweep_budget = budget;
        self
    }

    pub fn with_graph_settings(mut self, graph: GraphSettings) -> Self {
        self.graph = graph;
        self
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("platform", &self.platform)
            .field("editor_mode", &self.editor_mode)
            .field("payload_offset", &self.payload_offset)
            .field("sweep_budget", &self.sweep_budget)
            .field("graph", &self.graph)
            .finish_non_exhaustive()
    }
}
