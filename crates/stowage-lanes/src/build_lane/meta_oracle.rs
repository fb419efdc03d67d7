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

use serde::Deserialize;
use stowage_core::asset::{AssetId, FileLocator};
use stowage_core::pipeline::{BoxedError, DependencyOracle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Extension of sidecar metadata files.
pub const META_EXTENSION: &str = "meta";

/// Contents of a `<asset>.meta` sidecar file.
#[derive(Debug, Default, Deserialize)]
struct MetaFile {
    #[serde(default)]
    dependencies: Vec<String>,
}

/// Errors raised while reading a sidecar file.
#[derive(Debug, Error)]
pub enum MetaError {
    /// The file exists but could not be read.
    #[error("failed to read '{path}': {source}")]
    Io {
        /// The sidecar path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The file is not valid TOML or has the wrong shape.
    #[error("failed to parse '{path}': {source}")]
    Parse {
        /// The sidecar path.
        path: PathBuf,
        /// The parser error.
        #[source]
        source: toml::de::Error,
    },
}

/// A [`DependencyOracle`] backed by sidecar metadata files.
///
/// For an asset `ui/root.prefab` it reads `ui/root.prefab.meta`:
///
/// ```toml
/// dependencies = ["ui/atlas.png", "shaders/ui.shader"]
/// ```
///
/// An asset without a sidecar has no dependencies.
#[derive(Clone)]
pub struct MetaFileOracle {
    locator: FileLocator,
}

impl MetaFileOracle {
    /// Reads sidecars relative to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            locator: Arc::new(move |name: &str| root.join(name)),
        }
    }

    /// Reads sidecars through a host file locator.
    pub fn with_locator(locator: FileLocator) -> Self {
        Self { locator }
    }

    /// Physical path of the sidecar for `asset`.
    pub fn meta_path(&self, asset: &AssetId) -> PathBuf {
        (self.locator)(&format!("{asset}.{META_EXTENSION}"))
    }
}

impl DependencyOracle for MetaFileOracle {
    fn direct_dependencies(&self, asset: &AssetId) -> Result<Vec<AssetId>, BoxedError> {
        let path = self.meta_path(asset);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(Box::new(MetaError::Io { path, source })),
        };
        let meta: MetaFile =
            toml::from_str(&text).map_err(|source| MetaError::Parse { path, source })?;
        Ok(meta.dependencies.into_iter().map(AssetId::new).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_reads_sidecar_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("ui")).unwrap();
        fs::write(
            dir.path().join("ui/root.prefab.meta"),
            "dependencies = [\"ui/atlas.png\", \"shaders\\\\ui.shader\"]\n",
        )
        .unwrap();

        let oracle = MetaFileOracle::new(dir.path());
        let deps = oracle
            .direct_dependencies(&AssetId::new("ui/root.prefab"))
            .unwrap();
        assert_eq!(
            deps,
            vec![AssetId::new("ui/atlas.png"), AssetId::new("shaders/ui.shader")]
        );
    }

    #[test]
    fn test_missing_sidecar_means_no_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = MetaFileOracle::new(dir.path());
        assert!(oracle
            .direct_dependencies(&AssetId::new("lonely.png"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_malformed_sidecar_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.png.meta"), "dependencies = 12").unwrap();
        let oracle = MetaFileOracle::new(dir.path());

        let err = oracle
            .direct_dependencies(&AssetId::new("bad.png"))
            .unwrap_err();
        assert!(err.to_string().contains("bad.png.meta"));
    }
}
