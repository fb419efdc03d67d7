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

use super::{write_bundle, PackError};
use stowage_core::asset::FileLocator;
use stowage_core::manifest::{
    BundleDependencyManifest, BundleMap, DependencyMap, ManifestSections, BUNDLE_ENTRY,
    DEPENDENCY_ENTRY, MANIFEST_BUNDLE, RESOURCE_ENTRY,
};
use stowage_core::pipeline::{BoxedError, PackagingBackend};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The reference [`PackagingBackend`]: writes bundle files to a directory.
///
/// For each bundle it writes `<output>/<bundle name>`; alongside them it
/// writes the manifest bundle ([`MANIFEST_BUNDLE`]) holding the three
/// manifest sections, and a platform manifest file named after the platform
/// tag holding the bundle-level dependencies and file hashes.
pub struct PackWriter {
    output: PathBuf,
    platform: String,
    sources: FileLocator,
}

impl PackWriter {
    /// Creates a writer that reads source assets relative to `source_root`.
    pub fn new(
        output: impl Into<PathBuf>,
        platform: impl Into<String>,
        source_root: impl Into<PathBuf>,
    ) -> Self {
        let root = source_root.into();
        Self::with_locator(
            output,
            platform,
            Arc::new(move |asset: &str| root.join(asset)),
        )
    }

    /// Creates a writer that resolves source assets through a locator.
    pub fn with_locator(
        output: impl Into<PathBuf>,
        platform: impl Into<String>,
        sources: FileLocator,
    ) -> Self {
        Self {
            output: output.into(),
            platform: platform.into(),
            sources,
        }
    }

    /// The output directory.
    pub fn output(&self) -> &Path {
        &self.output
    }

    fn write_file(&self, name: &str, bytes: &[u8]) -> Result<(), PackError> {
        let path = self.output.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| PackError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, bytes).map_err(|source| PackError::Write { path, source })
    }

    /// Rejects output names that would clobber another output file or leave
    /// the output directory. Runs before anything is written.
    fn check_names(&self, bundles: &BundleMap) -> Result<(), PackError> {
        let reserved = [MANIFEST_BUNDLE, self.platform.as_str()];
        if !is_contained(&self.platform) || self.platform == MANIFEST_BUNDLE {
            return Err(PackError::UnsafeName(self.platform.clone()));
        }
        for bundle in bundles.keys() {
            let name = bundle.as_str();
            if !is_contained(name) {
                return Err(PackError::UnsafeName(name.to_string()));
            }
            if let Some(hit) = reserved.iter().find(|r| r.eq_ignore_ascii_case(name)) {
                return Err(PackError::ReservedName {
                    bundle: name.to_string(),
                    reserved: hit.to_string(),
                });
            }
        }
        Ok(())
    }

    fn pack(
        &self,
        bundles: &BundleMap,
        dependencies: &DependencyMap,
        manifest: &ManifestSections,
    ) -> Result<BundleDependencyManifest, PackError> {
        self.check_names(bundles)?;
        let mut platform_manifest =
            BundleDependencyManifest::derive(&self.platform, bundles, dependencies);

        for (bundle, assets) in bundles {
            let mut contents = Vec::with_capacity(assets.len());
            for asset in assets {
                let path = (self.sources)(asset.as_str());
                let bytes = fs::read(&path).map_err(|source| PackError::ReadAsset {
                    asset: asset.to_string(),
                    path,
                    source,
                })?;
                contents.push((asset.as_str(), bytes));
            }

            let file = write_bundle(
                contents
                    .iter()
                    .map(|(name, bytes)| (*name, bytes.as_slice())),
            )?;
            self.write_file(bundle.as_str(), &file)?;
            platform_manifest.set_hash(bundle, blake3::hash(&file).to_hex().to_string());
            log::debug!(
                "Packed '{bundle}' ({} assets, {} bytes).",
                assets.len(),
                file.len()
            );
        }

        let manifest_file = write_bundle([
            (RESOURCE_ENTRY, manifest.assets.as_slice()),
            (BUNDLE_ENTRY, manifest.bundles.as_slice()),
            (DEPENDENCY_ENTRY, manifest.dependencies.as_slice()),
        ])?;
        self.write_file(MANIFEST_BUNDLE, &manifest_file)?;

        self.write_file(&self.platform, &platform_manifest.to_bytes()?)?;

        log::info!(
            "Wrote {} bundles, '{MANIFEST_BUNDLE}' and '{}' to '{}'.",
            bundles.len(),
            self.platform,
            self.output.display()
        );
        Ok(platform_manifest)
    }
}

/// `true` if `name` is a relative path with no `.` or `..` components.
fn is_contained(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('/')
        && !name.contains('\\')
        && !name.contains(':')
        && name
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..")
}

impl PackagingBackend for PackWriter {
    fn package(
        &self,
        bundles: &BundleMap,
        dependencies: &DependencyMap,
        manifest: &ManifestSections,
    ) -> Result<BundleDependencyManifest, BoxedError> {
        Ok(self.pack(bundles, dependencies, manifest)?)
    }
}
