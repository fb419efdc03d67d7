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

use super::BundleFile;
use stowage_core::asset::{BundleArchive, BundleName, BundleSource, FileLocator, SourceError};
use stowage_core::manifest::{
    BundleDependencyManifest, ManifestSections, BUNDLE_ENTRY, DEPENDENCY_ENTRY, MANIFEST_BUNDLE,
    RESOURCE_ENTRY,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Reads a file through the locator and strips `offset` leading bytes.
///
/// Platforms that prepend a header to packaged files set a non-zero payload
/// offset; the bundle bytes start right after it.
fn read_payload(
    locator: &FileLocator,
    name: &BundleName,
    offset: u64,
) -> Result<Vec<u8>, SourceError> {
    let path: PathBuf = locator(name.as_str());
    let mut bytes = fs::read(&path).map_err(|source| SourceError::Io {
        bundle: name.clone(),
        path,
        source,
    })?;

    let skip = usize::try_from(offset)
        .ok()
        .filter(|&skip| skip <= bytes.len())
        .ok_or_else(|| SourceError::Corrupt {
            bundle: name.clone(),
            reason: format!(
                "file is {} bytes long, shorter than its payload offset {offset}",
                bytes.len()
            ),
        })?;
    if skip > 0 {
        bytes.drain(..skip);
    }
    Ok(bytes)
}

/// Opens the manifest bundle and returns its three sections.
pub fn read_manifest_bundle(
    locator: &FileLocator,
    payload_offset: u64,
) -> Result<ManifestSections, SourceError> {
    let name = BundleName::new(MANIFEST_BUNDLE);
    let bytes = read_payload(locator, &name, payload_offset)?;
    let file = BundleFile::parse(name.clone(), &bytes)?;

    let section = |entry: &str| -> Result<Vec<u8>, SourceError> {
        file.entry(entry)?.ok_or_else(|| SourceError::Corrupt {
            bundle: name.clone(),
            reason: format!("missing '{entry}' entry"),
        })
    };
    Ok(ManifestSections {
        assets: section(RESOURCE_ENTRY)?,
        bundles: section(BUNDLE_ENTRY)?,
        dependencies: section(DEPENDENCY_ENTRY)?,
    })
}

/// Reads the platform manifest file named after `platform`.
pub fn read_platform_manifest(
    locator: &FileLocator,
    platform: &str,
    payload_offset: u64,
) -> Result<BundleDependencyManifest, SourceError> {
    let name = BundleName::new(platform);
    let bytes = read_payload(locator, &name, payload_offset)?;
    BundleDependencyManifest::from_bytes(&bytes).map_err(|e| SourceError::Corrupt {
        bundle: name,
        reason: format!("unreadable platform manifest: {e}"),
    })
}

/// The reference [`BundleSource`]: reads bundle files written by
/// [`PackWriter`](super::PackWriter).
///
/// When a platform manifest is attached, each bundle file is checked against
/// the hash recorded at pack time before it is parsed.
pub struct PackBundleSource {
    locator: FileLocator,
    payload_offset: u64,
    manifest: Option<Arc<BundleDependencyManifest>>,
}

impl PackBundleSource {
    /// Creates a source that resolves bundle names through `locator`.
    pub fn new(locator: FileLocator, payload_offset: u64) -> Self {
        Self {
            locator,
            payload_offset,
            manifest: None,
        }
    }

    /// Attaches the platform manifest used for hash verification.
    pub fn with_manifest(mut self, manifest: Arc<BundleDependencyManifest>) -> Self {
        self.manifest = Some(manifest);
        self
    }

    fn verify(&self, name: &BundleName, bytes: &[u8]) -> Result<(), SourceError> {
        let expected = self
            .manifest
            .as_ref()
            .and_then(|manifest| manifest.record(name))
            .and_then(|record| record.hash.as_deref());
        let Some(expected) = expected else {
            return Ok(());
        };

        let actual = blake3::hash(bytes).to_hex();
        if actual.as_str() != expected {
            return Err(SourceError::Corrupt {
                bundle: name.clone(),
                reason: format!("hash mismatch: expected {expected}, found {actual}"),
            });
        }
        Ok(())
    }
}

impl BundleSource for PackBundleSource {
    fn load_bundle(&self, name: &BundleName) -> Result<Arc<dyn BundleArchive>, SourceError> {
        let bytes = read_payload(&self.locator, name, self.payload_offset)?;
        self.verify(name, &bytes)?;
        let file = BundleFile::parse(name.clone(), &bytes)?;
        log::debug!("Opened bundle '{name}' ({} bytes).", bytes.len());
        Ok(Arc::new(file))
    }

    fn unload_bundle(&self, bundle: Arc<dyn BundleArchive>) {
        log::debug!("Closed bundle '{}'.", bundle.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack_lane::write_bundle;
    use stowage_core::asset::AssetId;

    fn locator(root: &std::path::Path) -> FileLocator {
        let root = root.to_path_buf();
        Arc::new(move |name: &str| root.join(name))
    }

    #[test]
    fn test_payload_offset_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = vec![0xEE; 16];
        bytes.extend(write_bundle([("a.txt", b"hello".as_slice())]).unwrap());
        fs::write(dir.path().join("a.ab"), &bytes).unwrap();

        let source = PackBundleSource::new(locator(dir.path()), 16);
        let bundle = source.load_bundle(&BundleName::new("a.ab")).unwrap();
        assert_eq!(
            bundle.read(&AssetId::new("a.txt")).unwrap(),
            Some(b"hello".to_vec())
        );
    }

    #[test]
    fn test_file_shorter_than_offset_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ab"), [1, 2, 3]).unwrap();

        let source = PackBundleSource::new(locator(dir.path()), 8);
        let err = source.load_bundle(&BundleName::new("a.ab")).err().unwrap();
        assert!(matches!(err, SourceError::Corrupt { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = PackBundleSource::new(locator(dir.path()), 0);
        let err = source.load_bundle(&BundleName::new("nope.ab")).err().unwrap();
        assert!(matches!(err, SourceError::Io { .. }));
    }

    #[test]
    fn test_hash_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = write_bundle([("a.txt", b"hello".as_slice())]).unwrap();
        fs::write(dir.path().join("a.ab"), &bytes).unwrap();

        let mut manifest = BundleDependencyManifest::new("test");
        manifest.set_hash(&BundleName::new("a.ab"), "00ff");
        let source =
            PackBundleSource::new(locator(dir.path()), 0).with_manifest(Arc::new(manifest));

        let err = source.load_bundle(&BundleName::new("a.ab")).err().unwrap();
        assert!(err.to_string().contains("hash mismatch"));
    }
}
