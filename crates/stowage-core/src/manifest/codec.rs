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

//! Binary encoding of a [`Manifest`].
//!
//! The format is three sections written back to back:
//!
//! ```text
//! assets:       u16 count, then count × string
//! bundles:      u16 count, then count × (string name, u16 n, n × u16 id)
//! dependencies: u16 count, then count × (u16 id_count, u16 owner, (id_count-1) × u16 id)
//! ```
//!
//! All integers are little-endian. Strings are UTF-8 prefixed by their byte
//! length as a 7-bit variable-length integer (low bits first, high bit set on
//! every byte but the last). In a packed build the three sections travel as
//! separate entries of the [`MANIFEST_BUNDLE`]; [`encode`] and [`decode`] work
//! on their concatenation.

use super::{BundleEntry, DependencyChain, Manifest, ManifestError};
use crate::asset::{AssetId, BundleName};
use std::fmt;

/// Logical name of the bundle that carries the manifest sections.
pub const MANIFEST_BUNDLE: &str = "manifest.ab";
/// Manifest bundle entry holding the asset section.
pub const RESOURCE_ENTRY: &str = "Resource.bytes";
/// Manifest bundle entry holding the bundle section.
pub const BUNDLE_ENTRY: &str = "Bundle.bytes";
/// Manifest bundle entry holding the dependency section.
pub const DEPENDENCY_ENTRY: &str = "Dependency.bytes";

/// Longest 7-bit length prefix accepted (enough for a `u32`).
const MAX_VARINT_BYTES: usize = 5;

/// Identifies one of the three manifest sections in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// The asset table.
    Assets,
    /// The bundle table.
    Bundles,
    /// The dependency table.
    Dependencies,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Section::Assets => "asset",
            Section::Bundles => "bundle",
            Section::Dependencies => "dependency",
        })
    }
}

/// The three encoded sections, kept apart as the packer stores them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestSections {
    /// Encoded asset table (`Resource.bytes`).
    pub assets: Vec<u8>,
    /// Encoded bundle table (`Bundle.bytes`).
    pub bundles: Vec<u8>,
    /// Encoded dependency table (`Dependency.bytes`).
    pub dependencies: Vec<u8>,
}

impl ManifestSections {
    /// Concatenates the sections in wire order.
    pub fn concat(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(self.assets.len() + self.bundles.len() + self.dependencies.len());
        bytes.extend_from_slice(&self.assets);
        bytes.extend_from_slice(&self.bundles);
        bytes.extend_from_slice(&self.dependencies);
        bytes
    }
}

/// Encodes a manifest into its three sections.
///
/// # Errors
/// Returns [`ManifestError::Overflow`] if a table or list does not fit its
/// `u16` count. Manifests produced by [`Manifest::build`] never overflow.
pub fn encode_sections(manifest: &Manifest) -> Result<ManifestSections, ManifestError> {
    let mut assets = Writer::default();
    assets.count("asset table", manifest.assets().len())?;
    for asset in manifest.assets() {
        assets.string(asset.as_str());
    }

    let mut bundles = Writer::default();
    bundles.count("bundle table", manifest.bundles().len())?;
    for bundle in manifest.bundles() {
        bundles.string(bundle.name.as_str());
        bundles.count(format!("bundle '{}'", bundle.name), bundle.assets.len())?;
        for &id in &bundle.assets {
            bundles.u16(id);
        }
    }

    let mut dependencies = Writer::default();
    dependencies.count("dependency table", manifest.dependencies().len())?;
    for chain in manifest.dependencies() {
        // The id count includes the owner itself.
        dependencies.count(
            format!("dependency chain of asset {}", chain.owner),
            chain.dependencies.len() + 1,
        )?;
        dependencies.u16(chain.owner);
        for &id in &chain.dependencies {
            dependencies.u16(id);
        }
    }

    Ok(ManifestSections {
        assets: assets.0,
        bundles: bundles.0,
        dependencies: dependencies.0,
    })
}

/// Encodes a manifest as one contiguous byte string.
pub fn encode(manifest: &Manifest) -> Result<Vec<u8>, ManifestError> {
    encode_sections(manifest).map(|sections| sections.concat())
}

/// Decodes a manifest from its three separately stored sections.
///
/// Each section must be consumed exactly; leftover bytes are an error.
pub fn decode_sections(
    assets: &[u8],
    bundles: &[u8],
    dependencies: &[u8],
) -> Result<Manifest, ManifestError> {
    let mut reader = Reader::new(assets, Section::Assets);
    let asset_table = read_assets(&mut reader)?;
    reader.finish()?;

    let mut reader = Reader::new(bundles, Section::Bundles);
    let bundle_table = read_bundles(&mut reader)?;
    reader.finish()?;

    let mut reader = Reader::new(dependencies, Section::Dependencies);
    let dependency_table = read_dependencies(&mut reader)?;
    reader.finish()?;

    Manifest::from_parts(asset_table, bundle_table, dependency_table)
}

/// Decodes a manifest from the concatenated wire form produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Manifest, ManifestError> {
    let mut reader = Reader::new(bytes, Section::Assets);
    let asset_table = read_assets(&mut reader)?;
    reader.section = Section::Bundles;
    let bundle_table = read_bundles(&mut reader)?;
    reader.section = Section::Dependencies;
    let dependency_table = read_dependencies(&mut reader)?;
    reader.finish()?;

    Manifest::from_parts(asset_table, bundle_table, dependency_table)
}

fn read_assets(reader: &mut Reader<'_>) -> Result<Vec<AssetId>, ManifestError> {
    let count = reader.u16()? as usize;
    let mut assets = Vec::with_capacity(count);
    for _ in 0..count {
        assets.push(AssetId::new(reader.string()?));
    }
    Ok(assets)
}

fn read_bundles(reader: &mut Reader<'_>) -> Result<Vec<BundleEntry>, ManifestError> {
    let count = reader.u16()? as usize;
    let mut bundles = Vec::with_capacity(count);
    for _ in 0..count {
        let name = BundleName::new(reader.string()?);
        let len = reader.u16()? as usize;
        let mut assets = Vec::with_capacity(len);
        for _ in 0..len {
            assets.push(reader.u16()?);
        }
        bundles.push(BundleEntry { name, assets });
    }
    Ok(bundles)
}

fn read_dependencies(reader: &mut Reader<'_>) -> Result<Vec<DependencyChain>, ManifestError> {
    let count = reader.u16()? as usize;
    let mut chains = Vec::with_capacity(count);
    for _ in 0..count {
        let offset = reader.pos;
        let id_count = reader.u16()? as usize;
        if id_count == 0 {
            return Err(reader.malformed(offset, "dependency chain has no owner"));
        }
        let owner = reader.u16()?;
        let mut dependencies = Vec::with_capacity(id_count - 1);
        for _ in 1..id_count {
            dependencies.push(reader.u16()?);
        }
        chains.push(DependencyChain {
            owner,
            dependencies,
        });
    }
    Ok(chains)
}

#[derive(Default)]
struct Writer(Vec<u8>);

impl Writer {
    fn u16(&mut self, value: u16) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn count(&mut self, what: impl Into<String>, count: usize) -> Result<(), ManifestError> {
        let value = u16::try_from(count).map_err(|_| ManifestError::Overflow {
            what: what.into(),
            count,
        })?;
        self.u16(value);
        Ok(())
    }

    fn string(&mut self, value: &str) {
        let mut len = value.len();
        while len >= 0x80 {
            self.0.push((len as u8 & 0x7f) | 0x80);
            len >>= 7;
        }
        self.0.push(len as u8);
        self.0.extend_from_slice(value.as_bytes());
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    section: Section,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], section: Section) -> Self {
        Self {
            bytes,
            pos: 0,
            section,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ManifestError> {
        let remaining = self.bytes.len() - self.pos;
        if remaining < len {
            return Err(ManifestError::Truncated {
                section: self.section,
                offset: self.pos,
                needed: len - remaining,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, ManifestError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn varint(&mut self) -> Result<usize, ManifestError> {
        let start = self.pos;
        let mut value: u64 = 0;
        for shift in 0..MAX_VARINT_BYTES {
            let byte = self.take(1)?[0];
            value |= u64::from(byte & 0x7f) << (7 * shift);
            if byte & 0x80 == 0 {
                return usize::try_from(value)
                    .map_err(|_| self.malformed(start, "string length does not fit in memory"));
            }
        }
        Err(self.malformed(start, "string length prefix is too long"))
    }

    fn string(&mut self) -> Result<String, ManifestError> {
        let len = self.varint()?;
        let offset = self.pos;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ManifestError::InvalidUtf8 {
            section: self.section,
            offset,
        })
    }

    fn malformed(&self, offset: usize, reason: &'static str) -> ManifestError {
        ManifestError::Malformed {
            section: self.section,
            offset,
            reason,
        }
    }

    fn finish(&self) -> Result<(), ManifestError> {
        let remaining = self.bytes.len() - self.pos;
        if remaining > 0 {
            return Err(ManifestError::TrailingBytes {
                section: self.section,
                remaining,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{BundleMap, DependencyMap, ManifestViolation, MAX_DEPENDENCIES};

    fn id(s: &str) -> AssetId {
        AssetId::new(s)
    }

    fn two_asset_manifest() -> Manifest {
        let mut bundles = BundleMap::new();
        bundles.insert(BundleName::new("bundle1"), vec![id("A"), id("B")]);
        let mut deps = DependencyMap::new();
        deps.insert(id("A"), vec![id("B")]);
        Manifest::build(&bundles, &deps).unwrap()
    }

    #[test]
    fn test_encodes_reference_example_byte_for_byte() {
        let sections = encode_sections(&two_asset_manifest()).unwrap();

        assert_eq!(sections.assets, vec![0x02, 0x00, 0x01, b'A', 0x01, b'B']);
        let mut bundle_bytes = vec![0x01, 0x00, 0x07];
        bundle_bytes.extend_from_slice(b"bundle1");
        bundle_bytes.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(sections.bundles, bundle_bytes);
        assert_eq!(
            sections.dependencies,
            vec![0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x01, 0x00]
        );
    }

    #[test]
    fn test_decode_inverts_encode() {
        let manifest = two_asset_manifest();
        let bytes = encode(&manifest).unwrap();
        assert_eq!(decode(&bytes).unwrap(), manifest);

        let sections = encode_sections(&manifest).unwrap();
        let decoded =
            decode_sections(&sections.assets, &sections.bundles, &sections.dependencies).unwrap();
        assert_eq!(decoded, manifest);
    }

    #[test]
    fn test_long_strings_use_multi_byte_length_prefix() {
        let long = "x".repeat(300);
        let mut writer = Writer::default();
        writer.string(&long);
        // 300 = 0b10_0101100 -> 0xAC 0x02
        assert_eq!(&writer.0[..2], &[0xAC, 0x02]);

        let mut reader = Reader::new(&writer.0, Section::Assets);
        assert_eq!(reader.string().unwrap(), long);
        reader.finish().unwrap();
    }

    #[test]
    fn test_truncated_input_reports_section_and_offset() {
        let bytes = encode(&two_asset_manifest()).unwrap();
        let err = decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::Truncated {
                section: Section::Dependencies,
                needed: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut bytes = encode(&two_asset_manifest()).unwrap();
        bytes.push(0);
        assert!(matches!(
            decode(&bytes).unwrap_err(),
            ManifestError::TrailingBytes { remaining: 1, .. }
        ));
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let err = decode_sections(&[0x01, 0x00, 0x01, 0xFF], &[0x00, 0x00], &[0x00, 0x00]).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::InvalidUtf8 {
                section: Section::Assets,
                offset: 3
            }
        ));
    }

    #[test]
    fn test_chain_without_owner_is_malformed() {
        let err = decode_sections(&[0x00, 0x00], &[0x00, 0x00], &[0x01, 0x00, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, ManifestError::Malformed { .. }));
    }

    #[test]
    fn test_out_of_range_ids_fail_validation() {
        // One asset, one bundle claiming id 4.
        let assets = [0x01, 0x00, 0x01, b'A'];
        let bundles = [0x01, 0x00, 0x01, b'b', 0x01, 0x00, 0x04, 0x00];
        let err = decode_sections(&assets, &bundles, &[0x00, 0x00]).unwrap_err();
        assert!(matches!(err, ManifestError::Invalid(_)));
    }

    #[test]
    fn test_repeated_bundle_name_fails_validation() {
        // Assets [A, B]; bundles [("b", [0]), ("b", [1])].
        let assets = [0x02, 0x00, 0x01, b'A', 0x01, b'B'];
        let bundles = [
            0x02, 0x00, //
            0x01, b'b', 0x01, 0x00, 0x00, 0x00, //
            0x01, b'b', 0x01, 0x00, 0x01, 0x00,
        ];

        let err = decode_sections(&assets, &bundles, &[0x00, 0x00]).unwrap_err();

        match err {
            ManifestError::Invalid(violations) => assert_eq!(
                violations,
                vec![ManifestViolation::DuplicateBundle {
                    bundle: BundleName::new("b")
                }]
            ),
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_round_trip_over_manifest_shapes() {
        let wide: Vec<AssetId> = (0..MAX_DEPENDENCIES)
            .map(|i| id(&format!("tex/{i:03}.png")))
            .collect();
        let shapes: Vec<(&str, BundleMap, DependencyMap)> = vec![
            (
                "several bundles and chains",
                BundleMap::from([
                    (
                        BundleName::new("ui/root.prefab.ab"),
                        vec![id("ui/root.prefab")],
                    ),
                    (
                        BundleName::new("ui/menu.prefab.ab"),
                        vec![id("ui/menu.prefab")],
                    ),
                    (
                        BundleName::new("textures.ab"),
                        vec![id("tex/a.png"), id("tex/b.png"), id("tex/c.png")],
                    ),
                ]),
                DependencyMap::from([
                    (id("ui/root.prefab"), vec![id("tex/a.png"), id("tex/b.png")]),
                    (id("ui/menu.prefab"), vec![id("tex/c.png"), id("ui/root.prefab")]),
                    (id("tex/a.png"), vec![id("tex/b.png")]),
                ]),
            ),
            (
                "non-ascii identifiers",
                BundleMap::from([(
                    BundleName::new("界面/主菜单.ab"),
                    vec![id("界面/主菜单.prefab"), id("textures/café.png")],
                )]),
                DependencyMap::from([(
                    id("界面/主菜单.prefab"),
                    vec![id("textures/café.png")],
                )]),
            ),
            (
                "chain at the dependency limit",
                BundleMap::from([
                    (BundleName::new("hub.ab"), vec![id("hub.prefab")]),
                    (BundleName::new("tex.ab"), wide.clone()),
                ]),
                DependencyMap::from([(id("hub.prefab"), wide.clone())]),
            ),
        ];

        for (shape, bundles, deps) in shapes {
            let manifest = Manifest::build(&bundles, &deps)
                .unwrap_or_else(|e| panic!("{shape}: build failed: {e}"));

            let decoded = decode(&encode(&manifest).unwrap())
                .unwrap_or_else(|e| panic!("{shape}: decode failed: {e}"));
            assert_eq!(decoded, manifest, "{shape}");

            let sections = encode_sections(&manifest).unwrap();
            let decoded =
                decode_sections(&sections.assets, &sections.bundles, &sections.dependencies)
                    .unwrap_or_else(|e| panic!("{shape}: section decode failed: {e}"));
            assert_eq!(decoded, manifest, "{shape}");
        }
    }

    #[test]
    fn test_empty_manifest_round_trips() {
        let manifest = Manifest::default();
        let bytes = encode(&manifest).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0, 0, 0]);
        assert_eq!(decode(&bytes).unwrap(), manifest);
    }
}
