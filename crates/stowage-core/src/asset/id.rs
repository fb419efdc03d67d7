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

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// A stable, path-like identifier for a single addressable asset.
///
/// Identifiers are compared as plain strings. Backslashes are normalised to
/// forward slashes on construction so that identifiers produced on different
/// hosts compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Creates a new `AssetId` from a path-like string.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        if path.contains('\\') {
            Self(path.replace('\\', "/"))
        } else {
            Self(path)
        }
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the file extension (without the dot), if any.
    pub fn extension(&self) -> Option<&str> {
        let file = self.file_name();
        file.rfind('.')
            .filter(|&dot| dot > 0)
            .map(|dot| &file[dot + 1..])
    }

    /// Returns the last path component.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Returns everything before the last `/`, or an empty string for a bare name.
    pub fn directory(&self) -> &str {
        self.0.rfind('/').map(|slash| &self.0[..slash]).unwrap_or("")
    }

    /// Returns `true` if this identifier lies inside `scope`, comparing whole
    /// path components (`a/b` contains `a/b/c.png` but not `a/bc.png`).
    pub fn is_within(&self, scope: &str) -> bool {
        let scope = scope.trim_end_matches('/');
        if scope.is_empty() {
            return true;
        }
        match self.0.strip_prefix(scope) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AssetId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for AssetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for AssetId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The name of a bundle: a build-time-fixed partition of assets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleName(String);

impl BundleName {
    /// Creates a new `BundleName`.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BundleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BundleName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BundleName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for BundleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for BundleName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Records how an asset entered the build universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Selected explicitly by a packaging rule (a seed).
    Direct,
    /// Pulled in transitively through another asset's dependencies.
    Dependency,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_id_normalises_separators() {
        let id = AssetId::new("Assets\\UI\\Root.prefab");
        assert_eq!(id.as_str(), "Assets/UI/Root.prefab");
        assert_eq!(id, AssetId::from("Assets/UI/Root.prefab"));
    }

    #[test]
    fn test_asset_id_path_parts() {
        let id = AssetId::new("assets/ui/root.prefab");
        assert_eq!(id.extension(), Some("prefab"));
        assert_eq!(id.file_name(), "root.prefab");
        assert_eq!(id.directory(), "assets/ui");

        let bare = AssetId::new(".hidden");
        assert_eq!(bare.extension(), None);
        assert_eq!(bare.directory(), "");
    }

    #[test]
    fn test_is_within_compares_whole_components() {
        let id = AssetId::new("assets/ui/root.prefab");
        assert!(id.is_within("assets"));
        assert!(id.is_within("assets/ui/"));
        assert!(id.is_within("assets/ui/root.prefab"));
        assert!(!id.is_within("assets/u"));
        assert!(!id.is_within("assets/ui/root"));
        assert!(id.is_within(""));
    }
}
