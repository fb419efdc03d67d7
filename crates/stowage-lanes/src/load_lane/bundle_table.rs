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

use super::LoadError;
use stowage_core::asset::{BundleArchive, BundleName, BundleSource};
use stowage_core::manifest::BundleDependencyManifest;
use std::collections::HashMap;
use std::sync::Arc;

struct OpenBundle {
    archive: Arc<dyn BundleArchive>,
    refs: usize,
}

/// Reference-counted table of open bundles.
///
/// Acquiring a bundle first acquires every bundle it depends on (per the
/// platform manifest, deepest first), so a bundle is never open without its
/// dependencies. Each acquire must be matched by one release.
pub struct BundleTable {
    source: Arc<dyn BundleSource>,
    manifest: Arc<BundleDependencyManifest>,
    open: HashMap<BundleName, OpenBundle>,
}

impl BundleTable {
    /// Creates an empty table.
    pub fn new(source: Arc<dyn BundleSource>, manifest: Arc<BundleDependencyManifest>) -> Self {
        Self {
            source,
            manifest,
            open: HashMap::new(),
        }
    }

    /// Opens `bundle` and its dependencies, or takes another reference to them.
    ///
    /// On failure nothing stays acquired.
    pub fn acquire(&mut self, bundle: &BundleName) -> Result<Arc<dyn BundleArchive>, LoadError> {
        let mut chain = self.manifest.load_order(bundle);
        chain.push(bundle.clone());

        for (done, name) in chain.iter().enumerate() {
            if let Err(err) = self.acquire_one(name) {
                for opened in chain[..done].iter().rev() {
                    self.release_one(opened);
                }
                return Err(err);
            }
        }

        self.open
            .get(bundle)
            .map(|open| Arc::clone(&open.archive))
            .ok_or_else(|| LoadError::Bundle {
                bundle: bundle.clone(),
                reason: "bundle closed while being acquired".to_string(),
            })
    }

    /// Drops one reference to `bundle` and to each of its dependencies.
    pub fn release(&mut self, bundle: &BundleName) {
        self.release_one(bundle);
        for dep in self.manifest.load_order(bundle).iter().rev() {
            self.release_one(dep);
        }
    }

    fn acquire_one(&mut self, name: &BundleName) -> Result<(), LoadError> {
        if let Some(open) = self.open.get_mut(name) {
            open.refs += 1;
            return Ok(());
        }
        let archive = self
            .source
            .load_bundle(name)
            .map_err(|e| LoadError::Bundle {
                bundle: name.clone(),
                reason: e.to_string(),
            })?;
        log::debug!("Bundle '{name}' opened.");
        self.open.insert(name.clone(), OpenBundle { archive, refs: 1 });
        Ok(())
    }

    fn release_one(&mut self, name: &BundleName) {
        let Some(open) = self.open.get_mut(name) else {
            log::warn!("Release of bundle '{name}', which is not open.");
            return;
        };
        open.refs -= 1;
        if open.refs == 0 {
            if let Some(open) = self.open.remove(name) {
                self.source.unload_bundle(open.archive);
                log::debug!("Bundle '{name}' unloaded.");
            }
        }
    }

    /// Returns `true` if `bundle` is currently open.
    pub fn is_open(&self, bundle: &BundleName) -> bool {
        self.open.contains_key(bundle)
    }

    /// Number of open bundles.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Outstanding references to `bundle`; 0 when closed.
    pub fn refs(&self, bundle: &BundleName) -> usize {
        self.open.get(bundle).map_or(0, |open| open.refs)
    }

    /// Unloads every open bundle regardless of its reference count.
    pub fn release_all(&mut self) {
        for (name, open) in self.open.drain() {
            log::debug!("Bundle '{name}' unloaded ({} reference(s) dropped).", open.refs);
            self.source.unload_bundle(open.archive);
        }
    }
}
