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

use super::{ReadyCallback, ResourceState};
use std::collections::HashSet;
use std::time::Instant;
use stowage_core::asset::{AssetId, BundleName, Payload};
use stowage_lanes::{LoadMode, LoadTicket};

/// Why a handle outlived its entry.
#[derive(Debug, Clone)]
pub(super) enum Orphan {
    Failed(stowage_lanes::LoadError),
    ShutDown,
}

/// The cache's record for one asset.
pub(super) struct Entry {
    pub state: ResourceState,
    /// Public handles plus dependents holding this entry.
    pub refs: usize,
    /// Tickets of the public handles currently held.
    pub holders: HashSet<u64>,
    /// Dependencies this entry holds one reference on each.
    pub deps: Vec<AssetId>,
    pub bundle: Option<BundleName>,
    pub mode: LoadMode,
    pub load: Option<LoadTicket>,
    /// Held dependencies not yet `Ready`.
    pub pending_deps: usize,
    /// Entries waiting for this one before they can start their own load.
    pub dependents: Vec<AssetId>,
    pub callbacks: Vec<ReadyCallback>,
    pub payload: Option<Payload>,
    pub started: Instant,
}

impl Entry {
    pub fn loading(bundle: Option<BundleName>, mode: LoadMode) -> Self {
        Self {
            state: ResourceState::Loading,
            refs: 1,
            holders: HashSet::new(),
            deps: Vec::new(),
            bundle,
            mode,
            load: None,
            pending_deps: 0,
            dependents: Vec::new(),
            callbacks: Vec::new(),
            payload: None,
            started: Instant::now(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state == ResourceState::Loading
    }
}
