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

use super::{LoadCompletion, LoadError, LoadRequest, LoadTicket, PayloadLane};
use stowage_core::asset::{AssetId, BundleName, FileLocator, Payload};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

/// Loads payloads straight from the source tree, bypassing bundles.
///
/// Reads happen inside [`begin`](PayloadLane::begin). Asynchronous callers
/// still only see the result on their next poll, so the cache's ordering
/// rules hold the same way they do for bundles.
pub struct EditorLane {
    locator: FileLocator,
    next_ticket: u64,
    ready: VecDeque<LoadCompletion>,
}

impl EditorLane {
    /// Reads source files relative to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self::with_locator(Arc::new(move |asset: &str| root.join(asset)))
    }

    /// Reads source files through a host file locator.
    pub fn with_locator(locator: FileLocator) -> Self {
        Self {
            locator,
            next_ticket: 1,
            ready: VecDeque::new(),
        }
    }

    fn read(&self, asset: &AssetId) -> Result<Payload, LoadError> {
        let path = (self.locator)(asset.as_str());
        std::fs::read(&path)
            .map(Payload::new)
            .map_err(|e| LoadError::Io {
                asset: asset.clone(),
                reason: format!("{}: {e}", path.display()),
            })
    }
}

impl PayloadLane for EditorLane {
    fn name(&self) -> &'static str {
        "editor"
    }

    fn begin(&mut self, request: LoadRequest) -> LoadTicket {
        let ticket = LoadTicket(self.next_ticket);
        self.next_ticket += 1;
        let result = self.read(&request.asset);
        self.ready.push_back(LoadCompletion { ticket, result });
        ticket
    }

    fn poll(&mut self) -> Vec<LoadCompletion> {
        self.ready.drain(..).collect()
    }

    fn wait(&mut self, ticket: LoadTicket) -> LoadCompletion {
        self.ready
            .iter()
            .position(|c| c.ticket == ticket)
            .and_then(|index| self.ready.remove(index))
            .unwrap_or(LoadCompletion {
                ticket,
                result: Err(LoadError::UnknownTicket(ticket.0)),
            })
    }

    fn unload(&mut self, _asset: &AssetId, _bundle: Option<&BundleName>) {}

    fn in_flight(&self) -> usize {
        self.ready.len()
    }
}
