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

//! The runtime resource cache.
//!
//! Every asset moves through `Loading -> Ready -> PendingUnload -> (gone)`.
//! Acquiring an asset first acquires its dependencies, and an asset only
//! starts its own load once every dependency it holds is `Ready`. Releasing
//! the last reference parks the asset in `PendingUnload`; it is actually
//! unloaded by a later sweep, which releases its dependencies in turn.
//!
//! The cache is single-owner (`&mut self`). Asynchronous completions are
//! applied inside [`ResourceCache::update`], never behind the owner's back.

mod agent;
mod entry;
mod metrics;

pub use agent::ResourceCache;

use std::fmt;
use stowage_core::asset::{AssetId, Payload};
use stowage_lanes::{LoadError, LoadMode};
use thiserror::Error;

/// Continuation invoked once an acquired asset is ready or has failed.
///
/// Callbacks for one asset run in the order they were registered.
pub type ReadyCallback = Box<dyn FnOnce(&AssetId, Result<Payload, LoadError>) + Send>;

/// One caller's hold on a cached asset.
///
/// Handles are not `Clone`: each acquire yields exactly one handle, and
/// [`ResourceCache::release`] consumes it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    asset: AssetId,
    ticket: u64,
}

impl ResourceHandle {
    /// The asset this handle refers to.
    pub fn asset(&self) -> &AssetId {
        &self.asset
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.asset, self.ticket)
    }
}

/// Lifecycle state of a cached asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// Waiting for dependencies or for its own payload.
    Loading,
    /// Loaded and referenced.
    Ready,
    /// Loaded, unreferenced, waiting for a sweep.
    PendingUnload,
}

/// What a handle currently points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceStatus {
    /// The load is still in progress.
    Loading,
    /// The payload is available.
    Ready,
    /// The load failed; the handle only needs releasing.
    Failed(LoadError),
    /// The cache was shut down while the handle was held.
    Unloaded,
}

/// Errors raised by the resource cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The manifest does not know the asset.
    #[error("asset '{0}' is not in the manifest")]
    UnknownAsset(AssetId),
    /// The handle is not currently held from this cache.
    #[error("handle #{ticket} for '{asset}' is not held by this cache")]
    NotHeld {
        /// The asset named by the handle.
        asset: AssetId,
        /// The handle's ticket.
        ticket: u64,
    },
    /// The asset is already loading in the other mode.
    #[error("'{asset}' is already loading in {in_flight} mode; cannot acquire it in {requested} mode")]
    ModeMismatch {
        /// The asset.
        asset: AssetId,
        /// Mode of the load in flight.
        in_flight: LoadMode,
        /// Mode the caller asked for.
        requested: LoadMode,
    },
    /// The payload could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl CacheError {
    /// Returns `true` for errors that indicate a bug in the caller rather
    /// than a problem with the data or the environment.
    pub fn is_misuse(&self) -> bool {
        matches!(self, CacheError::NotHeld { .. } | CacheError::ModeMismatch { .. })
    }
}
