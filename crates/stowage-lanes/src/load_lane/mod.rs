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

//! Payload loading strategies.
//!
//! A [`PayloadLane`] turns an asset identifier into its payload bytes. The
//! resource cache owns exactly one lane, chosen at construction time:
//! - [`BundleLane`] reads from packed bundles, inline for synchronous requests
//!   and on a background worker for asynchronous ones.
//! - [`EditorLane`] reads straight from the source tree.

mod bundle_lane;
mod bundle_table;
mod editor_lane;

pub use bundle_lane::*;
pub use bundle_table::*;
pub use editor_lane::*;

use std::fmt;
use stowage_core::asset::{AssetId, BundleName, Payload};
use thiserror::Error;

/// How a load was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadMode {
    /// The caller blocks until the payload is ready.
    Sync,
    /// The caller is notified on a later `update`.
    Async,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMode::Sync => f.write_str("sync"),
            LoadMode::Async => f.write_str("async"),
        }
    }
}

/// Opaque handle to one load issued through a [`PayloadLane`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket(pub u64);

impl fmt::Display for LoadTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A request to load one asset's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    /// The asset to load.
    pub asset: AssetId,
    /// The bundle that owns it. `None` in editor mode.
    pub bundle: Option<BundleName>,
    /// Whether the caller will block on the result.
    pub mode: LoadMode,
}

/// The outcome of one load.
#[derive(Debug, Clone)]
pub struct LoadCompletion {
    /// The ticket returned by [`PayloadLane::begin`].
    pub ticket: LoadTicket,
    /// The payload, or why it could not be produced.
    pub result: Result<Payload, LoadError>,
}

/// Errors raised while loading a payload.
///
/// Load errors are cloned out to every callback waiting on the asset, so
/// they carry rendered reasons rather than source errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The asset is not assigned to any bundle.
    #[error("asset '{asset}' is not assigned to any bundle")]
    NoBundle {
        /// The requested asset.
        asset: AssetId,
    },
    /// The owning bundle opened but holds no entry for the asset.
    #[error("bundle '{bundle}' has no entry for '{asset}'")]
    NotInBundle {
        /// The requested asset.
        asset: AssetId,
        /// The bundle that should have held it.
        bundle: BundleName,
    },
    /// A bundle could not be opened or read.
    #[error("bundle '{bundle}' failed: {reason}")]
    Bundle {
        /// The failing bundle.
        bundle: BundleName,
        /// The rendered source error.
        reason: String,
    },
    /// A source file could not be read (editor mode).
    #[error("failed to read '{asset}': {reason}")]
    Io {
        /// The requested asset.
        asset: AssetId,
        /// The rendered I/O error.
        reason: String,
    },
    /// The dependency oracle failed for this asset (editor mode).
    #[error("failed to look up the dependencies of '{asset}': {reason}")]
    Lookup {
        /// The requested asset.
        asset: AssetId,
        /// The rendered oracle error.
        reason: String,
    },
    /// A dependency failed, so the dependent cannot load.
    #[error("'{asset}' cannot load because its dependency '{dependency}' failed")]
    Dependency {
        /// The dependent asset.
        asset: AssetId,
        /// The dependency that failed first.
        dependency: AssetId,
    },
    /// The ticket was never issued by this lane, or was already delivered.
    #[error("unknown load ticket #{0}")]
    UnknownTicket(u64),
    /// The background worker is gone.
    #[error("the loader thread has stopped")]
    Disconnected,
}

/// One way of producing payloads.
///
/// Every ticket returned by [`begin`](PayloadLane::begin) completes exactly
/// once, either through [`poll`](PayloadLane::poll) or through
/// [`wait`](PayloadLane::wait). A successful load pins whatever backs the
/// payload (its bundle, for instance) until [`unload`](PayloadLane::unload)
/// is called for it; a failed load pins nothing.
pub trait PayloadLane: Send {
    /// A short, stable name used in logs.
    fn name(&self) -> &'static str;

    /// Starts a load and returns its ticket.
    fn begin(&mut self, request: LoadRequest) -> LoadTicket;

    /// Returns every completion that has arrived since the last call. Never blocks.
    fn poll(&mut self) -> Vec<LoadCompletion>;

    /// Blocks until `ticket` completes. Other completions that arrive in the
    /// meantime are kept for the next [`poll`](PayloadLane::poll).
    fn wait(&mut self, ticket: LoadTicket) -> LoadCompletion;

    /// Releases what a successful load of `asset` pinned.
    fn unload(&mut self, asset: &AssetId, bundle: Option<&BundleName>);

    /// Number of loads started but not yet delivered.
    fn in_flight(&self) -> usize;

    /// Releases everything the lane still holds.
    fn shutdown(&mut self) {}
}
