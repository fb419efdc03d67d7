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

//! Provides the foundational primitive types for Stowage's asset system.
//!
//! This module defines the "common language" shared by the offline packer and
//! the runtime cache. It contains the identifiers and payload containers that
//! other crates pass around, plus the runtime contracts for opening bundles,
//! but it has no knowledge of how bundles are built or cached.
//!
//! The key components are:
//! - [`AssetId`] and [`BundleName`]: stable, string-backed identifiers.
//! - [`ResourceKind`]: whether an asset was selected explicitly or pulled in as a dependency.
//! - [`Payload`]: a cheap, shared view over the raw bytes of a loaded asset.
//! - [`BundleSource`] and [`BundleArchive`]: the `LoadBundle` / `UnloadBundle`
//!   interface implemented by a packaging backend.
//! - [`Instantiator`]: the host hook that turns a payload into a live object.

mod handle;
mod id;
mod instantiate;
mod source;

pub use handle::*;
pub use id::*;
pub use instantiate::*;
pub use source::*;
