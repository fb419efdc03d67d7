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

//! # Stowage Agents
//!
//! Agents own state and drive the lanes:
//! - [`cache_agent`]: the runtime [`ResourceCache`], a reference-counted,
//!   dependency-aware cache of loaded assets.
//! - [`build_agent`]: the [`BundleBuilder`], which runs the packing pipeline
//!   from seed assets to bundle files.

#![warn(missing_docs)]

pub mod build_agent;
pub mod cache_agent;

pub use build_agent::{BuildError, BuildPlan, BuildReport, BundleBuilder};
pub use cache_agent::{
    CacheError, ReadyCallback, ResourceCache, ResourceHandle, ResourceState, ResourceStatus,
};
