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

//! # Stowage Lanes
//!
//! The hot-path algorithms of the packer and the runtime:
//! - [`build_lane`]: dependency closure, packaging rules, and bundle assignment.
//! - [`pack_lane`]: the reference bundle file format, its writer (a
//!   [`PackagingBackend`](stowage_core::pipeline::PackagingBackend)) and its
//!   reader (a [`BundleSource`](stowage_core::asset::BundleSource)).
//! - [`load_lane`]: payload loading strategies behind the [`PayloadLane`] trait.

#![warn(missing_docs)]

pub mod build_lane;
pub mod load_lane;
pub mod pack_lane;

pub use build_lane::*;
pub use load_lane::*;
pub use pack_lane::*;
