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

//! Build-time lanes: from a handful of seed assets to a complete bundle map.
//!
//! The stages run in order:
//! 1. [`DependencyGraphBuilder`] expands the seeds into the full build universe.
//! 2. [`assign`] places every asset of that universe into exactly one bundle,
//!    according to a validated [`RuleSet`].
//!
//! [`MetaFileOracle`] is the default [`DependencyOracle`](stowage_core::pipeline::DependencyOracle)
//! for projects that keep dependency lists in sidecar `.meta` files.

mod assign;
mod graph;
mod meta_oracle;
mod rules;

pub use assign::*;
pub use graph::*;
pub use meta_oracle::*;
pub use rules::*;
