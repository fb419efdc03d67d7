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

//! The bundle builder: seeds in, bundle files and manifest out.
//!
//! The pipeline is `graph -> assign -> manifest -> package`. Each stage
//! reports every problem it finds before the build aborts, so one failed run
//! shows everything that needs fixing.

mod agent;

pub use agent::{BuildPlan, BuildReport, BundleBuilder};

use stowage_core::manifest::ManifestError;
use stowage_core::pipeline::BoxedError;
use stowage_lanes::{AssignError, GraphError, RuleError};
use thiserror::Error;

/// Errors that abort a build.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The packaging rules are invalid.
    #[error(transparent)]
    Rules(#[from] RuleError),
    /// Dependency discovery failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// Some assets match no packaging rule.
    #[error(transparent)]
    Assign(#[from] AssignError),
    /// The manifest exceeds its wire-format limits or is inconsistent.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    /// The packaging backend failed.
    #[error("packaging failed: {0}")]
    Packaging(#[source] BoxedError),
}
