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

//! The public-facing runtime API of Stowage.
//!
//! A host builds a [`RuntimeConfig`], calls [`ResourceSystem::initialize`]
//! once, then acquires and releases resources by asset id while calling
//! [`ResourceSystem::update`] every frame.

mod config;
mod system;

pub use config::RuntimeConfig;
pub use system::ResourceSystem;

pub mod prelude {
    pub use crate::{ResourceSystem, RuntimeConfig};
    pub use stowage_agents::{CacheError, ResourceHandle, ResourceStatus};
    pub use stowage_core::asset::{AssetId, FileLocator, Instantiator, Payload};
    pub use stowage_lanes::LoadError;
}
