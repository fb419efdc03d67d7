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

use super::{AssetId, Payload};

/// Host hook that turns a loaded payload into a live object.
///
/// The cache knows nothing about what payloads contain. When a caller asks it
/// to instantiate a resource, it hands the ready payload to the host's
/// instantiator, which decides whether the payload is instantiable at all.
pub trait Instantiator {
    /// Where a new instance is attached (a parent transform, a scene node...).
    type Parent;
    /// The object produced.
    type Instance;

    /// Creates an instance, or returns `None` if `payload` cannot be
    /// instantiated.
    fn instantiate(
        &self,
        asset: &AssetId,
        payload: &Payload,
        parent: Option<&Self::Parent>,
    ) -> Option<Self::Instance>;
}
