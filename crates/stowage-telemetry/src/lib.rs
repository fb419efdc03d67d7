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

//! # Stowage Telemetry
//!
//! Metrics and logging plumbing used by the bundle builder and the resource
//! cache. Metrics live in a [`MetricsRegistry`] backed by a
//! [`MetricsBackend`](storage::backend::MetricsBackend); logging goes through
//! the `log` facade and is initialised for binaries by [`init_logging`].

#![warn(missing_docs)]

pub mod logging;
pub mod metrics;
pub mod storage;
pub mod utils;

pub use logging::init_logging;
pub use metrics::model::{Metric, MetricId, MetricType, MetricValue, MetricsError, MetricsResult};
pub use metrics::registry::{CounterHandle, GaugeHandle, HistogramHandle, MetricsRegistry};
pub use utils::timer::ScopedMetricTimer;
