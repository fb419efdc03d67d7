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

use stowage_telemetry::{
    CounterHandle, GaugeHandle, HistogramHandle, MetricsRegistry, MetricsResult,
};

const NAMESPACE: &str = "cache";

fn registered<T>(name: &str, result: MetricsResult<T>) -> Option<T> {
    result
        .map_err(|e| log::warn!("Failed to register metric '{NAMESPACE}:{name}': {e}"))
        .ok()
}

/// Metric handles owned by the cache. Every handle is optional so a cache
/// without a registry pays nothing.
#[derive(Default)]
pub(super) struct CacheMetrics {
    loads_started: Option<CounterHandle>,
    hits: Option<CounterHandle>,
    load_failures: Option<CounterHandle>,
    unloaded: Option<CounterHandle>,
    resident: Option<GaugeHandle>,
    load_time: Option<HistogramHandle>,
}

impl CacheMetrics {
    pub fn register(registry: &MetricsRegistry) -> Self {
        Self {
            loads_started: registered(
                "loads_started",
                registry.register_counter(NAMESPACE, "loads_started", "Payload loads started"),
            ),
            hits: registered(
                "hits",
                registry.register_counter(
                    NAMESPACE,
                    "hits",
                    "Acquires served by an existing entry",
                ),
            ),
            load_failures: registered(
                "load_failures",
                registry.register_counter(NAMESPACE, "load_failures", "Failed loads"),
            ),
            unloaded: registered(
                "unloaded",
                registry.register_counter(NAMESPACE, "unloaded", "Entries unloaded by sweeps"),
            ),
            resident: registered(
                "resident",
                registry.register_gauge(NAMESPACE, "resident", "Loaded entries", "entries"),
            ),
            load_time: registered(
                "load_time",
                registry.register_histogram(
                    NAMESPACE,
                    "load_time",
                    "Time from request to ready",
                    "ms",
                    stowage_telemetry::metrics::registry::DURATION_BUCKETS_MS.to_vec(),
                ),
            ),
        }
    }

    fn bump(counter: &Option<CounterHandle>) {
        if let Some(counter) = counter {
            if let Err(e) = counter.increment() {
                log::warn!("Failed to update metric {}: {e}", counter.id());
            }
        }
    }

    fn shift(&self, delta: f64) {
        if let Some(gauge) = &self.resident {
            if let Err(e) = gauge.add(delta) {
                log::warn!("Failed to update metric {}: {e}", gauge.id());
            }
        }
    }

    pub fn load_started(&self) {
        Self::bump(&self.loads_started);
    }

    pub fn hit(&self) {
        Self::bump(&self.hits);
    }

    pub fn load_failed(&self) {
        Self::bump(&self.load_failures);
    }

    pub fn loaded(&self, elapsed_ms: f64) {
        self.shift(1.0);
        if let Some(histogram) = &self.load_time {
            if let Err(e) = histogram.observe(elapsed_ms) {
                log::warn!("Failed to update metric {}: {e}", histogram.id());
            }
        }
    }

    pub fn unloaded(&self, count: usize) {
        if count == 0 {
            return;
        }
        if let Some(counter) = &self.unloaded {
            if let Err(e) = counter.increment_by(count as u64) {
                log::warn!("Failed to update metric {}: {e}", counter.id());
            }
        }
        self.shift(-(count as f64));
    }
}
