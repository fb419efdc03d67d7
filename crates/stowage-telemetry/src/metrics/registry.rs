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

//! Registry for managing metrics.

use crate::metrics::model::{Metric, MetricId, MetricType, MetricsError, MetricsResult};
use crate::storage::{backend::MetricsBackend, memory_backend::InMemoryBackend};
use std::sync::Arc;

/// Default histogram buckets for durations in milliseconds.
pub const DURATION_BUCKETS_MS: &[f64] = &[0.1, 0.5, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0];

/// Central registry for Stowage metrics.
///
/// Registering a metric returns a cheap, cloneable handle. Registering the
/// same id twice returns a handle to the existing metric instead of resetting
/// it, so several components can share one registry.
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    backend: Arc<dyn MetricsBackend>,
}

impl MetricsRegistry {
    /// Creates a registry with the default in-memory backend.
    pub fn new() -> Self {
        Self {
            backend: Arc::new(InMemoryBackend::new()),
        }
    }

    fn ensure(&self, metric: Metric, expected: MetricType) -> MetricsResult<MetricId> {
        let id = metric.id.clone();
        match self.backend.get_metric(&id) {
            Ok(existing) if existing.value.metric_type() == expected => Ok(id),
            Ok(existing) => Err(MetricsError::TypeMismatch {
                expected,
                found: existing.value.metric_type(),
            }),
            Err(MetricsError::MetricNotFound(_)) => {
                self.backend.put_metric(metric)?;
                Ok(id)
            }
            Err(other) => Err(other),
        }
    }

    /// Registers (or looks up) a counter.
    pub fn register_counter(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> MetricsResult<CounterHandle> {
        let metric = Metric::counter(MetricId::new(namespace, name), description);
        let id = self.ensure(metric, MetricType::Counter)?;
        Ok(CounterHandle {
            id,
            backend: self.backend.clone(),
        })
    }

    /// Registers (or looks up) a gauge.
    pub fn register_gauge(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
    ) -> MetricsResult<GaugeHandle> {
        let metric = Metric::gauge(MetricId::new(namespace, name), description, unit);
        let id = self.ensure(metric, MetricType::Gauge)?;
        Ok(GaugeHandle {
            id,
            backend: self.backend.clone(),
        })
    }

    /// Registers (or looks up) a histogram.
    pub fn register_histogram(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
        buckets: Vec<f64>,
    ) -> MetricsResult<HistogramHandle> {
        let metric = Metric::histogram(MetricId::new(namespace, name), description, unit, buckets);
        let id = self.ensure(metric, MetricType::Histogram)?;
        Ok(HistogramHandle {
            id,
            backend: self.backend.clone(),
        })
    }

    /// Returns a copy of a metric.
    pub fn get_metric(&self, id: &MetricId) -> MetricsResult<Metric> {
        self.backend.get_metric(id)
    }

    /// Current value of a counter, if registered.
    pub fn counter_value(&self, namespace: &str, name: &str) -> Option<u64> {
        self.get_metric(&MetricId::new(namespace, name))
            .ok()
            .and_then(|metric| metric.value.as_counter())
    }

    /// Current value of a gauge, if registered.
    pub fn gauge_value(&self, namespace: &str, name: &str) -> Option<f64> {
        self.get_metric(&MetricId::new(namespace, name))
            .ok()
            .and_then(|metric| metric.value.as_gauge())
    }

    /// Every metric, sorted by id.
    pub fn snapshot(&self) -> Vec<Metric> {
        let mut metrics = self.backend.list_all_metrics();
        metrics.sort_by(|a, b| a.id.cmp(&b.id));
        metrics
    }

    /// Every metric in one namespace, sorted by id.
    pub fn namespace_metrics(&self, namespace: &str) -> Vec<Metric> {
        self.snapshot()
            .into_iter()
            .filter(|metric| metric.id.namespace == namespace)
            .collect()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for counter operations.
#[derive(Debug, Clone)]
pub struct CounterHandle {
    id: MetricId,
    backend: Arc<dyn MetricsBackend>,
}

impl CounterHandle {
    /// Increments the counter by 1.
    pub fn increment(&self) -> MetricsResult<u64> {
        self.backend.increment_counter(&self.id, 1)
    }

    /// Increments the counter by `amount`.
    pub fn increment_by(&self, amount: u64) -> MetricsResult<u64> {
        self.backend.increment_counter(&self.id, amount)
    }

    /// Current counter value.
    pub fn get(&self) -> MetricsResult<u64> {
        let metric = self.backend.get_metric(&self.id)?;
        metric
            .value
            .as_counter()
            .ok_or_else(|| MetricsError::TypeMismatch {
                expected: MetricType::Counter,
                found: metric.value.metric_type(),
            })
    }

    /// The metric id.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}

/// Handle for gauge operations.
#[derive(Debug, Clone)]
pub struct GaugeHandle {
    id: MetricId,
    backend: Arc<dyn MetricsBackend>,
}

impl GaugeHandle {
    /// Sets the gauge.
    pub fn set(&self, value: f64) -> MetricsResult<()> {
        self.backend.set_gauge(&self.id, value)
    }

    /// Adds `delta` and returns the new value.
    pub fn add(&self, delta: f64) -> MetricsResult<f64> {
        self.backend.adjust_gauge(&self.id, delta)
    }

    /// Subtracts `delta` and returns the new value.
    pub fn sub(&self, delta: f64) -> MetricsResult<f64> {
        self.add(-delta)
    }

    /// Current gauge value.
    pub fn get(&self) -> MetricsResult<f64> {
        let metric = self.backend.get_metric(&self.id)?;
        metric
            .value
            .as_gauge()
            .ok_or_else(|| MetricsError::TypeMismatch {
                expected: MetricType::Gauge,
                found: metric.value.metric_type(),
            })
    }

    /// The metric id.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}

/// Handle for histogram operations.
#[derive(Debug, Clone)]
pub struct HistogramHandle {
    id: MetricId,
    backend: Arc<dyn MetricsBackend>,
}

impl HistogramHandle {
    /// Records one sample.
    pub fn observe(&self, value: f64) -> MetricsResult<()> {
        self.backend.record_histogram_sample(&self.id, value)
    }

    /// The metric id.
    pub fn id(&self) -> &MetricId {
        &self.id
    }

    /// The full histogram metric.
    pub fn get_metric(&self) -> MetricsResult<Metric> {
        self.backend.get_metric(&self.id)
    }
}
