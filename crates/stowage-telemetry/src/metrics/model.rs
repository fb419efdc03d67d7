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

//! Metric identifiers, values, and errors.

use std::fmt::{self, Display};
use std::time::Instant;
use thiserror::Error;

/// A structured identifier for a metric: a namespace and a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricId {
    /// The broad category of the metric (e.g. "cache", "build").
    pub namespace: String,
    /// The specific name of the metric (e.g. "hits", "duration").
    pub name: String,
}

impl MetricId {
    /// Creates a new `MetricId` with a namespace and a name.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// The fundamental type of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    /// Only ever increases.
    Counter,
    /// Can go up or down.
    Gauge,
    /// Tracks the distribution of a set of measurements.
    Histogram,
}

/// The current value of a metric.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// Counter value.
    Counter(u64),
    /// Gauge value.
    Gauge(f64),
    /// Recorded samples and their distribution across buckets.
    Histogram {
        /// The raw samples recorded.
        samples: Vec<f64>,
        /// Upper bounds of the buckets.
        bucket_bounds: Vec<f64>,
        /// Count of samples at or below each bound.
        bucket_counts: Vec<u64>,
    },
}

impl MetricValue {
    /// Returns the [`MetricType`] of this value.
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricValue::Counter(_) => MetricType::Counter,
            MetricValue::Gauge(_) => MetricType::Gauge,
            MetricValue::Histogram { .. } => MetricType::Histogram,
        }
    }

    /// Returns the value if this is a counter.
    pub fn as_counter(&self) -> Option<u64> {
        match self {
            MetricValue::Counter(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value if this is a gauge.
    pub fn as_gauge(&self) -> Option<f64> {
        match self {
            MetricValue::Gauge(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the recorded samples if this is a histogram.
    pub fn samples(&self) -> Option<&[f64]> {
        match self {
            MetricValue::Histogram { samples, .. } => Some(samples),
            _ => None,
        }
    }
}

/// A metric entry: its value plus descriptive metadata.
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric's identifier.
    pub id: MetricId,
    /// Human-readable description.
    pub description: String,
    /// Unit of measurement (e.g. "ms", "count").
    pub unit: String,
    /// When the metric was last written.
    pub last_updated: Instant,
    /// The current value.
    pub value: MetricValue,
}

impl Metric {
    /// Creates a counter starting at zero.
    pub fn counter(id: MetricId, description: impl Into<String>) -> Self {
        Self::with_value(id, description, "count", MetricValue::Counter(0))
    }

    /// Creates a gauge starting at zero.
    pub fn gauge(id: MetricId, description: impl Into<String>, unit: impl Into<String>) -> Self {
        Self::with_value(id, description, unit, MetricValue::Gauge(0.0))
    }

    /// Creates an empty histogram with the given bucket bounds.
    pub fn histogram(
        id: MetricId,
        description: impl Into<String>,
        unit: impl Into<String>,
        bucket_bounds: Vec<f64>,
    ) -> Self {
        let bucket_counts = vec![0; bucket_bounds.len()];
        Self::with_value(
            id,
            description,
            unit,
            MetricValue::Histogram {
                samples: Vec::new(),
                bucket_bounds,
                bucket_counts,
            },
        )
    }

    fn with_value(
        id: MetricId,
        description: impl Into<String>,
        unit: impl Into<String>,
        value: MetricValue,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            unit: unit.into(),
            last_updated: Instant::now(),
            value,
        }
    }

    /// Marks the metric as written now.
    pub fn touch(&mut self) {
        self.last_updated = Instant::now();
    }
}

/// A specialized `Result` type for metric operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Errors raised by the metrics system.
#[derive(Debug, Clone, Error)]
pub enum MetricsError {
    /// The metric is not registered.
    #[error("metric not found: {0}")]
    MetricNotFound(MetricId),
    /// The operation does not apply to this kind of metric.
    #[error("type mismatch: expected {expected:?}, found {found:?}")]
    TypeMismatch {
        /// The type the operation needs.
        expected: MetricType,
        /// The type actually registered.
        found: MetricType,
    },
    /// The storage backend failed.
    #[error("storage error: {0}")]
    StorageError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_ids_order_by_namespace_then_name() {
        let mut ids = vec![
            MetricId::new("cache", "loaded"),
            MetricId::new("build", "duration"),
            MetricId::new("build", "assets"),
        ];
        ids.sort();
        assert_eq!(ids[0].to_string(), "build:assets");
        assert_eq!(ids[1].to_string(), "build:duration");
        assert_eq!(ids[2].to_string(), "cache:loaded");
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(MetricValue::Counter(3).as_counter(), Some(3));
        assert_eq!(MetricValue::Counter(3).as_gauge(), None);
        assert_eq!(MetricValue::Gauge(1.5).metric_type(), MetricType::Gauge);
    }
}
