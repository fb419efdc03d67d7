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

use crate::metrics::model::{Metric, MetricId, MetricType, MetricValue, MetricsError, MetricsResult};
use std::fmt::Debug;

/// The interface a metrics storage backend must provide.
pub trait MetricsBackend: Send + Sync + Debug + 'static {
    /// Stores or replaces a metric.
    fn put_metric(&self, metric: Metric) -> MetricsResult<()>;

    /// Returns a copy of a metric.
    fn get_metric(&self, id: &MetricId) -> MetricsResult<Metric>;

    /// Applies `update` to a stored metric while holding exclusive access.
    fn modify(
        &self,
        id: &MetricId,
        update: &mut dyn FnMut(&mut Metric) -> MetricsResult<()>,
    ) -> MetricsResult<()>;

    /// Returns copies of every stored metric.
    fn list_all_metrics(&self) -> Vec<Metric>;

    /// Increments a counter and returns its new value.
    fn increment_counter(&self, id: &MetricId, delta: u64) -> MetricsResult<u64> {
        let mut result = 0;
        self.modify(id, &mut |metric| match metric.value {
            MetricValue::Counter(ref mut value) => {
                *value = value.saturating_add(delta);
                result = *value;
                metric.touch();
                Ok(())
            }
            ref other => Err(MetricsError::TypeMismatch {
                expected: MetricType::Counter,
                found: other.metric_type(),
            }),
        })?;
        Ok(result)
    }

    /// Adds `delta` to a gauge and returns its new value.
    fn adjust_gauge(&self, id: &MetricId, delta: f64) -> MetricsResult<f64> {
        let mut result = 0.0;
        self.modify(id, &mut |metric| match metric.value {
            MetricValue::Gauge(ref mut value) => {
                *value += delta;
                result = *value;
                metric.touch();
                Ok(())
            }
            ref other => Err(MetricsError::TypeMismatch {
                expected: MetricType::Gauge,
                found: other.metric_type(),
            }),
        })?;
        Ok(result)
    }

    /// Sets a gauge.
    fn set_gauge(&self, id: &MetricId, new_value: f64) -> MetricsResult<()> {
        self.modify(id, &mut |metric| match metric.value {
            MetricValue::Gauge(ref mut value) => {
                *value = new_value;
                metric.touch();
                Ok(())
            }
            ref other => Err(MetricsError::TypeMismatch {
                expected: MetricType::Gauge,
                found: other.metric_type(),
            }),
        })
    }

    /// Records one histogram sample.
    fn record_histogram_sample(&self, id: &MetricId, sample: f64) -> MetricsResult<()> {
        self.modify(id, &mut |metric| match metric.value {
            MetricValue::Histogram {
                ref mut samples,
                ref bucket_bounds,
                ref mut bucket_counts,
            } => {
                samples.push(sample);
                for (count, &bound) in bucket_counts.iter_mut().zip(bucket_bounds) {
                    if sample <= bound {
                        *count += 1;
                    }
                }
                metric.touch();
                Ok(())
            }
            ref other => Err(MetricsError::TypeMismatch {
                expected: MetricType::Histogram,
                found: other.metric_type(),
            }),
        })
    }
}
