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

//! Provides RAII-based timers for automatically recording metrics.

use crate::metrics::registry::HistogramHandle;
use std::time::Instant;

/// Times a scope and records the elapsed milliseconds into a histogram when
/// dropped, including on early returns.
pub struct ScopedMetricTimer<'a> {
    started: Instant,
    histogram: &'a HistogramHandle,
}

impl<'a> ScopedMetricTimer<'a> {
    /// Starts a timer for `histogram`.
    pub fn new(histogram: &'a HistogramHandle) -> Self {
        Self {
            started: Instant::now(),
            histogram,
        }
    }
}

impl Drop for ScopedMetricTimer<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        if let Err(e) = self.histogram.observe(elapsed_ms) {
            log::warn!("[ScopedMetricTimer] Failed to record metric: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::registry::MetricsRegistry;

    #[test]
    fn test_timer_records_on_drop() {
        let registry = MetricsRegistry::new();
        let histogram = registry
            .register_histogram("build", "duration", "", "ms", vec![1000.0])
            .unwrap();
        {
            let _timer = ScopedMetricTimer::new(&histogram);
        }
        let metric = histogram.get_metric().unwrap();
        assert_eq!(metric.value.samples().map(<[f64]>::len), Some(1));
    }
}
