//! Per-operation latency metrics: a bounded ring buffer per operation
//! feeding an in-process p50/p95/p99 query surface, alongside the global
//! `metrics` histogram recorder for Prometheus scraping.

use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

const RING_BUFFER_CAPACITY: usize = 1000;

/// A p50/p95/p99 latency snapshot for one operation.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct OperationStats {
    /// Number of samples currently held (at most [`RING_BUFFER_CAPACITY`]).
    pub count: usize,
    /// 50th percentile latency, in milliseconds.
    pub p50_ms: f64,
    /// 95th percentile latency, in milliseconds.
    pub p95_ms: f64,
    /// 99th percentile latency, in milliseconds.
    pub p99_ms: f64,
}

struct RingBuffer {
    samples: Vec<f64>,
    next: usize,
}

impl RingBuffer {
    fn new() -> Self {
        Self { samples: Vec::with_capacity(RING_BUFFER_CAPACITY), next: 0 }
    }

    fn push(&mut self, value_ms: f64) {
        if self.samples.len() < RING_BUFFER_CAPACITY {
            self.samples.push(value_ms);
        } else {
            self.samples[self.next] = value_ms;
        }
        self.next = (self.next + 1) % RING_BUFFER_CAPACITY;
    }

    fn stats(&self) -> OperationStats {
        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        OperationStats {
            count: sorted.len(),
            p50_ms: percentile(&sorted, 0.50),
            p95_ms: percentile(&sorted, 0.95),
            p99_ms: percentile(&sorted, 0.99),
        }
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * (sorted.len() as f64 - 1.0)).round().max(0.0);
    let index = (rank as usize).min(sorted.len() - 1);
    sorted[index]
}

/// Global registry of bounded per-operation latency ring buffers.
#[derive(Default)]
pub struct MetricsRegistry {
    buffers: Mutex<HashMap<String, RingBuffer>>,
}

impl MetricsRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a latency sample for `operation`, updating both the
    /// in-process ring buffer and the global `metrics` histogram.
    pub fn record(&self, operation: &str, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        metrics::histogram!("mnemograph_operation_duration_ms", "operation" => operation.to_string()).record(ms);

        let mut buffers = self.buffers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        buffers.entry(operation.to_string()).or_insert_with(RingBuffer::new).push(ms);
    }

    /// Snapshot of recorded stats for `operation`, if any samples exist.
    #[must_use]
    pub fn stats(&self, operation: &str) -> Option<OperationStats> {
        let buffers = self.buffers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        buffers.get(operation).map(RingBuffer::stats)
    }

    /// Snapshot of stats for every operation recorded so far.
    #[must_use]
    pub fn all_stats(&self) -> HashMap<String, OperationStats> {
        let buffers = self.buffers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        buffers.iter().map(|(k, v)| (k.clone(), v.stats())).collect()
    }

    /// Clears every operation's ring buffer. Does not affect the global
    /// `metrics` recorder, whose own reset is the exporter's concern.
    pub fn reset(&self) {
        let mut buffers = self.buffers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        buffers.clear();
    }
}

/// Installs the global Prometheus recorder and returns its render handle.
///
/// # Errors
///
/// Returns an error if a recorder has already been installed for this
/// process.
pub fn install_prometheus() -> Result<metrics_exporter_prometheus::PrometheusHandle> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|err| Error::BackendError { operation: "metrics_init".to_string(), cause: err.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_tracks_percentiles_for_known_distribution() {
        let registry = MetricsRegistry::new();
        for ms in 1..=100 {
            registry.record("test_op", Duration::from_millis(ms));
        }
        let stats = registry.stats("test_op").expect("samples were recorded");
        assert_eq!(stats.count, 100);
        assert!((stats.p50_ms - 50.0).abs() <= 1.0);
        assert!(stats.p95_ms > stats.p50_ms);
        assert!(stats.p99_ms >= stats.p95_ms);
    }

    #[test]
    fn registry_ring_buffer_is_bounded() {
        let registry = MetricsRegistry::new();
        for ms in 0..(RING_BUFFER_CAPACITY as u64 + 50) {
            registry.record("bounded_op", Duration::from_millis(ms));
        }
        let stats = registry.stats("bounded_op").expect("samples were recorded");
        assert_eq!(stats.count, RING_BUFFER_CAPACITY);
    }

    #[test]
    fn unknown_operation_has_no_stats() {
        let registry = MetricsRegistry::new();
        assert!(registry.stats("never_recorded").is_none());
    }

    #[test]
    fn reset_clears_all_recorded_operations() {
        let registry = MetricsRegistry::new();
        registry.record("op", Duration::from_millis(5));
        assert!(registry.stats("op").is_some());
        registry.reset();
        assert!(registry.stats("op").is_none());
    }
}
