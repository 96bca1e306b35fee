//! In-memory latency histogram for exchange REST requests.
//! Every request that goes through the exchange client's timeout wrapper is
//! recorded here, including ones that timed out.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

/// Request latency percentiles as served on `/stats/latency`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LatencySnapshot {
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub sample_count: u64,
}

/// Shared by the exchange client (writer) and the HTTP API (reader).
/// Values stored in microseconds.
pub struct LatencyStats {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

impl LatencyStats {
    /// Tracks 1us to 100s, 3 significant figures. Requests are capped by the
    /// client timeout well below the upper bound.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 100_000_000, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    pub fn record(&self, d: Duration) {
        let us = d.as_micros().clamp(1, 100_000_000) as u64;
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(us);
        }
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        let Ok(h) = self.inner.lock() else {
            return LatencySnapshot::default();
        };
        if h.len() == 0 {
            return LatencySnapshot::default();
        }
        let ms = |q: f64| Some(h.value_at_quantile(q) as f64 / 1000.0);
        LatencySnapshot {
            p50_ms: ms(0.5),
            p95_ms: ms(0.95),
            p99_ms: ms(0.99),
            sample_count: h.len(),
        }
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}
