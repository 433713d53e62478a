//! Latency and counter metrics for the orchestrator.

use std::sync::Mutex;
use std::time::Duration;

/// Point-in-time copy of the orchestrator metrics.
///
/// Latencies hold the most recent observation; counters are totals since
/// the orchestrator was created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Time spent in the attestation provider and token issuer.
    pub attestation_latency: Duration,
    /// Time spent computing the request signature.
    pub signature_latency: Duration,
    /// Time spent building the attestation payload.
    pub payload_latency: Duration,
    /// End-to-end time of the last header request.
    pub total_latency: Duration,
    /// Requests served from an unexpired cached token.
    pub cache_hits: u64,
    /// Requests that found no usable cached token.
    pub cache_misses: u64,
    /// Fetches performed as leader.
    pub fetches: u64,
    /// Requests that waited on another caller's fetch.
    pub coalesced_waits: u64,
    /// Fetches that ended in an error.
    pub fetch_failures: u64,
    /// Refreshes requested, of any kind.
    pub refreshes: u64,
}

impl MetricsSnapshot {
    /// Returns the fraction of requests served from cache, or 0.0 if none.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }
        // Saturate to u32 so the f64 conversion is exact.
        let hits = u32::try_from(self.cache_hits).unwrap_or(u32::MAX);
        let total = u32::try_from(total).unwrap_or(u32::MAX);
        f64::from(hits) / f64::from(total)
    }
}

/// Process-lifetime metrics recorder owned by the orchestrator.
///
/// Observational only: nothing in the orchestrator reads these values to
/// make decisions.
#[derive(Debug, Default)]
pub(crate) struct AttestationMetrics {
    inner: Mutex<MetricsSnapshot>,
}

impl AttestationMetrics {
    /// Creates a zeroed recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current values.
    ///
    /// # Panics
    ///
    /// Panics if the metrics lock is poisoned.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().expect("lock poisoned").clone()
    }

    pub(crate) fn record_hit(&self) {
        self.update(|m| m.cache_hits += 1);
    }

    pub(crate) fn record_miss(&self) {
        self.update(|m| m.cache_misses += 1);
    }

    pub(crate) fn record_coalesced(&self) {
        self.update(|m| m.coalesced_waits += 1);
    }

    pub(crate) fn record_refresh(&self) {
        self.update(|m| m.refreshes += 1);
    }

    pub(crate) fn record_fetch(&self, payload: Duration, attestation: Duration, ok: bool) {
        self.update(|m| {
            m.fetches += 1;
            m.payload_latency = payload;
            m.attestation_latency = attestation;
            if !ok {
                m.fetch_failures += 1;
            }
        });
    }

    pub(crate) fn record_signature(&self, latency: Duration) {
        self.update(|m| m.signature_latency = latency);
    }

    pub(crate) fn record_total(&self, latency: Duration) {
        self.update(|m| m.total_latency = latency);
    }

    fn update(&self, f: impl FnOnce(&mut MetricsSnapshot)) {
        let mut metrics = self.inner.lock().expect("lock poisoned");
        f(&mut metrics);
    }
}
