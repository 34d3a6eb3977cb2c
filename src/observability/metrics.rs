//! Query metrics
//!
//! Counters only, monotonic, reset only when the registry is created.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters shared by every query an engine runs.
///
/// All counters use Relaxed atomics; a snapshot taken while queries run is
/// not a consistent cut across counters.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    queries_translated: AtomicU64,
    queries_rejected: AtomicU64,
    queries_executed: AtomicU64,
    queries_faulted: AtomicU64,
    queries_cancelled: AtomicU64,
    /// Candidate elements deserialized from a source
    elements_scanned: AtomicU64,
    elements_emitted: AtomicU64,
    /// Elements dropped by `ShapePolicy::Skip`
    elements_skipped: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Translation

    pub fn increment_queries_translated(&self) {
        self.queries_translated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_rejected(&self) {
        self.queries_rejected.fetch_add(1, Ordering::Relaxed);
    }

    // Execution

    pub fn increment_queries_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_faulted(&self) {
        self.queries_faulted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_cancelled(&self) {
        self.queries_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    // Elements

    pub fn increment_elements_scanned(&self) {
        self.elements_scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_elements_emitted(&self) {
        self.elements_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_elements_skipped(&self) {
        self.elements_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_translated: self.queries_translated.load(Ordering::Relaxed),
            queries_rejected: self.queries_rejected.load(Ordering::Relaxed),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_faulted: self.queries_faulted.load(Ordering::Relaxed),
            queries_cancelled: self.queries_cancelled.load(Ordering::Relaxed),
            elements_scanned: self.elements_scanned.load(Ordering::Relaxed),
            elements_emitted: self.elements_emitted.load(Ordering::Relaxed),
            elements_skipped: self.elements_skipped.load(Ordering::Relaxed),
        }
    }

    /// Current counters as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub queries_translated: u64,
    pub queries_rejected: u64,
    pub queries_executed: u64,
    pub queries_faulted: u64,
    pub queries_cancelled: u64,
    pub elements_scanned: u64,
    pub elements_emitted: u64,
    pub elements_skipped: u64,
}
