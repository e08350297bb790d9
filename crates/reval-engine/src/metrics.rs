use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Trait for metrics backends. Implementations can forward to Prometheus,
/// StatsD, or simply log metrics.
pub trait MetricsBackend: Send + Sync {
    fn record_counter(&self, name: &str, value: u64);
}

/// In-memory engine metrics with atomic counters.
/// Thread-safe for concurrent requests.
pub struct EngineMetrics {
    pub passes_evaluated: AtomicU64,
    pub fallback_evaluations: AtomicU64,
    pub fallback_contract_violations: AtomicU64,
    pub reevaluations_scheduled: AtomicU64,
    pub reschedule_failures: AtomicU64,
    pub expirations: AtomicU64,
    pub sync_deferrals: AtomicU64,
    backend: Option<Arc<dyn MetricsBackend>>,
}

impl std::fmt::Debug for EngineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineMetrics")
            .field("passes_evaluated", &self.passes_evaluated)
            .field("fallback_evaluations", &self.fallback_evaluations)
            .field(
                "fallback_contract_violations",
                &self.fallback_contract_violations,
            )
            .field("reevaluations_scheduled", &self.reevaluations_scheduled)
            .field("reschedule_failures", &self.reschedule_failures)
            .field("expirations", &self.expirations)
            .field("sync_deferrals", &self.sync_deferrals)
            .finish()
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            passes_evaluated: AtomicU64::new(0),
            fallback_evaluations: AtomicU64::new(0),
            fallback_contract_violations: AtomicU64::new(0),
            reevaluations_scheduled: AtomicU64::new(0),
            reschedule_failures: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            sync_deferrals: AtomicU64::new(0),
            backend: None,
        }
    }

    pub fn with_backend(backend: Arc<dyn MetricsBackend>) -> Self {
        Self {
            backend: Some(backend),
            ..Self::new()
        }
    }

    pub fn record_pass(&self) {
        self.bump(&self.passes_evaluated, "reval.engine.passes_evaluated");
    }

    pub fn record_fallback(&self) {
        self.bump(
            &self.fallback_evaluations,
            "reval.engine.fallback_evaluations",
        );
    }

    pub fn record_fallback_violation(&self) {
        self.bump(
            &self.fallback_contract_violations,
            "reval.engine.fallback_contract_violations",
        );
    }

    pub fn record_reschedule(&self) {
        self.bump(
            &self.reevaluations_scheduled,
            "reval.engine.reevaluations_scheduled",
        );
    }

    pub fn record_reschedule_failure(&self) {
        self.bump(&self.reschedule_failures, "reval.engine.reschedule_failures");
    }

    pub fn record_expiration(&self) {
        self.bump(&self.expirations, "reval.engine.expirations");
    }

    pub fn record_sync_deferral(&self) {
        self.bump(&self.sync_deferrals, "reval.engine.sync_deferrals");
    }

    fn bump(&self, counter: &AtomicU64, name: &str) {
        let val = counter.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(backend) = &self.backend {
            backend.record_counter(name, val);
        }
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            passes_evaluated: self.passes_evaluated.load(Ordering::Relaxed),
            fallback_evaluations: self.fallback_evaluations.load(Ordering::Relaxed),
            fallback_contract_violations: self.fallback_contract_violations.load(Ordering::Relaxed),
            reevaluations_scheduled: self.reevaluations_scheduled.load(Ordering::Relaxed),
            reschedule_failures: self.reschedule_failures.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            sync_deferrals: self.sync_deferrals.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of engine metrics.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub passes_evaluated: u64,
    pub fallback_evaluations: u64,
    pub fallback_contract_violations: u64,
    pub reevaluations_scheduled: u64,
    pub reschedule_failures: u64,
    pub expirations: u64,
    pub sync_deferrals: u64,
}

/// Logging-based metrics backend. Emits metrics as structured log events.
pub struct LoggingMetricsBackend;

impl MetricsBackend for LoggingMetricsBackend {
    fn record_counter(&self, name: &str, value: u64) {
        tracing::info!(metric = name, value = value, kind = "counter", "metric");
    }
}
