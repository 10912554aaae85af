mod server;

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

use crate::utils::CircuitState;

pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order batch advancement outcomes
// - Outbox dispatch (published / failed)
// - Catalog lookups and resilience fallbacks
// - Circuit breaker state
// - Scheduled job runs (including lock-contention skips)
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Lifecycle advancement
    pub orders_processed: IntCounterVec,

    // Outbox dispatch
    pub outbox_events_published: IntCounterVec,
    pub outbox_publish_failures: IntCounter,

    // Catalog client
    pub catalog_requests: IntCounterVec,
    pub catalog_fallbacks: IntCounterVec,
    pub circuit_breaker_state: IntGauge,

    // Scheduled jobs
    pub job_runs: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_processed = IntCounterVec::new(
            Opts::new(
                "orders_processed_total",
                "Orders advanced out of NEW, by terminal outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(orders_processed.clone()))?;

        let outbox_events_published = IntCounterVec::new(
            Opts::new(
                "outbox_events_published_total",
                "Outbox events successfully published to the broker",
            ),
            &["event_type"],
        )?;
        registry.register(Box::new(outbox_events_published.clone()))?;

        let outbox_publish_failures = IntCounter::new(
            "outbox_publish_failures_total",
            "Outbox publish attempts that failed and stayed pending",
        )?;
        registry.register(Box::new(outbox_publish_failures.clone()))?;

        let catalog_requests = IntCounterVec::new(
            Opts::new("catalog_requests_total", "Catalog lookups by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(catalog_requests.clone()))?;

        let catalog_fallbacks = IntCounterVec::new(
            Opts::new(
                "catalog_fallbacks_total",
                "Catalog lookups degraded to an empty result",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(catalog_fallbacks.clone()))?;

        let circuit_breaker_state = IntGauge::new(
            "circuit_breaker_state",
            "Catalog circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        let job_runs = IntCounterVec::new(
            Opts::new("job_runs_total", "Scheduled job invocations by outcome"),
            &["job", "outcome"],
        )?;
        registry.register(Box::new(job_runs.clone()))?;

        Ok(Self {
            registry,
            orders_processed,
            outbox_events_published,
            outbox_publish_failures,
            catalog_requests,
            catalog_fallbacks,
            circuit_breaker_state,
            job_runs,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_breaker_state(&self, state: CircuitState) {
        let value = match state {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        };
        self.circuit_breaker_state.set(value);
    }
}
