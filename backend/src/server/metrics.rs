//! Prometheus request metrics and the `/metrics` endpoint.

use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use prometheus::{IntCounterVec, Opts, Registry};

use chama::domain::BootstrapOutcome;

/// Request middleware plus the bootstrap outcome counter, sharing one
/// registry.
pub(crate) struct Metrics {
    pub(crate) http: PrometheusMetrics,
    bootstrap_runs: IntCounterVec,
}

impl Metrics {
    /// # Errors
    /// Fails when a collector cannot be registered.
    pub(crate) fn new() -> std::io::Result<Self> {
        let registry = Registry::new();
        let bootstrap_runs = IntCounterVec::new(
            Opts::new("admin_bootstrap_runs_total", "Admin bootstrap runs by outcome")
                .namespace("chama"),
            &["outcome"],
        )
        .map_err(std::io::Error::other)?;
        registry
            .register(Box::new(bootstrap_runs.clone()))
            .map_err(std::io::Error::other)?;
        let http = PrometheusMetricsBuilder::new("chama")
            .endpoint("/metrics")
            .registry(registry)
            .build()
            .map_err(|error| std::io::Error::other(error.to_string()))?;
        Ok(Self {
            http,
            bootstrap_runs,
        })
    }

    pub(crate) fn record_bootstrap(&self, outcome: BootstrapOutcome) {
        let label = match outcome {
            BootstrapOutcome::AlreadyPresent => "already_present",
            BootstrapOutcome::Created(_) => "created",
            BootstrapOutcome::Promoted(_) => "promoted",
            BootstrapOutcome::Failed => "failed",
        };
        self.bootstrap_runs.with_label_values(&[label]).inc();
    }
}
