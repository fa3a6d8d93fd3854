// src/metrics.rs
// Prometheus plumbing for the ingest counters emitted by the pipeline and
// connection manager.

use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Must happen before the first
    /// counter macro fires or those series never register. The feed's window
    /// capacity is exported as a static gauge so dashboards can relate window
    /// fill to the cap.
    pub fn init(window_capacity: usize) -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");

        gauge!("feed_window_capacity").set(window_capacity as f64);

        Self { handle }
    }

    /// Router serving `/metrics` in the Prometheus exposition format, merged
    /// into the main API router by the binary.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
