//! Prometheus metrics endpoint

use axum::extract::State;
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct MetricsHandlerState {
    pub handle: PrometheusHandle,
}

/// `GET /metrics` — Prometheus text exposition.
pub async fn metrics(State(state): State<MetricsHandlerState>) -> String {
    state.handle.render()
}
