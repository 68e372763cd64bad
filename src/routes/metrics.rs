use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::services::watches::WatchRegistry;

#[derive(Clone)]
pub struct MetricsState {
    pub handle: Arc<PrometheusHandle>,
    pub watches: Arc<WatchRegistry>,
}

/// GET /metrics - Prometheus text exposition, with the active watch gauge
/// refreshed at scrape time.
pub async fn prometheus_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    metrics::gauge!("active_watches").set(state.watches.active_count().await as f64);
    state.handle.render()
}
