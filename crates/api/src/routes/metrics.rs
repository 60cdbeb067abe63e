//! Prometheus exposition endpoint.
//!
//! Renders the recorder the store layer writes its placement and
//! transition counters into (`orders_placed_total`,
//! `order_lock_conflicts_total`, `order_placement_seconds`,
//! `order_status_transitions_total`).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

/// GET /metrics — Prometheus text format.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}
