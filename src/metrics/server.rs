//! HTTP transport for the metrics sink: an axum server exposing `GET
//! /metrics` in Prometheus text exposition format.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::info;

use crate::error::{AlertMagnetError, Result};

/// Serves `/metrics` on `port` until the process exits. Intended to run
/// as its own task alongside the analysis loop.
pub async fn serve(registry: Registry, port: u16) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(Arc::new(registry));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(AlertMagnetError::Io)?;

    info!(%addr, "metrics server listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| AlertMagnetError::Other(e.to_string()))
}

async fn metrics_handler(State(registry): State<Arc<Registry>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {e}"),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}
