use axum::{extract::State, http::header, response::IntoResponse, routing::get, Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde_json::json;
use shoal_proto::StreamDescriptor;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::websocket::{ws_handler, BeaconState};

#[derive(Debug, Serialize)]
struct CatalogResponse {
    streams: Vec<StreamDescriptor>,
}

/// Core routes: health, catalog snapshot, and the discovery WebSocket.
pub fn router(state: BeaconState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/api/streams", get(streams_handler))
        .route("/ws", get(ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Core routes plus the Prometheus scrape endpoint.
pub fn router_with_metrics(state: BeaconState, metrics: PrometheusHandle) -> Router {
    router(state).route(
        "/metrics",
        get(move || {
            let handle = metrics.clone();
            async move {
                (
                    [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
                    handle.render(),
                )
            }
        }),
    )
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// HTTP view of the same catalog `requestStreamList` serves.
async fn streams_handler(State(state): State<BeaconState>) -> impl IntoResponse {
    Json(CatalogResponse {
        streams: state.registry().list(),
    })
}
