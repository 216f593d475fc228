use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use routes::{
    chat::chat, ingest::ingest_data, liveness::live, readiness::ready, stats::kb_stats,
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for the JSON API, version 1. No retrieval logic lives here; every
/// handler delegates to the engine or the ingestion pipeline.
pub fn api_routes_v1<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Public, unauthenticated endpoints (for k8s/systemd probes)
    let public = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    let api = Router::new()
        .route(
            "/api/ingest",
            post(ingest_data).layer(DefaultBodyLimit::max(
                app_state.config.ingest_max_body_bytes,
            )),
        )
        .route("/api/chat", post(chat))
        .route("/api/kb-stats", get(kb_stats));

    public.merge(api)
}
