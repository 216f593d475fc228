use axum::{extract::State, response::IntoResponse, Json};
use serde_json::Value;
use ingestion_pipeline::IngestPayload;

use crate::{api_state::ApiState, error::ApiError};

/// `POST /api/ingest` — body `{"kind": "pdf-text" | "plain-text" | "qa-json", …}`.
/// Returns the batch report: items stored plus per-item failures.
pub async fn ingest_data(
    State(state): State<ApiState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = IngestPayload::parse(body)?;
    let report = state.pipeline.ingest(payload).await?;

    Ok(Json(report))
}
