use axum::{extract::State, response::IntoResponse, Json};

use crate::{api_state::ApiState, error::ApiError};

/// `GET /api/kb-stats` — per-tier record counts.
pub async fn kb_stats(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.engine.store().stats().await?;

    Ok(Json(stats))
}
