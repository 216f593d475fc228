use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
}

/// `POST /api/chat` — runs one query through the cascade and returns the
/// structured result (layer, source, answer, confidence, contexts).
pub async fn chat(
    State(state): State<ApiState>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ApiError::ValidationError("query must not be empty".into()));
    }

    let result = state.engine.answer(query).await?;

    Ok(Json(result))
}
