use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;

use crate::answer::{extract_answer, preview};
use crate::api::error::ApiError;
use crate::api::models::{HealthResponse, PredictRequest, PredictResponse};
use crate::app_state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model: state.model_name.clone(),
    })
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let prompt = payload.prompt_text().to_string();
    let model = payload.model_label();
    tracing::info!("Received request with prompt: {}... and model: {}", preview(&prompt, 30), model);

    if prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("Empty prompt or question".to_string()));
    }

    // Generation blocks for its whole duration; keep it off the async workers.
    let task_state = Arc::clone(&state);
    let task_prompt = prompt.clone();
    let generated = tokio::task::spawn_blocking(move || {
        task_state
            .generator
            .generate_text(&task_prompt, &task_state.params)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Error generating response: {}", e)))?;

    let full_text = generated.map_err(ApiError::from).inspect_err(|err| {
        tracing::error!("{}", err);
    })?;

    let response = extract_answer(&full_text, &prompt);
    tracing::info!("Generated response: {}...", preview(&response, 50));

    Ok(Json(PredictResponse {
        response,
        model,
        status: "success".to_string(),
    }))
}
