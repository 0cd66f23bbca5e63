use super::types::{ChatResponse, ErrorResponse, PromptRequest};
use crate::inference::InferenceService;
use axum::{extract::State, http::StatusCode, response::Json};
use std::{sync::Arc, time::Instant};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<InferenceService>,
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<PromptRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = Uuid::new_v4();
    let started = Instant::now();
    info!(
        %request_id,
        prompt_chars = request.prompt.chars().count(),
        "Received chat request"
    );

    match state.service.generate(&request.prompt).await {
        Ok(response) => {
            info!(
                %request_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Chat request completed"
            );
            Ok(Json(ChatResponse { response }))
        }
        Err(e) => {
            error!(%request_id, "Failed to generate response: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to generate response".to_string(),
                }),
            ))
        }
    }
}
