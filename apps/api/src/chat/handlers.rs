use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::chat::responder;
use crate::errors::AppError;
use crate::models::message::ChatMessage;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub thread_id: Uuid,
    pub message: String,
}

/// POST /api/chat
///
/// Q&A over a single item's stored summary; the thread is keyed by item id.
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<[ChatMessage; 2]>, AppError> {
    if req.message.trim().is_empty() {
        return Err(AppError::Validation("Message is required".to_string()));
    }
    let item = state
        .store
        .get_item(req.thread_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item {} not found", req.thread_id)))?;

    let (user, assistant) = responder::respond(
        &state.store,
        &state.summarizer,
        req.thread_id,
        &item.summary,
        &req.message,
    )
    .await?;
    Ok(Json([user, assistant]))
}

/// GET /api/chat/:thread_id
pub async fn handle_list_messages(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let messages = state.store.list_messages(thread_id).await?;
    Ok(Json(messages))
}
