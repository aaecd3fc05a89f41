use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::chat::responder;
use crate::errors::AppError;
use crate::models::message::ChatMessage;
use crate::models::note::{Note, NoteStatus};
use crate::state::AppState;
use crate::store::NotePatch;
use crate::summarize::service::strip_html;

/// GET /api/notes
pub async fn handle_list_notes(State(state): State<AppState>) -> Result<Json<Vec<Note>>, AppError> {
    let notes = state.store.list_notes().await?;
    Ok(Json(notes))
}

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub title: String,
    pub content: String,
}

/// POST /api/notes
pub async fn handle_create_note(
    State(state): State<AppState>,
    Json(req): Json<CreateNoteRequest>,
) -> Result<Json<Note>, AppError> {
    if req.title.trim().is_empty() || req.content.trim().is_empty() {
        return Err(AppError::Validation(
            "Title and content are required".to_string(),
        ));
    }
    let note = state.store.create_note(&req.title, &req.content).await?;
    Ok(Json(note))
}

/// GET /api/notes/:id
pub async fn handle_get_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Note>, AppError> {
    let note = state
        .store
        .get_note(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Note {id} not found")))?;
    Ok(Json(note))
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// PUT /api/notes/:id
pub async fn handle_update_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateNoteRequest>,
) -> Result<Json<Note>, AppError> {
    let patch = NotePatch {
        title: req.title,
        content: req.content,
        ..Default::default()
    };
    let note = state
        .store
        .update_note(id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Note {id} not found")))?;
    Ok(Json(note))
}

/// DELETE /api/notes/:id
pub async fn handle_delete_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.store.delete_note(id).await?;
    Ok(StatusCode::OK)
}

/// POST /api/notes/:id/summarize
///
/// Synchronous, unlike URL ingestion: the note's text is already at hand, so
/// the caller waits for the triple and gets the updated note back.
pub async fn handle_summarize_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Note>, AppError> {
    let note = state
        .store
        .get_note(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Note {id} not found")))?;

    let bundle = state
        .summarizer
        .summarize_note(&note.content)
        .await
        .map_err(|e| AppError::Llm(format!("Failed to summarize note: {e}")))?;

    let patch = NotePatch {
        summary: Some(bundle.summary),
        one_line_summary: Some(bundle.one_line_summary),
        key_points: Some(bundle.key_points),
        status: Some(NoteStatus::Completed),
        ..Default::default()
    };
    let updated = state
        .store
        .update_note(id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Note {id} not found")))?;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct NoteChatRequest {
    pub message: String,
}

/// POST /api/notes/:id/chat
///
/// Q&A over the note's own text (not its summary — notes are chatted with
/// whether or not they have been summarized).
pub async fn handle_note_chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<NoteChatRequest>,
) -> Result<Json<[ChatMessage; 2]>, AppError> {
    if req.message.trim().is_empty() {
        return Err(AppError::Validation("Message is required".to_string()));
    }
    let note = state
        .store
        .get_note(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Note {id} not found")))?;

    let context = strip_html(&note.content);
    let (user, assistant) =
        responder::respond(&state.store, &state.summarizer, id, &context, &req.message).await?;
    Ok(Json([user, assistant]))
}

/// GET /api/notes/:id/chat
pub async fn handle_note_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let messages = state.store.list_messages(id).await?;
    Ok(Json(messages))
}
