use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::chat::responder;
use crate::errors::AppError;
use crate::models::collection::Collection;
use crate::models::item::ContentItem;
use crate::models::message::ChatMessage;
use crate::state::AppState;

/// GET /api/collections
pub async fn handle_list_collections(
    State(state): State<AppState>,
) -> Result<Json<Vec<Collection>>, AppError> {
    let collections = state.store.list_collections().await?;
    Ok(Json(collections))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollectionRequest {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

/// POST /api/collections
pub async fn handle_create_collection(
    State(state): State<AppState>,
    Json(req): Json<CreateCollectionRequest>,
) -> Result<Json<Collection>, AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation(
            "Collection name is required".to_string(),
        ));
    }
    let collection = state
        .store
        .create_collection(
            req.name.trim(),
            req.description.as_deref(),
            req.color.as_deref(),
        )
        .await?;
    Ok(Json(collection))
}

/// GET /api/collections/:id
pub async fn handle_get_collection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Collection>, AppError> {
    let collection = state
        .store
        .get_collection(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Collection {id} not found")))?;
    Ok(Json(collection))
}

/// DELETE /api/collections/:id
///
/// Removes the collection, its join rows, and its chat thread. Member items
/// are untouched.
pub async fn handle_delete_collection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.store.delete_collection(id).await?;
    Ok(StatusCode::OK)
}

/// GET /api/collections/:id/items
pub async fn handle_list_collection_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ContentItem>>, AppError> {
    let items = state.store.list_collection_items(id).await?;
    Ok(Json(items))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub item_id: Uuid,
}

/// POST /api/collections/:id/items
pub async fn handle_add_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddItemRequest>,
) -> Result<StatusCode, AppError> {
    state.store.add_item_to_collection(id, req.item_id).await?;
    Ok(StatusCode::OK)
}

/// DELETE /api/collections/:id/items/:item_id
pub async fn handle_remove_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .store
        .remove_item_from_collection(id, item_id)
        .await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct CollectionChatRequest {
    pub message: String,
}

/// POST /api/collections/:id/chat
///
/// Q&A over the whole collection: the context is every member item's title
/// and summary concatenated. The thread is keyed by collection id.
pub async fn handle_collection_chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CollectionChatRequest>,
) -> Result<Json<[ChatMessage; 2]>, AppError> {
    if req.message.trim().is_empty() {
        return Err(AppError::Validation("Message is required".to_string()));
    }
    state
        .store
        .get_collection(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Collection {id} not found")))?;

    let items = state.store.list_collection_items(id).await?;
    if items.is_empty() {
        return Err(AppError::Validation("Collection is empty".to_string()));
    }
    let context = items
        .iter()
        .map(|item| format!("Title: {}\nSummary: {}", item.title, item.summary))
        .collect::<Vec<_>>()
        .join("\n\n");

    let (user, assistant) =
        responder::respond(&state.store, &state.summarizer, id, &context, &req.message).await?;
    Ok(Json([user, assistant]))
}

/// GET /api/collections/:id/chat
pub async fn handle_collection_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let messages = state.store.list_messages(id).await?;
    Ok(Json(messages))
}
