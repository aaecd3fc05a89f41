use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::item::{ContentItem, Language, SummaryBundle};
use crate::state::AppState;
use crate::store::ItemPatch;

/// GET /api/items
pub async fn handle_list_items(
    State(state): State<AppState>,
) -> Result<Json<Vec<ContentItem>>, AppError> {
    let items = state.store.list_items().await?;
    Ok(Json(items))
}

/// GET /api/items/:id
pub async fn handle_get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContentItem>, AppError> {
    let item = state
        .store
        .get_item(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item {id} not found")))?;
    Ok(Json(item))
}

/// Caller-editable fields. Status and provenance fields are not writable
/// through the API; only the pipeline moves an item's lifecycle.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub one_line_summary: Option<String>,
    pub key_points: Option<Vec<String>>,
}

/// PUT /api/items/:id
pub async fn handle_update_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<ContentItem>, AppError> {
    let patch = ItemPatch {
        title: req.title,
        summary: req.summary,
        one_line_summary: req.one_line_summary,
        key_points: req.key_points,
        ..Default::default()
    };
    let item = state
        .store
        .update_item(id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item {id} not found")))?;
    Ok(Json(item))
}

/// DELETE /api/items/:id
///
/// Deletion doubles as cancellation: an in-flight ingestion run targeting
/// this id discards its results at its next checkpoint.
pub async fn handle_delete_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.store.delete_item(id).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct GenerateLanguageRequest {
    pub language: Language,
}

/// POST /api/items/:id/language
pub async fn handle_generate_language(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<GenerateLanguageRequest>,
) -> Result<Json<SummaryBundle>, AppError> {
    let bundle = state
        .ingestor
        .generate_language_variant(id, req.language)
        .await?;
    Ok(Json(bundle))
}
