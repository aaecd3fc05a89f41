use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::item::{ContentItem, SourceKind};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub url: String,
    pub kind: SourceKind,
}

/// POST /api/summarize
///
/// Always answers immediately with the placeholder record; the fetch and
/// summarization happen behind it. Eventual failure is visible only through a
/// subsequent read, never on this request.
pub async fn handle_submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<ContentItem>, AppError> {
    let item = state.ingestor.submit(&req.url, req.kind).await?;
    Ok(Json(item))
}
