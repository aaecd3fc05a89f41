pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::chat::handlers as chat;
use crate::collections::handlers as collections;
use crate::ingest::handlers as ingest;
use crate::items::handlers as items;
use crate::notes::handlers as notes;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Ingestion
        .route("/api/summarize", post(ingest::handle_submit))
        // Items
        .route("/api/items", get(items::handle_list_items))
        .route(
            "/api/items/:id",
            get(items::handle_get_item)
                .put(items::handle_update_item)
                .delete(items::handle_delete_item),
        )
        .route(
            "/api/items/:id/language",
            post(items::handle_generate_language),
        )
        // Chat over a single item
        .route("/api/chat", post(chat::handle_chat))
        .route("/api/chat/:thread_id", get(chat::handle_list_messages))
        // Collections
        .route(
            "/api/collections",
            get(collections::handle_list_collections).post(collections::handle_create_collection),
        )
        .route(
            "/api/collections/:id",
            get(collections::handle_get_collection).delete(collections::handle_delete_collection),
        )
        .route(
            "/api/collections/:id/items",
            get(collections::handle_list_collection_items).post(collections::handle_add_item),
        )
        .route(
            "/api/collections/:id/items/:item_id",
            delete(collections::handle_remove_item),
        )
        .route(
            "/api/collections/:id/chat",
            get(collections::handle_collection_messages).post(collections::handle_collection_chat),
        )
        // Notes
        .route(
            "/api/notes",
            get(notes::handle_list_notes).post(notes::handle_create_note),
        )
        .route(
            "/api/notes/:id",
            get(notes::handle_get_note)
                .put(notes::handle_update_note)
                .delete(notes::handle_delete_note),
        )
        .route("/api/notes/:id/summarize", post(notes::handle_summarize_note))
        .route(
            "/api/notes/:id/chat",
            get(notes::handle_note_messages).post(notes::handle_note_chat),
        )
        .with_state(state)
}
