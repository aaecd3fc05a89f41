//! The injected store seam. Handlers and the orchestrator only ever see
//! `Arc<dyn Store>`; the backend is chosen once at startup (Postgres when
//! `DATABASE_URL` is set, in-memory otherwise) and passed by reference.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::collection::Collection;
use crate::models::item::{ContentItem, ItemStatus, Language, SourceKind, SummaryBundle};
use crate::models::message::{ChatMessage, Role};
use crate::models::note::{Note, NoteStatus};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Inputs for a placeholder row created by `submit`.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub id: Uuid,
    pub source_url: String,
    pub kind: SourceKind,
}

/// Partial update of an item. `None` fields are left untouched; `updated_at`
/// advances on every applied patch.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub one_line_summary: Option<String>,
    pub key_points: Option<Vec<String>>,
    pub cover_image: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub status: Option<ItemStatus>,
    pub worker_id: Option<String>,
}

/// Partial update of a note.
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub one_line_summary: Option<String>,
    pub key_points: Option<Vec<String>>,
    pub status: Option<NoteStatus>,
}

/// The job record store: content items plus their per-language variants.
///
/// `update_item` and `put_language_variant` are no-ops against a deleted id
/// (returning `None`/`false`) and never recreate a row — this is what lets a
/// deletion pre-empt an in-flight ingestion run.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn insert_placeholder(&self, new: NewItem) -> Result<ContentItem, AppError>;
    async fn get_item(&self, id: Uuid) -> Result<Option<ContentItem>, AppError>;
    async fn list_items(&self) -> Result<Vec<ContentItem>, AppError>;
    async fn update_item(&self, id: Uuid, patch: ItemPatch)
        -> Result<Option<ContentItem>, AppError>;
    async fn delete_item(&self, id: Uuid) -> Result<(), AppError>;

    async fn get_language_variant(
        &self,
        id: Uuid,
        language: Language,
    ) -> Result<Option<SummaryBundle>, AppError>;
    /// Writes all three fields of a language slot together. Returns `false`
    /// when the owning item no longer exists.
    async fn put_language_variant(
        &self,
        id: Uuid,
        language: Language,
        bundle: &SummaryBundle,
    ) -> Result<bool, AppError>;

    /// Marks every row still `processing` as failed with the given message.
    /// Called once at startup: after a restart no live task backs those rows,
    /// so they would otherwise stay `processing` forever. Returns the number
    /// of rows swept.
    async fn fail_orphaned_items(&self, message: &str) -> Result<u64, AppError>;
}

/// The message thread store. Append-only; listing is ordered by time ascending.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    async fn append_message(
        &self,
        thread_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<ChatMessage, AppError>;
    async fn list_messages(&self, thread_id: Uuid) -> Result<Vec<ChatMessage>, AppError>;
}

#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn create_collection(
        &self,
        name: &str,
        description: Option<&str>,
        color: Option<&str>,
    ) -> Result<Collection, AppError>;
    async fn list_collections(&self) -> Result<Vec<Collection>, AppError>;
    async fn get_collection(&self, id: Uuid) -> Result<Option<Collection>, AppError>;
    async fn delete_collection(&self, id: Uuid) -> Result<(), AppError>;

    async fn list_collection_items(&self, id: Uuid) -> Result<Vec<ContentItem>, AppError>;
    async fn add_item_to_collection(
        &self,
        collection_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), AppError>;
    async fn remove_item_from_collection(
        &self,
        collection_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), AppError>;
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn create_note(&self, title: &str, content: &str) -> Result<Note, AppError>;
    async fn get_note(&self, id: Uuid) -> Result<Option<Note>, AppError>;
    async fn list_notes(&self) -> Result<Vec<Note>, AppError>;
    async fn update_note(&self, id: Uuid, patch: NotePatch) -> Result<Option<Note>, AppError>;
    async fn delete_note(&self, id: Uuid) -> Result<(), AppError>;
}

/// The single injected store object carried in `AppState`.
pub trait Store: ContentStore + ThreadStore + CollectionStore + NoteStore {}

impl<T: ContentStore + ThreadStore + CollectionStore + NoteStore> Store for T {}
