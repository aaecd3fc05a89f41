//! In-memory store backend. Serves two roles: the fallback when no
//! `DATABASE_URL` is configured (local development without Postgres) and the
//! backend the test suite runs against.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::collection::{Collection, DEFAULT_COLLECTION_COLOR};
use crate::models::item::{
    ContentItem, ItemStatus, Language, SummaryBundle, PLACEHOLDER_SUMMARY, PLACEHOLDER_TITLE,
};
use crate::models::message::{ChatMessage, Role};
use crate::models::note::{Note, NoteStatus};

use super::{ContentStore, CollectionStore, ItemPatch, NewItem, NotePatch, NoteStore, ThreadStore};

#[derive(Debug, Clone)]
struct Membership {
    collection_id: Uuid,
    item_id: Uuid,
    added_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<Uuid, ContentItem>>,
    messages: RwLock<Vec<ChatMessage>>,
    collections: RwLock<HashMap<Uuid, Collection>>,
    memberships: RwLock<Vec<Membership>>,
    notes: RwLock<HashMap<Uuid, Note>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn insert_placeholder(&self, new: NewItem) -> Result<ContentItem, AppError> {
        let now = Utc::now();
        let item = ContentItem {
            id: new.id,
            source_url: new.source_url,
            kind: new.kind,
            status: ItemStatus::Processing,
            title: PLACEHOLDER_TITLE.to_string(),
            summary: PLACEHOLDER_SUMMARY.to_string(),
            one_line_summary: None,
            key_points: None,
            cover_image: None,
            metadata: None,
            languages: BTreeMap::new(),
            worker_id: None,
            created_at: now,
            updated_at: now,
        };
        self.items.write().await.insert(item.id, item.clone());
        Ok(item)
    }

    async fn get_item(&self, id: Uuid) -> Result<Option<ContentItem>, AppError> {
        Ok(self.items.read().await.get(&id).cloned())
    }

    async fn list_items(&self) -> Result<Vec<ContentItem>, AppError> {
        let mut items: Vec<_> = self.items.read().await.values().cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn update_item(
        &self,
        id: Uuid,
        patch: ItemPatch,
    ) -> Result<Option<ContentItem>, AppError> {
        let mut items = self.items.write().await;
        let Some(item) = items.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = patch.title {
            item.title = title;
        }
        if let Some(summary) = patch.summary {
            item.summary = summary;
        }
        if let Some(one_line) = patch.one_line_summary {
            item.one_line_summary = Some(one_line);
        }
        if let Some(key_points) = patch.key_points {
            item.key_points = Some(key_points);
        }
        if let Some(cover_image) = patch.cover_image {
            item.cover_image = Some(cover_image);
        }
        if let Some(metadata) = patch.metadata {
            item.metadata = Some(metadata);
        }
        if let Some(status) = patch.status {
            item.status = status;
        }
        if let Some(worker_id) = patch.worker_id {
            item.worker_id = Some(worker_id);
        }
        item.updated_at = Utc::now();
        Ok(Some(item.clone()))
    }

    async fn delete_item(&self, id: Uuid) -> Result<(), AppError> {
        self.items.write().await.remove(&id);
        self.messages.write().await.retain(|m| m.thread_id != id);
        self.memberships.write().await.retain(|m| m.item_id != id);
        Ok(())
    }

    async fn get_language_variant(
        &self,
        id: Uuid,
        language: Language,
    ) -> Result<Option<SummaryBundle>, AppError> {
        Ok(self
            .items
            .read()
            .await
            .get(&id)
            .and_then(|item| item.languages.get(&language).cloned()))
    }

    async fn put_language_variant(
        &self,
        id: Uuid,
        language: Language,
        bundle: &SummaryBundle,
    ) -> Result<bool, AppError> {
        let mut items = self.items.write().await;
        let Some(item) = items.get_mut(&id) else {
            return Ok(false);
        };
        item.languages.insert(language, bundle.clone());
        item.updated_at = Utc::now();
        Ok(true)
    }

    async fn fail_orphaned_items(&self, message: &str) -> Result<u64, AppError> {
        let mut swept = 0;
        let mut items = self.items.write().await;
        for item in items.values_mut() {
            if item.status == ItemStatus::Processing {
                item.status = ItemStatus::Failed;
                item.summary = message.to_string();
                item.updated_at = Utc::now();
                swept += 1;
            }
        }
        Ok(swept)
    }
}

#[async_trait]
impl ThreadStore for MemoryStore {
    async fn append_message(
        &self,
        thread_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<ChatMessage, AppError> {
        let message = ChatMessage {
            id: Uuid::new_v4(),
            thread_id,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.messages.write().await.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, thread_id: Uuid) -> Result<Vec<ChatMessage>, AppError> {
        let mut messages: Vec<_> = self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn create_collection(
        &self,
        name: &str,
        description: Option<&str>,
        color: Option<&str>,
    ) -> Result<Collection, AppError> {
        let now = Utc::now();
        let collection = Collection {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(str::to_string),
            color: color.unwrap_or(DEFAULT_COLLECTION_COLOR).to_string(),
            item_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.collections
            .write()
            .await
            .insert(collection.id, collection.clone());
        Ok(collection)
    }

    async fn list_collections(&self) -> Result<Vec<Collection>, AppError> {
        let memberships = self.memberships.read().await;
        let mut collections: Vec<_> = self
            .collections
            .read()
            .await
            .values()
            .cloned()
            .map(|mut c| {
                c.item_count = memberships
                    .iter()
                    .filter(|m| m.collection_id == c.id)
                    .count() as i64;
                c
            })
            .collect();
        collections.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(collections)
    }

    async fn get_collection(&self, id: Uuid) -> Result<Option<Collection>, AppError> {
        let Some(mut collection) = self.collections.read().await.get(&id).cloned() else {
            return Ok(None);
        };
        collection.item_count = self
            .memberships
            .read()
            .await
            .iter()
            .filter(|m| m.collection_id == id)
            .count() as i64;
        Ok(Some(collection))
    }

    async fn delete_collection(&self, id: Uuid) -> Result<(), AppError> {
        self.collections.write().await.remove(&id);
        self.memberships
            .write()
            .await
            .retain(|m| m.collection_id != id);
        self.messages.write().await.retain(|m| m.thread_id != id);
        Ok(())
    }

    async fn list_collection_items(&self, id: Uuid) -> Result<Vec<ContentItem>, AppError> {
        let items = self.items.read().await;
        let mut members: Vec<_> = self
            .memberships
            .read()
            .await
            .iter()
            .filter(|m| m.collection_id == id)
            .cloned()
            .collect();
        members.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(members
            .iter()
            .filter_map(|m| items.get(&m.item_id).cloned())
            .collect())
    }

    async fn add_item_to_collection(
        &self,
        collection_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), AppError> {
        if !self.collections.read().await.contains_key(&collection_id) {
            return Err(AppError::NotFound(format!(
                "Collection {collection_id} not found"
            )));
        }
        if !self.items.read().await.contains_key(&item_id) {
            return Err(AppError::NotFound(format!("Item {item_id} not found")));
        }
        let mut memberships = self.memberships.write().await;
        let exists = memberships
            .iter()
            .any(|m| m.collection_id == collection_id && m.item_id == item_id);
        if !exists {
            memberships.push(Membership {
                collection_id,
                item_id,
                added_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn remove_item_from_collection(
        &self,
        collection_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), AppError> {
        self.memberships
            .write()
            .await
            .retain(|m| !(m.collection_id == collection_id && m.item_id == item_id));
        Ok(())
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn create_note(&self, title: &str, content: &str) -> Result<Note, AppError> {
        let now = Utc::now();
        let note = Note {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: content.to_string(),
            status: NoteStatus::Draft,
            summary: None,
            one_line_summary: None,
            key_points: None,
            created_at: now,
            updated_at: now,
        };
        self.notes.write().await.insert(note.id, note.clone());
        Ok(note)
    }

    async fn get_note(&self, id: Uuid) -> Result<Option<Note>, AppError> {
        Ok(self.notes.read().await.get(&id).cloned())
    }

    async fn list_notes(&self) -> Result<Vec<Note>, AppError> {
        let mut notes: Vec<_> = self.notes.read().await.values().cloned().collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notes)
    }

    async fn update_note(&self, id: Uuid, patch: NotePatch) -> Result<Option<Note>, AppError> {
        let mut notes = self.notes.write().await;
        let Some(note) = notes.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = patch.title {
            note.title = title;
        }
        if let Some(content) = patch.content {
            note.content = content;
        }
        if let Some(summary) = patch.summary {
            note.summary = Some(summary);
        }
        if let Some(one_line) = patch.one_line_summary {
            note.one_line_summary = Some(one_line);
        }
        if let Some(key_points) = patch.key_points {
            note.key_points = Some(key_points);
        }
        if let Some(status) = patch.status {
            note.status = status;
        }
        note.updated_at = Utc::now();
        Ok(Some(note.clone()))
    }

    async fn delete_note(&self, id: Uuid) -> Result<(), AppError> {
        self.notes.write().await.remove(&id);
        self.messages.write().await.retain(|m| m.thread_id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_placeholder_starts_processing() {
        let store = MemoryStore::new();
        let item = store
            .insert_placeholder(NewItem {
                id: Uuid::new_v4(),
                source_url: "https://example.com".to_string(),
                kind: crate::models::item::SourceKind::Website,
            })
            .await
            .unwrap();
        assert_eq!(item.status, ItemStatus::Processing);
        assert_eq!(item.title, PLACEHOLDER_TITLE);
        assert_eq!(item.summary, PLACEHOLDER_SUMMARY);
    }

    #[tokio::test]
    async fn test_update_missing_item_is_noop() {
        let store = MemoryStore::new();
        let result = store
            .update_item(Uuid::new_v4(), ItemPatch::default())
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(store.list_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_cascades_messages_and_memberships() {
        let store = MemoryStore::new();
        let item = store
            .insert_placeholder(NewItem {
                id: Uuid::new_v4(),
                source_url: "https://example.com".to_string(),
                kind: crate::models::item::SourceKind::Website,
            })
            .await
            .unwrap();
        let collection = store.create_collection("Reads", None, None).await.unwrap();
        store
            .add_item_to_collection(collection.id, item.id)
            .await
            .unwrap();
        store
            .append_message(item.id, Role::User, "hello")
            .await
            .unwrap();

        store.delete_item(item.id).await.unwrap();

        assert!(store.get_item(item.id).await.unwrap().is_none());
        assert!(store.list_messages(item.id).await.unwrap().is_empty());
        assert_eq!(
            store.get_collection(collection.id).await.unwrap().unwrap().item_count,
            0
        );
    }

    #[tokio::test]
    async fn test_language_variant_round_trip() {
        let store = MemoryStore::new();
        let item = store
            .insert_placeholder(NewItem {
                id: Uuid::new_v4(),
                source_url: "https://example.com".to_string(),
                kind: crate::models::item::SourceKind::Website,
            })
            .await
            .unwrap();
        let bundle = SummaryBundle {
            summary: "Résumé".to_string(),
            one_line_summary: "Une ligne".to_string(),
            key_points: vec!["point".to_string()],
        };
        assert!(store
            .put_language_variant(item.id, Language::French, &bundle)
            .await
            .unwrap());
        let stored = store
            .get_language_variant(item.id, Language::French)
            .await
            .unwrap();
        assert_eq!(stored, Some(bundle.clone()));

        // Against a deleted id the write is a refused no-op.
        store.delete_item(item.id).await.unwrap();
        assert!(!store
            .put_language_variant(item.id, Language::French, &bundle)
            .await
            .unwrap());
        assert!(store.get_item(item.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fail_orphaned_only_touches_processing() {
        let store = MemoryStore::new();
        let orphan = store
            .insert_placeholder(NewItem {
                id: Uuid::new_v4(),
                source_url: "https://example.com/a".to_string(),
                kind: crate::models::item::SourceKind::Website,
            })
            .await
            .unwrap();
        let done = store
            .insert_placeholder(NewItem {
                id: Uuid::new_v4(),
                source_url: "https://example.com/b".to_string(),
                kind: crate::models::item::SourceKind::Website,
            })
            .await
            .unwrap();
        store
            .update_item(
                done.id,
                ItemPatch {
                    status: Some(ItemStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let swept = store.fail_orphaned_items("interrupted").await.unwrap();
        assert_eq!(swept, 1);

        let orphan = store.get_item(orphan.id).await.unwrap().unwrap();
        assert_eq!(orphan.status, ItemStatus::Failed);
        assert_eq!(orphan.summary, "interrupted");
        let done = store.get_item(done.id).await.unwrap().unwrap();
        assert_eq!(done.status, ItemStatus::Completed);
    }
}
