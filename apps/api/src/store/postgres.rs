//! Postgres store backend (sqlx). Language variants live in a child table
//! keyed by `(item_id, language)` rather than wide per-language columns, so a
//! slot is present iff its row is.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::collection::{Collection, CollectionRow, DEFAULT_COLLECTION_COLOR};
use crate::models::item::{
    ContentItem, ItemLanguageRow, ItemRow, Language, SourceKind, SummaryBundle, PLACEHOLDER_SUMMARY,
    PLACEHOLDER_TITLE,
};
use crate::models::message::{ChatMessage, ChatMessageRow, Role};
use crate::models::note::{Note, NoteRow};

use super::{ContentStore, CollectionStore, ItemPatch, NewItem, NotePatch, NoteStore, ThreadStore};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn variants_for(&self, item_id: Uuid) -> Result<Vec<ItemLanguageRow>, AppError> {
        let rows: Vec<ItemLanguageRow> =
            sqlx::query_as("SELECT * FROM item_languages WHERE item_id = $1")
                .bind(item_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }
}

fn key_points_from_json(value: Option<Value>) -> Result<Option<Vec<String>>, AppError> {
    match value {
        None => Ok(None),
        Some(v) => serde_json::from_value(v)
            .map(Some)
            .map_err(|e| AppError::Internal(anyhow!("malformed key_points column: {e}"))),
    }
}

fn item_from_rows(row: ItemRow, variants: Vec<ItemLanguageRow>) -> Result<ContentItem, AppError> {
    let mut languages = BTreeMap::new();
    for variant in variants {
        let language = Language::from_str(&variant.language)
            .map_err(|e| AppError::Internal(anyhow!(e)))?;
        let key_points = serde_json::from_value(variant.key_points)
            .map_err(|e| AppError::Internal(anyhow!("malformed variant key_points: {e}")))?;
        languages.insert(
            language,
            SummaryBundle {
                summary: variant.summary,
                one_line_summary: variant.one_line_summary,
                key_points,
            },
        );
    }
    Ok(ContentItem {
        id: row.id,
        source_url: row.source_url,
        kind: SourceKind::from_str(&row.kind).map_err(|e| AppError::Internal(anyhow!(e)))?,
        status: row
            .status
            .parse()
            .map_err(|e: String| AppError::Internal(anyhow!(e)))?,
        title: row.title,
        summary: row.summary,
        one_line_summary: row.one_line_summary,
        key_points: key_points_from_json(row.key_points)?,
        cover_image: row.cover_image,
        metadata: row.metadata,
        languages,
        worker_id: row.worker_id,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn note_from_row(row: NoteRow) -> Result<Note, AppError> {
    Ok(Note {
        id: row.id,
        title: row.title,
        content: row.content,
        status: row
            .status
            .parse()
            .map_err(|e: String| AppError::Internal(anyhow!(e)))?,
        summary: row.summary,
        one_line_summary: row.one_line_summary,
        key_points: key_points_from_json(row.key_points)?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn message_from_row(row: ChatMessageRow) -> Result<ChatMessage, AppError> {
    Ok(ChatMessage {
        id: row.id,
        thread_id: row.thread_id,
        role: row
            .role
            .parse()
            .map_err(|e: String| AppError::Internal(anyhow!(e)))?,
        content: row.content,
        created_at: row.created_at,
    })
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

#[async_trait]
impl ContentStore for PgStore {
    async fn insert_placeholder(&self, new: NewItem) -> Result<ContentItem, AppError> {
        let row: ItemRow = sqlx::query_as(
            r#"
            INSERT INTO items (id, source_url, kind, status, title, summary)
            VALUES ($1, $2, $3, 'processing', $4, $5)
            RETURNING *
            "#,
        )
        .bind(new.id)
        .bind(&new.source_url)
        .bind(new.kind.as_str())
        .bind(PLACEHOLDER_TITLE)
        .bind(PLACEHOLDER_SUMMARY)
        .fetch_one(&self.pool)
        .await?;
        item_from_rows(row, Vec::new())
    }

    async fn get_item(&self, id: Uuid) -> Result<Option<ContentItem>, AppError> {
        let row: Option<ItemRow> = sqlx::query_as("SELECT * FROM items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            None => Ok(None),
            Some(row) => {
                let variants = self.variants_for(id).await?;
                item_from_rows(row, variants).map(Some)
            }
        }
    }

    async fn list_items(&self) -> Result<Vec<ContentItem>, AppError> {
        let rows: Vec<ItemRow> = sqlx::query_as("SELECT * FROM items ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        let variants: Vec<ItemLanguageRow> = sqlx::query_as("SELECT * FROM item_languages")
            .fetch_all(&self.pool)
            .await?;
        let mut by_item: HashMap<Uuid, Vec<ItemLanguageRow>> = HashMap::new();
        for variant in variants {
            by_item.entry(variant.item_id).or_default().push(variant);
        }
        rows.into_iter()
            .map(|row| {
                let variants = by_item.remove(&row.id).unwrap_or_default();
                item_from_rows(row, variants)
            })
            .collect()
    }

    async fn update_item(
        &self,
        id: Uuid,
        patch: ItemPatch,
    ) -> Result<Option<ContentItem>, AppError> {
        let key_points = patch
            .key_points
            .map(|kp| serde_json::to_value(kp))
            .transpose()
            .map_err(|e| AppError::Internal(anyhow!("serializing key_points: {e}")))?;
        let row: Option<ItemRow> = sqlx::query_as(
            r#"
            UPDATE items SET
                title            = COALESCE($2, title),
                summary          = COALESCE($3, summary),
                one_line_summary = COALESCE($4, one_line_summary),
                key_points       = COALESCE($5, key_points),
                cover_image      = COALESCE($6, cover_image),
                metadata         = COALESCE($7, metadata),
                status           = COALESCE($8, status),
                worker_id        = COALESCE($9, worker_id),
                updated_at       = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.title)
        .bind(patch.summary)
        .bind(patch.one_line_summary)
        .bind(key_points)
        .bind(patch.cover_image)
        .bind(patch.metadata)
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.worker_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            None => Ok(None),
            Some(row) => {
                let variants = self.variants_for(id).await?;
                item_from_rows(row, variants).map(Some)
            }
        }
    }

    async fn delete_item(&self, id: Uuid) -> Result<(), AppError> {
        // thread_id is untyped (items, collections, and notes all own threads),
        // so message cleanup cannot ride on a foreign key.
        sqlx::query("DELETE FROM chat_messages WHERE thread_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_language_variant(
        &self,
        id: Uuid,
        language: Language,
    ) -> Result<Option<SummaryBundle>, AppError> {
        let row: Option<ItemLanguageRow> =
            sqlx::query_as("SELECT * FROM item_languages WHERE item_id = $1 AND language = $2")
                .bind(id)
                .bind(language.code())
                .fetch_optional(&self.pool)
                .await?;
        match row {
            None => Ok(None),
            Some(row) => {
                let key_points = serde_json::from_value(row.key_points)
                    .map_err(|e| AppError::Internal(anyhow!("malformed variant key_points: {e}")))?;
                Ok(Some(SummaryBundle {
                    summary: row.summary,
                    one_line_summary: row.one_line_summary,
                    key_points,
                }))
            }
        }
    }

    async fn put_language_variant(
        &self,
        id: Uuid,
        language: Language,
        bundle: &SummaryBundle,
    ) -> Result<bool, AppError> {
        let key_points = serde_json::to_value(&bundle.key_points)
            .map_err(|e| AppError::Internal(anyhow!("serializing key_points: {e}")))?;
        let result = sqlx::query(
            r#"
            INSERT INTO item_languages (item_id, language, summary, one_line_summary, key_points)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (item_id, language) DO UPDATE SET
                summary          = EXCLUDED.summary,
                one_line_summary = EXCLUDED.one_line_summary,
                key_points       = EXCLUDED.key_points
            "#,
        )
        .bind(id)
        .bind(language.code())
        .bind(&bundle.summary)
        .bind(&bundle.one_line_summary)
        .bind(key_points)
        .execute(&self.pool)
        .await;
        match result {
            Ok(_) => {
                sqlx::query("UPDATE items SET updated_at = NOW() WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                Ok(true)
            }
            // The owning row is gone; the variant write is discarded.
            Err(e) if is_foreign_key_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn fail_orphaned_items(&self, message: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE items
            SET status = 'failed', summary = $1, updated_at = NOW()
            WHERE status = 'processing'
            "#,
        )
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ThreadStore for PgStore {
    async fn append_message(
        &self,
        thread_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<ChatMessage, AppError> {
        let row: ChatMessageRow = sqlx::query_as(
            r#"
            INSERT INTO chat_messages (id, thread_id, role, content)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(thread_id)
        .bind(role.as_str())
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        message_from_row(row)
    }

    async fn list_messages(&self, thread_id: Uuid) -> Result<Vec<ChatMessage>, AppError> {
        let rows: Vec<ChatMessageRow> = sqlx::query_as(
            "SELECT * FROM chat_messages WHERE thread_id = $1 ORDER BY created_at ASC",
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(message_from_row).collect()
    }
}

#[async_trait]
impl CollectionStore for PgStore {
    async fn create_collection(
        &self,
        name: &str,
        description: Option<&str>,
        color: Option<&str>,
    ) -> Result<Collection, AppError> {
        let row: CollectionRow = sqlx::query_as(
            r#"
            INSERT INTO collections (id, name, description, color)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, color, 0::BIGINT AS item_count,
                      created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .bind(color.unwrap_or(DEFAULT_COLLECTION_COLOR))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn list_collections(&self) -> Result<Vec<Collection>, AppError> {
        let rows: Vec<CollectionRow> = sqlx::query_as(
            r#"
            SELECT c.id, c.name, c.description, c.color,
                   COUNT(ci.item_id) AS item_count, c.created_at, c.updated_at
            FROM collections c
            LEFT JOIN collection_items ci ON ci.collection_id = c.id
            GROUP BY c.id
            ORDER BY c.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Collection::from).collect())
    }

    async fn get_collection(&self, id: Uuid) -> Result<Option<Collection>, AppError> {
        let row: Option<CollectionRow> = sqlx::query_as(
            r#"
            SELECT c.id, c.name, c.description, c.color,
                   COUNT(ci.item_id) AS item_count, c.created_at, c.updated_at
            FROM collections c
            LEFT JOIN collection_items ci ON ci.collection_id = c.id
            WHERE c.id = $1
            GROUP BY c.id
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Collection::from))
    }

    async fn delete_collection(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM chat_messages WHERE thread_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM collections WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_collection_items(&self, id: Uuid) -> Result<Vec<ContentItem>, AppError> {
        let rows: Vec<ItemRow> = sqlx::query_as(
            r#"
            SELECT i.*
            FROM items i
            JOIN collection_items ci ON ci.item_id = i.id
            WHERE ci.collection_id = $1
            ORDER BY ci.added_at DESC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let variants: Vec<ItemLanguageRow> =
            sqlx::query_as("SELECT * FROM item_languages WHERE item_id = ANY($1)")
                .bind(&ids)
                .fetch_all(&self.pool)
                .await?;
        let mut by_item: HashMap<Uuid, Vec<ItemLanguageRow>> = HashMap::new();
        for variant in variants {
            by_item.entry(variant.item_id).or_default().push(variant);
        }
        rows.into_iter()
            .map(|row| {
                let variants = by_item.remove(&row.id).unwrap_or_default();
                item_from_rows(row, variants)
            })
            .collect()
    }

    async fn add_item_to_collection(
        &self,
        collection_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO collection_items (collection_id, item_id)
            VALUES ($1, $2)
            ON CONFLICT (collection_id, item_id) DO NOTHING
            "#,
        )
        .bind(collection_id)
        .bind(item_id)
        .execute(&self.pool)
        .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_foreign_key_violation(&e) => Err(AppError::NotFound(
                "Collection or item not found".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_item_from_collection(
        &self,
        collection_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM collection_items WHERE collection_id = $1 AND item_id = $2")
            .bind(collection_id)
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl NoteStore for PgStore {
    async fn create_note(&self, title: &str, content: &str) -> Result<Note, AppError> {
        let row: NoteRow = sqlx::query_as(
            r#"
            INSERT INTO notes (id, title, content, status)
            VALUES ($1, $2, $3, 'draft')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        note_from_row(row)
    }

    async fn get_note(&self, id: Uuid) -> Result<Option<Note>, AppError> {
        let row: Option<NoteRow> = sqlx::query_as("SELECT * FROM notes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(note_from_row).transpose()
    }

    async fn list_notes(&self) -> Result<Vec<Note>, AppError> {
        let rows: Vec<NoteRow> = sqlx::query_as("SELECT * FROM notes ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(note_from_row).collect()
    }

    async fn update_note(&self, id: Uuid, patch: NotePatch) -> Result<Option<Note>, AppError> {
        let key_points = patch
            .key_points
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| AppError::Internal(anyhow!("serializing key_points: {e}")))?;
        let row: Option<NoteRow> = sqlx::query_as(
            r#"
            UPDATE notes SET
                title            = COALESCE($2, title),
                content          = COALESCE($3, content),
                summary          = COALESCE($4, summary),
                one_line_summary = COALESCE($5, one_line_summary),
                key_points       = COALESCE($6, key_points),
                status           = COALESCE($7, status),
                updated_at       = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.title)
        .bind(patch.content)
        .bind(patch.summary)
        .bind(patch.one_line_summary)
        .bind(key_points)
        .bind(patch.status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await?;
        row.map(note_from_row).transpose()
    }

    async fn delete_note(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM chat_messages WHERE thread_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
