// Gallery asset store - image blobs persisted in SQLite

use crate::core::database::Database;
use crate::models::asset::AssetEntry;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Other(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable key-value store of image blobs.
///
/// Ids are assigned by the store, never reused, and deletion is terminal.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Persist a blob under a fresh id and the current time
    async fn save(&self, blob: Vec<u8>, name: &str) -> StoreResult<AssetEntry>;

    /// All entries, newest first
    async fn list(&self) -> StoreResult<Vec<AssetEntry>>;

    async fn get(&self, id: &str) -> StoreResult<Option<AssetEntry>>;

    /// Remove an entry; succeeds if the id is absent
    async fn delete(&self, id: &str) -> StoreResult<()>;
}

pub struct SqliteAssetStore {
    db: Arc<Database>,
}

impl SqliteAssetStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AssetStore for SqliteAssetStore {
    async fn save(&self, blob: Vec<u8>, name: &str) -> StoreResult<AssetEntry> {
        let entry = AssetEntry {
            id: Uuid::new_v4().to_string(),
            blob,
            name: name.to_string(),
            added_at: chrono::Utc::now().timestamp_millis(),
        };
        let created_at = chrono::Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO assets (id, name, blob, added_at, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.name)
        .bind(&entry.blob)
        .bind(entry.added_at)
        .bind(created_at)
        .execute(self.db.pool())
        .await?;

        tracing::debug!(
            id = %entry.id,
            name = %entry.name,
            bytes = entry.blob.len(),
            "Saved asset"
        );
        Ok(entry)
    }

    async fn list(&self) -> StoreResult<Vec<AssetEntry>> {
        let entries = sqlx::query_as::<_, AssetEntry>(
            "SELECT id, blob, name, added_at FROM assets ORDER BY added_at DESC, rowid DESC",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(entries)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<AssetEntry>> {
        let entry = sqlx::query_as::<_, AssetEntry>(
            "SELECT id, blob, name, added_at FROM assets WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(entry)
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM assets WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        tracing::debug!(id = %id, "Deleted asset");
        Ok(())
    }
}
