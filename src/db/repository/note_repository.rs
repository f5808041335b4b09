use chrono::Utc;
use rand::seq::SliceRandom;
use sqlx::SqlitePool;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Note Repository
// ============================================================================

pub struct NoteRepository;

impl NoteRepository {
    pub async fn add(pool: &SqlitePool, text: &str) -> AppResult<Item> {
        let now = Utc::now();

        let result = sqlx::query("INSERT INTO items (text, created_at) VALUES (?, ?)")
            .bind(text)
            .bind(now)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(Item {
            id: result.last_insert_rowid(),
            text: text.to_string(),
            created_at: now,
        })
    }

    /// Newest first.
    pub async fn list(pool: &SqlitePool) -> AppResult<Vec<Item>> {
        sqlx::query_as::<_, Item>(
            "SELECT id, text, created_at FROM items ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Newest first.
    pub async fn list_deleted(pool: &SqlitePool) -> AppResult<Vec<DeletedItem>> {
        sqlx::query_as::<_, DeletedItem>(
            "SELECT id, text, deleted_at FROM deleted ORDER BY deleted_at DESC, id DESC",
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn random(pool: &SqlitePool) -> AppResult<Option<Item>> {
        let items = sqlx::query_as::<_, Item>("SELECT id, text, created_at FROM items")
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(items.choose(&mut rand::thread_rng()).cloned())
    }

    /// Move an item into the deleted table.
    pub async fn move_to_deleted(pool: &SqlitePool, item: &Item) -> AppResult<DeletedItem> {
        let now = Utc::now();
        let mut tx = pool.begin().await.map_err(AppError::Database)?;

        let removed = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(item.id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        if removed.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("item {}", item.id)));
        }

        let inserted = sqlx::query("INSERT INTO deleted (text, deleted_at) VALUES (?, ?)")
            .bind(&item.text)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;

        Ok(DeletedItem {
            id: inserted.last_insert_rowid(),
            text: item.text.clone(),
            deleted_at: now,
        })
    }

    /// Move a deleted item back into the items table.
    pub async fn restore(pool: &SqlitePool, deleted: &DeletedItem) -> AppResult<Item> {
        let now = Utc::now();
        let mut tx = pool.begin().await.map_err(AppError::Database)?;

        let removed = sqlx::query("DELETE FROM deleted WHERE id = ?")
            .bind(deleted.id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        if removed.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("deleted item {}", deleted.id)));
        }

        let inserted = sqlx::query("INSERT INTO items (text, created_at) VALUES (?, ?)")
            .bind(&deleted.text)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;

        Ok(Item {
            id: inserted.last_insert_rowid(),
            text: deleted.text.clone(),
            created_at: now,
        })
    }

    /// Snapshot of both tables, oldest first.
    pub async fn export(pool: &SqlitePool) -> AppResult<BackupData> {
        let items = sqlx::query_as::<_, Item>(
            "SELECT id, text, created_at FROM items ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        let deleted = sqlx::query_as::<_, DeletedItem>(
            "SELECT id, text, deleted_at FROM deleted ORDER BY deleted_at ASC, id ASC",
        )
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(BackupData {
            items: items
                .into_iter()
                .map(|i| BackupItem {
                    text: i.text,
                    created_at: i.created_at,
                })
                .collect(),
            deleted_items: deleted
                .into_iter()
                .map(|d| BackupDeletedItem {
                    text: d.text,
                    deleted_at: d.deleted_at,
                })
                .collect(),
            exported_at: Utc::now(),
        })
    }

    /// Import a backup in one transaction, keeping the original timestamps.
    /// Entries whose text already exists in the target table are skipped.
    pub async fn import(pool: &SqlitePool, backup: &BackupData) -> AppResult<ImportSummary> {
        let mut summary = ImportSummary::default();
        let mut tx = pool.begin().await.map_err(AppError::Database)?;

        for item in &backup.items {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM items WHERE text = ?)")
                    .bind(&item.text)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(AppError::Database)?;

            if exists {
                summary.skipped += 1;
                continue;
            }

            sqlx::query("INSERT INTO items (text, created_at) VALUES (?, ?)")
                .bind(&item.text)
                .bind(item.created_at)
                .execute(&mut *tx)
                .await
                .map_err(AppError::Database)?;
            summary.imported += 1;
        }

        for item in &backup.deleted_items {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM deleted WHERE text = ?)")
                    .bind(&item.text)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(AppError::Database)?;

            if exists {
                summary.deleted_skipped += 1;
                continue;
            }

            sqlx::query("INSERT INTO deleted (text, deleted_at) VALUES (?, ?)")
                .bind(&item.text)
                .bind(item.deleted_at)
                .execute(&mut *tx)
                .await
                .map_err(AppError::Database)?;
            summary.deleted_imported += 1;
        }

        tx.commit().await.map_err(AppError::Database)?;

        Ok(summary)
    }
}
