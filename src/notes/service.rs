use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use crate::db::models::*;
use crate::db::repository::NoteRepository;
use crate::error::{AppError, AppResult};
use crate::notes::session::SessionStore;
use crate::reminder::clock::Clock;

/// How long a deletion can be undone.
pub const UNDO_WINDOW_MINUTES: i64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub enum UndoOutcome {
    Nothing,
    Expired,
    Restored(Item),
}

/// Note store commands, with per-chat pull/delete/undo state.
#[derive(Clone)]
pub struct NoteService {
    pool: SqlitePool,
    sessions: SessionStore,
    clock: Arc<dyn Clock>,
}

impl NoteService {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            sessions: SessionStore::new(),
            clock,
        }
    }

    pub async fn add(&self, text: &str) -> AppResult<Item> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("note text must not be empty".to_string()));
        }
        NoteRepository::add(&self.pool, text).await
    }

    /// Random note, remembered as this chat's last pull.
    pub async fn pull(&self, chat_id: i64) -> AppResult<Option<Item>> {
        let item = NoteRepository::random(&self.pool).await?;
        if let Some(item) = &item {
            self.sessions.remember_pulled(chat_id, item.clone());
        }
        Ok(item)
    }

    /// Move the chat's last pulled note to the deleted table. `None` when
    /// nothing was pulled.
    pub async fn delete_pulled(&self, chat_id: i64) -> AppResult<Option<DeletedItem>> {
        let Some(item) = self.sessions.last_pulled(chat_id) else {
            return Ok(None);
        };

        let result = NoteRepository::move_to_deleted(&self.pool, &item).await;
        self.sessions.forget_pulled(chat_id);

        let deleted = result?;
        self.sessions.remember_deleted(chat_id, deleted.clone());
        tracing::info!("Chat {} deleted note {}", chat_id, item.id);
        Ok(Some(deleted))
    }

    pub async fn list(&self) -> AppResult<Vec<Item>> {
        NoteRepository::list(&self.pool).await
    }

    pub async fn list_deleted(&self) -> AppResult<Vec<DeletedItem>> {
        NoteRepository::list_deleted(&self.pool).await
    }

    /// Restore the chat's last deleted note if it was deleted within the undo window.
    pub async fn undo(&self, chat_id: i64) -> AppResult<UndoOutcome> {
        let Some(deleted) = self.sessions.last_deleted(chat_id) else {
            return Ok(UndoOutcome::Nothing);
        };
        if self.clock.now() - deleted.deleted_at > Duration::minutes(UNDO_WINDOW_MINUTES) {
            return Ok(UndoOutcome::Expired);
        }

        let restored = NoteRepository::restore(&self.pool, &deleted).await?;
        self.sessions.forget_deleted(chat_id);
        Ok(UndoOutcome::Restored(restored))
    }

    pub async fn export(&self) -> AppResult<BackupData> {
        let mut backup = NoteRepository::export(&self.pool).await?;
        backup.exported_at = self.clock.now();
        Ok(backup)
    }

    /// Parse and import a backup document.
    pub async fn import(&self, raw: &[u8]) -> AppResult<(ImportSummary, DateTime<Utc>)> {
        let backup: BackupData = serde_json::from_slice(raw)?;
        let summary = NoteRepository::import(&self.pool, &backup).await?;
        tracing::info!(
            "Imported backup from {}: {:?}",
            backup.exported_at,
            summary
        );
        Ok((summary, backup.exported_at))
    }
}

pub fn backup_file_name(at: DateTime<Utc>) -> String {
    format!("mindbot-backup-{}.json", at.format("%Y-%m-%d-%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::clock::FixedClock;
    use chrono::TimeZone;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn service() -> (NoteService, FixedClock) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        let clock = FixedClock::new(Utc::now());
        (NoteService::new(pool, Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn add_rejects_blank_text() {
        let (notes, _) = service().await;
        let err = notes.add("  ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_requires_a_pull() {
        let (notes, _) = service().await;
        notes.add("learn rust").await.unwrap();
        assert!(notes.delete_pulled(1).await.unwrap().is_none());

        let pulled = notes.pull(1).await.unwrap().unwrap();
        // Another chat has not pulled anything.
        assert!(notes.delete_pulled(2).await.unwrap().is_none());

        let deleted = notes.delete_pulled(1).await.unwrap().unwrap();
        assert_eq!(deleted.text, pulled.text);
        assert!(notes.list().await.unwrap().is_empty());
        assert!(notes.delete_pulled(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn undo_restores_within_window() {
        let (notes, _) = service().await;
        notes.add("call the bank").await.unwrap();
        notes.pull(1).await.unwrap();
        notes.delete_pulled(1).await.unwrap();

        let restored = match notes.undo(1).await.unwrap() {
            UndoOutcome::Restored(item) => item,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(restored.text, "call the bank");
        assert_eq!(notes.list().await.unwrap(), vec![restored]);
        assert_eq!(notes.undo(1).await.unwrap(), UndoOutcome::Nothing);
        assert!(notes.list_deleted().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn undo_expires_after_an_hour() {
        let (notes, clock) = service().await;
        notes.add("old idea").await.unwrap();
        notes.pull(1).await.unwrap();
        notes.delete_pulled(1).await.unwrap();

        clock.advance(Duration::minutes(61));
        assert_eq!(notes.undo(1).await.unwrap(), UndoOutcome::Expired);
        assert_eq!(notes.list_deleted().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn export_then_import_into_fresh_store() {
        let (notes, _) = service().await;
        notes.add("one").await.unwrap();
        notes.add("two").await.unwrap();
        let backup = notes.export().await.unwrap();
        let raw = serde_json::to_vec_pretty(&backup).unwrap();

        let (fresh, _) = service().await;
        fresh.add("two").await.unwrap();
        let (summary, exported_at) = fresh.import(&raw).await.unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(exported_at, backup.exported_at);
        assert_eq!(fresh.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn import_rejects_garbage() {
        let (notes, _) = service().await;
        let err = notes.import(b"not json").await.unwrap_err();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[test]
    fn backup_file_name_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(backup_file_name(at), "mindbot-backup-2024-03-05-070809.json");
    }
}
