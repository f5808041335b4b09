use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stored note.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A note that was removed with `/delete`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct DeletedItem {
    pub id: i64,
    pub text: String,
    pub deleted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupItem {
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupDeletedItem {
    pub text: String,
    pub deleted_at: DateTime<Utc>,
}

/// JSON document produced by `/export` and accepted by `/import`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupData {
    #[serde(default)]
    pub items: Vec<BackupItem>,
    #[serde(default)]
    pub deleted_items: Vec<BackupDeletedItem>,
    pub exported_at: DateTime<Utc>,
}

/// Counters reported after an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub deleted_imported: usize,
    pub deleted_skipped: usize,
}
