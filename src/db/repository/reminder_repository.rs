use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, SqlitePool};

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// Intermediate structure for reading from DB (pattern and status kept as text)
#[derive(sqlx::FromRow)]
struct RowReminder {
    id: String,
    user_id: String,
    title: String,
    description: Option<String>,
    due_time: DateTime<Utc>,
    recurrence_pattern: Option<String>,
    priority: bool,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RowReminder> for Reminder {
    type Error = AppError;

    fn try_from(row: RowReminder) -> Result<Self, Self::Error> {
        let recurrence = match row.recurrence_pattern.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<RecurrencePattern>()?),
        };
        let status = ReminderStatus::from_str(&row.status).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "reminder {} has unknown status {}",
                row.id,
                row.status
            ))
        })?;

        Ok(Reminder {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            due_time: row.due_time,
            recurrence,
            priority: row.priority,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, title, description, due_time,
           recurrence_pattern, priority, status, created_at, updated_at
    FROM reminders
"#;

fn insert_query(reminder: &Reminder) -> sqlx::query::Query<'_, Sqlite, SqliteArguments<'_>> {
    sqlx::query(
        r#"
        INSERT INTO reminders (
            id, user_id, title, description, due_time,
            recurrence_pattern, priority, status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&reminder.id)
    .bind(&reminder.user_id)
    .bind(&reminder.title)
    .bind(reminder.description.as_deref())
    .bind(reminder.due_time)
    .bind(reminder.recurrence.as_ref().map(|p| p.to_string()))
    .bind(reminder.priority)
    .bind(reminder.status.as_str())
    .bind(reminder.created_at)
    .bind(reminder.updated_at)
}

// ============================================================================
// Reminder Repository
// ============================================================================

pub struct ReminderRepository;

impl ReminderRepository {
    /// Insert a reminder. `updated_at` is set to the insertion time.
    pub async fn create(pool: &SqlitePool, reminder: &Reminder) -> AppResult<Reminder> {
        let mut stored = reminder.clone();
        stored.updated_at = Utc::now();

        insert_query(&stored)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(stored)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Reminder>> {
        let row = sqlx::query_as::<_, RowReminder>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)?;

        row.map(Reminder::try_from).transpose()
    }

    /// Resolve a reminder by full id or by the short prefix shown in listings,
    /// restricted to reminders owned by `user_id`.
    pub async fn find_by_id_prefix(
        pool: &SqlitePool,
        user_id: &str,
        prefix: &str,
    ) -> AppResult<Vec<Reminder>> {
        let escaped = prefix
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let rows = sqlx::query_as::<_, RowReminder>(&format!(
            "{} WHERE user_id = ? AND id LIKE ? ESCAPE '\\' ORDER BY due_time ASC",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .bind(format!("{}%", escaped))
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        rows.into_iter().map(Reminder::try_from).collect()
    }

    /// List reminders with optional filters, ordered by ascending due time.
    /// `user_id = None` lists across all users. Rows whose recurrence pattern
    /// can no longer be decoded are logged and skipped.
    pub async fn list(
        pool: &SqlitePool,
        user_id: Option<&str>,
        filter: &ListFilter,
    ) -> AppResult<Vec<Reminder>> {
        let status = filter.status.map(|s| s.as_str());

        let rows = sqlx::query_as::<_, RowReminder>(&format!(
            r#"{}
            WHERE (? IS NULL OR user_id = ?)
            AND (? IS NULL OR status = ?)
            AND (? IS NULL OR priority = ?)
            AND (? IS NULL OR due_time >= ?)
            AND (? IS NULL OR due_time <= ?)
            ORDER BY due_time ASC
            "#,
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .bind(user_id)
        .bind(status)
        .bind(status)
        .bind(filter.priority)
        .bind(filter.priority)
        .bind(filter.from_time)
        .bind(filter.from_time)
        .bind(filter.to_time)
        .bind(filter.to_time)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        let mut reminders = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match Reminder::try_from(row) {
                Ok(r) => reminders.push(r),
                Err(e) => tracing::warn!("Skipping undecodable reminder {}: {}", id, e),
            }
        }
        Ok(reminders)
    }

    /// Overwrite all mutable fields. Returns `NotFound` if the row is gone.
    pub async fn update(pool: &SqlitePool, reminder: &Reminder) -> AppResult<Reminder> {
        let mut stored = reminder.clone();
        stored.updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE reminders
            SET user_id = ?, title = ?, description = ?, due_time = ?,
                recurrence_pattern = ?, priority = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&stored.user_id)
        .bind(&stored.title)
        .bind(stored.description.as_deref())
        .bind(stored.due_time)
        .bind(stored.recurrence.as_ref().map(|p| p.to_string()))
        .bind(stored.priority)
        .bind(stored.status.as_str())
        .bind(stored.updated_at)
        .bind(&stored.id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("reminder {}", stored.id)));
        }

        Ok(stored)
    }

    /// Delete a reminder; its notification logs go with it (ON DELETE CASCADE).
    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("reminder {}", id)));
        }

        Ok(())
    }

    /// Mark `current_id` completed and insert `successor` in a single transaction.
    pub async fn complete_and_insert(
        pool: &SqlitePool,
        current_id: &str,
        successor: &Reminder,
    ) -> AppResult<Reminder> {
        let now = Utc::now();
        let mut stored = successor.clone();
        stored.updated_at = now;

        let mut tx = pool.begin().await.map_err(AppError::Database)?;

        let result = sqlx::query("UPDATE reminders SET status = ?, updated_at = ? WHERE id = ?")
            .bind(ReminderStatus::Completed.as_str())
            .bind(now)
            .bind(current_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls it back.
            return Err(AppError::NotFound(format!("reminder {}", current_id)));
        }

        insert_query(&stored)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;

        Ok(stored)
    }
}
