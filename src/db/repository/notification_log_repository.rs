use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

#[derive(sqlx::FromRow)]
struct RowNotificationLog {
    id: String,
    reminder_id: String,
    notification_type: String,
    status: String,
    error_message: Option<String>,
    attempted_at: DateTime<Utc>,
}

impl TryFrom<RowNotificationLog> for NotificationLog {
    type Error = AppError;

    fn try_from(row: RowNotificationLog) -> Result<Self, Self::Error> {
        let notification_type =
            NotificationType::from_str(&row.notification_type).ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "unknown notification type {}",
                    row.notification_type
                ))
            })?;
        let status = DeliveryStatus::from_str(&row.status).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("unknown delivery status {}", row.status))
        })?;

        Ok(NotificationLog {
            id: row.id,
            reminder_id: row.reminder_id,
            notification_type,
            status,
            error_message: row.error_message,
            attempted_at: row.attempted_at,
        })
    }
}

// ============================================================================
// Notification Log Repository
// ============================================================================

pub struct NotificationLogRepository;

impl NotificationLogRepository {
    pub async fn create(
        pool: &SqlitePool,
        log: CreateNotificationLog,
    ) -> AppResult<NotificationLog> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO reminder_logs (
                id, reminder_id, notification_type, status, error_message, attempted_at
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&log.reminder_id)
        .bind(log.notification_type.as_str())
        .bind(log.status.as_str())
        .bind(log.error_message.as_deref())
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(NotificationLog {
            id,
            reminder_id: log.reminder_id,
            notification_type: log.notification_type,
            status: log.status,
            error_message: log.error_message,
            attempted_at: now,
        })
    }

    /// All attempts for a reminder, newest first.
    pub async fn find_by_reminder_id(
        pool: &SqlitePool,
        reminder_id: &str,
    ) -> AppResult<Vec<NotificationLog>> {
        let rows = sqlx::query_as::<_, RowNotificationLog>(
            r#"
            SELECT id, reminder_id, notification_type, status, error_message, attempted_at
            FROM reminder_logs
            WHERE reminder_id = ?
            ORDER BY attempted_at DESC
            "#,
        )
        .bind(reminder_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        rows.into_iter().map(NotificationLog::try_from).collect()
    }
}
