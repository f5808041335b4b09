use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::db::models::*;
use crate::db::repository::{NotificationLogRepository, ReminderRepository};
use crate::error::{AppError, AppResult};

/// Persistence used by the reminder service and scheduler.
#[async_trait]
pub trait ReminderStore: Send + Sync + 'static {
    async fn create_reminder(&self, reminder: &Reminder) -> AppResult<Reminder>;

    /// `NotFound` when no reminder has this id.
    async fn get_reminder(&self, id: &str) -> AppResult<Reminder>;

    /// Reminders of `user_id` whose id starts with `prefix`.
    async fn find_by_prefix(&self, user_id: &str, prefix: &str) -> AppResult<Vec<Reminder>>;

    /// Ordered by ascending due time. `None` lists every user's reminders.
    async fn list_reminders(
        &self,
        user_id: Option<&str>,
        filter: &ListFilter,
    ) -> AppResult<Vec<Reminder>>;

    async fn update_reminder(&self, reminder: &Reminder) -> AppResult<Reminder>;

    async fn delete_reminder(&self, id: &str) -> AppResult<()>;

    async fn create_notification_log(&self, log: CreateNotificationLog) -> AppResult<NotificationLog>;

    /// Newest first.
    async fn notification_logs(&self, reminder_id: &str) -> AppResult<Vec<NotificationLog>>;

    /// Complete `current_id` and insert `successor` as one unit.
    async fn advance_occurrence(&self, current_id: &str, successor: &Reminder) -> AppResult<Reminder>;
}

#[derive(Clone)]
pub struct SqliteReminderStore {
    pool: SqlitePool,
}

impl SqliteReminderStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderStore for SqliteReminderStore {
    async fn create_reminder(&self, reminder: &Reminder) -> AppResult<Reminder> {
        ReminderRepository::create(&self.pool, reminder).await
    }

    async fn get_reminder(&self, id: &str) -> AppResult<Reminder> {
        ReminderRepository::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("reminder {}", id)))
    }

    async fn find_by_prefix(&self, user_id: &str, prefix: &str) -> AppResult<Vec<Reminder>> {
        ReminderRepository::find_by_id_prefix(&self.pool, user_id, prefix).await
    }

    async fn list_reminders(
        &self,
        user_id: Option<&str>,
        filter: &ListFilter,
    ) -> AppResult<Vec<Reminder>> {
        ReminderRepository::list(&self.pool, user_id, filter).await
    }

    async fn update_reminder(&self, reminder: &Reminder) -> AppResult<Reminder> {
        ReminderRepository::update(&self.pool, reminder).await
    }

    async fn delete_reminder(&self, id: &str) -> AppResult<()> {
        ReminderRepository::delete(&self.pool, id).await
    }

    async fn create_notification_log(&self, log: CreateNotificationLog) -> AppResult<NotificationLog> {
        NotificationLogRepository::create(&self.pool, log).await
    }

    async fn notification_logs(&self, reminder_id: &str) -> AppResult<Vec<NotificationLog>> {
        NotificationLogRepository::find_by_reminder_id(&self.pool, reminder_id).await
    }

    async fn advance_occurrence(&self, current_id: &str, successor: &Reminder) -> AppResult<Reminder> {
        ReminderRepository::complete_and_insert(&self.pool, current_id, successor).await
    }
}

#[cfg(test)]
pub use memory::InMemoryReminderStore;

#[cfg(test)]
mod memory {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;

    #[derive(Default)]
    pub struct InMemoryReminderStore {
        reminders: Mutex<Vec<Reminder>>,
        logs: Mutex<Vec<NotificationLog>>,
    }

    impl InMemoryReminderStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl ReminderStore for InMemoryReminderStore {
        async fn create_reminder(&self, reminder: &Reminder) -> AppResult<Reminder> {
            let mut stored = reminder.clone();
            stored.updated_at = Utc::now();
            self.reminders.lock().unwrap().push(stored.clone());
            Ok(stored)
        }

        async fn get_reminder(&self, id: &str) -> AppResult<Reminder> {
            self.reminders
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("reminder {}", id)))
        }

        async fn find_by_prefix(&self, user_id: &str, prefix: &str) -> AppResult<Vec<Reminder>> {
            Ok(self
                .reminders
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.user_id == user_id && r.id.starts_with(prefix))
                .cloned()
                .collect())
        }

        async fn list_reminders(
            &self,
            user_id: Option<&str>,
            filter: &ListFilter,
        ) -> AppResult<Vec<Reminder>> {
            let mut found: Vec<Reminder> = self
                .reminders
                .lock()
                .unwrap()
                .iter()
                .filter(|r| user_id.map_or(true, |u| r.user_id == u) && filter.matches(r))
                .cloned()
                .collect();
            found.sort_by_key(|r| r.due_time);
            Ok(found)
        }

        async fn update_reminder(&self, reminder: &Reminder) -> AppResult<Reminder> {
            let mut reminders = self.reminders.lock().unwrap();
            let slot = reminders
                .iter_mut()
                .find(|r| r.id == reminder.id)
                .ok_or_else(|| AppError::NotFound(format!("reminder {}", reminder.id)))?;
            *slot = reminder.clone();
            slot.updated_at = Utc::now();
            Ok(slot.clone())
        }

        async fn delete_reminder(&self, id: &str) -> AppResult<()> {
            let mut reminders = self.reminders.lock().unwrap();
            let before = reminders.len();
            reminders.retain(|r| r.id != id);
            if reminders.len() == before {
                return Err(AppError::NotFound(format!("reminder {}", id)));
            }
            self.logs.lock().unwrap().retain(|l| l.reminder_id != id);
            Ok(())
        }

        async fn create_notification_log(
            &self,
            log: CreateNotificationLog,
        ) -> AppResult<NotificationLog> {
            let entry = NotificationLog {
                id: uuid::Uuid::new_v4().to_string(),
                reminder_id: log.reminder_id,
                notification_type: log.notification_type,
                status: log.status,
                error_message: log.error_message,
                attempted_at: Utc::now(),
            };
            self.logs.lock().unwrap().push(entry.clone());
            Ok(entry)
        }

        async fn notification_logs(&self, reminder_id: &str) -> AppResult<Vec<NotificationLog>> {
            Ok(self
                .logs
                .lock()
                .unwrap()
                .iter()
                .rev()
                .filter(|l| l.reminder_id == reminder_id)
                .cloned()
                .collect())
        }

        async fn advance_occurrence(
            &self,
            current_id: &str,
            successor: &Reminder,
        ) -> AppResult<Reminder> {
            let mut reminders = self.reminders.lock().unwrap();
            let current = reminders
                .iter_mut()
                .find(|r| r.id == current_id)
                .ok_or_else(|| AppError::NotFound(format!("reminder {}", current_id)))?;
            current.status = ReminderStatus::Completed;
            current.updated_at = Utc::now();

            let mut stored = successor.clone();
            stored.updated_at = Utc::now();
            reminders.push(stored.clone());
            Ok(stored)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn sqlite_store() -> SqliteReminderStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteReminderStore::new(pool)
    }

    #[tokio::test]
    async fn sqlite_round_trip_keeps_pattern() {
        let store = sqlite_store().await;
        let due = Utc::now() + Duration::hours(1);
        let reminder = Reminder::new("42", "water plants", due)
            .with_recurrence("weekly:sunday".parse().unwrap())
            .with_description("balcony first")
            .with_priority(true);

        store.create_reminder(&reminder).await.unwrap();
        let loaded = store.get_reminder(&reminder.id).await.unwrap();

        assert_eq!(loaded.title, "water plants");
        assert_eq!(loaded.description.as_deref(), Some("balcony first"));
        assert_eq!(loaded.recurrence, reminder.recurrence);
        assert!(loaded.priority);
        assert_eq!(loaded.status, ReminderStatus::Pending);
        assert_eq!(loaded.due_time, reminder.due_time);
    }

    #[tokio::test]
    async fn sqlite_list_filters_and_orders() {
        let store = sqlite_store().await;
        let now = Utc::now();
        let late = Reminder::new("1", "late", now + Duration::hours(3));
        let early = Reminder::new("1", "early", now + Duration::hours(1)).with_priority(true);
        let other = Reminder::new("2", "other user", now + Duration::hours(2));
        for r in [&late, &early, &other] {
            store.create_reminder(r).await.unwrap();
        }

        let all = store.list_reminders(None, &ListFilter::default()).await.unwrap();
        let titles: Vec<&str> = all.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["early", "other user", "late"]);

        let mine = store
            .list_reminders(Some("1"), &ListFilter::pending())
            .await
            .unwrap();
        assert_eq!(mine.len(), 2);

        let priority = ListFilter {
            priority: Some(true),
            ..Default::default()
        };
        let found = store.list_reminders(Some("1"), &priority).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, early.id);

        let window = ListFilter {
            to_time: Some(now + Duration::hours(2)),
            ..ListFilter::pending()
        };
        let due_soon = store.list_reminders(None, &window).await.unwrap();
        assert_eq!(due_soon.len(), 2);
    }

    #[tokio::test]
    async fn sqlite_missing_rows_are_not_found() {
        let store = sqlite_store().await;
        let ghost = Reminder::new("1", "ghost", Utc::now());

        assert!(matches!(
            store.get_reminder(&ghost.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            store.update_reminder(&ghost).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            store.delete_reminder(&ghost.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn sqlite_advance_occurrence_is_atomic() {
        let store = sqlite_store().await;
        let due = Utc::now();
        let current = Reminder::new("1", "stretch", due).with_recurrence("daily".parse().unwrap());
        store.create_reminder(&current).await.unwrap();

        let successor = current.successor(due + Duration::days(1));
        store.advance_occurrence(&current.id, &successor).await.unwrap();

        assert_eq!(
            store.get_reminder(&current.id).await.unwrap().status,
            ReminderStatus::Completed
        );
        assert_eq!(
            store.get_reminder(&successor.id).await.unwrap().status,
            ReminderStatus::Pending
        );

        // Unknown current id rolls back the insert.
        let orphan = current.successor(due + Duration::days(2));
        let err = store.advance_occurrence("missing", &orphan).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(matches!(
            store.get_reminder(&orphan.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn sqlite_logs_are_newest_first_and_cascade() {
        let store = sqlite_store().await;
        let reminder = Reminder::new("1", "tea", Utc::now());
        store.create_reminder(&reminder).await.unwrap();

        let failed: Result<(), AppError> = Err(AppError::Delivery("timeout".into()));
        store
            .create_notification_log(CreateNotificationLog::from_outcome(
                &reminder.id,
                NotificationType::Message,
                &failed,
            ))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store
            .create_notification_log(CreateNotificationLog::from_outcome(
                &reminder.id,
                NotificationType::Call,
                &Ok::<(), AppError>(()),
            ))
            .await
            .unwrap();

        let logs = store.notification_logs(&reminder.id).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].notification_type, NotificationType::Call);
        assert_eq!(logs[0].status, DeliveryStatus::Success);
        assert_eq!(logs[1].status, DeliveryStatus::Failed);
        assert_eq!(
            logs[1].error_message.as_deref(),
            Some("Delivery failed: timeout")
        );

        store.delete_reminder(&reminder.id).await.unwrap();
        assert!(store.notification_logs(&reminder.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sqlite_prefix_lookup_treats_wildcards_literally() {
        let store = sqlite_store().await;
        let reminder = Reminder::new("1", "tea", Utc::now());
        store.create_reminder(&reminder).await.unwrap();

        let short = &reminder.id[..8];
        let found = store.find_by_prefix("1", short).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, reminder.id);

        assert!(store.find_by_prefix("1", "%").await.unwrap().is_empty());
        assert!(store.find_by_prefix("1", "_").await.unwrap().is_empty());
        assert!(store.find_by_prefix("1", "\\").await.unwrap().is_empty());
        assert!(store.find_by_prefix("2", short).await.unwrap().is_empty());
    }
}
