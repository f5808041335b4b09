use std::sync::Arc;

use crate::db::models::*;
use crate::error::{AppError, AppResult};
use crate::reminder::clock::Clock;
use crate::reminder::escalation::EscalationRegistry;
use crate::reminder::store::ReminderStore;

/// Reminder lifecycle on top of a [`ReminderStore`].
#[derive(Clone)]
pub struct ReminderService {
    store: Arc<dyn ReminderStore>,
    clock: Arc<dyn Clock>,
    escalations: EscalationRegistry,
}

impl ReminderService {
    pub fn new(store: Arc<dyn ReminderStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            escalations: EscalationRegistry::new(),
        }
    }

    pub fn escalations(&self) -> &EscalationRegistry {
        &self.escalations
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Store a new pending reminder.
    pub async fn create(&self, mut reminder: Reminder) -> AppResult<Reminder> {
        self.validate(&reminder)?;
        reminder.status = ReminderStatus::Pending;

        let created = self.store.create_reminder(&reminder).await?;
        tracing::info!(
            "Created reminder {} for user {} due {}",
            created.id,
            created.user_id,
            created.due_time
        );
        Ok(created)
    }

    /// Edit a pending reminder. Status changes go through `complete`/`cancel`.
    pub async fn update(&self, reminder: Reminder) -> AppResult<Reminder> {
        self.validate(&reminder)?;

        let current = self.store.get_reminder(&reminder.id).await?;
        if current.status.is_terminal() {
            return Err(AppError::Validation(format!(
                "reminder is already {}",
                current.status.as_str()
            )));
        }
        if reminder.status != current.status {
            return Err(AppError::Validation(
                "status cannot be changed by an update".to_string(),
            ));
        }

        self.store.update_reminder(&reminder).await
    }

    pub async fn get(&self, id: &str) -> AppResult<Reminder> {
        self.store.get_reminder(id).await
    }

    /// Look up one of `user_id`'s reminders by full id or a unique id prefix.
    pub async fn resolve(&self, user_id: &str, id_or_prefix: &str) -> AppResult<Reminder> {
        let needle = id_or_prefix.trim();
        if needle.is_empty() {
            return Err(AppError::Validation("reminder id is required".to_string()));
        }

        let mut matches = self.store.find_by_prefix(user_id, needle).await?;
        if let Some(pos) = matches.iter().position(|r| r.id == needle) {
            return Ok(matches.swap_remove(pos));
        }
        match matches.len() {
            0 => Err(AppError::NotFound(format!("reminder {}", needle))),
            1 => Ok(matches.remove(0)),
            n => Err(AppError::Validation(format!(
                "{} reminders start with '{}', use more characters",
                n, needle
            ))),
        }
    }

    pub async fn list(&self, user_id: Option<&str>, filter: &ListFilter) -> AppResult<Vec<Reminder>> {
        self.store.list_reminders(user_id, filter).await
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.escalations.cancel(id);
        self.store.delete_reminder(id).await?;
        tracing::info!("Deleted reminder {}", id);
        Ok(())
    }

    /// Acknowledge a reminder. Any pending escalation is dropped.
    pub async fn complete(&self, id: &str) -> AppResult<Reminder> {
        self.escalations.cancel(id);
        self.set_status(id, ReminderStatus::Completed).await
    }

    pub async fn cancel(&self, id: &str) -> AppResult<Reminder> {
        self.escalations.cancel(id);
        self.set_status(id, ReminderStatus::Cancelled).await
    }

    /// Mark a fired occurrence done without touching its escalation.
    pub(crate) async fn complete_occurrence(&self, id: &str) -> AppResult<Reminder> {
        self.set_status(id, ReminderStatus::Completed).await
    }

    /// Insert the next occurrence of a recurring reminder as-is, unless a
    /// pending row for the same occurrence already exists.
    pub(crate) async fn enroll_successor(&self, successor: &Reminder) -> AppResult<Reminder> {
        let same_slot = ListFilter {
            from_time: Some(successor.due_time),
            to_time: Some(successor.due_time),
            ..ListFilter::pending()
        };
        let existing = self
            .store
            .list_reminders(Some(&successor.user_id), &same_slot)
            .await?
            .into_iter()
            .find(|r| r.title == successor.title && r.recurrence == successor.recurrence);
        if let Some(existing) = existing {
            tracing::debug!(
                "Occurrence {} already enrolled as {}",
                successor.due_time,
                existing.id
            );
            return Ok(existing);
        }

        self.store.create_reminder(successor).await
    }

    pub async fn log_notification(&self, log: CreateNotificationLog) -> AppResult<NotificationLog> {
        self.store.create_notification_log(log).await
    }

    pub async fn notification_logs(&self, reminder_id: &str) -> AppResult<Vec<NotificationLog>> {
        self.store.notification_logs(reminder_id).await
    }

    /// Complete `current` and create `successor` in one store operation.
    pub async fn advance_occurrence(&self, current: &Reminder, successor: &Reminder) -> AppResult<Reminder> {
        let next = self.store.advance_occurrence(&current.id, successor).await?;
        tracing::info!(
            "Reminder {} completed, next occurrence {} due {}",
            current.id,
            next.id,
            next.due_time
        );
        Ok(next)
    }

    // Not atomic: concurrent writers race and the last write wins.
    async fn set_status(&self, id: &str, status: ReminderStatus) -> AppResult<Reminder> {
        let mut reminder = self.store.get_reminder(id).await?;
        if reminder.status == status {
            return Ok(reminder);
        }
        if reminder.status.is_terminal() {
            return Err(AppError::Validation(format!(
                "reminder is already {}",
                reminder.status.as_str()
            )));
        }
        reminder.status = status;
        self.store.update_reminder(&reminder).await
    }

    fn validate(&self, reminder: &Reminder) -> AppResult<()> {
        if reminder.title.trim().is_empty() {
            return Err(AppError::Validation("title must not be empty".to_string()));
        }
        if reminder.due_time <= self.clock.now() {
            return Err(AppError::Validation(
                "due time must be in the future".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::clock::FixedClock;
    use crate::reminder::store::InMemoryReminderStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 13, 10, 0, 0).unwrap()
    }

    fn service() -> (ReminderService, FixedClock) {
        let clock = FixedClock::new(t0());
        let service = ReminderService::new(
            Arc::new(InMemoryReminderStore::new()),
            Arc::new(clock.clone()),
        );
        (service, clock)
    }

    #[tokio::test]
    async fn create_requires_future_due_time_and_title() {
        let (service, _) = service();

        let err = service
            .create(Reminder::new("1", "tea", t0()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service
            .create(Reminder::new("1", "   ", t0() + Duration::minutes(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let created = service
            .create(Reminder::new("1", "tea", t0() + Duration::seconds(1)))
            .await
            .unwrap();
        assert_eq!(created.status, ReminderStatus::Pending);
    }

    #[tokio::test]
    async fn update_validates_and_reports_missing() {
        let (service, clock) = service();
        let mut reminder = service
            .create(Reminder::new("1", "tea", t0() + Duration::hours(1)))
            .await
            .unwrap();

        clock.advance(Duration::hours(2));
        reminder.title = "green tea".to_string();
        let err = service.update(reminder.clone()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        reminder.due_time = t0() + Duration::hours(3);
        let updated = service.update(reminder.clone()).await.unwrap();
        assert_eq!(updated.title, "green tea");

        let ghost = Reminder::new("1", "ghost", t0() + Duration::hours(5));
        let err = service.update(ghost).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn complete_is_idempotent() {
        let (service, _) = service();
        let reminder = service
            .create(Reminder::new("1", "tea", t0() + Duration::hours(1)))
            .await
            .unwrap();

        let done = service.complete(&reminder.id).await.unwrap();
        assert_eq!(done.status, ReminderStatus::Completed);
        let again = service.complete(&reminder.id).await.unwrap();
        assert_eq!(again.status, ReminderStatus::Completed);

        let err = service.complete("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn finished_reminders_keep_their_status() {
        let (service, _) = service();
        let done = service
            .create(Reminder::new("1", "tea", t0() + Duration::hours(1)))
            .await
            .unwrap();
        service.complete(&done.id).await.unwrap();

        let err = service.cancel(&done.id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(
            service.get(&done.id).await.unwrap().status,
            ReminderStatus::Completed
        );

        let dropped = service
            .create(Reminder::new("1", "coffee", t0() + Duration::hours(1)))
            .await
            .unwrap();
        service.cancel(&dropped.id).await.unwrap();
        assert_eq!(
            service.cancel(&dropped.id).await.unwrap().status,
            ReminderStatus::Cancelled
        );

        let err = service.complete(&dropped.id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(
            service.get(&dropped.id).await.unwrap().status,
            ReminderStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn update_cannot_reopen_or_change_status() {
        let (service, _) = service();
        let reminder = service
            .create(Reminder::new("1", "tea", t0() + Duration::hours(1)))
            .await
            .unwrap();

        let mut sneaky = reminder.clone();
        sneaky.status = ReminderStatus::Completed;
        let err = service.update(sneaky).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        service.complete(&reminder.id).await.unwrap();
        let mut reopened = reminder.clone();
        reopened.status = ReminderStatus::Pending;
        let err = service.update(reopened).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(
            service.get(&reminder.id).await.unwrap().status,
            ReminderStatus::Completed
        );
    }

    #[tokio::test]
    async fn successor_is_enrolled_once() {
        let (service, _) = service();
        let current = service
            .create(
                Reminder::new("1", "pills", t0() + Duration::hours(1))
                    .with_recurrence(RecurrencePattern::Daily),
            )
            .await
            .unwrap();

        let next = current.successor(current.due_time + Duration::days(1));
        let first = service.enroll_successor(&next).await.unwrap();
        let again = service
            .enroll_successor(&current.successor(next.due_time))
            .await
            .unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(service.list(Some("1"), &ListFilter::pending()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cancel_and_delete() {
        let (service, _) = service();
        let reminder = service
            .create(Reminder::new("1", "tea", t0() + Duration::hours(1)))
            .await
            .unwrap();

        let cancelled = service.cancel(&reminder.id).await.unwrap();
        assert_eq!(cancelled.status, ReminderStatus::Cancelled);

        service.delete(&reminder.id).await.unwrap();
        let err = service.get(&reminder.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = service.delete(&reminder.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_filters_by_user_and_priority() {
        let (service, _) = service();
        for (user, title, priority, hours) in [
            ("1", "b", false, 2),
            ("1", "a", true, 1),
            ("2", "c", false, 3),
        ] {
            service
                .create(
                    Reminder::new(user, title, t0() + Duration::hours(hours))
                        .with_priority(priority),
                )
                .await
                .unwrap();
        }

        let mine = service.list(Some("1"), &ListFilter::default()).await.unwrap();
        let titles: Vec<&str> = mine.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["a", "b"]);

        let everyone = service.list(None, &ListFilter::pending()).await.unwrap();
        assert_eq!(everyone.len(), 3);

        let regular = ListFilter {
            priority: Some(false),
            ..Default::default()
        };
        assert_eq!(service.list(Some("1"), &regular).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolve_accepts_full_id_and_prefix() {
        let (service, _) = service();
        let reminder = service
            .create(Reminder::new("1", "tea", t0() + Duration::hours(1)))
            .await
            .unwrap();

        let by_id = service.resolve("1", &reminder.id).await.unwrap();
        assert_eq!(by_id.id, reminder.id);

        let by_prefix = service.resolve("1", reminder.short_id()).await.unwrap();
        assert_eq!(by_prefix.id, reminder.id);

        let err = service.resolve("2", reminder.short_id()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = service.resolve("1", " ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn advance_occurrence_completes_and_enrolls() {
        let (service, _) = service();
        let current = service
            .create(
                Reminder::new("1", "stretch", t0() + Duration::hours(1))
                    .with_recurrence(RecurrencePattern::Daily),
            )
            .await
            .unwrap();

        let successor = current.successor(current.due_time + Duration::days(1));
        let next = service.advance_occurrence(&current, &successor).await.unwrap();

        assert_eq!(
            service.get(&current.id).await.unwrap().status,
            ReminderStatus::Completed
        );
        assert_eq!(next.status, ReminderStatus::Pending);
        assert_eq!(next.recurrence, Some(RecurrencePattern::Daily));
    }

    #[tokio::test]
    async fn complete_disarms_escalation() {
        let (service, _) = service();
        let reminder = service
            .create(Reminder::new("1", "pills", t0() + Duration::hours(1)).with_priority(true))
            .await
            .unwrap();

        service
            .escalations()
            .arm(&reminder.id, std::time::Duration::from_secs(60), async {});
        assert!(service.escalations().is_armed(&reminder.id));

        service.complete(&reminder.id).await.unwrap();
        assert!(!service.escalations().is_armed(&reminder.id));
    }
}
