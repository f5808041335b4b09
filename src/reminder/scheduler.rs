use std::sync::Arc;
use std::time::Duration;

use crate::db::models::*;
use crate::error::AppResult;
use crate::reminder::recurrence::OccurrenceCalculator;
use crate::reminder::service::ReminderService;
use crate::services::notifications::{
    parse_recipient, render_escalation, render_reminder_notification, Notifier,
};

/// Delivers due reminders and re-enrolls recurring ones.
pub struct ReminderScheduler {
    service: ReminderService,
    notifier: Arc<dyn Notifier>,
    calculator: Arc<dyn OccurrenceCalculator>,
    poll_interval: Duration,
    escalation_delay: Duration,
}

impl ReminderScheduler {
    pub fn new(
        service: ReminderService,
        notifier: Arc<dyn Notifier>,
        calculator: Arc<dyn OccurrenceCalculator>,
        poll_interval: Duration,
        escalation_delay: Duration,
    ) -> Self {
        Self {
            service,
            notifier,
            calculator,
            poll_interval,
            escalation_delay,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Abort every armed escalation. Pending reminders are picked up again
    /// on the next start.
    pub fn shutdown(&self) {
        let escalations = self.service.escalations();
        if !escalations.is_empty() {
            tracing::info!("Dropping {} armed escalations", escalations.len());
        }
        escalations.cancel_all();
    }

    /// One scheduler tick. Returns how many reminders were delivered.
    pub async fn check_reminders(&self) -> usize {
        let now = self.service.clock().now();
        let window = chrono::Duration::from_std(self.poll_interval)
            .unwrap_or_else(|_| chrono::Duration::minutes(1));
        let filter = ListFilter {
            to_time: Some(now + window),
            ..ListFilter::pending()
        };

        let candidates = match self.service.list(None, &filter).await {
            Ok(reminders) => reminders,
            Err(e) => {
                tracing::warn!("Failed to fetch due reminders: {:?}", e);
                return 0;
            }
        };
        tracing::debug!("Scheduler tick: {} pending reminders in window", candidates.len());

        let mut delivered = 0;
        for reminder in candidates {
            if reminder.due_time > now {
                continue;
            }
            if self.service.escalations().is_armed(&reminder.id) {
                continue;
            }

            let id = reminder.id.clone();
            match self.fire(reminder, now).await {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!("Reminder {} not delivered: {}", id, e),
            }
        }

        delivered
    }

    /// Deliver one due reminder and settle it. Returns whether a message went
    /// out on this call; a reminder already delivered before a restart is
    /// settled without sending it again.
    async fn fire(&self, reminder: Reminder, now: chrono::DateTime<chrono::Utc>) -> AppResult<bool> {
        let resumed = self.already_delivered(&reminder).await?;
        if resumed {
            tracing::info!(
                "Reminder {} was delivered before, resuming without resending",
                reminder.id
            );
        } else {
            let text = render_reminder_notification(&reminder);
            let outcome = match parse_recipient(&reminder.user_id) {
                Ok(recipient) => self.notifier.send_text(recipient, &text).await,
                Err(e) => Err(e),
            };
            self.record(&reminder, NotificationType::Message, &outcome).await;
            outcome?;

            tracing::info!("Delivered reminder {} to user {}", reminder.id, reminder.user_id);
        }

        if reminder.priority {
            if let Some(successor) = self.next_occurrence(&reminder, now) {
                if let Err(e) = self.service.enroll_successor(&successor).await {
                    tracing::error!(
                        "Failed to enroll next occurrence of reminder {}: {}",
                        reminder.id,
                        e
                    );
                }
            }
            self.arm_escalation(reminder);
            return Ok(!resumed);
        }

        let finished = match self.next_occurrence(&reminder, now) {
            Some(successor) => self
                .service
                .advance_occurrence(&reminder, &successor)
                .await
                .map(|_| ()),
            None => self.service.complete_occurrence(&reminder.id).await.map(|_| ()),
        };
        if let Err(e) = finished {
            tracing::error!("Failed to finish reminder {}: {}", reminder.id, e);
        }

        Ok(!resumed)
    }

    /// Whether the primary message for this occurrence already went out.
    async fn already_delivered(&self, reminder: &Reminder) -> AppResult<bool> {
        let logs = self.service.notification_logs(&reminder.id).await?;
        Ok(logs.iter().any(|log| {
            log.notification_type == NotificationType::Message
                && log.status == DeliveryStatus::Success
        }))
    }

    /// The successor of a recurring reminder. Calculation failures are logged
    /// and yield `None` so the current occurrence is still closed.
    fn next_occurrence(&self, reminder: &Reminder, now: chrono::DateTime<chrono::Utc>) -> Option<Reminder> {
        let pattern = reminder.recurrence.as_ref()?;
        match self.calculator.next_occurrence(pattern, reminder.due_time, now) {
            Ok(due) => Some(reminder.successor(due)),
            Err(e) => {
                tracing::error!(
                    "Failed to calculate next occurrence of reminder {} ({}): {}",
                    reminder.id,
                    pattern,
                    e
                );
                None
            }
        }
    }

    fn arm_escalation(&self, reminder: Reminder) {
        let service = self.service.clone();
        let notifier = self.notifier.clone();
        let id = reminder.id.clone();

        self.service
            .escalations()
            .arm(&id, self.escalation_delay, async move {
                escalate(service, notifier, reminder).await;
            });
        tracing::debug!(
            "Escalation armed for reminder {} in {:?}",
            id,
            self.escalation_delay
        );
    }

    async fn record<T>(&self, reminder: &Reminder, kind: NotificationType, outcome: &AppResult<T>) {
        let log = CreateNotificationLog::from_outcome(&reminder.id, kind, outcome);
        if let Err(e) = self.service.log_notification(log).await {
            tracing::warn!("Failed to log notification for reminder {}: {}", reminder.id, e);
        }
    }
}

/// Runs once the escalation delay has elapsed without acknowledgement.
async fn escalate(service: ReminderService, notifier: Arc<dyn Notifier>, reminder: Reminder) {
    let current = match service.get(&reminder.id).await {
        Ok(current) => current,
        Err(e) => {
            tracing::debug!("Escalation for reminder {} dropped: {}", reminder.id, e);
            return;
        }
    };
    if current.status != ReminderStatus::Pending {
        return;
    }

    let outcome = match parse_recipient(&current.user_id) {
        Ok(recipient) => notifier.send_text(recipient, &render_escalation(&current)).await,
        Err(e) => Err(e),
    };
    match &outcome {
        Ok(()) => tracing::info!("Escalated priority reminder {}", current.id),
        Err(e) => tracing::warn!("Escalation for reminder {} failed: {}", current.id, e),
    }

    let log = CreateNotificationLog::from_outcome(&current.id, NotificationType::Call, &outcome);
    if let Err(e) = service.log_notification(log).await {
        tracing::warn!("Failed to log escalation for reminder {}: {}", current.id, e);
    }

    if let Err(e) = service.complete_occurrence(&current.id).await {
        tracing::error!("Failed to complete reminder {} after escalation: {}", current.id, e);
    }
}
